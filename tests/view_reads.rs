/* Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

mod common;

use bytes::Bytes;
use common::*;
use iggy_table_view::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn collect(iterator: &mut ViewIterator<StringCodec>) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    while iterator.next() {
        let key = String::from_utf8(iterator.key().unwrap().to_vec()).unwrap();
        let value = iterator.value().unwrap().unwrap();
        entries.push((key, value));
    }
    assert!(iterator.err().is_none());
    entries
}

fn pairs(entries: &[(&str, &str)]) -> Vec<(String, String)> {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

async fn two_partition_view() -> (MemoryLog, RunningView<StringCodec>) {
    let log = first_byte_log(2);
    assert_eq!(log.append(TOPIC, "b", "2").unwrap().0, 1);
    assert_eq!(log.append(TOPIC, "a", "1").unwrap().0, 0);
    let running = start_and_wait(view(&log).await).await;
    (log, running)
}

#[tokio::test]
async fn iterator_should_merge_partitions_in_key_order() {
    let (_log, running) = two_partition_view().await;

    let mut iterator = running.view.iterator().unwrap();
    assert_eq!(collect(&mut iterator), pairs(&[("a", "1"), ("b", "2")]));

    running.stop().await.unwrap();
}

#[tokio::test]
async fn ranged_iterator_should_respect_bounds() {
    let (_log, running) = two_partition_view().await;

    let mut iterator = running.view.iterator_with_range("b", "z").unwrap();
    assert_eq!(collect(&mut iterator), pairs(&[("b", "2")]));

    let mut iterator = running.view.iterator_with_range("a", "b").unwrap();
    assert_eq!(collect(&mut iterator), pairs(&[("a", "1")]));

    let mut iterator = running.view.iterator_with_range("a", "").unwrap();
    assert_eq!(collect(&mut iterator).len(), 2);

    running.stop().await.unwrap();
}

#[tokio::test]
async fn get_should_return_none_for_missing_key() {
    let (_log, running) = two_partition_view().await;

    assert_eq!(running.view.get("missing").unwrap(), None);
    assert!(!running.view.has("missing").unwrap());
    assert!(running.view.has("a").unwrap());

    running.stop().await.unwrap();
}

#[tokio::test]
async fn evict_should_only_affect_local_view() {
    let (log, running) = two_partition_view().await;

    running.view.evict("a").unwrap();
    assert_eq!(running.view.get("a").unwrap(), None);

    let other = start_and_wait(view(&log).await).await;
    assert_eq!(other.view.get("a").unwrap().as_deref(), Some("1"));

    other.stop().await.unwrap();
    running.stop().await.unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    name: String,
    age: u8,
}

#[tokio::test]
async fn json_values_should_be_decoded() {
    let log = first_byte_log(1);
    let codec = JsonCodec::<User>::new();
    let user = User {
        name: "Alice".to_owned(),
        age: 30,
    };
    log.append(TOPIC, "alice", codec.encode(&user).unwrap()).unwrap();
    log.append(TOPIC, "broken", "{not json").unwrap();

    let options = options(ClientBuilders::memory(&log));
    let view = View::new(&[], TOPIC, codec, options).await.unwrap();
    let running = start_and_wait(view).await;

    assert_eq!(running.view.get("alice").unwrap(), Some(user));
    assert!(matches!(
        running.view.get("broken"),
        Err(ViewError::Decode(_))
    ));

    running.stop().await.unwrap();
}

#[tokio::test]
async fn empty_topic_should_fail_routing() {
    let log = first_byte_log(0);
    let running = start_and_wait(view(&log).await).await;

    assert_eq!(running.view.partitions_count(), 0);
    assert!(running.view.recovered());
    assert!(matches!(running.view.get("a"), Err(ViewError::EmptyView)));
    assert!(matches!(running.view.has("a"), Err(ViewError::EmptyView)));
    assert!(!running.view.iterator().unwrap().next());

    running.stop().await.unwrap();
}

#[tokio::test]
async fn stats_should_serialize_to_json() {
    let (_log, running) = two_partition_view().await;

    let stats = running.view.stats(&CancellationToken::new()).await;
    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["partitions"]["0"]["records_applied"], 1);
    assert_eq!(json["partitions"]["1"]["status"], "recovered");

    running.stop().await.unwrap();
}

/// Memory storage whose iterators count releases, optionally failing to open them.
#[derive(Debug)]
struct TrackedStorage {
    inner: MemoryStorage,
    fail_iterators: bool,
    released: Arc<AtomicUsize>,
}

struct TrackedIterator {
    inner: Box<dyn StorageIterator>,
    released: Arc<AtomicUsize>,
}

impl StorageIterator for TrackedIterator {
    fn next(&mut self) -> bool {
        self.inner.next()
    }

    fn key(&self) -> Option<&Bytes> {
        self.inner.key()
    }

    fn value(&self) -> Option<&Bytes> {
        self.inner.value()
    }

    fn seek(&mut self, key: &[u8]) -> bool {
        self.inner.seek(key)
    }

    fn err(&self) -> Option<ViewError> {
        self.inner.err()
    }

    fn release(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release();
    }
}

impl TrackedStorage {
    fn track(
        &self,
        iterator: Result<Box<dyn StorageIterator>, ViewError>,
    ) -> Result<Box<dyn StorageIterator>, ViewError> {
        if self.fail_iterators {
            return Err(ViewError::Storage("iterator unavailable".to_owned()));
        }
        Ok(Box::new(TrackedIterator {
            inner: iterator?,
            released: self.released.clone(),
        }))
    }
}

impl Storage for TrackedStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, ViewError> {
        self.inner.get(key)
    }

    fn has(&self, key: &[u8]) -> Result<bool, ViewError> {
        self.inner.has(key)
    }

    fn set(&self, key: &[u8], value: Bytes) -> Result<(), ViewError> {
        self.inner.set(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), ViewError> {
        self.inner.delete(key)
    }

    fn offset(&self) -> Result<Option<u64>, ViewError> {
        self.inner.offset()
    }

    fn set_offset(&self, offset: u64) -> Result<(), ViewError> {
        self.inner.set_offset(offset)
    }

    fn iterator(&self) -> Result<Box<dyn StorageIterator>, ViewError> {
        self.track(self.inner.iterator())
    }

    fn iterator_with_range(
        &self,
        start: &[u8],
        limit: &[u8],
    ) -> Result<Box<dyn StorageIterator>, ViewError> {
        self.track(self.inner.iterator_with_range(start, limit))
    }

    fn close(&self) -> Result<(), ViewError> {
        self.inner.close()
    }
}

fn tracked_view_options(log: &MemoryLog, released: Arc<AtomicUsize>) -> ViewOptions {
    let storage: StorageBuilder = Arc::new(move |_topic: &str, partition: u32| {
        Ok(Arc::new(TrackedStorage {
            inner: MemoryStorage::new(),
            fail_iterators: partition == 2,
            released: released.clone(),
        }) as Arc<dyn Storage>)
    });
    ViewOptions::builder()
        .clients(ClientBuilders::memory(log))
        .hasher(Arc::new(FirstByteHasher) as Arc<dyn KeyHasher>)
        .storage(storage)
        .catchup(fast_catchup())
        .build()
}

#[tokio::test]
async fn failed_iterator_open_should_release_opened_iterators() {
    let log = first_byte_log(3);
    let released = Arc::new(AtomicUsize::new(0));
    let view = View::new(
        &[],
        TOPIC,
        StringCodec,
        tracked_view_options(&log, released.clone()),
    )
    .await
    .unwrap();

    let error = view.iterator().unwrap_err();
    assert!(matches!(error, ViewError::Storage(_)));
    assert_eq!(released.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn dropping_iterator_should_release_every_partition() {
    let log = first_byte_log(2);
    let released = Arc::new(AtomicUsize::new(0));
    let view = View::new(
        &[],
        TOPIC,
        StringCodec,
        tracked_view_options(&log, released.clone()),
    )
    .await
    .unwrap();

    let mut iterator = view.iterator().unwrap();
    iterator.next();
    drop(iterator);
    assert_eq!(released.load(Ordering::SeqCst), 2);
}
