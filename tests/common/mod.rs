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

#![allow(dead_code)]

use async_trait::async_trait;
use iggy_table_view::prelude::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const TOPIC: &str = "users";

/// Routes by the first key byte, so `"a"` lands in partition 0 and `"b"` in partition 1 of two.
#[derive(Debug, Default)]
pub struct FirstByteHasher;

impl KeyHasher for FirstByteHasher {
    fn hash32(&self, key: &[u8]) -> u32 {
        key.first().map_or(0, |byte| *byte as u32 + 1)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn fast_catchup() -> CatchupSettings {
    CatchupSettings {
        poll_batch_length: 16,
        poll_interval: Duration::from_millis(5),
        restart_backoff: Duration::from_millis(5),
        max_restarts: Some(3),
    }
}

pub fn first_byte_log(partitions: u32) -> MemoryLog {
    let log = MemoryLog::with_hasher(Arc::new(FirstByteHasher));
    log.create_topic(TOPIC, partitions);
    log
}

pub fn options(clients: ClientBuilders) -> ViewOptions {
    ViewOptions::builder()
        .clients(clients)
        .hasher(Arc::new(FirstByteHasher) as Arc<dyn KeyHasher>)
        .catchup(fast_catchup())
        .build()
}

pub async fn view(log: &MemoryLog) -> View<StringCodec> {
    View::new(&[], TOPIC, StringCodec, options(ClientBuilders::memory(log)))
        .await
        .expect("view should be created")
}

pub struct RunningView<C: Codec> {
    pub view: Arc<View<C>>,
    pub token: CancellationToken,
    pub run: JoinHandle<Result<(), ViewError>>,
}

impl<C: Codec> RunningView<C> {
    pub async fn stop(self) -> Result<(), ViewError> {
        self.token.cancel();
        self.run.await.expect("run task should not panic")
    }
}

pub fn start<C: Codec>(view: View<C>) -> RunningView<C> {
    let view = Arc::new(view);
    let token = CancellationToken::new();
    let run = tokio::spawn({
        let view = view.clone();
        let token = token.clone();
        async move { view.run(token).await }
    });
    RunningView { view, token, run }
}

pub async fn start_and_wait<C: Codec>(view: View<C>) -> RunningView<C> {
    let running = start(view);
    tokio::time::timeout(Duration::from_secs(5), running.view.wait_running())
        .await
        .expect("view should reach running state");
    running
}

pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition was not met in time");
}

/// Storage builder keeping a handle to every storage it creates.
pub fn recording_storage() -> (StorageBuilder, Arc<Mutex<Vec<Arc<MemoryStorage>>>>) {
    let created = Arc::new(Mutex::new(Vec::new()));
    let builder: StorageBuilder = {
        let created = created.clone();
        Arc::new(move |_topic: &str, _partition: u32| {
            let storage = Arc::new(MemoryStorage::new());
            created.lock().push(storage.clone());
            Ok(storage as Arc<dyn Storage>)
        })
    };
    (builder, created)
}

/// Consumer failing every poll of one partition.
pub struct FailingConsumer {
    pub log: MemoryLog,
    pub partition: u32,
}

#[async_trait]
impl LogConsumer for FailingConsumer {
    async fn offsets(&self, topic: &str, partition: u32) -> Result<PartitionOffsets, ViewError> {
        self.log.offsets(topic, partition).await
    }

    async fn poll(
        &self,
        topic: &str,
        partition: u32,
        offset: u64,
        count: u32,
    ) -> Result<Vec<Record>, ViewError> {
        if partition == self.partition {
            return Err(ViewError::Log(format!("partition {partition} is unavailable")));
        }
        self.log.poll(topic, partition, offset, count).await
    }
}

/// Consumer counting the polls it serves.
pub struct CountingConsumer {
    pub log: MemoryLog,
    pub polls: Arc<AtomicUsize>,
}

#[async_trait]
impl LogConsumer for CountingConsumer {
    async fn offsets(&self, topic: &str, partition: u32) -> Result<PartitionOffsets, ViewError> {
        self.log.offsets(topic, partition).await
    }

    async fn poll(
        &self,
        topic: &str,
        partition: u32,
        offset: u64,
        count: u32,
    ) -> Result<Vec<Record>, ViewError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.log.poll(topic, partition, offset, count).await
    }
}

/// Topic manager reporting a fixed partition list.
pub struct FixedTopicManager {
    pub partitions: Vec<u32>,
}

#[async_trait]
impl TopicManager for FixedTopicManager {
    async fn partitions(&self, _topic: &str) -> Result<Vec<u32>, ViewError> {
        Ok(self.partitions.clone())
    }

    async fn close(&self) -> Result<(), ViewError> {
        Ok(())
    }
}
