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

use super::{LogConsumer, PartitionOffsets, Record, TopicManager};
use crate::error::ViewError;
use crate::router::{self, KeyHasher, XxHash32Hasher};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;

/// In-process partitioned log.
///
/// Clones share the same topics, so a writer and any number of views can use it
/// concurrently. Keyed appends are routed with the same hasher a view uses by
/// default, which keeps each key in the partition the view will look it up in.
#[derive(Debug, Clone)]
pub struct MemoryLog {
    topics: Arc<RwLock<HashMap<String, Vec<Vec<Record>>>>>,
    hasher: Arc<dyn KeyHasher>,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::with_hasher(Arc::new(XxHash32Hasher::default()))
    }
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hasher(hasher: Arc<dyn KeyHasher>) -> Self {
        Self {
            topics: Arc::new(RwLock::new(HashMap::new())),
            hasher,
        }
    }

    /// Creates the topic with `partitions` empty partitions, a no-op if it already exists.
    pub fn create_topic(&self, topic: &str, partitions: u32) {
        self.topics
            .write()
            .entry(topic.to_owned())
            .or_insert_with(|| vec![Vec::new(); partitions as usize]);
    }

    /// Appends a keyed value to the partition owning the key, returns `(partition, offset)`.
    pub fn append(
        &self,
        topic: &str,
        key: impl AsRef<[u8]>,
        value: impl Into<Bytes>,
    ) -> Result<(u32, u64), ViewError> {
        self.append_routed(topic, key.as_ref(), Some(value.into()))
    }

    /// Appends a tombstone for the key, returns `(partition, offset)`.
    pub fn delete(&self, topic: &str, key: impl AsRef<[u8]>) -> Result<(u32, u64), ViewError> {
        self.append_routed(topic, key.as_ref(), None)
    }

    pub fn append_to(
        &self,
        topic: &str,
        partition: u32,
        key: impl AsRef<[u8]>,
        value: Option<Bytes>,
    ) -> Result<u64, ViewError> {
        let mut topics = self.topics.write();
        let partitions = topics
            .get_mut(topic)
            .ok_or_else(|| ViewError::TopicNotFound(topic.to_owned()))?;
        let records = partitions
            .get_mut(partition as usize)
            .ok_or_else(|| ViewError::PartitionNotFound(topic.to_owned(), partition))?;

        let offset = records.len() as u64;
        records.push(Record {
            offset,
            timestamp: now_micros(),
            key: Bytes::copy_from_slice(key.as_ref()),
            value,
        });
        trace!("appended record at offset {offset} to topic {topic}, partition {partition}");
        Ok(offset)
    }

    pub fn partitions_count(&self, topic: &str) -> Option<u32> {
        self.topics
            .read()
            .get(topic)
            .map(|partitions| partitions.len() as u32)
    }

    fn append_routed(
        &self,
        topic: &str,
        key: &[u8],
        value: Option<Bytes>,
    ) -> Result<(u32, u64), ViewError> {
        let partitions_count = self
            .partitions_count(topic)
            .ok_or_else(|| ViewError::TopicNotFound(topic.to_owned()))?;
        let partition = router::route(self.hasher.as_ref(), key, partitions_count as usize)?;
        let offset = self.append_to(topic, partition, key, value)?;
        Ok((partition, offset))
    }

    fn with_partition<T>(
        &self,
        topic: &str,
        partition: u32,
        f: impl FnOnce(&[Record]) -> T,
    ) -> Result<T, ViewError> {
        let topics = self.topics.read();
        let partitions = topics
            .get(topic)
            .ok_or_else(|| ViewError::TopicNotFound(topic.to_owned()))?;
        let records = partitions
            .get(partition as usize)
            .ok_or_else(|| ViewError::PartitionNotFound(topic.to_owned(), partition))?;
        Ok(f(records))
    }
}

fn now_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros() as u64)
        .unwrap_or_default()
}

#[async_trait]
impl LogConsumer for MemoryLog {
    async fn offsets(&self, topic: &str, partition: u32) -> Result<PartitionOffsets, ViewError> {
        self.with_partition(topic, partition, |records| PartitionOffsets {
            oldest: 0,
            high_watermark: records.len() as u64,
        })
    }

    async fn poll(
        &self,
        topic: &str,
        partition: u32,
        offset: u64,
        count: u32,
    ) -> Result<Vec<Record>, ViewError> {
        self.with_partition(topic, partition, |records| {
            let start = (offset as usize).min(records.len());
            let end = start.saturating_add(count as usize).min(records.len());
            records[start..end].to_vec()
        })
    }
}

#[async_trait]
impl TopicManager for MemoryLog {
    async fn partitions(&self, topic: &str) -> Result<Vec<u32>, ViewError> {
        let count = self
            .partitions_count(topic)
            .ok_or_else(|| ViewError::TopicNotFound(topic.to_owned()))?;
        Ok((0..count).collect())
    }

    async fn close(&self) -> Result<(), ViewError> {
        Ok(())
    }
}
