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

//! Interfaces to the partitioned log the view materializes.

mod memory;

use crate::error::ViewError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;

pub use memory::MemoryLog;

/// A single record of a table topic. A `None` value is a tombstone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub offset: u64,
    pub timestamp: u64,
    pub key: Bytes,
    pub value: Option<Bytes>,
}

/// Offsets bounding the records currently held by a partition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PartitionOffsets {
    /// First offset still available in the partition.
    pub oldest: u64,
    /// Offset the next appended record will get.
    pub high_watermark: u64,
}

/// Reads records of a partition, starting at a given offset.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait LogConsumer: Send + Sync {
    async fn offsets(&self, topic: &str, partition: u32) -> Result<PartitionOffsets, ViewError>;

    /// Returns up to `count` records starting at `offset`, empty when there is nothing new.
    async fn poll(
        &self,
        topic: &str,
        partition: u32,
        offset: u64,
        count: u32,
    ) -> Result<Vec<Record>, ViewError>;
}

/// Topic metadata access.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TopicManager: Send + Sync {
    /// Partition numbers of the topic, in the order the log reports them.
    async fn partitions(&self, topic: &str) -> Result<Vec<u32>, ViewError>;
    async fn close(&self) -> Result<(), ViewError>;
}

pub type ConsumerBuilder =
    Arc<dyn Fn(&[String], &str) -> Result<Arc<dyn LogConsumer>, ViewError> + Send + Sync>;
pub type TopicManagerBuilder =
    Arc<dyn Fn(&[String]) -> Result<Arc<dyn TopicManager>, ViewError> + Send + Sync>;

/// Factories creating the log clients from the log addresses.
#[derive(Clone)]
pub struct ClientBuilders {
    /// Called with the addresses and the client ID.
    pub consumer: ConsumerBuilder,
    pub topic_manager: TopicManagerBuilder,
}

impl ClientBuilders {
    pub fn new(consumer: ConsumerBuilder, topic_manager: TopicManagerBuilder) -> Self {
        Self {
            consumer,
            topic_manager,
        }
    }

    /// Builders handing out clients of an in-process log, whatever the addresses.
    pub fn memory(log: &MemoryLog) -> Self {
        let consumer_log = log.clone();
        let topic_manager_log = log.clone();
        Self {
            consumer: Arc::new(move |_addresses: &[String], _client_id: &str| {
                Ok(Arc::new(consumer_log.clone()) as Arc<dyn LogConsumer>)
            }),
            topic_manager: Arc::new(move |_addresses: &[String]| {
                Ok(Arc::new(topic_manager_log.clone()) as Arc<dyn TopicManager>)
            }),
        }
    }
}

impl std::fmt::Debug for ClientBuilders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilders").finish_non_exhaustive()
    }
}
