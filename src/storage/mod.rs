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

//! Local key-value storage backing each partition of a view.

mod memory;
mod multi_iterator;

use crate::error::ViewError;
use bytes::Bytes;
use std::fmt::Debug;
use std::sync::Arc;

pub use memory::{MemoryIterator, MemoryStorage};
pub use multi_iterator::MultiIterator;

/// Key-value store owned by a single partition.
///
/// Implementations are shared between the partition table applying records and
/// any number of concurrent readers, so they synchronize internally.
pub trait Storage: Send + Sync + Debug {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, ViewError>;
    fn has(&self, key: &[u8]) -> Result<bool, ViewError>;
    fn set(&self, key: &[u8], value: Bytes) -> Result<(), ViewError>;
    fn delete(&self, key: &[u8]) -> Result<(), ViewError>;

    /// Offset of the last log record applied to this storage, if any.
    fn offset(&self) -> Result<Option<u64>, ViewError>;
    fn set_offset(&self, offset: u64) -> Result<(), ViewError>;

    /// Iterates every key in ascending byte order.
    fn iterator(&self) -> Result<Box<dyn StorageIterator>, ViewError>;

    /// Iterates keys in `[start, limit)`. An empty `limit` means no upper bound.
    fn iterator_with_range(
        &self,
        start: &[u8],
        limit: &[u8],
    ) -> Result<Box<dyn StorageIterator>, ViewError>;

    fn close(&self) -> Result<(), ViewError>;
}

/// Cursor over a storage, positioned before the first entry until `next` is called.
pub trait StorageIterator: Send {
    /// Advances to the next entry, returns `false` once exhausted.
    fn next(&mut self) -> bool;

    fn key(&self) -> Option<&Bytes>;
    fn value(&self) -> Option<&Bytes>;

    /// Positions the cursor at the first key greater than or equal to `key`.
    fn seek(&mut self, key: &[u8]) -> bool;

    fn err(&self) -> Option<ViewError>;

    /// Releases the resources held by the iterator; it yields nothing afterwards.
    fn release(&mut self);
}

/// Creates the storage of one partition of a topic.
pub type StorageBuilder =
    Arc<dyn Fn(&str, u32) -> Result<Arc<dyn Storage>, ViewError> + Send + Sync>;

pub fn memory_storage_builder() -> StorageBuilder {
    Arc::new(|_topic: &str, _partition: u32| Ok(Arc::new(MemoryStorage::new()) as Arc<dyn Storage>))
}
