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

use super::{Storage, StorageIterator};
use crate::error::ViewError;
use bytes::Bytes;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::collections::BTreeMap;
use std::ops::Bound;

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<Bytes, Bytes>,
    offset: Option<u64>,
    closed: bool,
}

/// Ordered in-memory storage. Iterators work on a snapshot taken when they are opened.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, ViewError> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(ViewError::StorageClosed);
        }
        Ok(inner)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, ViewError> {
        let inner = self.inner.write();
        if inner.closed {
            return Err(ViewError::StorageClosed);
        }
        Ok(inner)
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>, ViewError> {
        Ok(self.read()?.entries.get(key).cloned())
    }

    fn has(&self, key: &[u8]) -> Result<bool, ViewError> {
        Ok(self.read()?.entries.contains_key(key))
    }

    fn set(&self, key: &[u8], value: Bytes) -> Result<(), ViewError> {
        self.write()?
            .entries
            .insert(Bytes::copy_from_slice(key), value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), ViewError> {
        self.write()?.entries.remove(key);
        Ok(())
    }

    fn offset(&self) -> Result<Option<u64>, ViewError> {
        Ok(self.read()?.offset)
    }

    fn set_offset(&self, offset: u64) -> Result<(), ViewError> {
        self.write()?.offset = Some(offset);
        Ok(())
    }

    fn iterator(&self) -> Result<Box<dyn StorageIterator>, ViewError> {
        let entries = self
            .read()?
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Box::new(MemoryIterator::new(entries)))
    }

    fn iterator_with_range(
        &self,
        start: &[u8],
        limit: &[u8],
    ) -> Result<Box<dyn StorageIterator>, ViewError> {
        if !limit.is_empty() && start >= limit {
            return Ok(Box::new(MemoryIterator::new(Vec::new())));
        }

        let upper = if limit.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(limit)
        };
        let entries = self
            .read()?
            .entries
            .range::<[u8], _>((Bound::Included(start), upper))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(Box::new(MemoryIterator::new(entries)))
    }

    fn close(&self) -> Result<(), ViewError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(ViewError::StorageClosed);
        }
        inner.closed = true;
        inner.entries.clear();
        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryIterator {
    entries: Vec<(Bytes, Bytes)>,
    position: Option<usize>,
    next: usize,
    released: bool,
}

impl MemoryIterator {
    fn new(entries: Vec<(Bytes, Bytes)>) -> Self {
        Self {
            entries,
            position: None,
            next: 0,
            released: false,
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl StorageIterator for MemoryIterator {
    fn next(&mut self) -> bool {
        if self.released || self.next >= self.entries.len() {
            self.position = None;
            return false;
        }

        self.position = Some(self.next);
        self.next += 1;
        true
    }

    fn key(&self) -> Option<&Bytes> {
        self.position.map(|position| &self.entries[position].0)
    }

    fn value(&self) -> Option<&Bytes> {
        self.position.map(|position| &self.entries[position].1)
    }

    fn seek(&mut self, key: &[u8]) -> bool {
        if self.released {
            return false;
        }

        let index = self
            .entries
            .partition_point(|(entry_key, _)| entry_key.as_ref() < key);
        if index >= self.entries.len() {
            self.position = None;
            self.next = self.entries.len();
            return false;
        }

        self.position = Some(index);
        self.next = index + 1;
        true
    }

    fn err(&self) -> Option<ViewError> {
        None
    }

    fn release(&mut self) {
        self.released = true;
        self.position = None;
        self.entries = Vec::new();
    }
}
