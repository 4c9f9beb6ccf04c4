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

use crate::codec::Codec;
use crate::error::ViewError;
use crate::storage::{MultiIterator, StorageIterator};
use bytes::Bytes;
use std::sync::Arc;

/// Ordered iterator over every partition of a view.
///
/// Keys come in ascending byte order across partitions. Values are decoded
/// only when [`ViewIterator::value`] is called. Dropping the iterator releases
/// the underlying partition iterators.
pub struct ViewIterator<C: Codec> {
    iterator: MultiIterator,
    codec: Arc<C>,
}

impl<C: Codec> ViewIterator<C> {
    pub(crate) fn new(iterators: Vec<Box<dyn StorageIterator>>, codec: Arc<C>) -> Self {
        Self {
            iterator: MultiIterator::new(iterators),
            codec,
        }
    }

    /// Advances to the next key, returns `false` once exhausted.
    pub fn next(&mut self) -> bool {
        self.iterator.next()
    }

    pub fn key(&self) -> Option<&Bytes> {
        self.iterator.key()
    }

    pub fn raw_value(&self) -> Option<&Bytes> {
        self.iterator.value()
    }

    /// Decodes the value at the current position.
    pub fn value(&self) -> Result<Option<C::Value>, ViewError> {
        let Some(data) = self.iterator.value() else {
            return Ok(None);
        };
        self.codec
            .decode(data)
            .map(Some)
            .map_err(|error| ViewError::decode("iterator value", error))
    }

    /// Moves to the first key greater than or equal to `key`.
    pub fn seek(&mut self, key: impl AsRef<[u8]>) -> bool {
        self.iterator.seek(key.as_ref())
    }

    pub fn err(&self) -> Option<ViewError> {
        self.iterator.err()
    }

    pub fn release(&mut self) {
        self.iterator.release();
    }
}

impl<C: Codec> std::fmt::Debug for ViewIterator<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewIterator")
            .field("partitions", &self.iterator.len())
            .field("key", &self.iterator.key())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::StringCodec;
    use crate::storage::{MemoryStorage, Storage};

    fn storage(entries: &[(&str, &[u8])]) -> MemoryStorage {
        let storage = MemoryStorage::new();
        for (key, value) in entries {
            storage
                .set(key.as_bytes(), Bytes::copy_from_slice(value))
                .unwrap();
        }
        storage
    }

    #[test]
    fn values_should_be_decoded_lazily() {
        let first = storage(&[("a", "1".as_bytes()), ("c", &[0xff, 0xfe][..])]);
        let second = storage(&[("b", "2".as_bytes())]);
        let mut iterator = ViewIterator::new(
            vec![first.iterator().unwrap(), second.iterator().unwrap()],
            Arc::new(StringCodec),
        );

        assert!(iterator.next());
        assert_eq!(iterator.value().unwrap().as_deref(), Some("1"));
        assert!(iterator.next());
        assert_eq!(iterator.key().unwrap(), &Bytes::from("b"));
        assert!(iterator.next());
        assert_eq!(iterator.key().unwrap(), &Bytes::from("c"));
        assert!(matches!(iterator.value(), Err(ViewError::Decode(_))));
        assert!(!iterator.next());
        assert_eq!(iterator.value().unwrap(), None);
    }

    #[test]
    fn seek_should_position_across_partitions() {
        let first = storage(&[("a", "1".as_bytes()), ("d", "4".as_bytes())]);
        let second = storage(&[("b", "2".as_bytes()), ("e", "5".as_bytes())]);
        let mut iterator = ViewIterator::new(
            vec![first.iterator().unwrap(), second.iterator().unwrap()],
            Arc::new(StringCodec),
        );

        assert!(iterator.seek("c"));
        assert_eq!(iterator.key().unwrap(), &Bytes::from("d"));
        assert!(iterator.next());
        assert_eq!(iterator.value().unwrap().as_deref(), Some("5"));
        iterator.release();
        assert!(!iterator.next());
        assert!(iterator.err().is_none());
    }
}
