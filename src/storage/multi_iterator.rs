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

use super::StorageIterator;
use crate::error::ViewError;
use bytes::Bytes;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Merges ascending per-partition iterators into one ascending sequence.
///
/// Partitions hold disjoint key sets, so the merge never sees duplicate keys;
/// the iterator index only breaks ties to keep the heap ordering total.
pub struct MultiIterator {
    iterators: Vec<Box<dyn StorageIterator>>,
    heap: BinaryHeap<Reverse<(Bytes, usize)>>,
    current: Option<usize>,
    started: bool,
    released: bool,
}

impl MultiIterator {
    pub fn new(iterators: Vec<Box<dyn StorageIterator>>) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(iterators.len()),
            iterators,
            current: None,
            started: false,
            released: false,
        }
    }

    pub fn len(&self) -> usize {
        self.iterators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.iterators.is_empty()
    }

    fn push(&mut self, index: usize) {
        if let Some(key) = self.iterators[index].key() {
            self.heap.push(Reverse((key.clone(), index)));
        }
    }

    fn pop(&mut self) -> bool {
        self.current = self.heap.pop().map(|Reverse((_, index))| index);
        self.current.is_some()
    }
}

impl StorageIterator for MultiIterator {
    fn next(&mut self) -> bool {
        if self.released {
            return false;
        }

        if !self.started {
            self.started = true;
            for index in 0..self.iterators.len() {
                if self.iterators[index].next() {
                    self.push(index);
                }
            }
        } else if let Some(index) = self.current.take() {
            if self.iterators[index].next() {
                self.push(index);
            }
        }

        self.pop()
    }

    fn key(&self) -> Option<&Bytes> {
        self.current.and_then(|index| self.iterators[index].key())
    }

    fn value(&self) -> Option<&Bytes> {
        self.current.and_then(|index| self.iterators[index].value())
    }

    fn seek(&mut self, key: &[u8]) -> bool {
        if self.released {
            return false;
        }

        self.started = true;
        self.heap.clear();
        for index in 0..self.iterators.len() {
            if self.iterators[index].seek(key) {
                self.push(index);
            }
        }
        self.pop()
    }

    fn err(&self) -> Option<ViewError> {
        self.iterators.iter().find_map(|iterator| iterator.err())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }

        self.released = true;
        self.current = None;
        self.heap.clear();
        for iterator in &mut self.iterators {
            iterator.release();
        }
    }
}

impl Drop for MultiIterator {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, Storage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn partition(keys: &[&str]) -> Box<dyn StorageIterator> {
        let storage = MemoryStorage::new();
        for key in keys {
            storage
                .set(key.as_bytes(), Bytes::from(key.to_uppercase()))
                .unwrap();
        }
        storage.iterator().unwrap()
    }

    fn drain(iterator: &mut MultiIterator) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        while iterator.next() {
            entries.push((
                String::from_utf8(iterator.key().unwrap().to_vec()).unwrap(),
                String::from_utf8(iterator.value().unwrap().to_vec()).unwrap(),
            ));
        }
        entries
    }

    struct CountingIterator {
        inner: Box<dyn StorageIterator>,
        released: Arc<AtomicUsize>,
    }

    impl StorageIterator for CountingIterator {
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
            None
        }

        fn release(&mut self) {
            self.released.fetch_add(1, Ordering::SeqCst);
            self.inner.release();
        }
    }

    #[test]
    fn merged_iterator_should_yield_keys_in_ascending_order() {
        let mut iterator = MultiIterator::new(vec![
            partition(&["b", "e", "f"]),
            partition(&["a", "d"]),
            partition(&[]),
            partition(&["c", "g"]),
        ]);

        let keys = drain(&mut iterator)
            .into_iter()
            .map(|(key, _)| key)
            .collect::<Vec<_>>();
        assert_eq!(keys, ["a", "b", "c", "d", "e", "f", "g"]);
        assert!(!iterator.next());
    }

    #[test]
    fn merged_iterator_should_pair_keys_with_their_values() {
        let mut iterator = MultiIterator::new(vec![partition(&["b"]), partition(&["a"])]);
        assert_eq!(
            drain(&mut iterator),
            [
                ("a".to_owned(), "A".to_owned()),
                ("b".to_owned(), "B".to_owned())
            ]
        );
    }

    #[test]
    fn seek_should_position_every_partition() {
        let mut iterator = MultiIterator::new(vec![
            partition(&["a", "d", "g"]),
            partition(&["b", "e"]),
            partition(&["c", "f"]),
        ]);

        assert!(iterator.seek(b"c"));
        assert_eq!(iterator.key().unwrap().as_ref(), b"c");
        let rest = drain(&mut iterator)
            .into_iter()
            .map(|(key, _)| key)
            .collect::<Vec<_>>();
        assert_eq!(rest, ["d", "e", "f", "g"]);
        assert!(!iterator.seek(b"h"));
    }

    #[test]
    fn empty_merge_should_yield_nothing() {
        let mut iterator = MultiIterator::new(Vec::new());
        assert!(iterator.is_empty());
        assert!(!iterator.next());
        assert!(iterator.key().is_none());
    }

    #[test]
    fn release_should_release_every_partition_iterator_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let iterators = (0..3)
            .map(|_| {
                Box::new(CountingIterator {
                    inner: partition(&["a", "b"]),
                    released: released.clone(),
                }) as Box<dyn StorageIterator>
            })
            .collect();

        let mut iterator = MultiIterator::new(iterators);
        assert!(iterator.next());
        iterator.release();
        assert_eq!(released.load(Ordering::SeqCst), 3);
        assert!(!iterator.next());

        drop(iterator);
        assert_eq!(released.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn drop_should_release_partially_consumed_iterators() {
        let released = Arc::new(AtomicUsize::new(0));
        let iterators = (0..2)
            .map(|_| {
                Box::new(CountingIterator {
                    inner: partition(&["a"]),
                    released: released.clone(),
                }) as Box<dyn StorageIterator>
            })
            .collect();

        let mut iterator = MultiIterator::new(iterators);
        assert!(iterator.next());
        drop(iterator);
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }
}
