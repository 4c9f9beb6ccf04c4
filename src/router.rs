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

use crate::error::ViewError;
use std::fmt::Debug;
use twox_hash::XxHash32;

/// Hashes a key into 32 bits for partition routing.
///
/// Implementations must be deterministic and must not keep hashing state
/// between calls, routing is called concurrently from every reader.
pub trait KeyHasher: Send + Sync + Debug {
    fn hash32(&self, key: &[u8]) -> u32;
}

/// Seeded XxHash32, hashed one-shot so every call starts from fresh state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct XxHash32Hasher {
    seed: u32,
}

impl XxHash32Hasher {
    pub fn new(seed: u32) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }
}

impl KeyHasher for XxHash32Hasher {
    fn hash32(&self, key: &[u8]) -> u32 {
        XxHash32::oneshot(self.seed, key)
    }
}

/// Maps a key to the index of the partition owning it.
///
/// The hash is read as a signed 32-bit value and negated when negative;
/// `unsigned_abs` keeps `i32::MIN` from overflowing.
pub fn route(
    hasher: &dyn KeyHasher,
    key: &[u8],
    partitions_count: usize,
) -> Result<u32, ViewError> {
    if partitions_count == 0 {
        return Err(ViewError::EmptyView);
    }

    let hash = (hasher.hash32(key) as i32).unsigned_abs();
    Ok(hash % partitions_count as u32)
}
