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

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{AsRefStr, Display as StrumDisplay, EnumString};

/// Current status of a partition table
#[derive(
    Debug,
    Default,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Clone,
    Copy,
    AsRefStr,
    StrumDisplay,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PartitionStatus {
    /// Catch-up was not started yet
    #[default]
    Idle,
    /// Consuming the backlog up to the high watermark
    CatchingUp,
    /// Backlog consumed, following new records
    Recovered,
    /// Consumption ended, either cancelled or failed
    Stopped,
}

/// Snapshot of a single partition table.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionStats {
    pub status: PartitionStatus,
    pub recovered: bool,
    /// Next offset to consume.
    pub offset: u64,
    pub high_watermark: u64,
    pub records_applied: u64,
    pub records_deleted: u64,
    pub bytes_applied: u64,
    pub restarts: u32,
    pub last_error: Option<String>,
}

impl PartitionStats {
    /// Records between the consumed offset and the high watermark.
    pub fn lag(&self) -> u64 {
        self.high_watermark.saturating_sub(self.offset)
    }
}

/// Statistics of a whole view, keyed by partition number.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewStats {
    pub partitions: BTreeMap<u32, PartitionStats>,
}

impl ViewStats {
    /// Whether every partition present in the snapshot is recovered.
    pub fn recovered(&self) -> bool {
        self.partitions.values().all(|stats| stats.recovered)
    }

    pub fn lag(&self) -> u64 {
        self.partitions.values().map(PartitionStats::lag).sum()
    }

    pub fn records_applied(&self) -> u64 {
        self.partitions
            .values()
            .map(|stats| stats.records_applied)
            .sum()
    }
}
