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

use crate::multierr::AggregatedError;
use strum::{EnumDiscriminants, FromRepr, IntoStaticStr};
use thiserror::Error;

#[derive(Clone, Debug, Error, EnumDiscriminants, IntoStaticStr)]
#[repr(u32)]
#[strum(serialize_all = "snake_case")]
#[strum_discriminants(
    vis(pub),
    derive(FromRepr, IntoStaticStr),
    strum(serialize_all = "snake_case")
)]
pub enum ViewError {
    #[error("Error")]
    Error = 1,
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String) = 2,
    #[error("Cannot read configuration, Path: {0}, reason: {1}")]
    CannotReadConfiguration(String, String) = 3,
    #[error("Cannot connect to the log at [{addresses}]: {cause}")]
    Connection {
        addresses: String,
        #[source]
        cause: Box<ViewError>,
    } = 10,
    #[error("Partition numbers are not sequential for topic: {topic}, partitions: {partitions:?}")]
    Topology { topic: String, partitions: Vec<u32> } = 11,
    #[error("Topic: {0} was not found")]
    TopicNotFound(String) = 12,
    #[error("Partition: {1} was not found for topic: {0}")]
    PartitionNotFound(String, u32) = 13,
    #[error("Log error: {0}")]
    Log(String) = 14,
    #[error("Error while setup/catching up/recovering partition: {partition}: {cause}")]
    PartitionRecovery {
        partition: u32,
        #[source]
        cause: Box<ViewError>,
    } = 20,
    #[error("Partition table was closed")]
    PartitionTableClosed = 21,
    #[error("Storage error: {0}")]
    Storage(String) = 30,
    #[error("Storage is closed")]
    StorageClosed = 31,
    #[error("Cannot decode value: {0}")]
    Decode(String) = 40,
    #[error("Cannot encode value: {0}")]
    Encode(String) = 41,
    #[error("View has no partitions")]
    EmptyView = 50,
    #[error("{0}")]
    Aggregated(AggregatedError) = 60,
    #[error("View is already running")]
    AlreadyRunning = 70,
    #[error("Task failed: {0}")]
    TaskFailed(String) = 71,
}

impl ViewError {
    pub fn as_code(&self) -> u32 {
        // SAFETY: ViewError specifies #[repr(u32)] representation.
        // https://doc.rust-lang.org/reference/items/enumerations.html#pointer-casting
        unsafe { *(self as *const Self as *const u32) }
    }

    pub fn as_string(&self) -> &'static str {
        self.into()
    }

    pub fn connection(addresses: &[String], cause: ViewError) -> Self {
        ViewError::Connection {
            addresses: addresses.join(", "),
            cause: Box::new(cause),
        }
    }

    /// Wraps any error coming from a storage engine, leaving storage errors untouched.
    pub fn storage(context: impl std::fmt::Display, error: ViewError) -> Self {
        match error {
            ViewError::Storage(_) | ViewError::StorageClosed => error,
            other => ViewError::Storage(format!("{context}: {other}")),
        }
    }

    /// Wraps any error coming from a codec, leaving decode errors untouched.
    pub fn decode(context: impl std::fmt::Display, error: ViewError) -> Self {
        match error {
            ViewError::Decode(_) => error,
            other => ViewError::Decode(format!("{context}: {other}")),
        }
    }

    /// Returns the aggregated causes, or the error itself when it is not an aggregate.
    pub fn causes(&self) -> Vec<&ViewError> {
        match self {
            ViewError::Aggregated(aggregated) => aggregated.errors().iter().collect(),
            other => vec![other],
        }
    }
}

impl PartialEq for ViewError {
    fn eq(&self, other: &Self) -> bool {
        self.as_code() == other.as_code()
    }
}
