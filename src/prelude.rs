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

//! Prelude module for the table view.
//!
//! This module re-exports the most common types, traits, and functions
//! of the crate to make them easier to import and use.
//!
//! # Examples
//!
//! ```
//! use iggy_table_view::prelude::*;
//! ```

pub use crate::codec::{BytesCodec, Codec, JsonCodec, StringCodec};
pub use crate::config::ViewConfig;
pub use crate::error::ViewError;
pub use crate::iterator::ViewIterator;
pub use crate::log::{
    ClientBuilders, ConsumerBuilder, LogConsumer, MemoryLog, PartitionOffsets, Record,
    TopicManager, TopicManagerBuilder,
};
pub use crate::multierr::{AggregatedError, ErrGroup, Errors, MultiWait};
pub use crate::options::ViewOptions;
pub use crate::router::{route, KeyHasher, XxHash32Hasher};
pub use crate::signal::Signal;
pub use crate::stats::{PartitionStats, PartitionStatus, ViewStats};
pub use crate::storage::{
    memory_storage_builder, MemoryStorage, MultiIterator, Storage, StorageBuilder,
    StorageIterator,
};
pub use crate::table::{
    default_update, CatchupSettings, ErrorReceiver, LogPartitionTable, PartitionTable,
    PartitionTableBuilder, PartitionTableContext, UpdateCallback, UpdateContext,
};
pub use crate::view::{View, ViewState};
pub use tokio_util::sync::CancellationToken;
