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

use crate::config::{ViewConfig, DEFAULT_CLIENT_ID};
use crate::error::ViewError;
use crate::log::ClientBuilders;
use crate::router::{KeyHasher, XxHash32Hasher};
use crate::storage::{memory_storage_builder, StorageBuilder};
use crate::table::{
    default_update, CatchupSettings, LogPartitionTable, PartitionTableBuilder, UpdateCallback,
};
use bon::Builder;
use std::sync::Arc;

/// Options of a [`View`](crate::view::View).
///
/// Only the log clients are required, everything else falls back to in-memory
/// storage, the default update callback and the default partition table.
#[derive(Clone, Builder)]
pub struct ViewOptions {
    pub clients: ClientBuilders,
    #[builder(default = memory_storage_builder())]
    pub storage: StorageBuilder,
    #[builder(default = default_update())]
    pub update: UpdateCallback,
    #[builder(default = default_hasher())]
    pub hasher: Arc<dyn KeyHasher>,
    /// Restart partition catch-ups after transient failures instead of failing the view.
    #[builder(default)]
    pub restartable: bool,
    #[builder(default = LogPartitionTable::builder())]
    pub table_builder: PartitionTableBuilder,
    #[builder(default)]
    pub catchup: CatchupSettings,
    #[builder(into, default = DEFAULT_CLIENT_ID.to_owned())]
    pub client_id: String,
}

impl ViewOptions {
    /// Options taking every configurable setting from `config`.
    pub fn from_config(config: &ViewConfig, clients: ClientBuilders) -> Result<Self, ViewError> {
        config.validate()?;
        Ok(ViewOptions::builder()
            .clients(clients)
            .hasher(Arc::new(XxHash32Hasher::new(config.hasher_seed)) as Arc<dyn KeyHasher>)
            .restartable(config.restartable)
            .catchup(config.catchup_settings()?)
            .client_id(config.client_id.clone())
            .build())
    }
}

fn default_hasher() -> Arc<dyn KeyHasher> {
    Arc::new(XxHash32Hasher::default())
}

impl std::fmt::Debug for ViewOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewOptions")
            .field("hasher", &self.hasher)
            .field("restartable", &self.restartable)
            .field("catchup", &self.catchup)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}
