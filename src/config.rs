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
use crate::table::CatchupSettings;
use humantime::Duration as HumanDuration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub(crate) const DEFAULT_CLIENT_ID: &str = "iggy-table-view";
const DEFAULT_POLL_BATCH_LENGTH: u32 = 1000;
const DEFAULT_POLL_INTERVAL: &str = "100ms";
const DEFAULT_RESTART_BACKOFF: &str = "1s";

/// File based view configuration, every field is optional.
///
/// ```toml
/// client_id = "users-view"
/// hasher_seed = 0
/// restartable = true
/// poll_batch_length = 500
/// poll_interval = "250ms"
/// restart_backoff = "2s"
/// max_restarts = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub client_id: String,
    pub hasher_seed: u32,
    pub restartable: bool,
    pub poll_batch_length: u32,
    pub poll_interval: String,
    pub restart_backoff: String,
    pub max_restarts: Option<u32>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_owned(),
            hasher_seed: 0,
            restartable: false,
            poll_batch_length: DEFAULT_POLL_BATCH_LENGTH,
            poll_interval: DEFAULT_POLL_INTERVAL.to_owned(),
            restart_backoff: DEFAULT_RESTART_BACKOFF.to_owned(),
            max_restarts: None,
        }
    }
}

impl ViewConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ViewError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|error| {
            ViewError::CannotReadConfiguration(path.display().to_string(), error.to_string())
        })?;
        let config = Self::from_toml_str(&content)?;
        debug!("loaded view configuration from {}: {config:?}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ViewError> {
        let config: Self = toml::from_str(content)
            .map_err(|error| ViewError::InvalidConfiguration(error.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ViewError> {
        if self.client_id.trim().is_empty() {
            return Err(ViewError::InvalidConfiguration(
                "client_id cannot be empty".to_owned(),
            ));
        }
        if self.poll_batch_length == 0 {
            return Err(ViewError::InvalidConfiguration(
                "poll_batch_length must be greater than 0".to_owned(),
            ));
        }
        if self.catchup_settings()?.poll_interval.is_zero() {
            return Err(ViewError::InvalidConfiguration(
                "poll_interval must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn catchup_settings(&self) -> Result<CatchupSettings, ViewError> {
        Ok(CatchupSettings {
            poll_batch_length: self.poll_batch_length,
            poll_interval: parse_duration("poll_interval", &self.poll_interval)?,
            restart_backoff: parse_duration("restart_backoff", &self.restart_backoff)?,
            max_restarts: self.max_restarts,
        })
    }
}

fn parse_duration(name: &str, value: &str) -> Result<Duration, ViewError> {
    HumanDuration::from_str(value)
        .map(Into::into)
        .map_err(|error| ViewError::InvalidConfiguration(format!("{name}: {value}: {error}")))
}
