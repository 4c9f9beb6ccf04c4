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

use super::Errors;
use crate::error::ViewError;
use std::future::Future;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

/// Runs independent tasks under one cancellation token.
///
/// The first task returning an error cancels the token so the siblings can wind
/// down, but [`ErrGroup::wait`] still joins every task and returns all errors.
/// Dropping the group cancels the token and aborts the tasks still running.
#[derive(Debug)]
pub struct ErrGroup {
    token: CancellationToken,
    tasks: JoinSet<Result<(), ViewError>>,
}

impl ErrGroup {
    /// Creates a group bound to a child of `parent` and returns that child token.
    pub fn new(parent: &CancellationToken) -> (Self, CancellationToken) {
        let token = parent.child_token();
        let group = Self {
            token: token.clone(),
            tasks: JoinSet::new(),
        };
        (group, token)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Result<(), ViewError>> + Send + 'static,
    {
        let token = self.token.clone();
        self.tasks.spawn(async move {
            let result = task.await;
            if let Err(error) = &result {
                trace!("task failed, cancelling the group: {error}");
                token.cancel();
            }
            result
        });
    }

    /// Joins every task. The group token is cancelled once all tasks are done.
    pub async fn wait(mut self) -> Errors {
        let mut errors = Errors::new();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(result) => errors.collect(result),
                Err(join_error) => {
                    error!("task in group panicked or was aborted: {join_error}");
                    self.token.cancel();
                    errors.push(ViewError::TaskFailed(join_error.to_string()));
                }
            }
        }
        self.token.cancel();
        errors
    }
}

impl Drop for ErrGroup {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
