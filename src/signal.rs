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

use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

/// Monotonic state register with level-triggered waits.
///
/// The state only ever advances. Waiting for a state that was already reached
/// (or passed) completes immediately, so late subscribers never miss a wake-up.
#[derive(Debug, Clone)]
pub struct Signal<S> {
    state: Arc<watch::Sender<S>>,
}

impl<S> Signal<S>
where
    S: Copy + Ord + Debug + Send + Sync + 'static,
{
    pub fn new(initial: S) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> S {
        *self.state.borrow()
    }

    pub fn is_state(&self, state: S) -> bool {
        self.state() == state
    }

    /// Moves to `state` if it comes after the current one. Returns whether the state changed.
    pub fn set_state(&self, state: S) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if state <= *current {
                return false;
            }
            *current = state;
            true
        });

        if changed {
            debug!("state changed to {state:?}");
        } else {
            trace!("ignoring transition to {state:?}, current state is {:?}", self.state());
        }
        changed
    }

    /// Completes once the state reaches `state` or a later one.
    ///
    /// The returned future does not borrow the signal, so it can be moved into a task.
    pub fn wait_for_state(&self, state: S) -> impl Future<Output = ()> + Send + 'static {
        let mut receiver = self.state.subscribe();
        async move {
            loop {
                let reached = *receiver.borrow_and_update() >= state;
                if reached {
                    return;
                }
                if receiver.changed().await.is_err() {
                    // the signal is gone and will never advance
                    std::future::pending::<()>().await;
                }
            }
        }
    }

    /// Receiver that observes every state change from now on.
    pub fn observe(&self) -> watch::Receiver<S> {
        self.state.subscribe()
    }
}
