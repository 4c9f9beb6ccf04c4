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

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Fired by a partition table the first time it has consumed its whole backlog.
pub type CatchupSignal = oneshot::Receiver<()>;

#[derive(Debug)]
struct Inner {
    token: CancellationToken,
    expected: usize,
    remaining: Mutex<usize>,
    done: watch::Sender<bool>,
}

impl Inner {
    fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            warn!(
                "received more catch-up signals than the {} expected",
                self.expected
            );
            return;
        }

        *remaining -= 1;
        trace!("catch-up signal received, {} remaining", *remaining);
        if *remaining == 0 {
            self.done.send_if_modified(|done| {
                if *done {
                    return false;
                }
                *done = true;
                true
            });
        }
    }
}

/// One-shot barrier over `expected` catch-up signals.
///
/// Every added signal counts down once when it fires. The barrier resolves
/// exactly once, when the count reaches zero. Signals still pending when the
/// token is cancelled never count.
#[derive(Debug, Clone)]
pub struct MultiWait {
    inner: Arc<Inner>,
}

impl MultiWait {
    pub fn new(token: CancellationToken, expected: usize) -> Self {
        let (done, _) = watch::channel(expected == 0);
        Self {
            inner: Arc::new(Inner {
                token,
                expected,
                remaining: Mutex::new(expected),
                done,
            }),
        }
    }

    pub fn add(&self, signal: CatchupSignal) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = inner.token.cancelled() => {}
                caught_up = signal => match caught_up {
                    Ok(()) => inner.count_down(),
                    Err(_) => trace!("catch-up signal was dropped before firing"),
                },
            }
        });
    }

    pub fn is_done(&self) -> bool {
        *self.inner.done.borrow()
    }

    /// Returns `true` once every signal fired, `false` if the token was cancelled first.
    pub async fn wait(&self) -> bool {
        let mut done = self.inner.done.subscribe();
        loop {
            let all_caught_up = *done.borrow_and_update();
            if all_caught_up {
                return true;
            }

            tokio::select! {
                biased;
                changed = done.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
                _ = self.inner.token.cancelled() => return false,
            }
        }
    }
}
