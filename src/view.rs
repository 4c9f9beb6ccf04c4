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

use crate::codec::Codec;
use crate::error::ViewError;
use crate::iterator::ViewIterator;
use crate::log::ClientBuilders;
use crate::multierr::{ErrGroup, Errors, MultiWait};
use crate::options::ViewOptions;
use crate::router::{self, KeyHasher};
use crate::signal::Signal;
use crate::stats::ViewStats;
use crate::storage::{Storage, StorageIterator};
use crate::table::{PartitionTable, PartitionTableContext};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strum::{AsRefStr, Display as StrumDisplay};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Lifecycle of a view. States only ever advance in declaration order.
#[derive(
    Debug,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Clone,
    Copy,
    AsRefStr,
    StrumDisplay,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ViewState {
    /// Created, `run` was not called yet
    Idle,
    /// Partitions are consuming their backlog
    CatchingUp,
    /// Every partition caught up at least once
    Running,
}

#[derive(Clone)]
struct Partition {
    id: u32,
    storage: Arc<dyn Storage>,
    table: Arc<dyn PartitionTable>,
}

/// Materialized view of a table topic.
///
/// Every partition of the topic is consumed into its own local storage. Reads
/// route the key to the owning partition and never touch the log. They can be
/// issued concurrently with [`View::run`], but only reflect the whole topic once
/// [`View::recovered`] is true.
pub struct View<C: Codec> {
    topic: String,
    codec: Arc<C>,
    hasher: Arc<dyn KeyHasher>,
    restartable: bool,
    partitions: RwLock<Vec<Partition>>,
    state: Signal<ViewState>,
    running: AtomicBool,
}

impl<C: Codec> View<C> {
    /// Discovers the partitions of `topic` and creates a storage and a partition
    /// table for each one. Nothing is consumed until [`View::run`] is called.
    pub async fn new(
        addresses: &[String],
        topic: impl Into<String>,
        codec: C,
        options: ViewOptions,
    ) -> Result<Self, ViewError> {
        let topic = topic.into();
        let consumer = (options.clients.consumer)(addresses, &options.client_id)
            .map_err(|error| ViewError::connection(addresses, error))?;
        let topic_manager = (options.clients.topic_manager)(addresses)
            .map_err(|error| ViewError::connection(addresses, error))?;

        let ids = discover_partitions(&options.clients, addresses, &topic).await?;
        let mut partitions = Vec::with_capacity(ids.len());
        for id in ids {
            let storage = match (options.storage)(&topic, id) {
                Ok(storage) => storage,
                Err(error) => {
                    close_storages(&partitions);
                    return Err(ViewError::storage(
                        format!("create storage for partition {id}"),
                        error,
                    ));
                }
            };
            let table = (options.table_builder)(PartitionTableContext {
                topic: topic.clone(),
                partition: id,
                consumer: consumer.clone(),
                topic_manager: topic_manager.clone(),
                storage: storage.clone(),
                update: options.update.clone(),
                settings: options.catchup,
            });
            partitions.push(Partition { id, storage, table });
        }

        info!(
            "created view for topic: {topic} with {} partitions, client ID: {}",
            partitions.len(),
            options.client_id
        );
        Ok(Self {
            topic,
            codec: Arc::new(codec),
            hasher: options.hasher,
            restartable: options.restartable,
            partitions: RwLock::new(partitions),
            state: Signal::new(ViewState::Idle),
            running: AtomicBool::new(false),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn state(&self) -> ViewState {
        self.state.state()
    }

    pub fn observe_state(&self) -> watch::Receiver<ViewState> {
        self.state.observe()
    }

    pub fn partitions_count(&self) -> usize {
        self.partitions.read().len()
    }

    /// Consumes every partition until `token` is cancelled or a partition fails.
    ///
    /// The view moves to [`ViewState::Running`] once every partition caught up.
    /// Whatever the outcome, all partitions are closed before returning, and
    /// the returned error carries every partition and close failure.
    ///
    /// Dropping the returned future cancels every partition and closes the
    /// storages without awaiting the tables' `close`. The view cannot be run
    /// again afterwards.
    pub async fn run(&self, token: CancellationToken) -> Result<(), ViewError> {
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(ViewError::AlreadyRunning);
        }

        let span = info_span!("view", topic = %self.topic);
        async {
            info!("starting view");
            self.state.set_state(ViewState::CatchingUp);
            let close_on_drop = CloseOnDrop::new(&self.partitions);
            let mut errors = self.catchup(&token).await;
            close_on_drop.disarm();
            errors.merge(self.close_partitions().await);
            if errors.has_errors() {
                error!("view stopped with {} error(s)", errors.len());
            } else {
                info!("view stopped");
            }
            errors.into_result()
        }
        .instrument(span)
        .await
    }

    async fn catchup(&self, token: &CancellationToken) -> Errors {
        let partitions = self.partitions.read().clone();
        let (mut group, token) = ErrGroup::new(token);
        let _cancel_on_drop = token.clone().drop_guard();
        let barrier = MultiWait::new(token.clone(), partitions.len());

        let watcher = {
            let barrier = barrier.clone();
            let state = self.state.clone();
            tokio::spawn(
                async move {
                    if barrier.wait().await {
                        info!("all partitions recovered");
                        state.set_state(ViewState::Running);
                    } else {
                        debug!("catch-up interrupted before all partitions recovered");
                    }
                }
                .in_current_span(),
            )
        };

        for partition in partitions {
            let token = token.clone();
            let barrier = barrier.clone();
            let restartable = self.restartable;
            let span = info_span!("partition", partition = partition.id);
            group.spawn(
                async move {
                    let (caught_up, errors) =
                        partition.table.start_catchup(token.clone(), restartable);
                    barrier.add(caught_up);
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => Ok(()),
                        received = errors.recv_async() => match received {
                            Ok(cause) => {
                                error!("partition failed: {cause}");
                                Err(ViewError::PartitionRecovery {
                                    partition: partition.id,
                                    cause: Box::new(cause),
                                })
                            }
                            Err(_) => {
                                warn!("partition table stopped without reporting an error");
                                Ok(())
                            }
                        },
                    }
                }
                .instrument(span),
            );
        }
        debug!("catching up {} partitions", group.len());

        let mut errors = group.wait().await;
        if let Err(join_error) = watcher.await {
            errors.push(ViewError::TaskFailed(join_error.to_string()));
        }
        errors
    }

    async fn close_partitions(&self) -> Errors {
        let partitions = std::mem::take(&mut *self.partitions.write());
        debug!("closing {} partitions", partitions.len());
        let (mut group, _) = ErrGroup::new(&CancellationToken::new());
        for partition in partitions {
            group.spawn(async move {
                let table = partition.table;
                table.close().await.inspect_err(|error| {
                    error!("cannot close partition {}: {error}", table.partition());
                })
            });
        }
        group.wait().await
    }

    /// Returns the decoded value of `key`, `None` when the key is absent.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<C::Value>, ViewError> {
        let key = key.as_ref();
        let Some(data) = self
            .find(key)?
            .get(key)
            .map_err(|error| ViewError::storage("get", error))?
        else {
            return Ok(None);
        };

        self.codec
            .decode(&data)
            .map(Some)
            .map_err(|error| ViewError::decode("get", error))
    }

    pub fn has(&self, key: impl AsRef<[u8]>) -> Result<bool, ViewError> {
        let key = key.as_ref();
        self.find(key)?
            .has(key)
            .map_err(|error| ViewError::storage("has", error))
    }

    /// Removes `key` from the local storage only, the log is left untouched.
    pub fn evict(&self, key: impl AsRef<[u8]>) -> Result<(), ViewError> {
        let key = key.as_ref();
        self.find(key)?
            .delete(key)
            .map_err(|error| ViewError::storage("evict", error))
    }

    pub fn iterator(&self) -> Result<ViewIterator<C>, ViewError> {
        self.open_iterator(|storage| storage.iterator())
    }

    /// Iterates keys in `[start, limit)`. An empty `limit` leaves the range open.
    pub fn iterator_with_range(
        &self,
        start: impl AsRef<[u8]>,
        limit: impl AsRef<[u8]>,
    ) -> Result<ViewIterator<C>, ViewError> {
        let (start, limit) = (start.as_ref(), limit.as_ref());
        self.open_iterator(|storage| storage.iterator_with_range(start, limit))
    }

    fn open_iterator<F>(&self, open: F) -> Result<ViewIterator<C>, ViewError>
    where
        F: Fn(&dyn Storage) -> Result<Box<dyn StorageIterator>, ViewError>,
    {
        let storages = self
            .partitions
            .read()
            .iter()
            .map(|partition| (partition.id, partition.storage.clone()))
            .collect::<Vec<_>>();

        let mut iterators = Vec::with_capacity(storages.len());
        for (id, storage) in storages {
            match open(storage.as_ref()) {
                Ok(iterator) => iterators.push(iterator),
                Err(error) => {
                    for iterator in &mut iterators {
                        iterator.release();
                    }
                    return Err(ViewError::storage(
                        format!("open iterator of partition {id}"),
                        error,
                    ));
                }
            }
        }
        Ok(ViewIterator::new(iterators, self.codec.clone()))
    }

    /// Whether every partition consumed its backlog at least once.
    pub fn recovered(&self) -> bool {
        self.partitions
            .read()
            .iter()
            .all(|partition| partition.table.is_recovered())
    }

    /// Completes once the view reached [`ViewState::Running`], immediately if it already did.
    pub fn wait_running(&self) -> impl Future<Output = ()> + Send + 'static {
        self.state.wait_for_state(ViewState::Running)
    }

    /// Best-effort statistics of every partition.
    ///
    /// Partitions whose statistics cannot be fetched are logged and left out.
    pub async fn stats(&self, token: &CancellationToken) -> ViewStats {
        let partitions = self.partitions.read().clone();
        let stats = Arc::new(Mutex::new(ViewStats::default()));
        let (mut group, token) = ErrGroup::new(token);
        for partition in partitions {
            let stats = stats.clone();
            let token = token.clone();
            group.spawn(async move {
                match partition.table.fetch_stats(token).await {
                    Ok(partition_stats) => {
                        stats.lock().partitions.insert(partition.id, partition_stats);
                    }
                    Err(error) => {
                        warn!("cannot fetch stats of partition {}: {error}", partition.id);
                    }
                }
                Ok(())
            });
        }

        if let Err(error) = group.wait().await.into_result() {
            warn!("fetching view stats failed: {error}");
        }
        Arc::try_unwrap(stats)
            .map(Mutex::into_inner)
            .unwrap_or_else(|stats| stats.lock().clone())
    }

    fn find(&self, key: &[u8]) -> Result<Arc<dyn Storage>, ViewError> {
        let partitions = self.partitions.read();
        let index = router::route(self.hasher.as_ref(), key, partitions.len())?;
        partitions
            .get(index as usize)
            .map(|partition| partition.storage.clone())
            .ok_or(ViewError::EmptyView)
    }
}

impl<C: Codec> std::fmt::Debug for View<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("View")
            .field("topic", &self.topic)
            .field("partitions", &self.partitions_count())
            .field("state", &self.state())
            .field("restartable", &self.restartable)
            .finish()
    }
}

/// Queries the partitions of `topic` with a topic manager used only for this purpose.
async fn discover_partitions(
    clients: &ClientBuilders,
    addresses: &[String],
    topic: &str,
) -> Result<Vec<u32>, ViewError> {
    let topic_manager = (clients.topic_manager)(addresses)
        .map_err(|error| ViewError::connection(addresses, error))?;
    let discovered = match topic_manager.partitions(topic).await {
        Ok(partitions) => validate_partitions(topic, partitions),
        Err(error) => Err(error),
    };

    match (discovered, topic_manager.close().await) {
        (Ok(partitions), Ok(())) => Ok(partitions),
        (Ok(_), Err(close_error)) => Err(close_error),
        (Err(error), Err(close_error)) => {
            warn!("cannot close topic manager after failed discovery: {close_error}");
            Err(error)
        }
        (Err(error), Ok(())) => Err(error),
    }
}

/// Partitions must be numbered `0..N` in order.
fn validate_partitions(topic: &str, partitions: Vec<u32>) -> Result<Vec<u32>, ViewError> {
    let sequential = partitions
        .iter()
        .enumerate()
        .all(|(index, partition)| *partition as usize == index);
    if !sequential {
        return Err(ViewError::Topology {
            topic: topic.to_owned(),
            partitions,
        });
    }
    Ok(partitions)
}

fn close_storages(partitions: &[Partition]) {
    for partition in partitions {
        if let Err(error) = partition.storage.close() {
            warn!("cannot close storage of partition {}: {error}", partition.id);
        }
    }
}

/// Closes the storages of a view whose `run` future is dropped mid-flight.
struct CloseOnDrop<'a> {
    partitions: &'a RwLock<Vec<Partition>>,
    armed: bool,
}

impl<'a> CloseOnDrop<'a> {
    fn new(partitions: &'a RwLock<Vec<Partition>>) -> Self {
        Self {
            partitions,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CloseOnDrop<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let partitions = std::mem::take(&mut *self.partitions.write());
        warn!(
            "view run was dropped, closing {} partition storages",
            partitions.len()
        );
        close_storages(&partitions);
    }
}
