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

//! Per-partition engines keeping a storage in sync with one log partition.

use crate::error::ViewError;
use crate::log::{LogConsumer, Record, TopicManager};
use crate::multierr::CatchupSignal;
use crate::stats::{PartitionStats, PartitionStatus};
use crate::storage::Storage;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};

#[cfg(test)]
use mockall::automock;

/// Errors reported by a running catch-up. The channel closes when the catch-up ends.
pub type ErrorReceiver = flume::Receiver<ViewError>;

/// Position of the record being applied.
#[derive(Debug, Clone, Copy)]
pub struct UpdateContext<'a> {
    pub topic: &'a str,
    pub partition: u32,
    pub offset: u64,
    pub timestamp: u64,
}

/// Applies a single record to the storage. A `None` value is a tombstone.
pub type UpdateCallback = Arc<
    dyn Fn(&UpdateContext<'_>, &dyn Storage, &[u8], Option<&Bytes>) -> Result<(), ViewError>
        + Send
        + Sync,
>;

/// Stores the value under its key, or deletes the key on a tombstone.
pub fn default_update() -> UpdateCallback {
    Arc::new(
        |_context: &UpdateContext<'_>,
         storage: &dyn Storage,
         key: &[u8],
         value: Option<&Bytes>| match value {
            Some(value) => storage.set(key, value.clone()),
            None => storage.delete(key),
        },
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchupSettings {
    /// Maximum number of records fetched by a single poll.
    pub poll_batch_length: u32,
    /// Pause after a poll that returned nothing.
    pub poll_interval: Duration,
    pub restart_backoff: Duration,
    /// `None` restarts forever.
    pub max_restarts: Option<u32>,
}

impl Default for CatchupSettings {
    fn default() -> Self {
        Self {
            poll_batch_length: 1000,
            poll_interval: Duration::from_millis(100),
            restart_backoff: Duration::from_secs(1),
            max_restarts: None,
        }
    }
}

/// Everything a partition table is created from.
#[derive(Clone)]
pub struct PartitionTableContext {
    pub topic: String,
    pub partition: u32,
    pub consumer: Arc<dyn LogConsumer>,
    pub topic_manager: Arc<dyn TopicManager>,
    pub storage: Arc<dyn Storage>,
    pub update: UpdateCallback,
    pub settings: CatchupSettings,
}

impl std::fmt::Debug for PartitionTableContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionTableContext")
            .field("topic", &self.topic)
            .field("partition", &self.partition)
            .field("storage", &self.storage)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

pub type PartitionTableBuilder =
    Arc<dyn Fn(PartitionTableContext) -> Arc<dyn PartitionTable> + Send + Sync>;

/// Engine consuming one partition of a table topic into its storage.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PartitionTable: Send + Sync {
    fn partition(&self) -> u32;

    /// Starts consuming the partition in the background.
    ///
    /// The signal fires once the backlog is consumed. The error channel yields
    /// the error that ended the catch-up and closes without one on cancellation.
    /// With `restartable`, transient failures restart the catch-up instead.
    fn start_catchup(
        &self,
        token: CancellationToken,
        restartable: bool,
    ) -> (CatchupSignal, ErrorReceiver);

    fn is_recovered(&self) -> bool;

    async fn fetch_stats(&self, token: CancellationToken) -> Result<PartitionStats, ViewError>;

    /// Stops applying records and closes the storage.
    async fn close(&self) -> Result<(), ViewError>;
}

/// Default [`PartitionTable`] polling a [`LogConsumer`].
pub struct LogPartitionTable {
    shared: Arc<Shared>,
}

struct Shared {
    context: PartitionTableContext,
    started: AtomicBool,
    closed: AtomicBool,
    recovered: AtomicBool,
    status: Mutex<PartitionStatus>,
    offset: AtomicU64,
    high_watermark: AtomicU64,
    records_applied: AtomicU64,
    records_deleted: AtomicU64,
    bytes_applied: AtomicU64,
    restarts: AtomicU32,
    last_error: Mutex<Option<String>>,
}

impl LogPartitionTable {
    pub fn new(context: PartitionTableContext) -> Self {
        Self {
            shared: Arc::new(Shared {
                context,
                started: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                recovered: AtomicBool::new(false),
                status: Mutex::new(PartitionStatus::Idle),
                offset: AtomicU64::new(0),
                high_watermark: AtomicU64::new(0),
                records_applied: AtomicU64::new(0),
                records_deleted: AtomicU64::new(0),
                bytes_applied: AtomicU64::new(0),
                restarts: AtomicU32::new(0),
                last_error: Mutex::new(None),
            }),
        }
    }

    pub fn builder() -> PartitionTableBuilder {
        Arc::new(|context| Arc::new(LogPartitionTable::new(context)) as Arc<dyn PartitionTable>)
    }

    pub fn status(&self) -> PartitionStatus {
        *self.shared.status.lock()
    }

    fn snapshot(&self) -> PartitionStats {
        let shared = &self.shared;
        PartitionStats {
            status: *shared.status.lock(),
            recovered: shared.recovered.load(Ordering::Acquire),
            offset: shared.offset.load(Ordering::Relaxed),
            high_watermark: shared.high_watermark.load(Ordering::Relaxed),
            records_applied: shared.records_applied.load(Ordering::Relaxed),
            records_deleted: shared.records_deleted.load(Ordering::Relaxed),
            bytes_applied: shared.bytes_applied.load(Ordering::Relaxed),
            restarts: shared.restarts.load(Ordering::Relaxed),
            last_error: shared.last_error.lock().clone(),
        }
    }
}

impl std::fmt::Debug for LogPartitionTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogPartitionTable")
            .field("topic", &self.shared.context.topic)
            .field("partition", &self.shared.context.partition)
            .field("status", &self.status())
            .finish()
    }
}

#[async_trait]
impl PartitionTable for LogPartitionTable {
    fn partition(&self) -> u32 {
        self.shared.context.partition
    }

    fn start_catchup(
        &self,
        token: CancellationToken,
        restartable: bool,
    ) -> (CatchupSignal, ErrorReceiver) {
        let (caught_up_sender, caught_up) = oneshot::channel();
        let (error_sender, errors) = flume::bounded(1);

        if self.shared.closed.load(Ordering::Acquire) {
            let _ = error_sender.send(ViewError::PartitionTableClosed);
            return (caught_up, errors);
        }
        if self.shared.started.swap(true, Ordering::AcqRel) {
            let _ = error_sender.send(ViewError::AlreadyRunning);
            return (caught_up, errors);
        }

        let shared = self.shared.clone();
        let span = info_span!(
            "partition_table",
            topic = %shared.context.topic,
            partition = shared.context.partition
        );
        tokio::spawn(
            async move {
                shared
                    .catchup(token, restartable, caught_up_sender, error_sender)
                    .await;
            }
            .instrument(span),
        );
        (caught_up, errors)
    }

    fn is_recovered(&self) -> bool {
        self.shared.recovered.load(Ordering::Acquire)
    }

    async fn fetch_stats(&self, token: CancellationToken) -> Result<PartitionStats, ViewError> {
        let context = &self.shared.context;
        let offsets = tokio::select! {
            biased;
            _ = token.cancelled() => {
                trace!(
                    "stats of partition {} fetched without refreshing offsets",
                    context.partition
                );
                return Ok(self.snapshot());
            }
            offsets = context.consumer.offsets(&context.topic, context.partition) => offsets?,
        };
        self.shared
            .high_watermark
            .fetch_max(offsets.high_watermark, Ordering::Relaxed);
        Ok(self.snapshot())
    }

    async fn close(&self) -> Result<(), ViewError> {
        if self.shared.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let context = &self.shared.context;
        debug!(
            "closing partition table for topic {}, partition {}",
            context.topic, context.partition
        );
        self.shared.set_status(PartitionStatus::Stopped);
        context
            .storage
            .close()
            .map_err(|error| ViewError::storage("close", error))
    }
}

/// Errors a restart cannot fix.
fn is_transient(error: &ViewError) -> bool {
    !matches!(
        error,
        ViewError::TopicNotFound(_)
            | ViewError::PartitionNotFound(_, _)
            | ViewError::PartitionTableClosed
            | ViewError::StorageClosed
    )
}

impl Shared {
    fn set_status(&self, status: PartitionStatus) {
        *self.status.lock() = status;
    }

    async fn catchup(
        &self,
        token: CancellationToken,
        restartable: bool,
        caught_up: oneshot::Sender<()>,
        errors: flume::Sender<ViewError>,
    ) {
        let settings = self.context.settings;
        let mut caught_up = Some(caught_up);
        let mut restarts = 0u32;
        self.set_status(PartitionStatus::CatchingUp);

        loop {
            let error = match self.consume(&token, &mut caught_up).await {
                Ok(()) => {
                    debug!("catch-up cancelled");
                    break;
                }
                Err(error) => error,
            };

            *self.last_error.lock() = Some(error.to_string());
            let can_restart = restartable
                && is_transient(&error)
                && !self.closed.load(Ordering::Acquire)
                && settings.max_restarts.map_or(true, |max| restarts < max);
            if !can_restart {
                error!("catch-up failed: {error}");
                self.set_status(PartitionStatus::Stopped);
                if errors.send_async(error).await.is_err() {
                    trace!("nobody is listening for catch-up errors");
                }
                return;
            }

            restarts += 1;
            self.restarts.fetch_add(1, Ordering::Relaxed);
            warn!(
                "catch-up failed: {error}, restarting in {:?} (restart {restarts})",
                settings.restart_backoff
            );
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = tokio::time::sleep(settings.restart_backoff) => {}
            }
        }

        self.set_status(PartitionStatus::Stopped);
    }

    /// Consumes the partition until cancelled. Only returns an error on failure.
    async fn consume(
        &self,
        token: &CancellationToken,
        caught_up: &mut Option<oneshot::Sender<()>>,
    ) -> Result<(), ViewError> {
        let context = &self.context;
        let (topic, partition) = (context.topic.as_str(), context.partition);

        let partitions = context.topic_manager.partitions(topic).await?;
        if !partitions.contains(&partition) {
            return Err(ViewError::PartitionNotFound(topic.to_owned(), partition));
        }

        let offsets = context.consumer.offsets(topic, partition).await?;
        let stored = context
            .storage
            .offset()
            .map_err(|error| ViewError::storage("read offset", error))?;
        let mut next = stored
            .map_or(offsets.oldest, |offset| offset + 1)
            .max(offsets.oldest);
        let mut high_watermark = offsets.high_watermark;
        self.offset.store(next, Ordering::Relaxed);
        self.high_watermark
            .fetch_max(high_watermark, Ordering::Relaxed);
        info!("consuming from offset {next}, high watermark {high_watermark}");
        self.mark_caught_up(next, high_watermark, caught_up);

        loop {
            let records = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(()),
                polled = context.consumer.poll(
                    topic,
                    partition,
                    next,
                    context.settings.poll_batch_length,
                ) => polled?,
            };

            if records.is_empty() {
                if caught_up.is_some() {
                    high_watermark =
                        context.consumer.offsets(topic, partition).await?.high_watermark;
                    self.mark_caught_up(next, high_watermark, caught_up);
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(context.settings.poll_interval) => {}
                }
                continue;
            }

            for record in &records {
                if self.closed.load(Ordering::Acquire) {
                    return Err(ViewError::PartitionTableClosed);
                }
                self.apply(record)?;
                next = record.offset + 1;
                self.offset.store(next, Ordering::Relaxed);
            }
            self.high_watermark.fetch_max(next, Ordering::Relaxed);
            self.mark_caught_up(next, high_watermark, caught_up);
        }
    }

    fn apply(&self, record: &Record) -> Result<(), ViewError> {
        let context = &self.context;
        let update_context = UpdateContext {
            topic: &context.topic,
            partition: context.partition,
            offset: record.offset,
            timestamp: record.timestamp,
        };
        (context.update)(
            &update_context,
            context.storage.as_ref(),
            &record.key,
            record.value.as_ref(),
        )?;
        context
            .storage
            .set_offset(record.offset)
            .map_err(|error| ViewError::storage("store offset", error))?;

        self.records_applied.fetch_add(1, Ordering::Relaxed);
        match &record.value {
            Some(value) => {
                self.bytes_applied
                    .fetch_add(value.len() as u64, Ordering::Relaxed);
            }
            None => {
                self.records_deleted.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    fn mark_caught_up(
        &self,
        next: u64,
        high_watermark: u64,
        caught_up: &mut Option<oneshot::Sender<()>>,
    ) {
        if next < high_watermark {
            return;
        }
        let Some(sender) = caught_up.take() else {
            return;
        };

        self.recovered.store(true, Ordering::Release);
        if !self.closed.load(Ordering::Acquire) {
            self.set_status(PartitionStatus::Recovered);
        }
        info!("partition recovered at offset {next}");
        if sender.send(()).is_err() {
            trace!("nobody is waiting for the catch-up signal");
        }
    }
}
