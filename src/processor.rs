//! Batch processing of queued images through an [`AiClient`].
//!
//! The [`BatchProcessor`] is the only owner of the [`FileQueue`]. AI calls run
//! on spawned tokio tasks that never touch the queue; each one sends a single
//! [`ItemUpdate`] back over a channel when it settles, and the owner applies it
//! by id. An update for an item that has since been removed or re-dispatched
//! is dropped. A request that panics settles as an error like any other
//! failure.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinError;

use crate::ai::{AiClient, Platform};
use crate::config::{ConfigStore, GenerationConfig};
use crate::queue::{
    Applied, FileQueue, ImagePayload, ItemId, ItemResult, ItemStatus, Mode, QueuedItem, Transition,
};

/// Message used when a failure carries no text of its own.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Settled outcome of one dispatch, sent from the worker task to the owner.
#[derive(Debug)]
pub struct ItemUpdate {
    pub id: ItemId,
    pub ticket: u64,
    pub outcome: Result<ItemResult, String>,
}

/// Counts for one [`BatchProcessor::process_all`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Items dispatched by this batch.
    pub dispatched: usize,
    pub completed: usize,
    pub failed: usize,
    /// Settled after their item was removed or re-dispatched.
    pub discarded: usize,
}

/// Drives queued items from pending to completed or error.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use stock_seo::ai::GeminiClient;
/// use stock_seo::config::ConfigStore;
/// use stock_seo::processor::BatchProcessor;
/// use stock_seo::queue::{ImagePayload, Mode};
///
/// # async fn example() -> anyhow::Result<()> {
/// let store = ConfigStore::open(None)?;
/// let client = Arc::new(GeminiClient::from_env(None));
/// let mut processor = BatchProcessor::new(client, store);
///
/// processor.set_mode(Mode::Prompt);
/// processor.enqueue(ImagePayload::from_path("photo.jpg".as_ref())?);
///
/// let summary = processor.process_all().await;
/// println!("{} completed, {} failed", summary.completed, summary.failed);
/// # Ok(())
/// # }
/// ```
pub struct BatchProcessor {
    client: Arc<dyn AiClient>,
    store: ConfigStore,
    queue: FileQueue,
    mode: Mode,
    platform: Platform,
    batch_in_flight: Arc<watch::Sender<bool>>,
    next_ticket: u64,
    outstanding: HashSet<u64>,
    tx: mpsc::UnboundedSender<ItemUpdate>,
    rx: mpsc::UnboundedReceiver<ItemUpdate>,
}

impl BatchProcessor {
    pub fn new(client: Arc<dyn AiClient>, store: ConfigStore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (batch_in_flight, _) = watch::channel(false);
        Self {
            client,
            store,
            queue: FileQueue::new(),
            mode: Mode::default(),
            platform: Platform::default(),
            batch_in_flight: Arc::new(batch_in_flight),
            next_ticket: 0,
            outstanding: HashSet::new(),
            tx,
            rx,
        }
    }

    // ── queue access ─────────────────────────────────────────────────

    pub fn enqueue(&mut self, payload: ImagePayload) -> ItemId {
        let id = self.queue.push(payload);
        log::debug!("Queued {id}");
        id
    }

    /// Remove an item. Its in-flight request, if any, keeps running and its
    /// result is discarded.
    pub fn remove(&mut self, id: ItemId) -> bool {
        self.queue.remove(id)
    }

    /// Remove every item, including ones still processing.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn queue(&self) -> &FileQueue {
        &self.queue
    }

    pub fn item(&self, id: ItemId) -> Option<&QueuedItem> {
        self.queue.get(id)
    }

    // ── settings ─────────────────────────────────────────────────────

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Change the mode for future dispatches. Items already in flight keep
    /// the mode they were dispatched with.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn set_platform(&mut self, platform: Platform) {
        self.platform = platform;
    }

    pub fn config(&self) -> &GenerationConfig {
        self.store.config()
    }

    /// Edit the generation settings and persist them.
    pub fn update_config<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut GenerationConfig),
    {
        self.store.update(edit)
    }

    /// `true` while [`process_all`](Self::process_all) is running.
    pub fn is_batch_in_flight(&self) -> bool {
        *self.batch_in_flight.borrow()
    }

    /// Watch the batch-in-flight flag from another task, e.g. a UI that
    /// disables its controls while a batch runs.
    pub fn batch_in_flight_signal(&self) -> watch::Receiver<bool> {
        self.batch_in_flight.subscribe()
    }

    /// Number of dispatches that have not settled yet.
    pub fn in_flight(&self) -> usize {
        self.outstanding.len()
    }

    // ── processing ───────────────────────────────────────────────────

    /// Dispatch one item with the current mode, platform and settings.
    ///
    /// Returns `false` without doing anything if the id is not queued. The
    /// call returns immediately; the result is applied by a later
    /// [`poll_updates`](Self::poll_updates), [`wait_idle`](Self::wait_idle)
    /// or [`process_all`](Self::process_all).
    pub fn process_one(&mut self, id: ItemId) -> bool {
        self.dispatch(id).is_some()
    }

    /// Process every item that is pending right now, concurrently.
    ///
    /// Resolves once each dispatched item has settled. A failure never
    /// cancels or delays the others. With nothing pending this returns at
    /// once and the in-flight flag is never raised. The flag is lowered
    /// again when the batch ends or this future is dropped; items it already
    /// dispatched keep running and settle through
    /// [`wait_idle`](Self::wait_idle) or [`poll_updates`](Self::poll_updates).
    pub async fn process_all(&mut self) -> BatchSummary {
        let pending = self.queue.pending_ids();
        let mut summary = BatchSummary::default();
        if pending.is_empty() {
            return summary;
        }

        let _flag = BatchFlag::raise(&self.batch_in_flight);
        log::info!("Processing {} item(s) in {} mode", pending.len(), self.mode);

        let mut batch: HashSet<u64> = pending.into_iter().filter_map(|id| self.dispatch(id)).collect();
        summary.dispatched = batch.len();

        while !batch.is_empty() {
            let Some(update) = self.rx.recv().await else {
                break;
            };
            let in_batch = batch.remove(&update.ticket);
            let succeeded = update.outcome.is_ok();
            let applied = self.apply(update);
            if in_batch {
                match (applied, succeeded) {
                    (Applied::Updated, true) => summary.completed += 1,
                    (Applied::Updated, false) => summary.failed += 1,
                    _ => summary.discarded += 1,
                }
            }
        }

        log::info!(
            "Batch done: {} completed, {} failed, {} discarded",
            summary.completed,
            summary.failed,
            summary.discarded
        );
        summary
    }

    /// Apply every update that has already arrived, without waiting.
    ///
    /// Returns how many updates were received.
    pub fn poll_updates(&mut self) -> usize {
        let mut received = 0;
        while let Ok(update) = self.rx.try_recv() {
            self.apply(update);
            received += 1;
        }
        received
    }

    /// Wait until every outstanding dispatch has settled and been applied.
    pub async fn wait_idle(&mut self) {
        while !self.outstanding.is_empty() {
            match self.rx.recv().await {
                Some(update) => {
                    self.apply(update);
                }
                None => break,
            }
        }
    }

    fn dispatch(&mut self, id: ItemId) -> Option<u64> {
        let payload = self.queue.get(id)?.payload().clone();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let mode = self.mode;
        let platform = self.platform;
        let config = self.store.config().clone();

        self.queue.apply(id, Transition::Started { mode, ticket });
        self.outstanding.insert(ticket);
        log::info!("Dispatching {} ({mode})", payload.file_name());

        let client = Arc::clone(&self.client);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let request = tokio::spawn(async move {
                run_request(client.as_ref(), &payload, mode, platform, &config).await
            });
            let outcome = match request.await {
                Ok(outcome) => outcome,
                Err(e) => Err(join_error_message(e)),
            };
            // The receiver lives as long as the processor; a closed channel
            // means nobody is left to care about this result.
            let _ = tx.send(ItemUpdate { id, ticket, outcome });
        });

        Some(ticket)
    }

    fn apply(&mut self, update: ItemUpdate) -> Applied {
        self.outstanding.remove(&update.ticket);

        let transition = match update.outcome {
            Ok(result) => Transition::Completed { ticket: update.ticket, result },
            Err(message) => {
                log::warn!("Item {} failed: {message}", update.id);
                Transition::Failed { ticket: update.ticket, message }
            }
        };

        let applied = self.queue.apply(update.id, transition);
        match applied {
            Applied::Updated => {}
            Applied::Missing => log::debug!("Dropping result for removed item {}", update.id),
            Applied::Superseded => log::debug!("Dropping stale result for item {}", update.id),
        }
        applied
    }

    /// Snapshot of completed/error counts for status lines.
    pub fn counts(&self) -> (usize, usize) {
        (
            self.queue.count(ItemStatus::Completed),
            self.queue.count(ItemStatus::Error),
        )
    }
}

async fn run_request(
    client: &dyn AiClient,
    payload: &ImagePayload,
    mode: Mode,
    platform: Platform,
    config: &GenerationConfig,
) -> Result<ItemResult, String> {
    let result = match mode {
        Mode::Seo => client
            .describe_for_seo(payload, platform, config)
            .await
            .map(ItemResult::Seo),
        Mode::Prompt => client
            .describe_as_prompt(payload, config)
            .await
            .map(ItemResult::Prompt),
    };
    result.map_err(|e| error_message(&e))
}

/// Lowers the batch flag when dropped.
struct BatchFlag(Arc<watch::Sender<bool>>);

impl BatchFlag {
    fn raise(flag: &Arc<watch::Sender<bool>>) -> Self {
        flag.send_replace(true);
        Self(Arc::clone(flag))
    }
}

impl Drop for BatchFlag {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

/// Item error text for a request task that panicked or was cancelled.
fn join_error_message(err: JoinError) -> String {
    if !err.is_panic() {
        return "Request cancelled".to_string();
    }
    let panic = err.into_panic();
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned());
    match detail {
        Some(detail) => format!("Request panicked: {detail}"),
        None => "Request panicked".to_string(),
    }
}

/// Human-readable text for a failed request.
fn error_message(err: &anyhow::Error) -> String {
    let message = format!("{err:#}");
    if message.trim().is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        message
    }
}
