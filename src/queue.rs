use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::ai::SeoResult;

/// Extensions accepted by [`collect_images`].
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic", "heif", "svg"];

/// Opaque identity of a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemId(Uuid);

impl ItemId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Which AI operation applies to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Title, description and keywords for stock sites.
    #[default]
    Seo,
    /// Reverse-engineered text-to-image prompt.
    Prompt,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Seo => f.write_str("seo"),
            Mode::Prompt => f.write_str("prompt"),
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "seo" => Ok(Mode::Seo),
            "prompt" => Ok(Mode::Prompt),
            other => anyhow::bail!("Unknown mode '{other}' (expected 'seo' or 'prompt')"),
        }
    }
}

/// Lifecycle of a queued item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ItemStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Error)
    }
}

/// Result attached to a completed item. The variant always matches the
/// item's `mode_processed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ItemResult {
    Seo(SeoResult),
    Prompt(String),
}

impl ItemResult {
    pub fn mode(&self) -> Mode {
        match self {
            ItemResult::Seo(_) => Mode::Seo,
            ItemResult::Prompt(_) => Mode::Prompt,
        }
    }
}

/// An uploaded image: name, bytes and declared MIME type.
///
/// The bytes are shared, so cloning a payload for an in-flight request is
/// cheap and the buffer is released once the queue and every request have
/// dropped it.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    file_name: String,
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl ImagePayload {
    /// Wrap in-memory bytes, deriving the MIME type from content and name.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = detect_mime_type(&file_name, &bytes).to_string();
        Self {
            file_name,
            bytes: bytes.into(),
            mime_type,
        }
    }

    /// Read an image file from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Number of live handles to the image buffer (queue plus in-flight requests).
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.bytes)
    }
}

/// MIME type from the file signature, falling back to the extension.
pub fn detect_mime_type(file_name: &str, bytes: &[u8]) -> &'static str {
    if let Ok(format) = image::guess_format(bytes) {
        return format.to_mime_type();
    }
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "svg" => "image/svg+xml",
        _ => "image/jpeg",
    }
}

/// One uploaded image plus its processing state.
#[derive(Debug, Clone)]
pub struct QueuedItem {
    id: ItemId,
    payload: ImagePayload,
    status: ItemStatus,
    result: Option<ItemResult>,
    mode_processed: Option<Mode>,
    error_msg: Option<String>,
    ticket: Option<u64>,
}

impl QueuedItem {
    fn new(payload: ImagePayload) -> Self {
        Self {
            id: ItemId::new(),
            payload,
            status: ItemStatus::Pending,
            result: None,
            mode_processed: None,
            error_msg: None,
            ticket: None,
        }
    }

    pub fn id(&self) -> ItemId {
        self.id
    }

    pub fn payload(&self) -> &ImagePayload {
        &self.payload
    }

    pub fn file_name(&self) -> &str {
        self.payload.file_name()
    }

    pub fn status(&self) -> ItemStatus {
        self.status
    }

    pub fn result(&self) -> Option<&ItemResult> {
        self.result.as_ref()
    }

    pub fn seo_result(&self) -> Option<&SeoResult> {
        match &self.result {
            Some(ItemResult::Seo(seo)) => Some(seo),
            _ => None,
        }
    }

    pub fn prompt_result(&self) -> Option<&str> {
        match &self.result {
            Some(ItemResult::Prompt(prompt)) => Some(prompt),
            _ => None,
        }
    }

    /// Mode recorded when the item was last dispatched.
    pub fn mode_processed(&self) -> Option<Mode> {
        self.mode_processed
    }

    pub fn error_msg(&self) -> Option<&str> {
        self.error_msg.as_deref()
    }

    /// Ticket of the most recent dispatch, if any.
    pub fn ticket(&self) -> Option<u64> {
        self.ticket
    }
}

/// State change applied to an item by id.
#[derive(Debug, Clone)]
pub enum Transition {
    /// Dispatched: record the mode in effect and the dispatch ticket.
    Started { mode: Mode, ticket: u64 },
    /// Settled successfully.
    Completed { ticket: u64, result: ItemResult },
    /// Settled with a failure message.
    Failed { ticket: u64, message: String },
}

/// Outcome of [`FileQueue::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Updated,
    /// No item with that id (removed or cleared).
    Missing,
    /// The item was re-dispatched after this update was issued.
    Superseded,
}

/// Ordered collection of uploaded items.
///
/// Items are located by id on every write, so an update for an item that was
/// removed in the meantime is a no-op.
#[derive(Debug, Default, Clone)]
pub struct FileQueue {
    items: Vec<QueuedItem>,
}

impl FileQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pending item and return its id.
    pub fn push(&mut self, payload: ImagePayload) -> ItemId {
        let item = QueuedItem::new(payload);
        let id = item.id;
        self.items.push(item);
        id
    }

    pub fn get(&self, id: ItemId) -> Option<&QueuedItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Remove an item, dropping the queue's handle to its image.
    pub fn remove(&mut self, id: ItemId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedItem> {
        self.items.iter()
    }

    pub fn items(&self) -> &[QueuedItem] {
        &self.items
    }

    /// Ids of items currently pending, in queue order.
    pub fn pending_ids(&self) -> Vec<ItemId> {
        self.ids_with_status(ItemStatus::Pending)
    }

    pub fn ids_with_status(&self, status: ItemStatus) -> Vec<ItemId> {
        self.items
            .iter()
            .filter(|item| item.status == status)
            .map(|item| item.id)
            .collect()
    }

    pub fn count(&self, status: ItemStatus) -> usize {
        self.items.iter().filter(|item| item.status == status).count()
    }

    /// Apply `transition` to the item with `id`, if it is still queued.
    pub fn apply(&mut self, id: ItemId, transition: Transition) -> Applied {
        let Some(item) = self.items.iter_mut().find(|item| item.id == id) else {
            return Applied::Missing;
        };

        match transition {
            Transition::Started { mode, ticket } => {
                item.status = ItemStatus::Processing;
                item.mode_processed = Some(mode);
                item.ticket = Some(ticket);
                item.result = None;
                item.error_msg = None;
            }
            Transition::Completed { ticket, result } => {
                if item.ticket != Some(ticket) {
                    return Applied::Superseded;
                }
                item.status = ItemStatus::Completed;
                item.mode_processed = Some(result.mode());
                item.result = Some(result);
                item.error_msg = None;
            }
            Transition::Failed { ticket, message } => {
                if item.ticket != Some(ticket) {
                    return Applied::Superseded;
                }
                item.status = ItemStatus::Error;
                item.result = None;
                item.error_msg = Some(message);
            }
        }
        Applied::Updated
    }
}

/// Collect supported image files from the given paths.
///
/// Directories are walked recursively (following symlinks). Unsupported
/// files and missing paths are logged and skipped.
pub fn collect_images(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if is_supported_image(path) {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .follow_links(true)
                .into_iter()
                .filter_map(|e| e.ok())
                .map(|e| e.into_path())
                .filter(|p| p.is_file() && is_supported_image(p))
                .collect();
            found.sort();
            images.extend(found);
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
