//! Terminal rendering of queued items and copy-ready field text.

use serde::Serialize;

use crate::ai::SeoResult;
use crate::queue::{ItemResult, ItemStatus, Mode, QueuedItem};

// ANSI color codes
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 60;
/// Indent for continuation lines (label column + " : ").
const INDENT: &str = "                  ";

/// A field the user can copy from a completed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyField {
    Title,
    Description,
    Keywords,
    Prompt,
}

/// Badge text for a status.
pub fn status_label(status: ItemStatus) -> &'static str {
    match status {
        ItemStatus::Pending => "PENDING",
        ItemStatus::Processing => "PROCESSING",
        ItemStatus::Completed => "DONE",
        ItemStatus::Error => "ERROR",
    }
}

/// Text the copy action for `field` would place on the clipboard.
///
/// Keywords are joined with `", "`. Returns `None` when the item has no
/// result of the matching kind.
pub fn copy_text(item: &QueuedItem, field: CopyField) -> Option<String> {
    match (item.result()?, field) {
        (ItemResult::Seo(seo), CopyField::Title) => Some(seo.title.clone()),
        (ItemResult::Seo(seo), CopyField::Description) => Some(seo.description.clone()),
        (ItemResult::Seo(seo), CopyField::Keywords) => Some(seo.keywords.join(", ")),
        (ItemResult::Prompt(prompt), CopyField::Prompt) => Some(prompt.clone()),
        _ => None,
    }
}

/// Render one item as a block of terminal lines.
pub fn render_item(item: &QueuedItem, color: bool) -> String {
    let paint = |code: &'static str| if color { code } else { "" };
    let reset = paint(RESET);

    let badge_color = match item.status() {
        ItemStatus::Pending => DIM,
        ItemStatus::Processing => YELLOW,
        ItemStatus::Completed => GREEN,
        ItemStatus::Error => RED,
    };

    let mut out = format!(
        "{}{}{reset} {}[{}]{reset}",
        paint(BOLD),
        item.file_name(),
        paint(badge_color),
        status_label(item.status()),
    );
    if let Some(mode) = item.mode_processed() {
        out.push_str(&format!(" {}{mode}{reset}", paint(DIM)));
    }
    out.push('\n');

    match (item.status(), item.result()) {
        (ItemStatus::Completed, Some(ItemResult::Seo(seo))) => render_seo(&mut out, seo),
        (ItemStatus::Completed, Some(ItemResult::Prompt(prompt))) => push_row(&mut out, "Prompt", prompt),
        (ItemStatus::Error, _) => {
            let message = item.error_msg().unwrap_or(crate::processor::UNKNOWN_ERROR);
            out.push_str(&format!("  {}{message}{reset}\n", paint(RED)));
        }
        _ => {}
    }
    out
}

fn render_seo(out: &mut String, seo: &SeoResult) {
    push_row(out, "Title", &seo.title);
    push_row(out, "Description", &seo.description);
    push_row(out, &format!("Keywords ({})", seo.keywords.len()), &seo.keywords.join(", "));
}

fn push_row(out: &mut String, label: &str, value: &str) {
    let label_col = format!("{label:<13}");
    for (i, line) in wrap_text(value, VAL_WIDTH).iter().enumerate() {
        if i == 0 {
            out.push_str(&format!("  {label_col} : {line}\n"));
        } else {
            out.push_str(&format!("{INDENT}{line}\n"));
        }
    }
}

/// Split `text` into lines of at most `width` characters, breaking between
/// words. A single word longer than `width` gets a line of its own.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut line = String::new();
    let mut line_chars = 0;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        if line_chars > 0 && line_chars + 1 + word_chars > width {
            lines.push(std::mem::take(&mut line));
            line_chars = 0;
        }
        if line_chars > 0 {
            line.push(' ');
            line_chars += 1;
        }
        line.push_str(word);
        line_chars += word_chars;
    }

    if line_chars > 0 || lines.is_empty() {
        lines.push(line);
    }
    lines
}

/// Serializable per-item summary for `--json` output.
#[derive(Debug, Clone, Serialize)]
pub struct ItemReport {
    pub id: String,
    pub file_name: String,
    pub status: ItemStatus,
    pub mode: Option<Mode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seo: Option<SeoResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&QueuedItem> for ItemReport {
    fn from(item: &QueuedItem) -> Self {
        Self {
            id: item.id().to_string(),
            file_name: item.file_name().to_string(),
            status: item.status(),
            mode: item.mode_processed(),
            seo: item.seo_result().cloned(),
            prompt: item.prompt_result().map(str::to_string),
            error: item.error_msg().map(str::to_string),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{FileQueue, ImagePayload, Transition};

    fn queue_with(result: Option<ItemResult>, failure: Option<&str>) -> FileQueue {
        let mut queue = FileQueue::new();
        let id = queue.push(ImagePayload::new("shot.jpg", b"x".to_vec()));
        let mode = result.as_ref().map_or(Mode::Seo, ItemResult::mode);
        queue.apply(id, Transition::Started { mode, ticket: 1 });
        if let Some(result) = result {
            queue.apply(id, Transition::Completed { ticket: 1, result });
        } else if let Some(message) = failure {
            queue.apply(id, Transition::Failed { ticket: 1, message: message.into() });
        }
        queue
    }

    fn sample_seo() -> ItemResult {
        ItemResult::Seo(SeoResult {
            title: "Red car on highway".into(),
            description: "A red car speeding down an empty highway.".into(),
            keywords: vec!["red".into(), "car".into(), "highway".into()],
        })
    }

    #[test]
    fn copy_keywords_joined() {
        let queue = queue_with(Some(sample_seo()), None);
        let item = &queue.items()[0];
        assert_eq!(copy_text(item, CopyField::Keywords).as_deref(), Some("red, car, highway"));
        assert_eq!(copy_text(item, CopyField::Title).as_deref(), Some("Red car on highway"));
        assert!(copy_text(item, CopyField::Prompt).is_none());
    }

    #[test]
    fn copy_prompt() {
        let queue = queue_with(Some(ItemResult::Prompt("A neon city".into())), None);
        let item = &queue.items()[0];
        assert_eq!(copy_text(item, CopyField::Prompt).as_deref(), Some("A neon city"));
        assert!(copy_text(item, CopyField::Title).is_none());
    }

    #[test]
    fn render_completed_seo_plain() {
        let queue = queue_with(Some(sample_seo()), None);
        let text = render_item(&queue.items()[0], false);
        assert!(text.starts_with("shot.jpg [DONE] seo\n"));
        assert!(text.contains("Title         : Red car on highway"));
        assert!(text.contains("Keywords (3)  : red, car, highway"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn render_error_shows_message() {
        let queue = queue_with(None, Some("timeout"));
        let text = render_item(&queue.items()[0], false);
        assert!(text.contains("[ERROR]"));
        assert!(text.contains("timeout"));
    }

    #[test]
    fn render_processing_has_no_body() {
        let queue = queue_with(None, None);
        let text = render_item(&queue.items()[0], true);
        assert!(text.contains("PROCESSING"));
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn wrap_text_breaks_long_lines() {
        let lines = wrap_text("one two three four", 9);
        assert_eq!(lines, vec!["one two", "three", "four"]);
    }

    #[test]
    fn wrap_text_counts_characters_not_bytes() {
        let lines = wrap_text("café crème brûlée", 10);
        assert_eq!(lines, vec!["café crème", "brûlée"]);
        assert_eq!(wrap_text("", 10), vec![""]);
    }

    #[test]
    fn report_serializes_status_lowercase() {
        let queue = queue_with(Some(ItemResult::Prompt("p".into())), None);
        let report = ItemReport::from(&queue.items()[0]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["mode"], "prompt");
        assert_eq!(json["prompt"], "p");
        assert!(json.get("error").is_none());
    }
}
