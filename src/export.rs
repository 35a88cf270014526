//! CSV export of completed results.
//!
//! Completed items are split by the kind of result they carry. Each
//! non-empty group becomes one file: [`SEO_FILE_NAME`] or [`PROMPT_FILE_NAME`].

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::queue::{ItemResult, ItemStatus, QueuedItem};

pub const SEO_FILE_NAME: &str = "seo_metadata.csv";
pub const PROMPT_FILE_NAME: &str = "image_prompts.csv";

const SEO_HEADER: &str = "Filename,Title,Description,Keywords";
const PROMPT_HEADER: &str = "Filename,Prompt";

/// A generated export, ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: &'static str,
    pub contents: String,
}

/// SEO metadata CSV for completed SEO items, or `None` if there are none.
pub fn seo_csv<'a>(items: impl IntoIterator<Item = &'a QueuedItem>) -> Option<String> {
    let rows: Vec<String> = completed(items)
        .filter_map(|item| match item.result() {
            Some(ItemResult::Seo(seo)) => Some(format!(
                "{},{},{},{}",
                file_name_field(item.file_name()),
                quote(&seo.title),
                quote(&seo.description),
                quote(&seo.keywords.join(", ")),
            )),
            _ => None,
        })
        .collect();
    build(SEO_HEADER, rows)
}

/// Prompt CSV for completed prompt items, or `None` if there are none.
pub fn prompt_csv<'a>(items: impl IntoIterator<Item = &'a QueuedItem>) -> Option<String> {
    let rows: Vec<String> = completed(items)
        .filter_map(|item| match item.result() {
            Some(ItemResult::Prompt(prompt)) => Some(format!(
                "{},{}",
                file_name_field(item.file_name()),
                quote(prompt),
            )),
            _ => None,
        })
        .collect();
    build(PROMPT_HEADER, rows)
}

/// Every export the current queue snapshot produces, SEO first.
pub fn export_files(items: &[QueuedItem]) -> Vec<ExportFile> {
    let mut files = Vec::new();
    if let Some(contents) = seo_csv(items) {
        files.push(ExportFile {
            file_name: SEO_FILE_NAME,
            contents,
        });
    }
    if let Some(contents) = prompt_csv(items) {
        files.push(ExportFile {
            file_name: PROMPT_FILE_NAME,
            contents,
        });
    }
    files
}

/// Write exports into `dir`, returning the paths written.
pub fn write_exports(dir: &Path, files: &[ExportFile]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let path = dir.join(file.file_name);
        std::fs::write(&path, &file.contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Exported {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn completed<'a>(items: impl IntoIterator<Item = &'a QueuedItem>) -> impl Iterator<Item = &'a QueuedItem> {
    items
        .into_iter()
        .filter(|item| item.status() == ItemStatus::Completed)
}

fn build(header: &str, rows: Vec<String>) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(header.to_string());
    lines.extend(rows);
    Some(lines.join("\n"))
}

/// Wrap in double quotes, doubling any embedded quote.
fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// File names go out bare unless they would break the row.
fn file_name_field(name: &str) -> String {
    if name.contains([',', '"', '\n', '\r']) {
        quote(name)
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::SeoResult;
    use crate::queue::{FileQueue, ImagePayload, Mode, Transition};

    fn complete(queue: &mut FileQueue, name: &str, result: ItemResult) {
        let id = queue.push(ImagePayload::new(name, b"fake".to_vec()));
        let mode = result.mode();
        queue.apply(id, Transition::Started { mode, ticket: 1 });
        queue.apply(id, Transition::Completed { ticket: 1, result });
    }

    fn seo(title: &str, description: &str, keywords: &[&str]) -> ItemResult {
        ItemResult::Seo(SeoResult {
            title: title.into(),
            description: description.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        })
    }

    #[test]
    fn seo_csv_two_rows_with_escaping() {
        let mut queue = FileQueue::new();
        complete(&mut queue, "car.jpg", seo("Red car on highway", "Fast \"sports\" car", &["red", "car", "highway"]));
        complete(&mut queue, "dog.png", seo("Dog", "A dog", &["dog"]));

        let csv = seo_csv(queue.items()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "Filename,Title,Description,Keywords");
        assert_eq!(
            lines[1],
            r#"car.jpg,"Red car on highway","Fast ""sports"" car","red, car, highway""#
        );
        assert_eq!(lines[2], r#"dog.png,"Dog","A dog","dog""#);
    }

    #[test]
    fn no_prompt_items_means_no_prompt_csv() {
        let mut queue = FileQueue::new();
        complete(&mut queue, "a.jpg", seo("t", "d", &["k"]));

        assert!(prompt_csv(queue.items()).is_none());
        let files = export_files(queue.items());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_name, SEO_FILE_NAME);
    }

    #[test]
    fn prompt_csv_escapes_quotes() {
        let mut queue = FileQueue::new();
        complete(&mut queue, "art.webp", ItemResult::Prompt("A \"neon\" city at night".into()));

        let csv = prompt_csv(queue.items()).unwrap();
        assert_eq!(csv, "Filename,Prompt\nart.webp,\"A \"\"neon\"\" city at night\"");
    }

    #[test]
    fn pending_and_failed_items_are_skipped() {
        let mut queue = FileQueue::new();
        queue.push(ImagePayload::new("pending.jpg", b"x".to_vec()));
        let failed = queue.push(ImagePayload::new("failed.jpg", b"x".to_vec()));
        queue.apply(failed, Transition::Started { mode: Mode::Seo, ticket: 1 });
        queue.apply(failed, Transition::Failed { ticket: 1, message: "boom".into() });

        assert!(seo_csv(queue.items()).is_none());
        assert!(export_files(queue.items()).is_empty());
    }

    #[test]
    fn mixed_queue_exports_both_files() {
        let mut queue = FileQueue::new();
        complete(&mut queue, "a.jpg", seo("t", "d", &["k"]));
        complete(&mut queue, "b.jpg", ItemResult::Prompt("p".into()));

        let files = export_files(queue.items());
        let names: Vec<&str> = files.iter().map(|f| f.file_name).collect();
        assert_eq!(names, vec![SEO_FILE_NAME, PROMPT_FILE_NAME]);
        assert_eq!(files[1].contents, "Filename,Prompt\nb.jpg,\"p\"");
    }

    #[test]
    fn awkward_file_names_are_quoted() {
        assert_eq!(file_name_field("plain.jpg"), "plain.jpg");
        assert_eq!(file_name_field("a,b.jpg"), "\"a,b.jpg\"");
        assert_eq!(file_name_field("say \"hi\".jpg"), "\"say \"\"hi\"\".jpg\"");
    }

    #[test]
    fn write_exports_creates_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("exports");
        let files = vec![ExportFile {
            file_name: PROMPT_FILE_NAME,
            contents: "Filename,Prompt".into(),
        }];

        let written = write_exports(&out, &files).unwrap();
        assert_eq!(written, vec![out.join(PROMPT_FILE_NAME)]);
        assert_eq!(std::fs::read_to_string(&written[0]).unwrap(), "Filename,Prompt");
    }
}
