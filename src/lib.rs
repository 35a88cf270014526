//! # stock-seo
//!
//! AI-powered stock photo metadata: generate SEO titles, descriptions and
//! keyword lists, or reverse-engineer text-to-image prompts, for a batch of
//! images using Google Gemini, then export the results as CSV.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use std::sync::Arc;
//! use stock_seo::ai::{GeminiClient, Platform};
//! use stock_seo::config::ConfigStore;
//! use stock_seo::export::{export_files, write_exports};
//! use stock_seo::processor::BatchProcessor;
//! use stock_seo::queue::{collect_images, ImagePayload};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Settings persist between runs; a missing file means defaults
//!     let store = ConfigStore::open(None)?;
//!     let client = Arc::new(GeminiClient::from_env(None));
//!
//!     let mut processor = BatchProcessor::new(client, store);
//!     processor.set_platform(Platform::AdobeStock);
//!
//!     for path in collect_images(&[PathBuf::from("./photos")]) {
//!         processor.enqueue(ImagePayload::from_path(&path)?);
//!     }
//!
//!     // Every pending image is sent concurrently; failures stay per item
//!     let summary = processor.process_all().await;
//!     println!("{} done, {} failed", summary.completed, summary.failed);
//!
//!     write_exports(".".as_ref(), &export_files(processor.queue().items()))?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`ai`]: AI client trait, prompts, and the Gemini implementation
//! - [`config`]: Generation settings and their persisted store
//! - [`queue`]: Queued items, their lifecycle, and image intake
//! - [`processor`]: Batch processor driving items through the AI client
//! - [`export`]: CSV export of completed results
//! - [`presenter`]: Terminal rendering and copy-ready text

pub mod ai;
pub mod config;
pub mod export;
pub mod presenter;
pub mod processor;
pub mod queue;
