//! Content processing module
//!
//! Extraction isolates the main content of a fetched page; conversion turns
//! that fragment into the Markdown body stored for ingestion.

mod dom;
mod extractor;
mod markdown;
mod strategy;

pub use extractor::{ContentExtractor, ExtractedContent};
pub use markdown::to_markdown;
pub use strategy::{DensityStrategy, ExtractionStrategy, TagExclusionStrategy};
