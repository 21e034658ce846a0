mod blocks;
mod dates;
mod pdf_text;
mod pipeline;
mod record;
#[cfg(test)]
mod tests;

pub use blocks::{AnchorConfig, BlockExtractor};
pub use pdf_text::load_pages;
pub use pipeline::{SourceDocument, ingest};
pub use record::RecordParser;
