pub mod client;
pub mod error;
pub mod parse;
pub mod prompts;

pub use client::{PageExtractor, VisionClient};
pub use error::ExtractError;
pub use parse::{FooterSummary, HeaderMetadata, RecordEntry, ResponseParser};

/// The role a page plays in a roll document, which decides its prompt and
/// payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// First page: roll metadata.
    Header,
    /// Middle pages: the voter record grid.
    Records,
    /// Last page: the summary table.
    Footer,
}

/// Typed payload extracted from one page.
#[derive(Debug, Clone)]
pub enum PagePayload {
    Header(HeaderMetadata),
    Records(Vec<RecordEntry>),
    Footer(FooterSummary),
}
