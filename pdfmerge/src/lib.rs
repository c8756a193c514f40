//! Merges existing PDF documents into one.
//!
//! Each input is parsed into an immutable [`ParsedDocument`], its page tree is reduced to a
//! [`PageClosure`] (the pages plus everything they reference), and the [`Merger`] writes all
//! pages, in input order, into a single new document with fresh object numbers.
//!
//! ```no_run
//! # fn main() -> Result<(), pdfmerge::Error> {
//! let a = std::fs::read("a.pdf")?;
//! let b = std::fs::read("b.pdf")?;
//! let merged = pdfmerge::merge_documents(&[a, b])?;
//! std::fs::write("merged.pdf", merged)?;
//! # Ok(())
//! # }
//! ```

mod document;
mod error;
mod filter;
mod idseq;
mod merge;
mod pages;
mod writer;
mod xref;

pub use document::ParsedDocument;
pub use error::{Error, Result};
pub use merge::{merge, Merger};
pub use pages::{extract_pages, PageClosure, PageLeaf};
pub use serde_pdf::{Dictionary, Name, ObjectId, PdfString, Stream, Value};

/// Parses the raw bytes of a PDF file.
pub fn parse(input: &[u8]) -> Result<ParsedDocument> {
    ParsedDocument::parse(input)
}

/// Parses all `inputs`, extracts their pages and merges them into a new PDF.
pub fn merge_documents<I, B>(inputs: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    Merger::new().merge_documents(inputs)
}
