use std::io;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The input is not a parseable PDF (missing or garbled trailer, unresolvable xref, encrypted).
    #[error("Malformed PDF document: {0}")]
    MalformedDocument(String),
    /// The input parses, but its Catalog/Pages chain is broken.
    #[error("Invalid page tree: {0}")]
    InvalidPageTree(String),
    #[error("No documents to merge")]
    EmptyInput,
    #[error("None of the documents to merge contain any pages")]
    NoPages,
    #[error("Error writing PDF")]
    Io(#[from] io::Error),
    #[error("Error creating PDF object")]
    Pdf(#[from] serde_pdf::Error),
}

impl Error {
    pub(crate) fn malformed<S: Into<String>>(reason: S) -> Self {
        Error::MalformedDocument(reason.into())
    }

    pub(crate) fn invalid_page_tree<S: Into<String>>(reason: S) -> Self {
        Error::InvalidPageTree(reason.into())
    }

    /// Prefixes input-related errors with the zero-based index of the input that caused them.
    pub(crate) fn in_input(self, index: usize) -> Self {
        match self {
            Error::MalformedDocument(reason) => {
                Error::MalformedDocument(format!("input #{}: {}", index, reason))
            }
            Error::InvalidPageTree(reason) => {
                Error::InvalidPageTree(format!("input #{}: {}", index, reason))
            }
            err => err,
        }
    }
}
