//! Error kinds surfaced by the container, store, sampler, and processing passes.
//!
//! I/O failures carry the underlying system error, format failures name the
//! offending path, and `repeat`'s parameter mismatch is reserved for genuine
//! programmer errors (handled as an assertion at the call site, not as one
//! of these variants).

use std::path::PathBuf;

use thiserror::Error as ThisError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a sparse cube-map file: {path}")]
    NotOurFormat { path: PathBuf },

    #[error("parameter mismatch for {name}: expected {expected}, found {actual}")]
    ParameterMismatch {
        name: &'static str,
        expected: String,
        actual: String,
    },

    #[error("catalog chain length {found} does not match sorted index count {expected}")]
    ShortCatalog { expected: usize, found: usize },

    #[error("corrupt strip data in page {page_index}")]
    CorruptStrip { page_index: u64 },

    #[error("failed to allocate {requested_bytes} bytes")]
    AllocationFailure { requested_bytes: usize },
}

impl Error {
    pub fn not_our_format(path: impl Into<PathBuf>) -> Self {
        Error::NotOurFormat { path: path.into() }
    }

    pub fn parameter_mismatch(
        name: &'static str,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Error::ParameterMismatch {
            name,
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}
