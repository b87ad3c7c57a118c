//! Disk I/O errors.

use std::io;

use oxbow_common::types::PageId;
use thiserror::Error;

/// Result type for disk gateway and scheduler operations.
pub type IoResult<T> = Result<T, IoError>;

/// Errors that can occur while reading or writing pages.
#[derive(Debug, Error)]
pub enum IoError {
    /// Underlying I/O error from the operating system.
    #[error("I/O error: {source}")]
    Io {
        /// The OS-level error.
        #[from]
        source: io::Error,
    },

    /// A buffer of the wrong size was handed to the gateway.
    #[error("buffer of {len} bytes does not match the page size {expected}")]
    BadBufferSize {
        /// Actual buffer length.
        len: usize,
        /// Required page size.
        expected: usize,
    },

    /// An injected fault from a test gateway.
    #[error("injected gateway fault for page {page_id}")]
    Injected {
        /// Page the faulted operation addressed.
        page_id: PageId,
    },

    /// The scheduler dropped the request before completing it.
    #[error("disk request was dropped without completing")]
    Canceled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IoError::BadBufferSize {
            len: 100,
            expected: 4096,
        };
        assert!(err.to_string().contains("4096"));

        let err = IoError::Injected {
            page_id: PageId::new(3),
        };
        assert!(err.to_string().contains("page 3"));
    }
}
