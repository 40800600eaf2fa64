//! Error Type Definition Module
//!
//! This module defines the errors that may be encountered while scrubbing
//! EPUB files. All errors are uniformly wrapped in the [ScrubError]
//! enumeration so that a single job can report any failure to the batch.

use thiserror::Error;

/// Types of errors that can occur while processing an EPUB file
///
/// Any of these aborts the job it occurred in. The batch driver logs the
/// error together with the file name and moves on to the next file.
#[derive(Debug, Error)]
pub enum ScrubError {
    /// Invalid archive error
    ///
    /// The input file could not be opened as a ZIP container, so it
    /// cannot be an EPUB file.
    #[error("Invalid archive: \"{path}\" is not a valid EPUB/ZIP file ({source}).")]
    InvalidArchive {
        path: String,
        source: zip::result::ZipError,
    },

    /// ZIP archive related errors
    ///
    /// Errors occur while extracting the input archive or writing the output one.
    #[error("Archive error: {source}")]
    ArchiveError { source: zip::result::ZipError },

    #[error("IO error: {source}")]
    IOError { source: std::io::Error },

    /// Markup rewriting error
    ///
    /// The HTML tokenizer gave up on a chapter file. This is rare, since the
    /// rewriter runs in lenient mode.
    #[error("Markup error: {source}")]
    MarkupError {
        source: lol_html::errors::RewritingError,
    },

    /// No input files error
    ///
    /// None of the command line arguments resolved to an EPUB file.
    #[error("No EPUB files found to process.")]
    NoInputFiles,

    /// Invalid regular expression error
    #[error("Pattern error: \"{pattern}\" is not a valid regular expression: {source}")]
    PatternError {
        pattern: String,
        source: regex::Error,
    },

    /// WalkDir error
    ///
    /// This error occurs when traversing the extracted archive tree.
    #[error("WalkDir error: {source}")]
    WalkDirError { source: walkdir::Error },
}

impl From<zip::result::ZipError> for ScrubError {
    fn from(value: zip::result::ZipError) -> Self {
        ScrubError::ArchiveError { source: value }
    }
}

impl From<lol_html::errors::RewritingError> for ScrubError {
    fn from(value: lol_html::errors::RewritingError) -> Self {
        ScrubError::MarkupError { source: value }
    }
}

impl From<std::io::Error> for ScrubError {
    fn from(value: std::io::Error) -> Self {
        ScrubError::IOError { source: value }
    }
}

impl From<tempfile::PersistError> for ScrubError {
    fn from(value: tempfile::PersistError) -> Self {
        ScrubError::IOError { source: value.error }
    }
}

impl From<walkdir::Error> for ScrubError {
    fn from(value: walkdir::Error) -> Self {
        ScrubError::WalkDirError { source: value }
    }
}

#[cfg(test)]
impl PartialEq for ScrubError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::InvalidArchive { path: l_path, .. },
                Self::InvalidArchive { path: r_path, .. },
            ) => l_path == r_path,
            (
                Self::PatternError {
                    pattern: l_pattern, ..
                },
                Self::PatternError {
                    pattern: r_pattern, ..
                },
            ) => l_pattern == r_pattern,

            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}
