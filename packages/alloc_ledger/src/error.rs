use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when exporting tracking data.
///
/// Recording allocations never fails. A tracker that cannot record simply stops recording.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The report file could not be created or written to.
    #[error("failed to write allocation report to '{}'", path.display())]
    ReportFile {
        /// The file we attempted to write.
        path: PathBuf,

        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

/// A specialized `Result` type for alloc_ledger operations, returning the crate's
/// [`Error`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::error::Error as _;
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync, Debug);

    #[test]
    fn report_file_error_names_path_and_keeps_source() {
        let error = Error::ReportFile {
            path: PathBuf::from("/nowhere/report.txt"),
            source: io::Error::new(io::ErrorKind::NotFound, "no such directory"),
        };

        assert!(error.to_string().contains("/nowhere/report.txt"));
        assert_eq!(error.source().unwrap().to_string(), "no such directory");
    }
}
