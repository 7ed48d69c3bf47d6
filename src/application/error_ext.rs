//! Error conversion helpers for common I/O operations

use std::io;
use std::path::Path;

use crate::application::{ApplicationError, ApplicationResult};

/// Extension trait for converting `io::Result` to `ApplicationResult` with context.
pub trait IoResultExt<T> {
    /// Add path context to an I/O error.
    ///
    /// # Example
    /// ```ignore
    /// let content = fs.read_to_string(&path)
    ///     .with_path_context("read source", &path)?;
    /// ```
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T>;

    /// Map a failed write to [`ApplicationError::CannotCreateOutput`].
    fn output_context(self, path: &Path) -> ApplicationResult<T>;
}

impl<T> IoResultExt<T> for io::Result<T> {
    fn with_path_context(self, action: &str, path: &Path) -> ApplicationResult<T> {
        self.map_err(|e| ApplicationError::OperationFailed {
            context: format!("{}: {}", action, path.display()),
            source: Box::new(e),
        })
    }

    fn output_context(self, path: &Path) -> ApplicationResult<T> {
        self.map_err(|source| ApplicationError::CannotCreateOutput {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_io_error_when_adding_path_context_then_message_names_path() {
        let result: io::Result<()> = Err(io::Error::new(io::ErrorKind::NotFound, "gone"));

        let err = result
            .with_path_context("read source", Path::new("/tmp/App.swift"))
            .unwrap_err();

        assert_eq!(err.to_string(), "operation failed: read source: /tmp/App.swift");
    }

    #[test]
    fn given_write_error_when_adding_output_context_then_cannot_create_output() {
        let result: io::Result<()> = Err(io::Error::new(io::ErrorKind::PermissionDenied, "ro"));

        let err = result.output_context(Path::new("/out/App.saber.swift")).unwrap_err();

        assert!(matches!(err, ApplicationError::CannotCreateOutput { .. }));
    }
}
