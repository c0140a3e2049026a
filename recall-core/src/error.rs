//! Recall core error types
//!
//! Re-exports recall-error and provides core-specific conveniences.

pub use recall_error::{Error, ErrorKind, Result};

/// Create an IoFailed error for a path
pub fn io_error(path: &std::path::Path, err: std::io::Error) -> Error {
    let kind = match err.kind() {
        std::io::ErrorKind::NotFound => ErrorKind::FileNotFound,
        std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
        _ => ErrorKind::IoFailed,
    };
    Error::new(kind, format!("{}: {}", path.display(), err))
        .with_context("path", path.display().to_string())
        .set_source(err)
}

/// Create a SerializationFailed error for a path
pub fn serialization_error(path: &std::path::Path, err: serde_json::Error) -> Error {
    Error::serialization_failed(format!("{}: {}", path.display(), err))
        .with_context("path", path.display().to_string())
        .set_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_io_error_kind_mapping() {
        let path = Path::new("memory/index.json");
        let err = io_error(path, std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
        assert!(err.message().starts_with("memory/index.json"));

        let err = io_error(path, std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert_eq!(err.kind(), ErrorKind::IoFailed);
    }
}
