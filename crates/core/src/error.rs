// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    /// Directory creation, listing or rename failed.
    ///
    /// Fatal at startup; logged and absorbed during per-job transitions.
    #[error("Environment error: {context}: {source}")]
    Environment {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem event watching cannot be initialized in this environment.
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Something other than this engine touched a state directory.
    #[error("External interference: {0}")]
    ExternalInterference(String),

    /// The watcher broke after it was established (backend error, overflow,
    /// closed event stream).
    #[error("Watcher failure: {0}")]
    Watcher(String),
}

impl AppError {
    /// Wrap an I/O error with a description of the operation that failed
    pub fn environment(context: impl Into<String>, source: std::io::Error) -> Self {
        AppError::Environment {
            context: context.into(),
            source,
        }
    }

    /// True when the underlying cause is a missing file or directory
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::Environment { source, .. } if source.kind() == std::io::ErrorKind::NotFound
        )
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_environment_error_display_includes_context() {
        let err = AppError::environment(
            "rename /q/in/a.txt -> /q/active/a.txt",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );

        let msg = err.to_string();
        assert!(msg.contains("/q/in/a.txt"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn test_is_not_found() {
        let missing = AppError::environment("stat", io::Error::from(io::ErrorKind::NotFound));
        let denied =
            AppError::environment("stat", io::Error::from(io::ErrorKind::PermissionDenied));

        assert!(missing.is_not_found());
        assert!(!denied.is_not_found());
        assert!(!AppError::Watcher("closed".to_string()).is_not_found());
    }
}
