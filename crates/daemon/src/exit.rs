// Process exit statuses

use dirqueue_core::error::AppError;

/// Exit statuses of the `dirqueue` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Graceful shutdown after an interrupt
    Success,
    /// Any fatal error without a more specific status
    UnknownError,
    /// Filesystem event watching is not available in this environment
    WatcherUnavailable,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::UnknownError => 1,
            ExitStatus::WatcherUnavailable => 2,
        }
    }

    /// Status to exit with after a fatal error
    pub fn from_error(err: &AppError) -> Self {
        match err {
            AppError::DependencyUnavailable(_) => ExitStatus::WatcherUnavailable,
            _ => ExitStatus::UnknownError,
        }
    }
}

impl From<ExitStatus> for std::process::ExitCode {
    fn from(status: ExitStatus) -> Self {
        std::process::ExitCode::from(status.code())
    }
}

/// What an operator can do about a fatal error, when there is something
pub fn remediation_hint(err: &AppError) -> Option<&'static str> {
    match err {
        AppError::DependencyUnavailable(_) => Some(
            "filesystem notifications are required; on Linux check that inotify is enabled \
             and raise fs.inotify.max_user_instances / fs.inotify.max_user_watches if exhausted",
        ),
        AppError::Watcher(_) => Some(
            "the incoming directory can no longer be watched; restart dirqueue (files still in \
             queue/in are not picked up automatically: move them out and back in)",
        ),
        AppError::Environment { .. } => {
            Some("check that the queue root exists on a writable local filesystem")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitStatus::Success.code(), 0);
        assert_eq!(ExitStatus::UnknownError.code(), 1);
        assert_eq!(ExitStatus::WatcherUnavailable.code(), 2);
    }

    #[test]
    fn test_dependency_unavailable_has_dedicated_status_and_hint() {
        let err = AppError::DependencyUnavailable("inotify_init failed".to_string());

        assert_eq!(ExitStatus::from_error(&err), ExitStatus::WatcherUnavailable);
        assert!(remediation_hint(&err).unwrap().contains("inotify"));
    }

    #[test]
    fn test_every_error_kind_maps_to_a_status() {
        use dirqueue_core::domain::DomainError;
        use std::io;

        let cases = [
            (
                AppError::Domain(DomainError::InvalidJobId("..".to_string())),
                ExitStatus::UnknownError,
            ),
            (
                AppError::environment("list /q/active", io::Error::from(io::ErrorKind::NotFound)),
                ExitStatus::UnknownError,
            ),
            (
                AppError::DependencyUnavailable("no inotify".to_string()),
                ExitStatus::WatcherUnavailable,
            ),
            (
                AppError::ExternalInterference("deleted".to_string()),
                ExitStatus::UnknownError,
            ),
            (AppError::Watcher("overflow".to_string()), ExitStatus::UnknownError),
        ];

        for (err, status) in cases {
            // No wildcard: a new error kind must be added to the cases above
            match &err {
                AppError::Domain(_)
                | AppError::Environment { .. }
                | AppError::DependencyUnavailable(_)
                | AppError::ExternalInterference(_)
                | AppError::Watcher(_) => {}
            }
            assert_eq!(ExitStatus::from_error(&err), status, "{}", err);
        }
    }

    #[test]
    fn test_other_errors_are_unknown() {
        let err = AppError::Watcher("event stream closed".to_string());

        assert_eq!(ExitStatus::from_error(&err), ExitStatus::UnknownError);
        assert!(
            remediation_hint(&AppError::ExternalInterference("deleted".to_string())).is_none()
        );
    }
}
