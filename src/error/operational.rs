//! Operational error context propagation with `anyhow`.
//!
//! This module provides extension traits and utilities for enhancing
//! error context and centralized error reporting.

use std::{error::Error as StdError, fmt::Display};

use {
    anyhow::{Context, Error, Result as AnyhowResult},
    tracing::{debug, error, info, warn},
};

/// Extension trait for enhanced error context.
pub trait ResultExt<T, E> {
    /// Adds context to an error with a static string.
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;

    /// Adds context to an error with a formatted string.
    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static;
}

impl<T, E> ResultExt<T, E> for Result<T, E> {
    fn add_context(self, context: &'static str) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(context)
    }

    fn add_contextf(self, format: impl Display) -> AnyhowResult<T>
    where
        E: StdError + Send + Sync + 'static,
    {
        self.context(format.to_string())
    }
}

/// Severity used when reporting an operational error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

/// Centralized error reporting and logging.
pub struct ErrorReporter;

impl ErrorReporter {
    /// Logs `error` with its full cause chain at the given severity.
    pub fn report(error: &Error, context: &str, severity: Severity) {
        let message = Self::to_user_message(error);
        match severity {
            Severity::Debug => debug!(context = context, error = %message, "Operation failed"),
            Severity::Info => info!(context = context, error = %message, "Operation failed"),
            Severity::Warn => warn!(context = context, error = %message, "Operation failed"),
            Severity::Error => error!(context = context, error = %message, "Operation failed"),
        }
    }

    /// Converts an error to a user-friendly message.
    ///
    /// Every cause in the chain is joined with `": "`, outermost first.
    pub fn to_user_message(error: &Error) -> String {
        error
            .chain()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ")
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Error, ErrorKind::NotFound};

    use anyhow::anyhow;

    use crate::error::operational::{ErrorReporter, ResultExt, Severity};

    #[test]
    fn test_result_ext_with_context() {
        let result: Result<(), Error> = Err(Error::new(NotFound, "missing"));
        let error = result.add_context("Loading settings").unwrap_err();

        assert_eq!(error.to_string(), "Loading settings");
        assert_eq!(
            ErrorReporter::to_user_message(&error),
            "Loading settings: missing"
        );
    }

    #[test]
    fn test_result_ext_with_contextf() {
        let result: Result<(), Error> = Err(Error::new(NotFound, "missing"));
        let error = result.add_contextf(format!("Scanning {}", "/music")).unwrap_err();

        assert_eq!(
            ErrorReporter::to_user_message(&error),
            "Scanning /music: missing"
        );
    }

    #[test]
    fn test_error_reporter_single_message() {
        let error = anyhow!("Test error message");
        assert_eq!(ErrorReporter::to_user_message(&error), "Test error message");
        ErrorReporter::report(&error, "test", Severity::Debug);
    }
}
