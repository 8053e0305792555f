//! CLI-specific error types

use miette::Diagnostic;
use thiserror::Error;

/// Failures of the CLI itself, as opposed to gate evaluation errors
#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("Tracing initialization failed: {message}")]
    #[diagnostic(
        code(cigate::cli::tracing),
        help("Check RUST_LOG; it must be a valid tracing filter directive")
    )]
    Tracing { message: String },

    #[error("Failed to install {signal} handler")]
    #[diagnostic(code(cigate::cli::signal))]
    Signal {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write command output")]
    #[diagnostic(code(cigate::cli::output))]
    Output {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CliError {
    pub fn tracing(message: impl Into<String>) -> Self {
        Self::Tracing {
            message: message.into(),
        }
    }

    pub const fn signal(signal: &'static str, source: std::io::Error) -> Self {
        Self::Signal { signal, source }
    }

    pub fn output(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Output {
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_error_names_signal() {
        let err = CliError::signal("SIGTERM", std::io::Error::other("boom"));
        assert_eq!(err.to_string(), "Failed to install SIGTERM handler");
        assert_eq!(
            err.code().map(|c| c.to_string()).as_deref(),
            Some("cigate::cli::signal")
        );
    }

    #[test]
    fn test_tracing_error_message() {
        let err = CliError::tracing("invalid filter");
        assert!(err.to_string().contains("invalid filter"));
    }
}
