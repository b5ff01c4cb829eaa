//! Errors raised while loading `strobe.toml`.

use std::path::{Path, PathBuf};

/// Why a bench configuration could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", .path.display())]
    IoError {
        /// File that was being read.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// The text is not valid TOML or does not match the expected layout.
    #[error("cannot parse {}: {message}", origin(.path.as_deref()))]
    ParseError {
        /// File the text came from, if any.
        path: Option<PathBuf>,
        /// Parser message.
        message: String,
    },

    /// A value parsed but cannot drive a bench.
    #[error("invalid {key}: {reason}")]
    ValidationError {
        /// Dotted key of the offending value, e.g. `clock.period`.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::ValidationError {
            key,
            reason: reason.into(),
        }
    }
}

fn origin(path: Option<&Path>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "configuration".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_names_its_file() {
        let err = ConfigError::ParseError {
            path: Some(PathBuf::from("bench/strobe.toml")),
            message: "expected '=' at line 3".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "cannot parse bench/strobe.toml: expected '=' at line 3"
        );
        let inline = ConfigError::ParseError {
            path: None,
            message: "bad".to_string(),
        };
        assert_eq!(inline.to_string(), "cannot parse configuration: bad");
    }

    #[test]
    fn validation_error_names_its_key() {
        let err = ConfigError::invalid("clock.period", "must be at least 2 fs");
        assert_eq!(err.to_string(), "invalid clock.period: must be at least 2 fs");
    }

    #[test]
    fn io_error_keeps_its_source() {
        let err = ConfigError::IoError {
            path: PathBuf::from("missing.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        assert!(err.to_string().starts_with("cannot read missing.toml:"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
