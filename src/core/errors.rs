//! HS-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, HsError>;

/// Top-level error type for Host Sentry.
#[derive(Debug, Error)]
pub enum HsError {
    #[error("[HS-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[HS-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[HS-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[HS-1101] invalid condition for subject '{subject}': {details}")]
    InvalidCondition { subject: String, details: String },

    #[error("[HS-2001] probe query failure for '{subject}': {details}")]
    ProbeQuery { subject: String, details: String },

    #[error("[HS-2002] probe capability not supported: {capability}")]
    ProbeUnsupported { capability: &'static str },

    #[error("[HS-2101] template load failure for {path}: {details}")]
    Template { path: PathBuf, details: String },

    #[error("[HS-2102] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[HS-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[HS-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[HS-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl HsError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "HS-1001",
            Self::MissingConfig { .. } => "HS-1002",
            Self::ConfigParse { .. } => "HS-1003",
            Self::InvalidCondition { .. } => "HS-1101",
            Self::ProbeQuery { .. } => "HS-2001",
            Self::ProbeUnsupported { .. } => "HS-2002",
            Self::Template { .. } => "HS-2101",
            Self::Serialization { .. } => "HS-2102",
            Self::Io { .. } => "HS-3002",
            Self::ChannelClosed { .. } => "HS-3003",
            Self::Runtime { .. } => "HS-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// Transient probe errors are the canonical case: the watchdog treats the
    /// tick as "no data" and simply asks again on the next one.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ProbeQuery { .. }
                | Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for probe query failures.
    #[must_use]
    pub fn probe(subject: impl Into<String>, details: impl Into<String>) -> Self {
        Self::ProbeQuery {
            subject: subject.into(),
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for HsError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for HsError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_errors() -> Vec<HsError> {
        vec![
            HsError::InvalidConfig {
                details: String::new(),
            },
            HsError::MissingConfig {
                path: PathBuf::new(),
            },
            HsError::ConfigParse {
                context: "",
                details: String::new(),
            },
            HsError::InvalidCondition {
                subject: String::new(),
                details: String::new(),
            },
            HsError::ProbeQuery {
                subject: String::new(),
                details: String::new(),
            },
            HsError::ProbeUnsupported { capability: "" },
            HsError::Template {
                path: PathBuf::new(),
                details: String::new(),
            },
            HsError::Serialization {
                context: "",
                details: String::new(),
            },
            HsError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            HsError::ChannelClosed { component: "" },
            HsError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = sample_errors();
        let codes: Vec<&str> = errors.iter().map(HsError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_hs_prefix() {
        for err in &sample_errors() {
            assert!(
                err.code().starts_with("HS-"),
                "code {} must start with HS-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = HsError::InvalidCondition {
            subject: "app.exe".to_string(),
            details: "grace period must be at least 1 tick".to_string(),
        };
        let msg = err.to_string();
        assert!(
            msg.contains("HS-1101"),
            "display should contain error code: {msg}"
        );
        assert!(
            msg.contains("grace period"),
            "display should contain details: {msg}"
        );
    }

    #[test]
    fn retryable_errors_are_correct() {
        assert!(HsError::probe("cpu", "query timed out").is_retryable());
        assert!(HsError::ChannelClosed { component: "hub" }.is_retryable());
        assert!(
            HsError::Runtime {
                details: String::new()
            }
            .is_retryable()
        );

        assert!(
            !HsError::InvalidCondition {
                subject: String::new(),
                details: String::new()
            }
            .is_retryable()
        );
        assert!(!HsError::ProbeUnsupported { capability: "gpu" }.is_retryable());
        assert!(
            !HsError::Template {
                path: PathBuf::new(),
                details: String::new()
            }
            .is_retryable()
        );
    }

    #[test]
    fn io_convenience_constructor() {
        let err = HsError::io(
            "/tmp/rules.toml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "HS-3002");
        assert!(err.to_string().contains("/tmp/rules.toml"));
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: HsError = toml_err.into();
        assert_eq!(err.code(), "HS-1003");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: HsError = json_err.into();
        assert_eq!(err.code(), "HS-2102");
    }
}
