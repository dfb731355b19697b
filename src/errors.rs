//! Error types for filter generation

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for filter operations
pub type Result<T> = std::result::Result<T, FilterError>;

/// Errors that can occur while building, compiling or exporting a filter
#[derive(Error, Debug)]
pub enum FilterError {
    #[error("Failed to initialize seccomp filter: {0}")]
    Initialization(String),

    #[error("Failed to add {syscall} rule: {reason}")]
    RuleAdd { syscall: String, reason: String },

    #[error("Failed to add multiplexed socket rule: {0}")]
    MultiplexRule(String),

    #[error("Failed to compile seccomp filter: {0}")]
    Compile(String),

    #[error("Failed to render policy: {0}")]
    PolicyDump(#[from] serde_json::Error),

    #[error("Failed to open output file {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed to write seccomp filter to {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

impl FilterError {
    pub(crate) fn rule_add(syscall: &str, reason: impl Into<String>) -> Self {
        FilterError::RuleAdd {
            syscall: syscall.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FilterError::Compile("jump out of range".to_string());
        assert_eq!(
            err.to_string(),
            "Failed to compile seccomp filter: jump out of range"
        );
    }

    #[test]
    fn test_rule_add_names_syscall() {
        let err = FilterError::rule_add("socketpair", "unknown syscall");
        assert!(err.to_string().contains("socketpair"));
        assert!(err.to_string().contains("unknown syscall"));
    }

    #[test]
    fn test_open_and_write_are_distinguishable() {
        let open = FilterError::Open {
            path: PathBuf::from("/nope/filter.bpf"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        let write = FilterError::Write {
            path: PathBuf::from("/dev/full"),
            source: io::Error::new(io::ErrorKind::Other, "no space"),
        };
        assert!(open.to_string().starts_with("Failed to open output file /nope/filter.bpf"));
        assert!(write.to_string().starts_with("Failed to write seccomp filter to /dev/full"));
    }

    #[test]
    fn test_result_error() {
        fn returns_error() -> Result<i32> {
            Err(FilterError::Initialization("unsupported target".to_string()))
        }
        assert!(returns_error().is_err());
    }
}
