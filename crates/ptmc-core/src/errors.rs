//! Error type returned by fallible setup operations of the sampler.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine readable description of a failure.
///
/// `code` is stable and meant for matching in callers and tests; `context`
/// carries the offending values (indices, lengths, file paths).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable kebab-case identifier, e.g. `param-bounds`.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Offending values keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    /// Suggested fix, if one is obvious.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a payload without context or hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Records an offending value.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Records the file a failure relates to under the `path` key.
    pub fn with_path(self, path: &Path) -> Self {
        self.with_context("path", path.display())
    }

    /// Attaches a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        let mut entries = self.context.iter();
        if let Some((key, value)) = entries.next() {
            write!(f, " ({key}={value}")?;
            for (key, value) in entries {
                write!(f, ", {key}={value}")?;
            }
            f.write_str(")")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "; hint: {hint}")?;
        }
        Ok(())
    }
}

/// Failures reported by the sampler crates.
///
/// Only setup-time problems are reported through this type. Structural
/// violations detected while a chain is being stepped are assertions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", content = "info", rename_all = "kebab-case")]
pub enum McmcError {
    /// Invalid run, calibration or tempering configuration.
    #[error("invalid configuration: {0}")]
    Config(ErrorInfo),
    /// Bad bounds, steps, parameter vectors or data binding.
    #[error("chain setup failed: {0}")]
    Chain(ErrorInfo),
    /// Ladder construction or ensemble shape errors.
    #[error("tempering failed: {0}")]
    Tempering(ErrorInfo),
    /// Reading, parsing or writing configuration and checkpoint files.
    #[error("serialization failed: {0}")]
    Serde(ErrorInfo),
}

impl McmcError {
    /// Payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            McmcError::Config(info)
            | McmcError::Chain(info)
            | McmcError::Tempering(info)
            | McmcError::Serde(info) => info,
        }
    }

    /// Shorthand for `self.info().code`.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Applies `f` to the payload, keeping the variant.
    pub fn map_info(self, f: impl FnOnce(ErrorInfo) -> ErrorInfo) -> Self {
        match self {
            McmcError::Config(info) => McmcError::Config(f(info)),
            McmcError::Chain(info) => McmcError::Chain(f(info)),
            McmcError::Tempering(info) => McmcError::Tempering(f(info)),
            McmcError::Serde(info) => McmcError::Serde(f(info)),
        }
    }
}
