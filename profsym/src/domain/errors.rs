//! Structured error types for profsym
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! None of these are fatal to a symbolization run: the orchestrator turns
//! per-mapping failures into diagnostics and only reports [`PartialError`]
//! when nothing could be resolved.

use std::fmt::Write as _;
use std::io;

use thiserror::Error;

/// Failure to open an object file.
///
/// Clonable so that a failed open can be cached and handed to every later
/// request for the same image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    #[error("{path}: no such file")]
    NotFound { path: String },

    #[error("{path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("{path}: unsupported object format: {reason}")]
    UnsupportedFormat { path: String, reason: String },

    #[error("{path}: build id {found} does not match expected {expected}")]
    BuildIdMismatch { path: String, expected: String, found: String },

    #[error("{path}: no build id in file, expected {expected}")]
    MissingBuildId { path: String, expected: String },

    #[error("no candidate file for {0}")]
    NoCandidates(String),
}

impl OpenError {
    /// Classify an I/O error raised while reading `path`.
    #[must_use]
    pub fn from_io(path: &str, err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Self::NotFound { path: path.to_string() }
        } else {
            Self::Unreadable { path: path.to_string(), reason: err.to_string() }
        }
    }
}

/// A query against an open image could not be answered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("{0}: image has been released")]
    Released(String),

    #[error("{name}: cannot read debug info at {addr:#x}: {reason}")]
    DebugInfo { name: String, addr: u64, reason: String },
}

#[derive(Error, Debug)]
pub enum DisasmError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error("empty address range [{start:#x}, {end:#x})")]
    EmptyRange { start: u64, end: u64 },

    #[error("{file}: range [{start:#x}, {end:#x}) is outside every loadable segment")]
    OutsideSegments { file: String, start: u64, end: u64 },

    #[error("{file}: cannot decode instructions: {reason}")]
    Decoder { file: String, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModeError {
    #[error("unknown symbolization mode option {0:?}")]
    UnknownOption(String),

    #[error("unknown demangle style {0:?} (expected none, simple or full)")]
    UnknownDemangle(String),
}

/// A mapping that could not be symbolized, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedMapping {
    pub mapping_id: u64,
    pub identity: String,
    pub reason: String,
}

/// Nothing in the profile could be symbolized.
///
/// Lists every mapping that failed and every sampled address that fell
/// outside all mappings. Whatever was resolved has still been written to
/// the profile.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("{}", summarize(.unresolved, .unmapped))]
pub struct PartialError {
    pub unresolved: Vec<UnresolvedMapping>,
    pub unmapped: Vec<u64>,
}

fn summarize(unresolved: &[UnresolvedMapping], unmapped: &[u64]) -> String {
    let mut out = format!(
        "symbolization failed: {} unresolved mapping(s), {} unmapped address(es)",
        unresolved.len(),
        unmapped.len()
    );
    for m in unresolved {
        let _ = write!(out, "\n  mapping {} ({}): {}", m.mapping_id, m.identity, m.reason);
    }
    if !unmapped.is_empty() {
        let addrs: Vec<String> = unmapped.iter().map(|a| format!("{a:#x}")).collect();
        let _ = write!(out, "\n  no mapping for: {}", addrs.join(", "));
    }
    out
}
