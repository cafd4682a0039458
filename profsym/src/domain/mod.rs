//! Domain model for profsym
//!
//! This module contains the value types and errors shared by every backend:
//! - Frames, symbols, segments and instructions returned by object images
//! - Mapping sources recorded when profiles are merged
//! - Structured error handling

pub mod errors;
pub mod types;

pub use types::{Frame, Instruction, MappingSource, MappingSources, Segment, Symbol};

pub use errors::{DisasmError, LookupError, ModeError, OpenError, PartialError, UnresolvedMapping};
