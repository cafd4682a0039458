//! Value types exchanged across the symbolization boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry of an inlined call chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Frame {
    pub function: String,
    pub file: String,
    /// 0 when unknown
    pub line: u32,
}

impl Frame {
    #[must_use]
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self { function: function.into(), file: file.into(), line }
    }

    /// A frame that only names a function, as produced from a symbol table.
    #[must_use]
    pub fn function_only(function: impl Into<String>) -> Self {
        Self { function: function.into(), file: String::new(), line: 0 }
    }
}

/// A named address range `[start, end]` in an image. `end` is the address of
/// the last byte. Symbols sharing an address are merged into one with
/// several names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub names: Vec<String>,
    pub file: String,
    pub start: u64,
    pub end: u64,
}

impl Symbol {
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr <= self.end
    }

    #[must_use]
    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// A loadable segment, in the image's virtual address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub start: u64,
    /// exclusive
    pub end: u64,
    pub file_offset: u64,
    pub file_size: u64,
    pub executable: bool,
}

impl Segment {
    #[must_use]
    pub fn contains_offset(&self, offset: u64) -> bool {
        offset >= self.file_offset && offset - self.file_offset < self.file_size
    }

    #[must_use]
    pub fn overlaps(&self, start: u64, end: u64) -> bool {
        start < self.end && end > self.start
    }
}

/// One line of an assembly listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    pub addr: u64,
    pub size: u64,
    pub text: String,
    pub function: String,
    pub file: String,
    pub line: u32,
}

/// Where addresses of a mapping came from, and the delta that was applied to
/// them when several raw profiles were merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSource {
    /// URL or path of the profile the addresses were collected from
    pub origin: String,
    #[serde(default)]
    pub delta: i64,
}

impl MappingSource {
    #[must_use]
    pub fn new(origin: impl Into<String>, delta: i64) -> Self {
        Self { origin: origin.into(), delta }
    }
}

/// Keyed by mapping build id or file path; order within each list matters.
pub type MappingSources = HashMap<String, Vec<MappingSource>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_contains_is_inclusive() {
        let sym = Symbol { names: vec!["main".into()], file: "a.out".into(), start: 0x1000, end: 0x1010 };
        assert!(sym.contains(0x1000));
        assert!(sym.contains(0x1010));
        assert!(!sym.contains(0x1011));
        assert!(!sym.contains(0x0fff));
        assert!(sym.has_name("main"));
    }

    #[test]
    fn test_segment_offsets() {
        let seg = Segment { start: 0x1000, end: 0x3000, file_offset: 0x1000, file_size: 0x2000, executable: true };
        assert!(seg.contains_offset(0x1000));
        assert!(seg.contains_offset(0x2fff));
        assert!(!seg.contains_offset(0x3000));
        assert!(seg.overlaps(0x2ff0, 0x4000));
        assert!(!seg.overlaps(0x3000, 0x4000));
    }

    #[test]
    fn test_mapping_sources_from_json() {
        let json = r#"{"abcd": [{"origin": "http://a/profile", "delta": 0}, {"origin": "http://b/profile", "delta": 8192}]}"#;
        let srcs: MappingSources = serde_json::from_str(json).unwrap();
        let list = &srcs["abcd"];
        assert_eq!(list[0].origin, "http://a/profile");
        assert_eq!(list[1].delta, 0x2000);
    }
}
