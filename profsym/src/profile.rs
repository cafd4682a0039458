//! In-memory profile model
//!
//! A trimmed-down pprof-style profile: samples point at locations, locations
//! belong to mappings and carry an ordered list of lines (innermost first),
//! and lines point at deduplicated functions. Ids are 1-based; 0 means
//! "none". The whole model round-trips through JSON.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub samples: Vec<Sample>,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
    #[serde(default)]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Leaf location first
    pub location_ids: Vec<u64>,
    #[serde(default)]
    pub values: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub id: u64,
    pub start: u64,
    pub limit: u64,
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub build_id: String,
    #[serde(default)]
    pub has_functions: bool,
    #[serde(default)]
    pub has_filenames: bool,
    #[serde(default)]
    pub has_line_numbers: bool,
    #[serde(default)]
    pub has_inline_frames: bool,
}

impl Mapping {
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.limit
    }

    /// Stable identity: the build id when known, the file path otherwise.
    #[must_use]
    pub fn identity(&self) -> &str {
        if self.build_id.is_empty() {
            &self.file
        } else {
            &self.build_id
        }
    }

    /// Mappings that never correspond to a file we could open: anonymous
    /// regions, kernel-provided pseudo files and device mappings.
    #[must_use]
    pub fn is_unsymbolizable(&self) -> bool {
        let name = self.file.rsplit('/').next().unwrap_or_default();
        self.file.is_empty()
            || self.file.starts_with('[')
            || self.file.starts_with("/dev/")
            || name.starts_with("linux-vdso")
            || name.starts_with("//anon")
            || self.file.starts_with("/memfd:")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: u64,
    /// 0 when the location is not attributed to a mapping
    #[serde(default)]
    pub mapping_id: u64,
    pub address: u64,
    /// Innermost (leaf) call first
    #[serde(default)]
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    pub function_id: u64,
    #[serde(default)]
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub system_name: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub start_line: u32,
}

impl Profile {
    #[must_use]
    pub fn mapping(&self, id: u64) -> Option<&Mapping> {
        self.mappings.iter().find(|m| m.id == id)
    }

    pub fn mapping_mut(&mut self, id: u64) -> Option<&mut Mapping> {
        self.mappings.iter_mut().find(|m| m.id == id)
    }

    pub fn location_mut(&mut self, id: u64) -> Option<&mut Location> {
        self.locations.iter_mut().find(|l| l.id == id)
    }

    #[must_use]
    pub fn function(&self, id: u64) -> Option<&Function> {
        self.functions.iter().find(|f| f.id == id)
    }

    /// Mapping responsible for a location: its own mapping if that one
    /// actually covers the address, otherwise the first mapping that does.
    #[must_use]
    pub fn mapping_for(&self, location: &Location) -> Option<&Mapping> {
        if location.mapping_id != 0 {
            if let Some(m) = self.mapping(location.mapping_id) {
                if m.contains(location.address) {
                    return Some(m);
                }
            }
        }
        self.mappings.iter().find(|m| m.contains(location.address))
    }

    /// Id of a function with exactly these attributes, adding it if needed.
    pub fn intern_function(
        &mut self,
        name: &str,
        system_name: &str,
        filename: &str,
        start_line: u32,
    ) -> u64 {
        if let Some(f) = self.functions.iter().find(|f| {
            f.name == name
                && f.system_name == system_name
                && f.filename == filename
                && f.start_line == start_line
        }) {
            return f.id;
        }
        let id = self.functions.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        self.functions.push(Function {
            id,
            name: name.to_string(),
            system_name: system_name.to_string(),
            filename: filename.to_string(),
            start_line,
        });
        id
    }

    /// Function names of a location, innermost first.
    #[must_use]
    pub fn location_function_names(&self, location: &Location) -> Vec<&str> {
        location
            .lines
            .iter()
            .filter_map(|l| self.function(l.function_id))
            .map(|f| f.name.as_str())
            .collect()
    }
}
