//! Finding the file behind a mapping
//!
//! A profile may come from another machine, so the path it recorded is not
//! necessarily where the binary lives here. Binaries are looked up by build
//! id in the configured search directories first:
//!
//! ```text
//! <dir>/<build id>/<file name>
//! <dir>/<build id>
//! <dir>/.build-id/<first two hex digits>/<rest>.debug
//! <dir>/<file name>
//! ```
//!
//! and only then at the recorded path itself.

use std::path::{Path, PathBuf};

use crate::profile::Mapping;

#[derive(Debug, Clone, Default)]
pub struct BinaryLocator {
    search_paths: Vec<PathBuf>,
}

impl BinaryLocator {
    #[must_use]
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    /// Candidate files for `mapping`, most specific first. Files under the
    /// search directories are only listed if they exist; the recorded path
    /// is always listed last so its open error is the one reported.
    #[must_use]
    pub fn candidates(&self, mapping: &Mapping) -> Vec<String> {
        let base_name = Path::new(&mapping.file).file_name();
        let mut found: Vec<PathBuf> = Vec::new();

        for dir in &self.search_paths {
            if !mapping.build_id.is_empty() {
                let by_id = dir.join(&mapping.build_id);
                if let Some(name) = base_name {
                    found.push(by_id.join(name));
                }
                found.push(by_id);
                if mapping.build_id.len() > 2 {
                    let (head, tail) = mapping.build_id.split_at(2);
                    found.push(dir.join(".build-id").join(head).join(format!("{tail}.debug")));
                }
            }
            if let Some(name) = base_name {
                found.push(dir.join(name));
            }
        }

        let mut out: Vec<String> = Vec::new();
        for path in found.into_iter().filter(|p| p.is_file()) {
            let path = path.to_string_lossy().into_owned();
            if !out.contains(&path) {
                out.push(path);
            }
        }
        if !mapping.file.is_empty() && !out.contains(&mapping.file) {
            out.push(mapping.file.clone());
        }
        out
    }
}
