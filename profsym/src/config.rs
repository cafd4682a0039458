//! Backend configuration
//!
//! Defaults come from the environment; the CLI overrides individual fields.

use std::env;
use std::path::PathBuf;
use std::thread;

/// Directories searched for binaries, separated like `PATH`.
pub const BINARY_PATH_ENV: &str = "PROFSYM_BINARY_PATH";

/// Overrides the `objdump` used for disassembly.
pub const OBJDUMP_ENV: &str = "PROFSYM_OBJDUMP";

#[derive(Debug, Clone)]
pub struct SymbolizerConfig {
    /// Searched in order, before the path recorded in the mapping
    pub search_paths: Vec<PathBuf>,
    pub objdump: PathBuf,
    /// Upper bound on mappings symbolized concurrently
    pub jobs: usize,
}

impl Default for SymbolizerConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            objdump: PathBuf::from("objdump"),
            jobs: thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        }
    }
}

impl SymbolizerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(paths) = env::var_os(BINARY_PATH_ENV) {
            config.search_paths = env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()).collect();
        } else if let Some(home) = env::var_os("HOME") {
            config.search_paths.push(PathBuf::from(home).join("pprof").join("binaries"));
        }
        if let Some(objdump) = env::var_os(OBJDUMP_ENV) {
            config.objdump = PathBuf::from(objdump);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SymbolizerConfig::default();
        assert!(config.search_paths.is_empty());
        assert_eq!(config.objdump, PathBuf::from("objdump"));
        assert!(config.jobs >= 1);
    }
}
