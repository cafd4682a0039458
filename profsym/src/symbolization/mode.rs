//! Symbolization mode strings
//!
//! A mode is a `:`-separated list of options, case-insensitive:
//!
//! ```text
//! local | fastlocal   only use binaries available on this machine
//! remote              only ask the profile's sources
//! force               re-symbolize locations that already have lines
//! strict              require the file's build id to match the mapping's
//! none | no           do not symbolize at all
//! demangle=STYLE      none, simple (default) or full
//! ```
//!
//! Without `local`, `fastlocal` or `remote` both lookups are allowed.

use std::fmt;
use std::str::FromStr;

use rustc_demangle::demangle;

use crate::domain::ModeError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Demangle {
    /// Keep linker names as they are
    None,
    /// Demangle, dropping hashes and other noise
    #[default]
    Simple,
    /// Demangle keeping everything
    Full,
}

impl Demangle {
    /// Names that are not Rust-mangled come back unchanged.
    #[must_use]
    pub fn apply(self, raw: &str) -> String {
        match self {
            Self::None => raw.to_string(),
            Self::Simple => format!("{:#}", demangle(raw)),
            Self::Full => demangle(raw).to_string(),
        }
    }
}

impl FromStr for Demangle {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "simple" | "templates" => Ok(Self::Simple),
            "full" => Ok(Self::Full),
            other => Err(ModeError::UnknownDemangle(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolizeMode {
    pub enabled: bool,
    pub local: bool,
    pub remote: bool,
    pub force: bool,
    pub strict: bool,
    pub demangle: Demangle,
}

impl Default for SymbolizeMode {
    fn default() -> Self {
        Self {
            enabled: true,
            local: true,
            remote: true,
            force: false,
            strict: false,
            demangle: Demangle::Simple,
        }
    }
}

impl FromStr for SymbolizeMode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut mode = Self::default();
        let (mut local, mut remote) = (false, false);

        for opt in s.to_lowercase().split(':').map(str::trim).filter(|o| !o.is_empty()) {
            match opt {
                "local" | "fastlocal" => local = true,
                "remote" => remote = true,
                "force" => mode.force = true,
                "strict" => mode.strict = true,
                "none" | "no" => mode.enabled = false,
                _ => match opt.strip_prefix("demangle=") {
                    Some(style) => mode.demangle = style.parse()?,
                    None => return Err(ModeError::UnknownOption(opt.to_string())),
                },
            }
        }

        if local || remote {
            mode.local = local;
            mode.remote = remote;
        }
        Ok(mode)
    }
}

impl fmt::Display for SymbolizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.enabled {
            return f.write_str("none");
        }
        let mut opts = Vec::new();
        if self.local {
            opts.push("local");
        }
        if self.remote {
            opts.push("remote");
        }
        if self.force {
            opts.push("force");
        }
        if self.strict {
            opts.push("strict");
        }
        opts.push(match self.demangle {
            Demangle::None => "demangle=none",
            Demangle::Simple => "demangle=simple",
            Demangle::Full => "demangle=full",
        });
        f.write_str(&opts.join(":"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_mode_allows_everything() {
        let mode: SymbolizeMode = "".parse().unwrap();
        assert_eq!(mode, SymbolizeMode::default());
        assert!(mode.local && mode.remote && !mode.force);
    }

    #[test]
    fn test_mode_options() {
        let mode: SymbolizeMode = "Local:FORCE:strict".parse().unwrap();
        assert!(mode.local);
        assert!(!mode.remote);
        assert!(mode.force);
        assert!(mode.strict);

        let mode: SymbolizeMode = "remote".parse().unwrap();
        assert!(!mode.local);
        assert!(mode.remote);

        let mode: SymbolizeMode = "none".parse().unwrap();
        assert!(!mode.enabled);
    }

    #[test]
    fn test_mode_demangle() {
        let mode: SymbolizeMode = "fastlocal:demangle=full".parse().unwrap();
        assert_eq!(mode.demangle, Demangle::Full);
        assert_eq!(
            "demangle=weird".parse::<SymbolizeMode>(),
            Err(ModeError::UnknownDemangle("weird".to_string()))
        );
    }

    #[test]
    fn test_unknown_option_rejected() {
        assert_eq!(
            "local:bogus".parse::<SymbolizeMode>(),
            Err(ModeError::UnknownOption("bogus".to_string()))
        );
    }

    #[test]
    fn test_display_round_trips() {
        let mode: SymbolizeMode = "local:force:demangle=none".parse().unwrap();
        assert_eq!(mode.to_string().parse::<SymbolizeMode>().unwrap(), mode);
    }

    #[test]
    fn test_demangle_styles() {
        let mangled = "_ZN4core3fmt5write17h0123456789abcdefE";
        assert_eq!(Demangle::None.apply(mangled), mangled);
        assert_eq!(Demangle::Simple.apply(mangled), "core::fmt::write");
        assert_eq!(Demangle::Full.apply(mangled), "core::fmt::write::h0123456789abcdef");
        assert_eq!(Demangle::Simple.apply("main"), "main");
    }
}
