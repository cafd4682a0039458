//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::SymbolizerConfig;

#[derive(Parser)]
#[command(
    name = "profsym",
    about = "Symbolize profiles and inspect binaries",
    after_help = "\
EXAMPLES:
    profsym symbolize cpu.json -o cpu.sym.json        Symbolize with local binaries
    profsym symbolize cpu.json --mode local:force     Redo existing symbols
    profsym symbols ./app --regex '^main$'            List matching symbols
    profsym lines ./app 0x1139                        Source lines for an address
    profsym disasm ./app 0x1130 0x1160                Annotated disassembly"
)]
pub struct Args {
    /// Extra directory to search for binaries (repeatable, searched first)
    #[arg(long = "binary-path", value_name = "DIR", global = true)]
    pub binary_path: Vec<PathBuf>,

    /// objdump executable used for disassembly
    #[arg(long, value_name = "PATH", global = true)]
    pub objdump: Option<PathBuf>,

    /// Mappings symbolized concurrently (default: number of CPUs)
    #[arg(short, long, global = true)]
    pub jobs: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Add symbol information to a JSON profile
    Symbolize {
        /// Profile to symbolize
        profile: String,

        /// Mode options separated by ':' (local, remote, force, strict, none, demangle=STYLE)
        #[arg(short, long, default_value = "")]
        mode: String,

        /// JSON map from mapping file or build id to [{origin, delta}]
        #[arg(long, value_name = "FILE")]
        sources: Option<PathBuf>,

        /// Where to write the symbolized profile ('-' for stdout)
        #[arg(short, long, default_value = "-")]
        output: String,
    },

    /// List the symbols of a binary
    Symbols {
        file: String,

        /// Only symbols with a name matching this regular expression
        #[arg(long)]
        regex: Option<String>,

        /// Only symbols containing this address
        #[arg(long, value_parser = parse_address)]
        addr: Option<u64>,
    },

    /// Show the inlined call chain at addresses of a binary
    Lines {
        file: String,

        #[arg(required = true, value_parser = parse_address)]
        addrs: Vec<u64>,
    },

    /// Disassemble [START, END) of a binary
    Disasm {
        file: String,

        #[arg(value_parser = parse_address)]
        start: u64,

        #[arg(value_parser = parse_address)]
        end: u64,
    },
}

impl Args {
    /// Environment defaults with command-line overrides applied.
    #[must_use]
    pub fn config(&self) -> SymbolizerConfig {
        let mut config = SymbolizerConfig::from_env();
        if !self.binary_path.is_empty() {
            let mut paths = self.binary_path.clone();
            paths.append(&mut config.search_paths);
            config.search_paths = paths;
        }
        if let Some(objdump) = &self.objdump {
            config.objdump.clone_from(objdump);
        }
        if let Some(jobs) = self.jobs {
            config.jobs = jobs.max(1);
        }
        config
    }
}

/// Parse a hexadecimal address, `0x` prefix optional, as printed by `nm`
/// and `objdump`.
///
/// # Errors
/// Returns an error if the string is not a hexadecimal number
pub fn parse_address(s: &str) -> Result<u64, String> {
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid address {s:?}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x1000"), Ok(0x1000));
        assert_eq!(parse_address("401000"), Ok(0x40_1000));
        assert_eq!(parse_address("0XfF"), Ok(0xff));
        assert!(parse_address("main").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_parse_disasm_command() {
        let args = Args::try_parse_from(["profsym", "disasm", "./app", "0x10", "0x20", "--objdump", "llvm-objdump"])
            .unwrap();
        assert!(matches!(args.command, Command::Disasm { start: 0x10, end: 0x20, .. }));
        assert_eq!(args.config().objdump, PathBuf::from("llvm-objdump"));
    }

    #[test]
    fn test_binary_path_searched_first() {
        let args = Args::try_parse_from(["profsym", "--binary-path", "/srv/bin", "-j", "0", "symbols", "./app"]).unwrap();
        let config = args.config();
        assert_eq!(config.search_paths[0], PathBuf::from("/srv/bin"));
        assert_eq!(config.jobs, 1);
    }

    #[test]
    fn test_lines_requires_address() {
        assert!(Args::try_parse_from(["profsym", "lines", "./app"]).is_err());
    }
}
