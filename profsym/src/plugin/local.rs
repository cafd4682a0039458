//! Local implementations of the pass-through collaborators.

use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, IsTerminal, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;

use super::{Fetcher, Ui, Writer};
use crate::profile::Profile;

/// Writes to files on disk; `-` is standard output.
pub struct FileWriter;

impl Writer for FileWriter {
    fn open(&self, name: &str) -> io::Result<Box<dyn Write>> {
        if name == "-" {
            return Ok(Box::new(io::stdout()));
        }
        Ok(Box::new(BufWriter::new(File::create(name)?)))
    }
}

/// Reads JSON-encoded profiles from local files.
///
/// Collection `duration` and `timeout` do not apply to files and are ignored.
pub struct FileFetcher;

impl Fetcher for FileFetcher {
    fn fetch(&self, src: &str, _duration: Duration, _timeout: Duration) -> Result<(Profile, String)> {
        let data = fs::read(src).with_context(|| format!("Failed to read profile {src}"))?;
        let profile: Profile =
            serde_json::from_slice(&data).with_context(|| format!("Failed to parse profile {src}"))?;
        let resolved = fs::canonicalize(src)
            .map_or_else(|_| src.to_string(), |p| p.to_string_lossy().into_owned());
        debug!(
            "Fetched {resolved}: {} samples, {} mappings, {} locations",
            profile.samples.len(),
            profile.mappings.len(),
            profile.locations.len()
        );
        Ok((profile, resolved))
    }
}

/// Line-based UI on standard input and standard error.
///
/// Standard output is reserved for report data.
pub struct StdUi {
    interactive: bool,
}

impl StdUi {
    #[must_use]
    pub fn new() -> Self {
        Self { interactive: io::stdin().is_terminal() && io::stdout().is_terminal() }
    }
}

impl Default for StdUi {
    fn default() -> Self {
        Self::new()
    }
}

impl Ui for StdUi {
    fn read_line(&self, prompt: &str) -> io::Result<String> {
        eprint!("{prompt}");
        io::stderr().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "end of input"));
        }
        Ok(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn print(&self, msg: &str) {
        eprintln!("{}", msg.strip_suffix('\n').unwrap_or(msg));
    }

    fn print_err(&self, msg: &str) {
        eprintln!("{}", msg.strip_suffix('\n').unwrap_or(msg));
    }

    fn is_terminal(&self) -> bool {
        self.interactive
    }

    fn set_auto_complete(&self, _complete: Box<dyn Fn(&str) -> String + Send + Sync>) {
        // no completion on a plain line reader
    }
}

/// Serialize `profile` as JSON to `out`.
///
/// # Errors
/// Returns an error if serialization or the write fails
pub fn write_profile(out: &mut dyn Write, profile: &Profile) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, profile).context("Failed to serialize profile")?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Location, Mapping};
    use std::path::Path;

    #[test]
    fn test_fetch_round_trips_written_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cpu.json");
        let path = path.to_str().unwrap();

        let profile = Profile {
            mappings: vec![Mapping { id: 1, start: 0x1000, limit: 0x2000, file: "/bin/app".into(), ..Mapping::default() }],
            locations: vec![Location { id: 1, mapping_id: 1, address: 0x1234, lines: vec![] }],
            ..Profile::default()
        };

        let mut out = FileWriter.open(path).unwrap();
        write_profile(&mut out, &profile).unwrap();
        drop(out);
        assert!(Path::new(path).is_file());

        let (fetched, resolved) = FileFetcher.fetch(path, Duration::ZERO, Duration::ZERO).unwrap();
        assert_eq!(fetched, profile);
        assert!(resolved.ends_with("cpu.json"));
    }

    #[test]
    fn test_fetch_missing_file_fails() {
        let err = FileFetcher.fetch("/nonexistent/profile.json", Duration::ZERO, Duration::ZERO);
        assert!(err.is_err());
        assert!(format!("{:#}", err.unwrap_err()).contains("/nonexistent/profile.json"));
    }
}
