//! Backend capability sets
//!
//! The driver talks to its backends only through these traits, so it never
//! knows whether it is reading local files, in-memory fixtures or a remote
//! service. [`Options`] bundles one implementation of each.
//!
//! Only [`Symbolizer`] and [`ObjTool`] carry real logic; writing output,
//! fetching profiles and talking to the user are thin pass-throughs with a
//! simple local implementation in [`local`].

pub mod local;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use regex::Regex;

use crate::config::SymbolizerConfig;
use crate::domain::{
    DisasmError, Frame, Instruction, LookupError, MappingSources, OpenError, PartialError,
    Segment, Symbol,
};
use crate::profile::{Mapping, Profile};
use crate::symbolization::{LocalObjTool, LocalSymbolizer, SymbolizeMode, SymbolizeReport};

pub use local::{FileFetcher, FileWriter, StdUi};

/// Opens named outputs, typically files.
pub trait Writer: Send + Sync {
    /// # Errors
    /// Returns an error if the output cannot be created
    fn open(&self, name: &str) -> io::Result<Box<dyn Write>>;
}

/// Reads the profile named by `src`, which may be a path or a URL.
///
/// `duration` is the requested collection length and `timeout` how long to
/// wait for the profile; both are zero when unspecified. Returns the profile
/// and the resolved source it actually came from.
pub trait Fetcher: Send + Sync {
    /// # Errors
    /// Returns an error if the profile cannot be read or decoded
    fn fetch(&self, src: &str, duration: Duration, timeout: Duration) -> Result<(Profile, String)>;
}

/// Introduces symbol information into a profile.
pub trait Symbolizer: Send + Sync {
    /// Symbolize `profile` in place.
    ///
    /// # Errors
    /// Returns [`PartialError`] when no mapping could be symbolized; whatever
    /// was resolved is still written to the profile.
    fn symbolize(
        &self,
        mode: &SymbolizeMode,
        sources: &MappingSources,
        profile: &mut Profile,
    ) -> Result<SymbolizeReport, PartialError>;
}

/// Inspects executables and shared libraries.
pub trait ObjTool: Send + Sync {
    /// Open `file`. For shared libraries `start`, `limit` and `offset`
    /// describe where the file is mapped in the inspected address space.
    ///
    /// # Errors
    /// Returns an error if the file is missing, unreadable or not an object file
    fn open(&self, file: &str, start: u64, limit: u64, offset: u64)
        -> Result<Box<dyn ObjFile>, OpenError>;

    /// Disassemble `file` over `[start, end)`, addresses in the file's own
    /// virtual address space.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, the range is outside
    /// every loadable segment, or decoding fails
    fn disasm(&self, file: &str, start: u64, end: u64) -> Result<Vec<Instruction>, DisasmError>;
}

/// One opened executable or shared library.
///
/// Names returned by [`ObjFile::source_line`] and [`ObjFile::symbols`] are raw
/// (mangled) linker names; callers demangle them.
pub trait ObjFile: Send {
    fn name(&self) -> &str;

    /// Subtract from a runtime address to get an address in the file.
    fn base(&self) -> u64;

    /// Hex-encoded GNU build id, or empty.
    fn build_id(&self) -> &str;

    fn segments(&self) -> &[Segment];

    /// Frames for `addr` (already base-adjusted), leaf first. Empty when no
    /// debug information covers the address.
    ///
    /// # Errors
    /// Returns an error if the image is no longer usable
    fn source_line(&self, addr: u64) -> Result<Vec<Frame>, LookupError>;

    /// Symbols whose names match `pattern` and/or whose range contains
    /// `addr`, ascending by address.
    ///
    /// # Errors
    /// Returns an error if the image is no longer usable
    fn symbols(&self, pattern: Option<&Regex>, addr: Option<u64>) -> Result<Vec<Symbol>, LookupError>;

    /// Release the image. Calling it again is a no-op.
    ///
    /// # Errors
    /// Returns an error if releasing the underlying resources fails
    fn close(&mut self) -> Result<(), LookupError>;
}

/// Remote symbol lookup, consulted when a mapping cannot be opened locally
/// and the mode allows it.
pub trait SymbolService: Send + Sync {
    /// Resolve `addresses` of `mapping` against the source the profile was
    /// collected from. Unknown addresses are simply left out of the result.
    ///
    /// # Errors
    /// Returns an error if the service cannot be reached
    fn lookup(
        &self,
        origin: &str,
        mapping: &Mapping,
        addresses: &[u64],
    ) -> Result<Vec<(u64, String)>>;
}

/// Interaction with the user.
pub trait Ui: Send + Sync {
    /// Read one line (a command), printing `prompt` first.
    ///
    /// # Errors
    /// Returns an error on end of input or a read failure
    fn read_line(&self, prompt: &str) -> io::Result<String>;

    fn print(&self, msg: &str);

    fn print_err(&self, msg: &str);

    fn is_terminal(&self) -> bool;

    /// Install a completion callback, if the UI supports completion at all.
    fn set_auto_complete(&self, complete: Box<dyn Fn(&str) -> String + Send + Sync>);
}

pub struct Options {
    pub writer: Box<dyn Writer>,
    pub fetcher: Box<dyn Fetcher>,
    pub symbolizer: Box<dyn Symbolizer>,
    pub obj: Arc<dyn ObjTool>,
    pub ui: Box<dyn Ui>,
}

impl Options {
    /// Local-filesystem backends for everything, no remote symbol service.
    #[must_use]
    pub fn local(config: &SymbolizerConfig) -> Self {
        let obj: Arc<dyn ObjTool> = Arc::new(LocalObjTool::new(config));
        Self {
            writer: Box::new(FileWriter),
            fetcher: Box::new(FileFetcher),
            symbolizer: Box::new(LocalSymbolizer::new(Arc::clone(&obj), config)),
            obj,
            ui: Box::new(StdUi::new()),
        }
    }
}
