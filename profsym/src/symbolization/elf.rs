//! ELF images on local disk
//!
//! Symbols, segments and the build id come from `object`; line tables and
//! inlined call chains from the DWARF sections through `addr2line`.
//! Everything is read at open time, so the file itself is not kept open.

use std::borrow::Cow;
use std::fs;
use std::sync::Arc;

use addr2line::Context;
use gimli::{EndianArcSlice, RunTimeEndian};
use log::{debug, info, warn};
use object::{Object, ObjectSection, ObjectSegment, ObjectSymbol, SegmentFlags, SymbolKind};
use regex::Regex;

use super::image::{compute_base, filter_symbols, merge_symbols};
use crate::config::SymbolizerConfig;
use crate::disasm::{self, ObjdumpDecoder};
use crate::domain::{DisasmError, Frame, Instruction, LookupError, OpenError, Segment, Symbol};
use crate::plugin::{ObjFile, ObjTool};

type DwarfReader = EndianArcSlice<RunTimeEndian>;

/// An ELF executable or shared library.
pub struct ElfImage {
    name: String,
    base: u64,
    build_id: String,
    segments: Vec<Segment>,
    /// Sorted by start address
    symbols: Vec<Symbol>,
    /// None when the file has no DWARF
    ctx: Option<Context<DwarfReader>>,
    released: bool,
}

impl ElfImage {
    /// Open `path`, mapped at `[start, limit)` from file `offset`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not an object file
    pub fn open(path: &str, start: u64, limit: u64, offset: u64) -> Result<Self, OpenError> {
        let data = fs::read(path).map_err(|e| OpenError::from_io(path, &e))?;
        let obj = object::File::parse(&*data).map_err(|e| OpenError::UnsupportedFormat {
            path: path.to_string(),
            reason: e.to_string(),
        })?;

        let build_id = obj.build_id().ok().flatten().map(hex::encode).unwrap_or_default();
        let segments = load_segments(&obj);
        let base = compute_base(&segments, start, limit, offset);
        let symbols = load_symbols(&obj, path);
        let ctx = load_dwarf(&obj).unwrap_or_else(|e| {
            warn!("{path}: ignoring unreadable DWARF: {e}");
            None
        });

        info!(
            "Opened {path}: base 0x{base:x}, {} symbols, {} segments, build id {}, dwarf: {}",
            symbols.len(),
            segments.len(),
            if build_id.is_empty() { "<none>" } else { &build_id },
            ctx.is_some()
        );

        Ok(Self { name: path.to_string(), base, build_id, segments, symbols, ctx, released: false })
    }

    fn check_open(&self) -> Result<(), LookupError> {
        if self.released {
            Err(LookupError::Released(self.name.clone()))
        } else {
            Ok(())
        }
    }

    fn debug_info_error(&self, addr: u64, err: &gimli::Error) -> LookupError {
        LookupError::DebugInfo { name: self.name.clone(), addr, reason: err.to_string() }
    }
}

impl ObjFile for ElfImage {
    fn name(&self) -> &str {
        &self.name
    }

    fn base(&self) -> u64 {
        self.base
    }

    fn build_id(&self) -> &str {
        &self.build_id
    }

    fn segments(&self) -> &[Segment] {
        &self.segments
    }

    fn source_line(&self, addr: u64) -> Result<Vec<Frame>, LookupError> {
        self.check_open()?;
        let Some(ctx) = &self.ctx else {
            return Ok(Vec::new());
        };

        let mut iter = ctx
            .find_frames(addr)
            .skip_all_loads()
            .map_err(|e| self.debug_info_error(addr, &e))?;

        let mut frames = Vec::new();
        while let Some(frame) = iter.next().map_err(|e| self.debug_info_error(addr, &e))? {
            let function = frame
                .function
                .as_ref()
                .and_then(|f| f.raw_name().ok())
                .map(Cow::into_owned)
                .unwrap_or_default();
            let (file, line) = frame.location.map_or((String::new(), 0), |loc| {
                (loc.file.unwrap_or_default().to_string(), loc.line.unwrap_or(0))
            });
            frames.push(Frame { function, file, line });
        }

        // DWARF without a name for the function: use the symbol table
        if frames.iter().any(|f| f.function.is_empty()) {
            if let Some(sym) = filter_symbols(&self.symbols, None, Some(addr)).into_iter().next() {
                for frame in frames.iter_mut().filter(|f| f.function.is_empty()) {
                    frame.function.clone_from(&sym.names[0]);
                }
            }
        }

        debug!("{}: 0x{addr:x} -> {} frame(s)", self.name, frames.len());
        Ok(frames)
    }

    fn symbols(&self, pattern: Option<&Regex>, addr: Option<u64>) -> Result<Vec<Symbol>, LookupError> {
        self.check_open()?;
        Ok(filter_symbols(&self.symbols, pattern, addr))
    }

    fn close(&mut self) -> Result<(), LookupError> {
        if !self.released {
            debug!("Releasing {}", self.name);
            self.released = true;
            self.ctx = None;
            self.symbols = Vec::new();
        }
        Ok(())
    }
}

fn load_segments(obj: &object::File<'_>) -> Vec<Segment> {
    obj.segments()
        .map(|seg| {
            let (file_offset, file_size) = seg.file_range();
            let executable = matches!(
                seg.flags(),
                SegmentFlags::Elf { p_flags } if p_flags & object::elf::PF_X != 0
            );
            Segment {
                start: seg.address(),
                end: seg.address().saturating_add(seg.size()),
                file_offset,
                file_size,
                executable,
            }
        })
        .collect()
}

fn load_symbols(obj: &object::File<'_>, path: &str) -> Vec<Symbol> {
    let raw = obj
        .symbols()
        .chain(obj.dynamic_symbols())
        .filter(|s| s.kind() == SymbolKind::Text && s.is_definition() && s.address() != 0)
        .filter_map(|s| {
            let name = s.name().ok().filter(|n| !n.is_empty())?;
            Some((s.address(), s.size(), name.to_string()))
        })
        .collect();
    merge_symbols(raw, path)
}

fn load_dwarf(obj: &object::File<'_>) -> Result<Option<Context<DwarfReader>>, gimli::Error> {
    if obj.section_by_name(".debug_info").is_none() {
        return Ok(None);
    }

    let endian = if obj.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

    let load_section = |id: gimli::SectionId| -> Result<DwarfReader, gimli::Error> {
        let data = obj
            .section_by_name(id.name())
            .and_then(|section| section.uncompressed_data().ok())
            .unwrap_or(Cow::Borrowed(&[][..]));
        Ok(EndianArcSlice::new(Arc::from(&*data), endian))
    };

    let dwarf = gimli::Dwarf::load(&load_section)?;
    Context::from_dwarf(dwarf).map(Some)
}

/// Object tool for files on the local machine: ELF parsing for symbols and
/// line tables, `objdump` for instruction decoding.
pub struct LocalObjTool {
    decoder: ObjdumpDecoder,
}

impl LocalObjTool {
    #[must_use]
    pub fn new(config: &SymbolizerConfig) -> Self {
        Self { decoder: ObjdumpDecoder::new(config.objdump.clone()) }
    }
}

impl ObjTool for LocalObjTool {
    fn open(&self, file: &str, start: u64, limit: u64, offset: u64) -> Result<Box<dyn ObjFile>, OpenError> {
        Ok(Box::new(ElfImage::open(file, start, limit, offset)?))
    }

    fn disasm(&self, file: &str, start: u64, end: u64) -> Result<Vec<Instruction>, DisasmError> {
        disasm::disassemble(self, &self.decoder, file, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file() {
        let err = ElfImage::open("/nonexistent/libnothing.so", 0, 0, 0).err().unwrap();
        assert_eq!(err, OpenError::NotFound { path: "/nonexistent/libnothing.so".to_string() });
    }

    #[test]
    fn test_open_non_object_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"definitely not an ELF file").unwrap();

        let err = ElfImage::open(path.to_str().unwrap(), 0, 0, 0).err().unwrap();
        assert!(matches!(err, OpenError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_close_is_idempotent() {
        let exe = std::env::current_exe().unwrap();
        let mut image = ElfImage::open(exe.to_str().unwrap(), 0, 0, 0).unwrap();
        assert!(!image.symbols(None, None).unwrap().is_empty());

        image.close().unwrap();
        image.close().unwrap();
        assert!(matches!(image.source_line(0x1000), Err(LookupError::Released(_))));
        assert!(matches!(image.symbols(None, None), Err(LookupError::Released(_))));
    }
}
