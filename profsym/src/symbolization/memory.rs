//! In-memory images
//!
//! Images described entirely in memory: a symbol table, a line table of
//! address ranges mapped to inlined frame chains, loadable segments and
//! optionally pre-decoded instructions. Used for synthetic inputs and as
//! the test double for the object tool.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;
use regex::Regex;

use super::image::{compute_base, filter_symbols, merge_symbols};
use crate::disasm::{self, InstructionDecoder, RawInstruction};
use crate::domain::{DisasmError, Frame, Instruction, LookupError, OpenError, Segment, Symbol};
use crate::plugin::{ObjFile, ObjTool};

#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    name: String,
    base: u64,
    build_id: String,
    segments: Vec<Segment>,
    raw_symbols: Vec<(u64, u64, String)>,
    symbols: Vec<Symbol>,
    /// start -> (end, frames leaf first)
    lines: BTreeMap<u64, (u64, Vec<Frame>)>,
    instructions: Vec<RawInstruction>,
    released: bool,
}

impl MemoryImage {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_build_id(mut self, build_id: impl Into<String>) -> Self {
        self.build_id = build_id.into();
        self
    }

    /// Add a loadable segment at virtual `range`, backed by the file from
    /// `file_offset`.
    #[must_use]
    pub fn with_segment(mut self, range: Range<u64>, file_offset: u64, executable: bool) -> Self {
        self.segments.push(Segment {
            start: range.start,
            end: range.end,
            file_offset,
            file_size: range.end - range.start,
            executable,
        });
        self
    }

    /// Add a symbol covering `[start, end]`. An `end` below `start` gives a
    /// one-byte symbol.
    #[must_use]
    pub fn with_symbol(mut self, name: impl Into<String>, start: u64, end: u64) -> Self {
        let size = end.saturating_sub(start).saturating_add(1);
        self.raw_symbols.push((start, size, name.into()));
        self.symbols = merge_symbols(self.raw_symbols.clone(), &self.name);
        self
    }

    /// Addresses in `range` resolve to `frames`, leaf first.
    #[must_use]
    pub fn with_lines(mut self, range: Range<u64>, frames: Vec<Frame>) -> Self {
        self.lines.insert(range.start, (range.end, frames));
        self
    }

    #[must_use]
    pub fn with_instruction(mut self, address: u64, size: u64, text: impl Into<String>) -> Self {
        self.instructions.push(RawInstruction { address, size, text: text.into() });
        self
    }

    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    fn check_open(&self) -> Result<(), LookupError> {
        if self.released {
            Err(LookupError::Released(self.name.clone()))
        } else {
            Ok(())
        }
    }
}

impl ObjFile for MemoryImage {
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
        Ok(self
            .lines
            .range(..=addr)
            .next_back()
            .filter(|(_, (end, _))| addr < *end)
            .map(|(_, (_, frames))| frames.clone())
            .unwrap_or_default())
    }

    fn symbols(&self, pattern: Option<&Regex>, addr: Option<u64>) -> Result<Vec<Symbol>, LookupError> {
        self.check_open()?;
        Ok(filter_symbols(&self.symbols, pattern, addr))
    }

    fn close(&mut self) -> Result<(), LookupError> {
        self.released = true;
        Ok(())
    }
}

/// Object tool over a registry of [`MemoryImage`]s keyed by file name.
///
/// Counts opens so callers can check how often images were actually loaded.
#[derive(Default)]
pub struct MemoryObjTool {
    images: RwLock<HashMap<String, MemoryImage>>,
    opens: AtomicUsize,
}

impl MemoryObjTool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `image` under its name.
    pub fn add(&self, image: MemoryImage) {
        self.images.write().insert(image.name.clone(), image);
    }

    #[must_use]
    pub fn with_image(self, image: MemoryImage) -> Self {
        self.add(image);
        self
    }

    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl ObjTool for MemoryObjTool {
    fn open(&self, file: &str, start: u64, limit: u64, offset: u64) -> Result<Box<dyn ObjFile>, OpenError> {
        let mut image = self
            .images
            .read()
            .get(file)
            .cloned()
            .ok_or_else(|| OpenError::NotFound { path: file.to_string() })?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        image.base = compute_base(&image.segments, start, limit, offset);
        Ok(Box::new(image))
    }

    fn disasm(&self, file: &str, start: u64, end: u64) -> Result<Vec<Instruction>, DisasmError> {
        disasm::disassemble(self, self, file, start, end)
    }
}

impl InstructionDecoder for MemoryObjTool {
    fn decode(&self, file: &str, start: u64, end: u64) -> Result<Vec<RawInstruction>, DisasmError> {
        let images = self.images.read();
        let image = images.get(file).ok_or_else(|| DisasmError::Decoder {
            file: file.to_string(),
            reason: "no such image".to_string(),
        })?;
        Ok(image
            .instructions
            .iter()
            .filter(|i| i.address < end && i.address.saturating_add(i.size) > start)
            .cloned()
            .collect())
    }
}
