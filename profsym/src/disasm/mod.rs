//! Disassembly listings
//!
//! Decoding is delegated to an [`InstructionDecoder`]; this module turns its
//! output into a listing that covers the requested range exactly once:
//! sorted, clipped to the range, overlaps dropped and holes filled with
//! `(bad)` entries. Each instruction is then annotated with its function and
//! source line from the image's symbol and line tables, best effort.

mod objdump;

pub use objdump::{parse_objdump, ObjdumpDecoder};

use log::debug;

use crate::domain::{DisasmError, Instruction};
use crate::plugin::{ObjFile, ObjTool};
use crate::symbolization::cache::{ImageCache, ImageRequest};
use crate::symbolization::Demangle;

/// Text used for bytes the decoder produced nothing for.
pub const FILLER_TEXT: &str = "(bad)";

/// One decoded instruction before annotation. A `size` of 0 means the
/// decoder did not report one; it is derived from the next address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInstruction {
    pub address: u64,
    pub size: u64,
    pub text: String,
}

pub trait InstructionDecoder: Send + Sync {
    /// Decode the instructions of `file` in `[start, end)`.
    ///
    /// # Errors
    /// Returns an error if the decoder cannot run or its output is unusable
    fn decode(&self, file: &str, start: u64, end: u64) -> Result<Vec<RawInstruction>, DisasmError>;
}

/// Disassemble `file` over `[start, end)`. The image is opened for this call
/// only and released before returning, so a failed open is not remembered.
///
/// # Errors
/// Returns an error if the range is empty, the file cannot be opened, the
/// range lies outside every loadable segment, or decoding fails
pub fn disassemble(
    tool: &dyn ObjTool,
    decoder: &dyn InstructionDecoder,
    file: &str,
    start: u64,
    end: u64,
) -> Result<Vec<Instruction>, DisasmError> {
    if start >= end {
        return Err(DisasmError::EmptyRange { start, end });
    }

    let handle = ImageCache::new().get_or_open(tool, &ImageRequest::for_file(file))?;
    let inside = handle.with(|image| image.segments().iter().any(|s| s.overlaps(start, end)));
    if !inside {
        return Err(DisasmError::OutsideSegments { file: file.to_string(), start, end });
    }

    let raw = decoder.decode(file, start, end)?;
    let listing = cover(raw, start, end);
    debug!("{file}: {} instruction(s) in [0x{start:x}, 0x{end:x})", listing.len());

    let base = handle.base();
    Ok(handle.with(|image| {
        listing.into_iter().map(|raw| annotate(image, base, raw)).collect()
    }))
}

/// Sort, clip and fill `raw` so that it covers `[start, end)` with no gaps
/// and no overlaps.
#[must_use]
pub fn cover(mut raw: Vec<RawInstruction>, start: u64, end: u64) -> Vec<RawInstruction> {
    raw.sort_by_key(|r| r.address);

    let mut out = Vec::with_capacity(raw.len());
    let mut cursor = start;
    for (i, inst) in raw.iter().enumerate() {
        if inst.address >= end {
            break;
        }
        if inst.address < cursor {
            continue;
        }
        if inst.address > cursor {
            out.push(filler(cursor, inst.address));
        }
        let size = match inst.size {
            0 => raw[i + 1..]
                .iter()
                .map(|next| next.address)
                .find(|&a| a > inst.address)
                .unwrap_or(end)
                .saturating_sub(inst.address)
                .max(1),
            size => size,
        };
        out.push(RawInstruction { address: inst.address, size, text: inst.text.clone() });
        cursor = inst.address.saturating_add(size);
    }
    if cursor < end {
        out.push(filler(cursor, end));
    }
    out
}

fn filler(from: u64, to: u64) -> RawInstruction {
    RawInstruction { address: from, size: to - from, text: FILLER_TEXT.to_string() }
}

fn annotate(image: &dyn ObjFile, base: u64, raw: RawInstruction) -> Instruction {
    let addr = raw.address.wrapping_sub(base);
    let frames = image.source_line(addr).unwrap_or_default();
    let symbol = image
        .symbols(None, Some(addr))
        .ok()
        .and_then(|syms| syms.into_iter().next())
        .map(|s| s.names[0].clone());
    let function = symbol
        .or_else(|| frames.last().map(|f| f.function.clone()))
        .map(|f| Demangle::Simple.apply(&f))
        .unwrap_or_default();
    let (file, line) = frames.first().map_or((String::new(), 0), |f| (f.file.clone(), f.line));

    Instruction { addr: raw.address, size: raw.size, text: raw.text, function, file, line }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(address: u64, size: u64, text: &str) -> RawInstruction {
        RawInstruction { address, size, text: text.to_string() }
    }

    fn assert_covers(listing: &[RawInstruction], start: u64, end: u64) {
        assert_eq!(listing.first().unwrap().address, start);
        for pair in listing.windows(2) {
            assert_eq!(pair[0].address + pair[0].size, pair[1].address);
        }
        let last = listing.last().unwrap();
        assert!(last.address + last.size >= end);
    }

    #[test]
    fn test_cover_contiguous() {
        let listing = cover(vec![raw(0x1004, 4, "b"), raw(0x1000, 4, "a")], 0x1000, 0x1008);
        assert_eq!(listing, vec![raw(0x1000, 4, "a"), raw(0x1004, 4, "b")]);
    }

    #[test]
    fn test_cover_fills_gaps() {
        let listing = cover(vec![raw(0x1002, 2, "a"), raw(0x1008, 1, "b")], 0x1000, 0x1010);
        assert_covers(&listing, 0x1000, 0x1010);
        assert_eq!(listing[0], raw(0x1000, 2, FILLER_TEXT));
        assert_eq!(listing[2], raw(0x1004, 4, FILLER_TEXT));
        assert_eq!(listing[4], raw(0x1009, 7, FILLER_TEXT));
    }

    #[test]
    fn test_cover_drops_overlaps_and_out_of_range() {
        let listing = cover(
            vec![raw(0x0ffe, 4, "straddle"), raw(0x1000, 4, "a"), raw(0x1002, 2, "overlap"), raw(0x1010, 1, "after")],
            0x1000,
            0x1008,
        );
        assert_covers(&listing, 0x1000, 0x1008);
        assert!(listing.iter().all(|i| i.text != "overlap" && i.text != "after" && i.text != "straddle"));
    }

    #[test]
    fn test_cover_derives_missing_sizes() {
        let listing = cover(vec![raw(0x1000, 0, "a"), raw(0x1003, 0, "b")], 0x1000, 0x1005);
        assert_eq!(listing, vec![raw(0x1000, 3, "a"), raw(0x1003, 2, "b")]);
    }

    #[test]
    fn test_cover_empty_decoder_output() {
        let listing = cover(Vec::new(), 0x1000, 0x1004);
        assert_eq!(listing, vec![raw(0x1000, 4, FILLER_TEXT)]);
    }
}
