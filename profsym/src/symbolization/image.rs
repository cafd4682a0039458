//! Helpers shared by every [`ObjFile`](crate::plugin::ObjFile) backend.

use regex::Regex;

use crate::domain::{Segment, Symbol};

/// Base address for a file mapped at `[start, limit)` from file `offset`.
///
/// Runtime address minus base gives the address in the file's own virtual
/// address space. A mapping with no bounds (`start == 0` and `limit` either 0
/// or `u64::MAX`) describes the file itself and gets base 0.
#[must_use]
pub fn compute_base(segments: &[Segment], start: u64, limit: u64, offset: u64) -> u64 {
    if start == 0 && (limit == 0 || limit == u64::MAX) {
        return 0;
    }
    let segment = segments
        .iter()
        .find(|s| s.contains_offset(offset))
        .or_else(|| segments.iter().find(|s| s.executable));
    match segment {
        Some(s) => start.wrapping_sub(offset).wrapping_add(s.file_offset).wrapping_sub(s.start),
        None => start.wrapping_sub(offset),
    }
}

/// Sort by address and merge entries that share an address into one symbol
/// with several names.
#[must_use]
pub fn merge_symbols(mut raw: Vec<(u64, u64, String)>, file: &str) -> Vec<Symbol> {
    raw.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.2.cmp(&b.2)));

    let mut out: Vec<Symbol> = Vec::new();
    for (addr, size, name) in raw {
        let end = addr.saturating_add(size.saturating_sub(1));
        match out.last_mut() {
            Some(last) if last.start == addr => {
                last.end = last.end.max(end);
                if !last.has_name(&name) {
                    last.names.push(name);
                }
            }
            _ => out.push(Symbol { names: vec![name], file: file.to_string(), start: addr, end }),
        }
    }
    out
}

/// Apply the name and address filters of `ObjFile::symbols` to a list sorted
/// by start address.
#[must_use]
pub fn filter_symbols(symbols: &[Symbol], pattern: Option<&Regex>, addr: Option<u64>) -> Vec<Symbol> {
    let candidates = match addr {
        Some(addr) => &symbols[..symbols.partition_point(|s| s.start <= addr)],
        None => symbols,
    };
    candidates
        .iter()
        .filter(|s| addr.map_or(true, |a| s.contains(a)))
        .filter(|s| pattern.map_or(true, |re| s.names.iter().any(|n| re.is_match(n))))
        .cloned()
        .collect()
}
