//! Instruction decoding with GNU `objdump`

use std::path::PathBuf;
use std::process::Command;

use log::debug;

use super::{InstructionDecoder, RawInstruction};
use crate::domain::DisasmError;

pub struct ObjdumpDecoder {
    objdump: PathBuf,
}

impl ObjdumpDecoder {
    #[must_use]
    pub fn new(objdump: PathBuf) -> Self {
        Self { objdump }
    }
}

impl InstructionDecoder for ObjdumpDecoder {
    fn decode(&self, file: &str, start: u64, end: u64) -> Result<Vec<RawInstruction>, DisasmError> {
        let decoder_error = |reason: String| DisasmError::Decoder { file: file.to_string(), reason };

        debug!("Running {} on {file} [0x{start:x}, 0x{end:x})", self.objdump.display());
        let output = Command::new(&self.objdump)
            .arg("-d")
            .arg(format!("--start-address={start:#x}"))
            .arg(format!("--stop-address={end:#x}"))
            .arg(file)
            .output()
            .map_err(|e| decoder_error(format!("cannot run {}: {e}", self.objdump.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(decoder_error(format!("{} failed: {}", self.objdump.display(), stderr.trim())));
        }

        Ok(parse_objdump(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parse an `objdump -d` listing.
///
/// Instruction lines look like `  401000:\t48 89 e5 \tmov %rsp,%rbp`; the
/// byte column gives the size. Encodings too long for one line continue on
/// a line with an address and bytes but no text. Listings made with
/// `--no-show-raw-insn` have no byte column and yield size 0.
#[must_use]
pub fn parse_objdump(listing: &str) -> Vec<RawInstruction> {
    let mut out: Vec<RawInstruction> = Vec::new();

    for line in listing.lines() {
        let Some((addr, rest)) = line.trim_start().split_once(':') else {
            continue;
        };
        let Ok(address) = u64::from_str_radix(addr.trim(), 16) else {
            continue;
        };

        let mut fields = rest.split('\t').skip(1);
        let first = fields.next().unwrap_or_default();
        let (size, text) = if is_byte_column(first) {
            let size = first.split_whitespace().count() as u64;
            (size, fields.collect::<Vec<_>>().join("\t").trim().to_string())
        } else {
            let text = std::iter::once(first).chain(fields).collect::<Vec<_>>().join("\t");
            (0, text.trim().to_string())
        };

        if text.is_empty() {
            if let Some(last) = out.last_mut() {
                if last.address.saturating_add(last.size) == address {
                    last.size += size;
                }
            }
            continue;
        }

        out.push(RawInstruction { address, size, text: squeeze(&text) });
    }
    out
}

fn is_byte_column(field: &str) -> bool {
    let mut tokens = field.split_whitespace().peekable();
    tokens.peek().is_some()
        && tokens.all(|t| t.len() == 2 && t.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Collapse the padding objdump puts between mnemonic and operands.
fn squeeze(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "
/usr/bin/app:     file format elf64-x86-64


Disassembly of section .text:

0000000000401000 <main>:
  401000:\t55                   \tpush   %rbp
  401001:\t48 89 e5             \tmov    %rsp,%rbp
  401004:\t48 b8 00 00 00 00 00 \tmovabs $0x0,%rax
  40100b:\t00 00 00
  40100e:\tc3                   \tret
";

    #[test]
    fn test_parse_listing() {
        let insts = parse_objdump(LISTING);
        assert_eq!(insts.len(), 4);
        assert_eq!(insts[0], RawInstruction { address: 0x401000, size: 1, text: "push %rbp".to_string() });
        assert_eq!(insts[1].size, 3);
        assert_eq!(insts[1].text, "mov %rsp,%rbp");
        assert_eq!(insts[2].address, 0x401004);
        assert_eq!(insts[2].size, 10);
        assert_eq!(insts[3], RawInstruction { address: 0x40100e, size: 1, text: "ret".to_string() });
    }

    #[test]
    fn test_parse_without_raw_bytes() {
        let insts = parse_objdump("  401000:\tpush   %rbp\n  401001:\tmov    %rsp,%rbp\n");
        assert_eq!(insts.len(), 2);
        assert_eq!(insts[0].size, 0);
        assert_eq!(insts[0].text, "push %rbp");
        assert_eq!(insts[1].address, 0x401001);
    }

    #[test]
    fn test_parse_ignores_headers() {
        let insts = parse_objdump("Disassembly of section .plt:\n\n0000000000401020 <.plt>:\n");
        assert!(insts.is_empty());
    }

    #[test]
    fn test_missing_objdump_is_decoder_error() {
        let decoder = ObjdumpDecoder::new(PathBuf::from("/nonexistent/objdump"));
        let err = decoder.decode("/bin/true", 0, 16).unwrap_err();
        assert!(matches!(err, DisasmError::Decoder { .. }));
    }
}
