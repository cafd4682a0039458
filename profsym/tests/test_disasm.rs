use regex::Regex;

use profsym::config::SymbolizerConfig;
use profsym::disasm::FILLER_TEXT;
use profsym::domain::{DisasmError, Frame};
use profsym::plugin::ObjTool;
use profsym::symbolization::{LocalObjTool, MemoryImage, MemoryObjTool};

fn memory_tool() -> MemoryObjTool {
    MemoryObjTool::new().with_image(
        MemoryImage::new("app")
            .with_segment(0x1000..0x2000, 0x1000, true)
            .with_symbol("_ZN3app4main17h0123456789abcdefE", 0x1000, 0x100f)
            .with_lines(0x1000..0x1004, vec![Frame::new("_ZN3app4main17h0123456789abcdefE", "src/main.rs", 3)])
            .with_lines(0x1008..0x100c, vec![Frame::new("_ZN3app4main17h0123456789abcdefE", "src/main.rs", 5)])
            .with_instruction(0x1000, 4, "push %rbp")
            .with_instruction(0x1008, 1, "nop")
            .with_instruction(0x1009, 3, "ret"),
    )
}

#[test]
fn test_listing_covers_range_without_gaps() {
    let tool = memory_tool();
    let listing = tool.disasm("app", 0x1000, 0x1010).expect("disasm");

    let texts: Vec<&str> = listing.iter().map(|i| i.text.as_str()).collect();
    assert_eq!(texts, vec!["push %rbp", FILLER_TEXT, "nop", "ret", FILLER_TEXT]);
    assert_eq!(listing[0].addr, 0x1000);
    for pair in listing.windows(2) {
        assert_eq!(pair[0].addr + pair[0].size, pair[1].addr, "gap or overlap after {:#x}", pair[0].addr);
    }
    let last = listing.last().expect("non-empty");
    assert_eq!(last.addr + last.size, 0x1010);
}

#[test]
fn test_listing_is_annotated() {
    let tool = memory_tool();
    let listing = tool.disasm("app", 0x1000, 0x100c).expect("disasm");

    assert!(listing.iter().all(|i| i.function == "app::main"));
    assert_eq!((listing[0].file.as_str(), listing[0].line), ("src/main.rs", 3));
    assert_eq!((listing[1].file.as_str(), listing[1].line), ("", 0));
    assert_eq!(listing[2].line, 5);
}

#[test]
fn test_range_errors() {
    let tool = memory_tool();

    assert!(matches!(tool.disasm("app", 0x1008, 0x1008), Err(DisasmError::EmptyRange { .. })));
    assert!(matches!(tool.disasm("app", 0x9000, 0x9010), Err(DisasmError::OutsideSegments { .. })));
    assert!(matches!(tool.disasm("missing", 0x1000, 0x1010), Err(DisasmError::Open(_))));
}

#[test]
fn test_image_added_after_failed_attempt() {
    let tool = memory_tool();
    assert!(matches!(tool.disasm("late", 0x1000, 0x1004), Err(DisasmError::Open(_))));

    tool.add(
        MemoryImage::new("late")
            .with_segment(0x1000..0x2000, 0x1000, true)
            .with_instruction(0x1000, 4, "nop"),
    );
    let listing = tool.disasm("late", 0x1000, 0x1004).expect("image is registered now");
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].text, "nop");
}

#[test]
fn test_binary_copied_after_failed_attempt() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("app");
    let path_str = path.to_str().expect("utf-8 path");
    let config = SymbolizerConfig { objdump: "/nonexistent/objdump".into(), ..SymbolizerConfig::default() };
    let tool = LocalObjTool::new(&config);

    let main_re = Regex::new("^main$").expect("regex");
    let main = tool
        .open(env!("CARGO_BIN_EXE_profsym"), 0, 0, 0)
        .expect("open")
        .symbols(Some(&main_re), None)
        .expect("symbols")
        .remove(0);

    let err = tool.disasm(path_str, main.start, main.end + 1).expect_err("file does not exist yet");
    assert!(matches!(err, DisasmError::Open(_)), "{err}");

    std::fs::copy(env!("CARGO_BIN_EXE_profsym"), &path).expect("copy");

    // the file opens now; only the missing objdump stops the listing
    let err = tool.disasm(path_str, main.start, main.end + 1).expect_err("objdump is missing");
    assert!(matches!(err, DisasmError::Decoder { .. }), "{err}");
}

#[test]
#[ignore = "needs objdump on PATH"]
fn test_objdump_disassembles_own_main() {
    let binary_path = env!("CARGO_BIN_EXE_profsym");
    let tool = LocalObjTool::new(&SymbolizerConfig::default());

    let main_re = Regex::new("^main$").expect("regex");
    let main = tool
        .open(binary_path, 0, 0, 0)
        .expect("open")
        .symbols(Some(&main_re), None)
        .expect("symbols")
        .remove(0);

    let listing = tool.disasm(binary_path, main.start, main.end + 1).expect("disasm");
    for inst in &listing {
        println!("{:>12x}: {:<40} {} {}:{}", inst.addr, inst.text, inst.function, inst.file, inst.line);
    }

    assert_eq!(listing[0].addr, main.start);
    assert!(listing.iter().any(|i| i.text != FILLER_TEXT), "objdump decoded nothing");
    assert!(listing.iter().all(|i| i.function == "main"));
}
