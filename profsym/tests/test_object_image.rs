use std::sync::Arc;

use regex::Regex;

use profsym::config::SymbolizerConfig;
use profsym::domain::MappingSources;
use profsym::plugin::{ObjFile, ObjTool, Symbolizer};
use profsym::profile::{Location, Mapping, Profile};
use profsym::symbolization::{Demangle, ElfImage, LocalObjTool, LocalSymbolizer, SymbolizeMode};

fn own_binary() -> &'static str {
    env!("CARGO_BIN_EXE_profsym")
}

#[test]
fn test_opens_own_binary() {
    let binary_path = own_binary();
    println!("Opening: {binary_path}");

    let tool = LocalObjTool::new(&SymbolizerConfig::default());
    let mut image = tool.open(binary_path, 0, 0, 0).expect("Failed to open own binary");

    assert_eq!(image.name(), binary_path);
    assert_eq!(image.base(), 0);
    assert!(image.segments().iter().any(|s| s.executable), "no executable segment");

    let symbols = image.symbols(None, None).expect("symbols");
    assert!(!symbols.is_empty(), "no text symbols");
    assert!(symbols.windows(2).all(|w| w[0].start <= w[1].start), "symbols not sorted");
    println!("✅ {} symbols", symbols.len());

    image.close().expect("close");
    image.close().expect("second close is a no-op");
    assert!(image.symbols(None, None).is_err());
}

#[test]
fn test_symbol_starts_resolve() {
    let image = ElfImage::open(own_binary(), 0, 0, 0).expect("open");
    let symbols = image.symbols(None, None).expect("symbols");

    let mut with_lines = 0;
    for sym in symbols.iter().step_by((symbols.len() / 50).max(1)) {
        let frames = image
            .source_line(sym.start)
            .unwrap_or_else(|e| panic!("source_line({:#x}) failed: {e}", sym.start));
        if !frames.is_empty() {
            with_lines += 1;
            assert!(frames.iter().all(|f| !f.function.is_empty()), "unnamed frame at {:#x}", sym.start);
        }
    }
    println!("✅ {with_lines} sampled symbol(s) had line information");
}

#[test]
fn test_symbol_start_leaf_is_symbol_alias() {
    let image = ElfImage::open(own_binary(), 0, 0, 0).expect("open");
    let own: Vec<_> = image
        .symbols(None, None)
        .expect("symbols")
        .into_iter()
        .filter(|s| s.names.iter().any(|n| Demangle::Simple.apply(n).starts_with("profsym::")))
        .collect();
    assert!(!own.is_empty(), "no profsym symbols in own binary");

    let mut checked = 0;
    for sym in &own {
        let frames = image.source_line(sym.start).expect("source_line");
        // a call inlined right at the entry reports the inlinee as leaf
        if frames.len() != 1 {
            continue;
        }
        assert!(
            sym.has_name(&frames[0].function),
            "{:#x}: leaf {} is not one of {:?}",
            sym.start,
            frames[0].function,
            sym.names
        );
        checked += 1;
    }
    println!("✅ {checked} symbol start(s) resolved to their own symbol");
    assert!(checked > 0);
}

#[test]
fn test_symbols_filtered_by_name_and_address() {
    let tool = LocalObjTool::new(&SymbolizerConfig::default());
    let image = tool.open(own_binary(), 0, 0, 0).expect("open");

    let main_re = Regex::new("^main$").expect("regex");
    let mains = image.symbols(Some(&main_re), None).expect("symbols");
    assert_eq!(mains.len(), 1, "expected exactly one main symbol");
    let main = &mains[0];

    let containing = image.symbols(None, Some(main.start)).expect("symbols");
    assert!(containing.iter().any(|s| s.has_name("main")));
    assert!(containing.iter().all(|s| s.contains(main.start)));
}

#[test]
fn test_symbolizes_own_main() {
    let tool = LocalObjTool::new(&SymbolizerConfig::default());
    let main_re = Regex::new("^main$").expect("regex");
    let main_start = tool
        .open(own_binary(), 0, 0, 0)
        .expect("open")
        .symbols(Some(&main_re), None)
        .expect("symbols")[0]
        .start;

    let mut profile = Profile {
        mappings: vec![Mapping {
            id: 1,
            start: 0,
            limit: u64::MAX,
            file: own_binary().to_string(),
            ..Mapping::default()
        }],
        locations: vec![Location { id: 1, mapping_id: 1, address: main_start, lines: vec![] }],
        ..Profile::default()
    };

    let config = SymbolizerConfig { search_paths: Vec::new(), ..SymbolizerConfig::default() };
    let symbolizer = LocalSymbolizer::new(Arc::new(LocalObjTool::new(&config)) as Arc<dyn ObjTool>, &config);
    let report = symbolizer
        .symbolize(&"local".parse::<SymbolizeMode>().expect("mode"), &MappingSources::new(), &mut profile)
        .expect("symbolize");

    assert_eq!(report.symbolized, vec![1]);
    assert_eq!(report.missed, 0);
    let names = profile.location_function_names(&profile.locations[0]);
    println!("main resolved to {names:?}");
    assert!(!names.is_empty());
    assert!(profile.mappings[0].has_functions);
}
