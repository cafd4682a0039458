//! # profsym - Main Entry Point
//!
//! Thin front end over the library backends:
//! - **symbolize**: read a JSON profile, add frames, write it back out
//! - **symbols** / **lines**: query one binary's symbol and line tables
//! - **disasm**: annotated instruction listing of an address range

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use regex::Regex;

use profsym::cli::{Args, Command};
use profsym::domain::{MappingSources, ModeError, PartialError};
use profsym::plugin::{local::write_profile, Options};
use profsym::symbolization::{Demangle, SymbolizeMode};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_PARTIAL: i32 = 3;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<PartialError>().is_some() {
        EXIT_PARTIAL
    } else if err.downcast_ref::<ModeError>().is_some() {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = args.config();
    info!("Binary search path: {:?}", config.search_paths);
    let options = Options::local(&config);

    match args.command {
        Command::Symbolize { profile, mode, sources, output } => {
            symbolize(&options, &profile, &mode, sources.as_deref(), &output)
        }
        Command::Symbols { file, regex, addr } => symbols(&options, &file, regex.as_deref(), addr),
        Command::Lines { file, addrs } => lines(&options, &file, &addrs),
        Command::Disasm { file, start, end } => disasm(&options, &file, start, end),
    }
}

fn symbolize(
    options: &Options,
    src: &str,
    mode: &str,
    sources: Option<&Path>,
    output: &str,
) -> Result<()> {
    let mode: SymbolizeMode = mode.parse()?;
    let sources: MappingSources = match sources {
        Some(path) => {
            let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_slice(&data).with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => MappingSources::new(),
    };

    let (mut profile, resolved) = options.fetcher.fetch(src, Duration::ZERO, Duration::ZERO)?;
    info!("Symbolizing {resolved} with mode {mode}");

    let result = options.symbolizer.symbolize(&mode, &sources, &mut profile);

    // partial results are still worth writing
    let mut out = options.writer.open(output).with_context(|| format!("Failed to open {output}"))?;
    write_profile(&mut out, &profile)?;

    match result {
        Ok(report) => {
            if !report.is_complete() {
                options.ui.print(&format!("warning: {report}"));
            }
            Ok(())
        }
        Err(partial) => Err(partial.into()),
    }
}

fn symbols(options: &Options, file: &str, regex: Option<&str>, addr: Option<u64>) -> Result<()> {
    let regex = regex.map(Regex::new).transpose().context("Invalid symbol regex")?;
    let mut image = options.obj.open(file, 0, 0, 0)?;
    let found = image.symbols(regex.as_ref(), addr)?;
    for sym in &found {
        let names: Vec<String> = sym.names.iter().map(|n| Demangle::Simple.apply(n)).collect();
        println!("{:016x} {:016x} {}", sym.start, sym.end, names.join(" "));
    }
    image.close()?;
    info!("{} symbol(s)", found.len());
    Ok(())
}

fn lines(options: &Options, file: &str, addrs: &[u64]) -> Result<()> {
    let mut image = options.obj.open(file, 0, 0, 0)?;
    for &addr in addrs {
        let frames = image.source_line(addr)?;
        println!("0x{addr:x}");
        if frames.is_empty() {
            println!("    ??");
        }
        for frame in frames {
            println!("    {} {}:{}", Demangle::Simple.apply(&frame.function), frame.file, frame.line);
        }
    }
    image.close()?;
    Ok(())
}

fn disasm(options: &Options, file: &str, start: u64, end: u64) -> Result<()> {
    let insts = options.obj.disasm(file, start, end)?;
    let mut function = None;
    let mut location = None;
    for inst in &insts {
        if function != Some(&inst.function) {
            println!("{}:", if inst.function.is_empty() { "??" } else { inst.function.as_str() });
            function = Some(&inst.function);
            location = None;
        }
        if !inst.file.is_empty() && location != Some((&inst.file, inst.line)) {
            println!("  ; {}:{}", inst.file, inst.line);
            location = Some((&inst.file, inst.line));
        }
        println!("  {:>12x}:  {}", inst.addr, inst.text);
    }
    Ok(())
}
