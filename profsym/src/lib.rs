//! # profsym - Symbolization Backends for a Profiling Driver
//!
//! profsym is the backend side of a pprof-style profiling driver: the code
//! that turns sampled addresses into function names, source files and line
//! numbers, lists the symbols of a binary, and disassembles address ranges.
//! The driver only sees the capability traits in [`plugin`], so it works the
//! same whether binaries come from local disk, an in-memory fixture or a
//! remote symbol service.
//!
//! ## Architecture Overview
//!
//! ```text
//!   Profile + MappingSources
//!            │
//!            ▼
//!   ┌──────────────────┐     ┌──────────────┐     ┌──────────────┐
//!   │ LocalSymbolizer  │────▶│  ImageCache  │────▶│   ObjTool    │
//!   │  (per mapping,   │     │ (one image   │     │ (ELF/memory) │
//!   │   concurrent)    │     │  per key)    │     └──────┬───────┘
//!   └────────┬─────────┘     └──────▲───────┘            │ open
//!            │ translate            │                    ▼
//!            │ + sourceLine         │             ┌──────────────┐
//!            ▼                      │             │   ObjFile    │
//!   frames written back             │             │ line/symbol  │
//!   into the profile                │             │   tables     │
//!                           ┌───────┴──────┐      └──────────────┘
//!                           │ Disassembler │
//!                           │  (objdump)   │
//!                           └──────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`plugin`]: capability traits (`Writer`, `Fetcher`, `Symbolizer`,
//!   `ObjTool`, `ObjFile`, `Ui`, `SymbolService`) and local implementations
//! - [`symbolization`]: the orchestrator, image cache, address translation,
//!   binary lookup and the ELF and in-memory image backends
//! - [`disasm`]: gap-free, source-annotated instruction listings
//! - [`profile`]: the profile model symbolization writes into
//! - [`domain`]: value types (frames, symbols, instructions) and errors
//! - [`config`]: search paths, objdump location, concurrency
//! - [`cli`]: argument definitions for the `profsym` binary

pub mod cli;
pub mod config;
pub mod disasm;
pub mod domain;
pub mod plugin;
pub mod profile;
pub mod symbolization;
