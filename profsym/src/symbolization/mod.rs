//! # Symbol Resolution and Address Translation
//!
//! This module turns raw sampled addresses into source-level frames. A
//! profile records, for every binary loaded in the profiled process, a
//! **mapping**: the address range it occupied, the file offset it was mapped
//! from, and its path and/or build id. Symbolizing an address means finding
//! its mapping, opening that binary, translating the runtime address into
//! the binary's own address space, and asking its line table which
//! function, file and line the address belongs to.
//!
//! ## Address Translation Flow
//!
//! ```text
//! 1. Sampled address          0x7f3a_1c2d_5123
//!
//! 2. Mapping containing it    libfoo.so [0x7f3a_1c2d_5000, 0x7f3a_1c2e_0000) @0x1000
//!
//! 3. Merge delta of source    + 0            (MappingSources, tried in order)
//!
//! 4. Minus image base         - 0x7f3a_1c2d_4000
//!                             = 0x1123       (virtual address in libfoo.so)
//!
//! 5. Line table               0x1123 -> [inner() foo.c:12, outer() foo.c:40]
//!                                        leaf first, one frame per inlined call
//! ```
//!
//! The base comes from the loadable segment backing the mapping's file
//! offset, so PIE executables and shared libraries at randomized addresses
//! resolve the same way as fixed-address executables.
//!
//! ## Module Structure
//!
//! - **`symbolizer`**: the orchestrator; plans work per mapping, runs
//!   mappings concurrently and writes frames back into the profile
//! - **`cache`**: one open image per (identity, mapping bounds)
//! - **`translate`**: merge deltas per profile source
//! - **`locate`**: candidate files for a mapping, by build id first
//! - **`elf`**: ELF backend (`object` + `addr2line`)
//! - **`memory`**: in-memory backend
//! - **`mode`**: parsing of mode strings such as `local:force`
//!
//! ## Example
//!
//! ```rust,ignore
//! let config = SymbolizerConfig::from_env();
//! let tool: Arc<dyn ObjTool> = Arc::new(LocalObjTool::new(&config));
//! let symbolizer = LocalSymbolizer::new(tool, &config);
//!
//! let mode: SymbolizeMode = "local".parse()?;
//! let report = symbolizer.symbolize(&mode, &MappingSources::new(), &mut profile)?;
//! ```

pub mod cache;
pub mod elf;
pub mod image;
pub mod locate;
pub mod memory;
pub mod mode;
pub mod symbolizer;
pub mod translate;

pub use cache::{ImageCache, ImageHandle, ImageKey, ImageRequest};
pub use elf::{ElfImage, LocalObjTool};
pub use locate::BinaryLocator;
pub use memory::{MemoryImage, MemoryObjTool};
pub use mode::{Demangle, SymbolizeMode};
pub use symbolizer::{LocalSymbolizer, SymbolizeReport};
pub use translate::{sources_for, translate};
