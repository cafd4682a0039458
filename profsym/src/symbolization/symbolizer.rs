use std::fmt;
use std::panic;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, info, warn};

use super::cache::{ImageCache, ImageKey, ImageRequest};
use super::locate::BinaryLocator;
use super::mode::SymbolizeMode;
use super::translate::{sources_for, translate};
use crate::config::SymbolizerConfig;
use crate::domain::{Frame, MappingSource, MappingSources, PartialError, UnresolvedMapping};
use crate::plugin::{ObjFile, ObjTool, SymbolService, Symbolizer};
use crate::profile::{Line, Mapping, Profile};

/// Outcome of a successful [`Symbolizer::symbolize`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolizeReport {
    /// Mappings whose addresses were looked up
    pub symbolized: Vec<u64>,
    pub unresolved: Vec<UnresolvedMapping>,
    /// Sampled addresses outside every mapping
    pub unmapped: Vec<u64>,
    /// Addresses inside a symbolized mapping that resolved to nothing
    pub missed: usize,
}

impl SymbolizeReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && self.unmapped.is_empty()
    }
}

impl fmt::Display for SymbolizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "symbolized {} mapping(s), {} address(es) without information",
            self.symbolized.len(),
            self.missed
        )?;
        for m in &self.unresolved {
            write!(f, "\n  mapping {} ({}): {}", m.mapping_id, m.identity, m.reason)?;
        }
        if !self.unmapped.is_empty() {
            let addrs: Vec<String> = self.unmapped.iter().map(|a| format!("{a:#x}")).collect();
            write!(f, "\n  no mapping for: {}", addrs.join(", "))?;
        }
        Ok(())
    }
}

/// Addresses of one mapping that need symbols.
struct MappingWork {
    mapping: Mapping,
    /// (location id, address)
    addresses: Vec<(u64, u64)>,
}

/// Frames found for one mapping, or why there are none.
struct MappingOutcome {
    index: usize,
    result: Result<Vec<(u64, Vec<Frame>)>, String>,
}

/// Symbolizes profiles with local binaries, falling back to a remote
/// [`SymbolService`] when one is configured and the mode allows it.
pub struct LocalSymbolizer {
    tool: Arc<dyn ObjTool>,
    locator: BinaryLocator,
    remote: Option<Arc<dyn SymbolService>>,
    jobs: usize,
}

impl LocalSymbolizer {
    #[must_use]
    pub fn new(tool: Arc<dyn ObjTool>, config: &SymbolizerConfig) -> Self {
        Self {
            tool,
            locator: BinaryLocator::new(config.search_paths.clone()),
            remote: None,
            jobs: config.jobs.max(1),
        }
    }

    #[must_use]
    pub fn with_remote(mut self, service: Arc<dyn SymbolService>) -> Self {
        self.remote = Some(service);
        self
    }

    /// Resolve every address of one mapping.
    fn symbolize_mapping(
        &self,
        cache: &ImageCache,
        mode: &SymbolizeMode,
        sources: &[MappingSource],
        work: &MappingWork,
    ) -> Result<Vec<(u64, Vec<Frame>)>, String> {
        let mapping = &work.mapping;
        let mut reason = String::from("local symbolization disabled");

        if mode.local {
            let request = ImageRequest {
                key: ImageKey::for_mapping(mapping),
                candidates: self.locator.candidates(mapping),
                expected_build_id: (mode.strict && !mapping.build_id.is_empty())
                    .then(|| mapping.build_id.clone()),
            };
            match cache.get_or_open(self.tool.as_ref(), &request) {
                Ok(handle) => {
                    let base = handle.base();
                    return Ok(handle.with(|image| {
                        work.addresses
                            .iter()
                            .filter_map(|&(loc, addr)| {
                                resolve_address(image, base, sources, addr).map(|frames| (loc, frames))
                            })
                            .collect()
                    }));
                }
                Err(e) => reason = e.to_string(),
            }
        }

        if mode.remote {
            if let Some(service) = &self.remote {
                return remote_lookup(service.as_ref(), sources, work).map_err(|e| format!("{reason}; remote: {e}"));
            }
        }

        Err(reason)
    }

    fn run(
        &self,
        cache: &ImageCache,
        mode: &SymbolizeMode,
        sources: &MappingSources,
        works: &[MappingWork],
    ) -> Vec<MappingOutcome> {
        let one = |index: usize| {
            let work = &works[index];
            let origins = sources_for(sources, &work.mapping);
            MappingOutcome { index, result: self.symbolize_mapping(cache, mode, &origins, work) }
        };

        let jobs = self.jobs.min(works.len());
        if jobs <= 1 {
            return (0..works.len()).map(one).collect();
        }

        let next = AtomicUsize::new(0);
        let mut outcomes: Vec<MappingOutcome> = thread::scope(|s| {
            let workers: Vec<_> = (0..jobs)
                .map(|_| {
                    s.spawn(|| {
                        let mut done = Vec::new();
                        loop {
                            let index = next.fetch_add(1, Ordering::Relaxed);
                            if index >= works.len() {
                                break done;
                            }
                            done.push(one(index));
                        }
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|w| w.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                .collect()
        });
        outcomes.sort_by_key(|o| o.index);
        outcomes
    }
}

impl Symbolizer for LocalSymbolizer {
    fn symbolize(
        &self,
        mode: &SymbolizeMode,
        sources: &MappingSources,
        profile: &mut Profile,
    ) -> Result<SymbolizeReport, PartialError> {
        let mut report = SymbolizeReport::default();
        if !mode.enabled {
            debug!("Symbolization disabled by mode");
            return Ok(report);
        }

        let works = plan(profile, mode, &mut report.unmapped);
        info!(
            "Symbolizing {} mapping(s) with mode {mode}, {} unmapped address(es)",
            works.len(),
            report.unmapped.len()
        );

        // dropped at the end of the run, releasing every image
        let cache = ImageCache::new();
        let outcomes = self.run(&cache, mode, sources, &works);

        for outcome in outcomes {
            let work = &works[outcome.index];
            let mapping = &work.mapping;
            match outcome.result {
                Ok(resolved) => {
                    report.missed += work.addresses.len() - resolved.len();
                    report.symbolized.push(mapping.id);
                    apply(profile, mapping.id, resolved, mode);
                }
                Err(reason) => {
                    warn!("Cannot symbolize mapping {} ({}): {reason}", mapping.id, mapping.identity());
                    report.unresolved.push(UnresolvedMapping {
                        mapping_id: mapping.id,
                        identity: mapping.identity().to_string(),
                        reason,
                    });
                }
            }
        }

        if report.symbolized.is_empty() && !report.is_complete() {
            return Err(PartialError { unresolved: report.unresolved, unmapped: report.unmapped });
        }
        info!("{report}");
        Ok(report)
    }
}

/// Group locations needing symbols by mapping, in mapping order. Addresses
/// outside every mapping go to `unmapped`.
fn plan(profile: &Profile, mode: &SymbolizeMode, unmapped: &mut Vec<u64>) -> Vec<MappingWork> {
    let mut works: Vec<MappingWork> = profile
        .mappings
        .iter()
        .map(|m| MappingWork { mapping: m.clone(), addresses: Vec::new() })
        .collect();

    for location in &profile.locations {
        let Some(mapping) = profile.mapping_for(location) else {
            unmapped.push(location.address);
            continue;
        };
        if mapping.is_unsymbolizable() || (!mode.force && (mapping.has_functions || !location.lines.is_empty())) {
            continue;
        }
        if let Some(work) = works.iter_mut().find(|w| w.mapping.id == mapping.id) {
            work.addresses.push((location.id, location.address));
        }
    }

    works.retain(|w| !w.addresses.is_empty());
    works
}

/// Frames for `addr`, trying each source's delta in order. Falls back to the
/// enclosing symbol when there is no line information.
fn resolve_address(image: &dyn ObjFile, base: u64, sources: &[MappingSource], addr: u64) -> Option<Vec<Frame>> {
    for source in sources {
        let file_addr = translate(addr, source).wrapping_sub(base);
        match image.source_line(file_addr) {
            Ok(frames) if !frames.is_empty() => return Some(frames),
            Ok(_) => {}
            Err(e) => debug!("{e}"),
        }
        if let Ok(symbols) = image.symbols(None, Some(file_addr)) {
            if let Some(sym) = symbols.first() {
                return Some(vec![Frame::function_only(sym.names[0].clone())]);
            }
        }
    }
    None
}

fn remote_lookup(
    service: &dyn SymbolService,
    sources: &[MappingSource],
    work: &MappingWork,
) -> anyhow::Result<Vec<(u64, Vec<Frame>)>> {
    let mut pending: Vec<(u64, u64)> = work.addresses.clone();
    let mut resolved = Vec::new();

    for source in sources {
        if pending.is_empty() {
            break;
        }
        let queries: Vec<u64> = pending.iter().map(|&(_, addr)| translate(addr, source)).collect();
        let names = service.lookup(&source.origin, &work.mapping, &queries)?;
        pending.retain(|&(loc, addr)| {
            let query = translate(addr, source);
            match names.iter().find(|(a, _)| *a == query) {
                Some((_, name)) => {
                    resolved.push((loc, vec![Frame::function_only(name.clone())]));
                    false
                }
                None => true,
            }
        });
    }
    Ok(resolved)
}

/// Write resolved frames into the profile and update the mapping's flags.
/// Locations without a result keep whatever lines they already had.
fn apply(profile: &mut Profile, mapping_id: u64, resolved: Vec<(u64, Vec<Frame>)>, mode: &SymbolizeMode) {
    let (mut filenames, mut line_numbers, mut inline_frames) = (false, false, false);

    for (loc, frames) in resolved {
        let lines: Vec<Line> = frames
            .iter()
            .map(|frame| {
                let name = mode.demangle.apply(&frame.function);
                Line {
                    function_id: profile.intern_function(&name, &frame.function, &frame.file, 0),
                    line: frame.line,
                }
            })
            .collect();
        filenames |= frames.iter().any(|f| !f.file.is_empty());
        line_numbers |= frames.iter().any(|f| f.line != 0);
        inline_frames |= frames.len() > 1;
        if let Some(location) = profile.location_mut(loc) {
            location.lines = lines;
        }
    }

    if let Some(mapping) = profile.mapping_mut(mapping_id) {
        mapping.has_functions = true;
        mapping.has_filenames |= filenames;
        mapping.has_line_numbers |= line_numbers;
        mapping.has_inline_frames |= inline_frames;
    }
}
