//! Image cache
//!
//! Every sampled address of a mapping is looked up against the same binary,
//! so each image is opened once per `(identity, start, limit, offset)` and
//! shared. The same file mapped at two addresses gets two entries because
//! its base address differs.
//!
//! Entries are reference counted. The image is released when the last
//! [`ImageHandle`] is gone and the cache has let go of the entry, either via
//! [`ImageCache::release`] or by being dropped, so an error path can never
//! skip the release. Failed opens are cached as well and handed back to
//! every later request for the same key.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::domain::OpenError;
use crate::plugin::{ObjFile, ObjTool};
use crate::profile::Mapping;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageKey {
    /// Build id when known, file path otherwise
    pub identity: String,
    pub start: u64,
    pub limit: u64,
    pub offset: u64,
}

impl ImageKey {
    #[must_use]
    pub fn for_mapping(mapping: &Mapping) -> Self {
        Self {
            identity: mapping.identity().to_string(),
            start: mapping.start,
            limit: mapping.limit,
            offset: mapping.offset,
        }
    }

    /// The whole file, addressed in its own virtual address space.
    #[must_use]
    pub fn for_file(file: &str) -> Self {
        Self { identity: file.to_string(), start: 0, limit: 0, offset: 0 }
    }
}

/// What to open for a key: candidate files in order of preference, and the
/// build id the file must carry, if any.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    pub key: ImageKey,
    pub candidates: Vec<String>,
    pub expected_build_id: Option<String>,
}

impl ImageRequest {
    #[must_use]
    pub fn for_file(file: &str) -> Self {
        Self { key: ImageKey::for_file(file), candidates: vec![file.to_string()], expected_build_id: None }
    }
}

struct CachedImage {
    name: String,
    base: u64,
    build_id: String,
    image: Mutex<Box<dyn ObjFile>>,
}

impl Drop for CachedImage {
    fn drop(&mut self) {
        debug!("Releasing cached image {}", self.name);
        if let Err(e) = self.image.get_mut().close() {
            warn!("Failed to release {}: {e}", self.name);
        }
    }
}

/// Shared access to a cached image. Cloning is cheap.
#[derive(Clone)]
pub struct ImageHandle(Arc<CachedImage>);

impl ImageHandle {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[must_use]
    pub fn base(&self) -> u64 {
        self.0.base
    }

    #[must_use]
    pub fn build_id(&self) -> &str {
        &self.0.build_id
    }

    /// Run `f` with exclusive access to the image.
    pub fn with<R>(&self, f: impl FnOnce(&dyn ObjFile) -> R) -> R {
        let image = self.0.image.lock();
        f(image.as_ref())
    }
}

type Slot = OnceCell<Result<ImageHandle, OpenError>>;

#[derive(Default)]
pub struct ImageCache {
    entries: Mutex<HashMap<ImageKey, Arc<Slot>>>,
}

impl ImageCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached image for `request.key`, opening it with `tool` on first
    /// use. Concurrent callers asking for the same key wait for one open;
    /// different keys open in parallel.
    ///
    /// # Errors
    /// Returns the (cached) open error if no candidate could be opened
    pub fn get_or_open(&self, tool: &dyn ObjTool, request: &ImageRequest) -> Result<ImageHandle, OpenError> {
        let slot = {
            let mut entries = self.entries.lock();
            Arc::clone(entries.entry(request.key.clone()).or_default())
        };
        slot.get_or_init(|| open_first(tool, request)).clone()
    }

    /// Drop the cache's reference to `key`. The image is released once no
    /// handle to it remains.
    pub fn release(&self, key: &ImageKey) {
        self.entries.lock().remove(key);
    }

    /// Number of keys with an entry, including cached failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn open_first(tool: &dyn ObjTool, request: &ImageRequest) -> Result<ImageHandle, OpenError> {
    let key = &request.key;
    let mut last_err = OpenError::NoCandidates(key.identity.clone());

    for path in &request.candidates {
        let mut image = match tool.open(path, key.start, key.limit, key.offset) {
            Ok(image) => image,
            Err(e) => {
                debug!("Cannot open {path}: {e}");
                last_err = e;
                continue;
            }
        };

        if let Some(expected) = request.expected_build_id.as_deref() {
            if let Err(e) = check_build_id(image.as_ref(), expected) {
                debug!("Rejecting {path}: {e}");
                // nothing else references this image yet
                let _ = image.close();
                last_err = e;
                continue;
            }
        }

        debug!("Cached {path} as {} [0x{:x}, 0x{:x}) @0x{:x}", key.identity, key.start, key.limit, key.offset);
        return Ok(ImageHandle(Arc::new(CachedImage {
            name: image.name().to_string(),
            base: image.base(),
            build_id: image.build_id().to_string(),
            image: Mutex::new(image),
        })));
    }

    warn!("No usable image for {}: {last_err}", key.identity);
    Err(last_err)
}

fn check_build_id(image: &dyn ObjFile, expected: &str) -> Result<(), OpenError> {
    let found = image.build_id();
    if found.is_empty() {
        Err(OpenError::MissingBuildId { path: image.name().to_string(), expected: expected.to_string() })
    } else if !found.eq_ignore_ascii_case(expected) {
        Err(OpenError::BuildIdMismatch {
            path: image.name().to_string(),
            expected: expected.to_string(),
            found: found.to_string(),
        })
    } else {
        Ok(())
    }
}
