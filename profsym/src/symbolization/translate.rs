//! Address translation for merged profiles
//!
//! When raw profiles are merged, addresses from each source may be shifted;
//! the shift is recorded per source in [`MappingSources`]. Undoing it gives
//! the address to look up in the image.

use std::borrow::Cow;

use crate::domain::{MappingSource, MappingSources};
use crate::profile::Mapping;

#[must_use]
pub fn translate(raw: u64, source: &MappingSource) -> u64 {
    raw.wrapping_add_signed(source.delta)
}

/// Sources of `mapping`, looked up by build id first and file path second.
/// A mapping nobody recorded sources for has a single implicit source with
/// no delta.
#[must_use]
pub fn sources_for<'a>(sources: &'a MappingSources, mapping: &Mapping) -> Cow<'a, [MappingSource]> {
    let found = [mapping.build_id.as_str(), mapping.file.as_str()]
        .into_iter()
        .filter(|key| !key.is_empty())
        .find_map(|key| sources.get(key).filter(|list| !list.is_empty()));
    match found {
        Some(list) => Cow::Borrowed(list.as_slice()),
        None => Cow::Owned(vec![MappingSource::new(String::new(), 0)]),
    }
}
