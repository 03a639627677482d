use serde::ser::{Serialize, SerializeMap, Serializer};
use tracing::{debug, warn};

use crate::style::catalog::{PlatformCatalog, PlatformKey};
use crate::utils::text::truncate_for_log;

const RAW_PREFIX_LOG_LIMIT: usize = 500;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error("no platform sections recognized in model response ({raw_chars} chars)")]
    Unparseable { raw_chars: usize },
}

/// Where one platform label was found in the raw response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelPosition<'a> {
    pub platform: &'a PlatformKey,
    pub offset: usize,
    pub label: &'a str,
}

impl LabelPosition<'_> {
    fn end(&self) -> usize {
        self.offset + self.label.len()
    }
}

/// One prompt per catalog platform, kept in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPrompts {
    entries: Vec<(PlatformKey, String)>,
}

impl PlatformPrompts {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(platform, _)| platform.as_str() == key)
            .map(|(_, prompt)| prompt.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PlatformKey, &str)> {
        self.entries
            .iter()
            .map(|(platform, prompt)| (platform, prompt.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for PlatformPrompts {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (platform, prompt) in &self.entries {
            map.serialize_entry(platform.as_str(), prompt)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone)]
pub struct Segmentation {
    pub prompts: PlatformPrompts,
    /// Platforms whose section was extracted, in response order.
    pub matched: Vec<PlatformKey>,
    pub backfilled: Vec<PlatformKey>,
}

impl Segmentation {
    pub fn is_complete(&self) -> bool {
        self.backfilled.is_empty()
    }
}

fn collect_occurrences<'a>(raw: &str, catalog: &'a PlatformCatalog) -> Vec<LabelPosition<'a>> {
    let mut occurrences = Vec::new();
    for platform in &catalog.platforms {
        for label in platform.accepted_labels() {
            for (offset, _) in raw.match_indices(label) {
                occurrences.push(LabelPosition {
                    platform: &platform.key,
                    offset,
                    label,
                });
            }
        }
    }
    occurrences
}

/// True when `inner` sits inside a longer label that belongs to another
/// platform, e.g. `IMAGE:` inside `GPT_IMAGE:`.
fn is_shadowed(inner: &LabelPosition<'_>, all: &[LabelPosition<'_>]) -> bool {
    all.iter().any(|outer| {
        outer.platform != inner.platform
            && outer.label.len() > inner.label.len()
            && outer.offset <= inner.offset
            && inner.end() <= outer.end()
    })
}

/// Earliest surviving label per platform, in response order. Ties at one
/// offset go to the longest variant. A label that starts before the previous
/// kept label ends is skipped, so kept labels never overlap.
pub fn locate_labels<'a>(raw: &str, catalog: &'a PlatformCatalog) -> Vec<LabelPosition<'a>> {
    let occurrences = collect_occurrences(raw, catalog);

    let mut candidates: Vec<&LabelPosition<'a>> = occurrences
        .iter()
        .filter(|position| !is_shadowed(position, &occurrences))
        .collect();
    candidates.sort_by(|a, b| {
        a.offset
            .cmp(&b.offset)
            .then_with(|| b.label.len().cmp(&a.label.len()))
    });

    let mut located: Vec<LabelPosition<'a>> = Vec::new();
    let mut kept_end = 0;
    for position in candidates {
        if located.iter().any(|kept| kept.platform == position.platform) {
            continue;
        }
        if position.offset < kept_end {
            debug!(
                "Skipping label {:?} at {} overlapping previous label",
                position.label, position.offset
            );
            continue;
        }
        kept_end = position.end();
        located.push(position.clone());
    }
    located
}

/// Splits a raw model response into one prompt per catalog platform.
///
/// Sections are cut at each platform's first label, so the order of labels
/// in the response does not matter. Platforms whose section is missing or
/// empty are backfilled with the first extracted prompt. Fails only when no
/// section at all can be extracted.
pub fn segment_response(raw: &str, catalog: &PlatformCatalog) -> Result<Segmentation, SegmentError> {
    let positions = locate_labels(raw, catalog);

    let mut extracted: Vec<(PlatformKey, String)> = Vec::new();
    for (index, position) in positions.iter().enumerate() {
        let end = positions
            .get(index + 1)
            .map(|next| next.offset)
            .unwrap_or(raw.len());
        let content = raw[position.end().min(end)..end].trim();
        if content.is_empty() {
            debug!("Empty section for platform {}", position.platform);
            continue;
        }
        extracted.push((position.platform.clone(), content.to_string()));
    }

    if extracted.is_empty() {
        warn!(
            "No platform sections recognized; raw_prefix={:?}",
            truncate_for_log(raw, RAW_PREFIX_LOG_LIMIT)
        );
        return Err(SegmentError::Unparseable {
            raw_chars: raw.chars().count(),
        });
    }

    let fallback = extracted
        .first()
        .map(|(_, prompt)| prompt.clone())
        .unwrap_or_else(|| catalog.fallback_text.clone());

    let mut entries = Vec::with_capacity(catalog.len());
    let mut backfilled = Vec::new();
    for platform in &catalog.platforms {
        match extracted.iter().find(|(key, _)| key == &platform.key) {
            Some((_, prompt)) => entries.push((platform.key.clone(), prompt.clone())),
            None => {
                backfilled.push(platform.key.clone());
                entries.push((platform.key.clone(), fallback.clone()));
            }
        }
    }

    let matched: Vec<PlatformKey> = extracted.into_iter().map(|(key, _)| key).collect();
    if !backfilled.is_empty() {
        warn!(
            "Partial style extraction: found={:?} missing={:?} raw_prefix={:?}",
            matched.iter().map(|key| key.as_str()).collect::<Vec<_>>(),
            backfilled.iter().map(|key| key.as_str()).collect::<Vec<_>>(),
            truncate_for_log(raw, RAW_PREFIX_LOG_LIMIT)
        );
    }

    Ok(Segmentation {
        prompts: PlatformPrompts { entries },
        matched,
        backfilled,
    })
}
