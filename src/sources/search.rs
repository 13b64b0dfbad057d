use crate::error::ScrapeError;
use crate::sources::{self, SearchResult};
use reqwest::Client;
use rustc_hash::FxHashSet;
use serde_json::Value;

/// How far behind an anchor the scan looks for scalar fields.
pub const SCAN_BACK_WINDOW: usize = 30;
/// How far ahead of an anchor the scan looks for the follower count.
pub const SCAN_AHEAD_WINDOW: usize = 20;

const MIN_ID_LENGTH: usize = 10;
const AQI_UPPER_BOUND: f64 = 600.0;
const FOLLOWERS_LOWER_BOUND: f64 = 100.0;

/// Window sizes for the proximity scan. These are calibration values
/// tuned against observed payloads, not part of any schema.
#[derive(Debug, Clone, Copy)]
pub struct ScanWindows {
    pub back: usize,
    pub ahead: usize,
}

impl Default for ScanWindows {
    fn default() -> Self {
        Self {
            back: SCAN_BACK_WINDOW,
            ahead: SCAN_AHEAD_WINDOW,
        }
    }
}

pub async fn fetch_search_results(
    client: &Client,
    query: &str,
) -> Result<Vec<SearchResult>, ScrapeError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(ScrapeError::InvalidInput(
            "search query is empty".to_string(),
        ));
    }
    let flat = sources::fetch_search_payload(client, trimmed).await?;
    let mut results = extract_search_results(&flat);
    for result in &mut results {
        result.url = sources::absolutize(&result.url);
    }
    Ok(results)
}

pub fn extract_search_results(flat: &[Value]) -> Vec<SearchResult> {
    extract_with_windows(flat, ScanWindows::default())
}

/// Reconstructs search-result records from the provider's serialized
/// router data: a single flat array of primitives where structure is
/// positional, not nested.
///
/// Every string token shaped like a 2- or 3-segment city path becomes
/// one record; scalar fields are recovered from nearby array entries.
/// A record whose windows turn up nothing keeps zeroed numeric fields
/// rather than being discarded.
pub fn extract_with_windows(flat: &[Value], windows: ScanWindows) -> Vec<SearchResult> {
    let mut seen_paths: FxHashSet<String> = FxHashSet::default();
    let mut consumed_ids: FxHashSet<usize> = FxHashSet::default();
    let mut results = Vec::new();

    for (idx, value) in flat.iter().enumerate() {
        let Some(token) = value.as_str() else {
            continue;
        };
        let Some(path) = city_path(token) else {
            continue;
        };
        if !seen_paths.insert(path.clone()) {
            continue;
        }

        let mut result = result_from_path(&path);
        scan_backward(flat, idx, windows.back, &mut consumed_ids, &mut result);
        scan_forward(flat, idx, windows.ahead, &mut result);
        results.push(result);
    }

    // Specific city paths (3 segments) ahead of broader region paths,
    // ties broken by follower count descending. sort_by is stable, so
    // payload order survives within equal keys.
    results.sort_by(|a, b| {
        let specificity = |r: &SearchResult| usize::from(sources::path_depth(&r.url) != 3);
        specificity(a)
            .cmp(&specificity(b))
            .then_with(|| b.followers_count.cmp(&a.followers_count))
    });
    results
}

/// Accepts slug paths of 2-3 segments and normalizes them to a
/// leading-slash form. Tokens with a "." are file-like chunk names,
/// not city paths.
fn city_path(token: &str) -> Option<String> {
    if token.contains('.') {
        return None;
    }
    let trimmed = token.trim_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    let segments: Vec<&str> = trimmed.split('/').collect();
    if !(2..=3).contains(&segments.len()) {
        return None;
    }
    if segments.iter().any(|segment| !is_slug(segment)) {
        return None;
    }
    Some(format!("/{trimmed}"))
}

fn is_slug(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
}

fn result_from_path(path: &str) -> SearchResult {
    let segments = sources::path_segments(path);
    let (name, state, country) = match segments.as_slice() {
        [country, state, city] => (
            sources::capitalize_slug(city),
            sources::capitalize_slug(state),
            sources::capitalize_slug(country),
        ),
        [country, city] => (
            sources::capitalize_slug(city),
            String::new(),
            sources::capitalize_slug(country),
        ),
        _ => (String::new(), String::new(), String::new()),
    };
    SearchResult {
        id: String::new(),
        name,
        state,
        country,
        url: path.to_string(),
        aqi: 0,
        estimated: false,
        latitude: 0.0,
        longitude: 0.0,
        followers_count: 0,
    }
}

fn scan_backward(
    flat: &[Value],
    anchor: usize,
    window: usize,
    consumed_ids: &mut FxHashSet<usize>,
    result: &mut SearchResult,
) {
    let start = anchor.saturating_sub(window);

    // Nearest unconsumed long alphanumeric token is the record id.
    for idx in (start..anchor).rev() {
        if consumed_ids.contains(&idx) {
            continue;
        }
        if let Some(token) = flat[idx].as_str()
            && is_identifier(token)
        {
            consumed_ids.insert(idx);
            result.id = token.to_string();
            break;
        }
    }

    // Nearest in-range number immediately followed by a boolean is
    // the {aqi, estimated} pair.
    for idx in (start..anchor).rev() {
        if let Some(number) = flat[idx].as_f64()
            && number > 0.0
            && number < AQI_UPPER_BOUND
            && let Some(estimated) = flat.get(idx + 1).and_then(Value::as_bool)
        {
            result.aqi = number.round() as u32;
            result.estimated = estimated;
            break;
        }
    }

    // Nearest adjacent number pair that reads as coordinates. The
    // |latitude| > 1 floor keeps tiny ratio values out.
    for idx in (start..anchor.saturating_sub(1)).rev() {
        if let Some(latitude) = flat[idx].as_f64()
            && latitude > -90.0
            && latitude < 90.0
            && latitude.abs() > 1.0
            && let Some(longitude) = flat.get(idx + 1).and_then(Value::as_f64)
            && longitude > -180.0
            && longitude < 180.0
        {
            result.latitude = latitude;
            result.longitude = longitude;
            break;
        }
    }
}

fn scan_forward(flat: &[Value], anchor: usize, window: usize, result: &mut SearchResult) {
    let end = flat.len().min(anchor + window + 1);
    for entry in &flat[anchor + 1..end] {
        if let Some(number) = entry.as_f64()
            && number > FOLLOWERS_LOWER_BOUND
        {
            result.followers_count = number as u64;
            break;
        }
    }
}

fn is_identifier(token: &str) -> bool {
    token.len() >= MIN_ID_LENGTH && token.chars().all(|ch| ch.is_ascii_alphanumeric())
}
