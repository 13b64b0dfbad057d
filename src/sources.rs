pub mod details;
pub mod ranking;
pub mod resolve;
pub mod search;

pub use details::{extract_city_details, fetch_city_details};
pub use ranking::{fetch_top_cities, parse_ranking_table};
pub use resolve::{resolve_city, select_candidate};
pub use search::{extract_search_results, fetch_search_results};

use crate::error::ScrapeError;
use reqwest::{Client, Url, header};
use scraper::ElementRef;
use serde::Serialize;
use serde_json::Value;

pub const PROVIDER_ORIGIN: &str = "https://www.iqair.com";
pub const RANKING_URL: &str = "https://www.iqair.com/world-air-quality-ranking";
pub const SEARCH_URL: &str = "https://www.iqair.com/search";

/// Concentration unit reported when the page carries a value whose
/// unit text cannot be recognized.
pub const DEFAULT_UNIT: &str = "µg/m³";

const SEARCH_ACCEPT: &str = "application/json";
const SEARCH_CLIENT_TAG: &str = "aqirank-cli";

/// One row of the world ranking. `rank` is 0 when the record came out
/// of a search rather than the ranking listing.
#[derive(Debug, Clone, Serialize)]
pub struct CityRanking {
    pub rank: u32,
    pub city: String,
    pub country_slug: String,
    pub aqi: u32,
    pub url: String,
}

/// A candidate record reconstructed from the search payload. Numeric
/// fields default to zero when the windowed scan finds nothing nearby.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub name: String,
    pub state: String,
    pub country: String,
    pub url: String,
    pub aqi: u32,
    pub estimated: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub followers_count: u64,
}

impl SearchResult {
    /// Repackages a search hit in the ranking shape used by the detail
    /// pipeline. Search hits carry no rank, so it is reported as 0.
    pub fn to_ranking(&self) -> CityRanking {
        CityRanking {
            rank: 0,
            city: self.name.clone(),
            country_slug: slugify(&self.country),
            aqi: self.aqi,
            url: absolutize(&self.url),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Pollutant {
    pub name: String,
    pub description: String,
    pub value: f64,
    pub unit: String,
}

/// Full city report: the ranking baseline refreshed with whatever the
/// detail page yielded, plus the level label and pollutant readings.
#[derive(Debug, Clone, Serialize)]
pub struct CityDetails {
    #[serde(flatten)]
    pub ranking: CityRanking,
    pub level: String,
    pub main_pollutant: Option<Pollutant>,
    pub pollutants: Vec<Pollutant>,
}

pub async fn fetch_text(client: &Client, url: &str) -> Result<String, ScrapeError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|source| ScrapeError::Transport {
            url: url.to_string(),
            source,
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Status {
            url: url.to_string(),
            status,
        });
    }
    response
        .text()
        .await
        .map_err(|source| ScrapeError::Transport {
            url: url.to_string(),
            source,
        })
}

/// Queries the search endpoint and returns the raw flat array the
/// provider serializes its router data into. The payload has no
/// schema; reconstruction happens in [`search`].
pub async fn fetch_search_payload(client: &Client, query: &str) -> Result<Vec<Value>, ScrapeError> {
    let response = client
        .get(SEARCH_URL)
        .query(&[("q", query)])
        .header(header::ACCEPT, SEARCH_ACCEPT)
        .header("x-requested-with", SEARCH_CLIENT_TAG)
        .send()
        .await
        .map_err(|source| ScrapeError::Transport {
            url: SEARCH_URL.to_string(),
            source,
        })?;
    let status = response.status();
    if !status.is_success() {
        return Err(ScrapeError::Status {
            url: SEARCH_URL.to_string(),
            status,
        });
    }
    let body = response
        .text()
        .await
        .map_err(|source| ScrapeError::Transport {
            url: SEARCH_URL.to_string(),
            source,
        })?;
    let payload: Value = serde_json::from_str(&body)
        .map_err(|err| ScrapeError::Parse(format!("search payload is not valid JSON: {err}")))?;
    match payload {
        Value::Array(values) => Ok(values),
        other => Err(ScrapeError::Parse(format!(
            "search payload is not a JSON array (got {})",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Joins the trimmed text chunks of an element with single spaces.
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    for chunk in element.text() {
        let trimmed = chunk.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(trimmed);
    }
    out
}

pub fn parse_integer(value: &str) -> Option<u32> {
    value
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>()
        .parse::<u32>()
        .ok()
}

/// Parses a float, accepting a comma as the decimal separator.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let normalized = value.trim().replace(',', ".");
    normalized.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Turns a URL slug into a display string: "new-york" -> "New York".
pub fn capitalize_slug(slug: &str) -> String {
    let mut out = String::with_capacity(slug.len());
    for (idx, word) in slug.split('-').filter(|word| !word.is_empty()).enumerate() {
        if idx > 0 {
            out.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

/// Inverse of [`capitalize_slug`]: "United Arab Emirates" ->
/// "united-arab-emirates".
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    lowered.split_whitespace().collect::<Vec<_>>().join("-")
}

pub fn absolutize(href: &str) -> String {
    if href.is_empty() {
        return PROVIDER_ORIGIN.to_string();
    }
    if href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Ok(base) = Url::parse(PROVIDER_ORIGIN)
        && let Ok(joined) = base.join(href)
    {
        return joined.to_string();
    }
    if href.starts_with('/') {
        format!("{PROVIDER_ORIGIN}{href}")
    } else {
        format!("{PROVIDER_ORIGIN}/{href}")
    }
}

/// Non-empty path segments of a URL or site-relative path, with any
/// scheme, host, query string, and fragment stripped first.
pub fn path_segments(url: &str) -> Vec<&str> {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .map_or(url, |rest| {
            rest.find('/').map_or("", |idx| &rest[idx..])
        });
    let path = without_scheme
        .split(['?', '#'])
        .next()
        .unwrap_or(without_scheme);
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect()
}

pub fn path_depth(url: &str) -> usize {
    path_segments(url).len()
}

/// Country slug of a city link. Ranking links are locale-prefixed
/// (`/us/<country>/<city>`), so the country sits in the second
/// segment.
pub fn country_slug_of(url: &str) -> String {
    path_segments(url)
        .get(1)
        .map_or_else(String::new, |segment| (*segment).to_string())
}
