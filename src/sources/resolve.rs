use crate::error::ScrapeError;
use crate::sources::{self, CityRanking, SearchResult, search};
use reqwest::Client;

const PLACE_SUFFIXES: [&str; 2] = [" city", " town"];

/// Maps a free-form city name onto a provider record, tolerating the
/// usual ways people type city names: wrong case, partial names, or a
/// trailing "city"/"town" the provider's slug drops.
///
/// Returns `Ok(None)` when the search itself came back empty.
pub async fn resolve_city(
    client: &Client,
    name: &str,
) -> Result<Option<CityRanking>, ScrapeError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ScrapeError::InvalidInput("city name is empty".to_string()));
    }
    let query = trimmed.to_lowercase();
    let results = search::fetch_search_results(client, &query).await?;
    Ok(select_candidate(&results, &query).map(SearchResult::to_ranking))
}

/// Picks the best candidate for a query, preferring exact name matches
/// over substring ones and specific city paths over region paths at
/// every rung. Falls back to the top-ranked candidate when nothing
/// matches by name.
pub fn select_candidate<'a>(
    results: &'a [SearchResult],
    query: &str,
) -> Option<&'a SearchResult> {
    if results.is_empty() {
        return None;
    }
    let query = query.trim().to_lowercase();

    let exact = |r: &SearchResult| r.name.to_lowercase() == query;
    let name_in_query = |r: &SearchResult| {
        let name = r.name.to_lowercase();
        !name.is_empty() && query.contains(name.as_str())
    };
    let query_in_name = |r: &SearchResult| r.name.to_lowercase().contains(query.as_str());

    first_match(results, &exact)
        .or_else(|| first_match(results, &query_in_name))
        .or_else(|| first_match(results, &name_in_query))
        .or_else(|| suffixless_match(results, &query))
        .or_else(|| results.first())
}

/// One rung pair: specific (3-segment) candidates first, then any.
fn first_match<'a>(
    results: &'a [SearchResult],
    matches: &dyn Fn(&SearchResult) -> bool,
) -> Option<&'a SearchResult> {
    results
        .iter()
        .find(|r| matches(r) && sources::path_depth(&r.url) == 3)
        .or_else(|| results.iter().find(|r| matches(r)))
}

/// Queries like "salt lake city" often correspond to a slug without
/// the suffix. Retry the containment rung with it stripped.
fn suffixless_match<'a>(
    results: &'a [SearchResult],
    query: &str,
) -> Option<&'a SearchResult> {
    let stripped = strip_place_suffix(query)?;
    let name_in_stripped = |r: &SearchResult| {
        let name = r.name.to_lowercase();
        !name.is_empty() && stripped.contains(name.as_str())
    };
    first_match(results, &name_in_stripped)
}

fn strip_place_suffix(query: &str) -> Option<String> {
    PLACE_SUFFIXES.iter().find_map(|suffix| {
        query
            .strip_suffix(suffix)
            .map(str::trim_end)
            .filter(|stripped| !stripped.is_empty())
            .map(str::to_string)
    })
}
