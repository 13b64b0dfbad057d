use crate::error::ScrapeError;
use crate::sources::{self, CityRanking};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

// The ranking table is found by its visible header text, not by class
// names or position, so cosmetic markup changes don't break it.
const CITY_HEADER_MARKER: &str = "Cities";
const AQI_HEADER_MARKER: &str = "AQI";

pub async fn fetch_top_cities(
    client: &Client,
    limit: usize,
) -> Result<Vec<CityRanking>, ScrapeError> {
    if limit == 0 {
        return Err(ScrapeError::InvalidInput(
            "ranking limit must be at least 1".to_string(),
        ));
    }
    let body = sources::fetch_text(client, sources::RANKING_URL).await?;
    parse_ranking_table(&body, limit)
}

/// Pulls up to `limit` city rows out of the world-ranking page.
///
/// Row order is preserved as encountered; the provider already sorts
/// by AQI descending and the parser trusts that. Rows with an empty
/// city name or an unparsable AQI are skipped.
pub fn parse_ranking_table(html: &str, limit: usize) -> Result<Vec<CityRanking>, ScrapeError> {
    if limit == 0 {
        return Err(ScrapeError::InvalidInput(
            "ranking limit must be at least 1".to_string(),
        ));
    }

    let document = Html::parse_document(html);
    let table_selector = Selector::parse("table").expect("valid selector");
    let table = document
        .select(&table_selector)
        .find(|table| is_ranking_table(*table))
        .ok_or_else(|| {
            ScrapeError::Parse(format!(
                "ranking page contains no table with {CITY_HEADER_MARKER:?}/{AQI_HEADER_MARKER:?} headers"
            ))
        })?;

    let mut records = Vec::new();
    for (idx, row) in body_rows(table).into_iter().take(limit).enumerate() {
        let fallback_rank = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        if let Some(record) = row_to_record(row, fallback_rank) {
            records.push(record);
        }
    }

    if records.is_empty() {
        return Err(ScrapeError::Parse(
            "ranking table matched but yielded no usable rows".to_string(),
        ));
    }
    Ok(records)
}

fn is_ranking_table(table: ElementRef<'_>) -> bool {
    let headers = header_cells(table);
    headers.len() >= 3
        && headers[1].contains(CITY_HEADER_MARKER)
        && headers[2].contains(AQI_HEADER_MARKER)
}

fn header_cells(table: ElementRef<'_>) -> Vec<String> {
    let head_row_selector = Selector::parse("thead tr").expect("valid selector");
    let row_selector = Selector::parse("tr").expect("valid selector");
    let cell_selector = Selector::parse("th, td").expect("valid selector");
    let head_row = table
        .select(&head_row_selector)
        .next()
        .or_else(|| table.select(&row_selector).next());
    head_row.map_or_else(Vec::new, |row| {
        row.select(&cell_selector)
            .map(sources::element_text)
            .collect()
    })
}

fn body_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    let body_selector = Selector::parse("tbody tr").expect("valid selector");
    let row_selector = Selector::parse("tr").expect("valid selector");
    let rows: Vec<ElementRef<'_>> = table.select(&body_selector).collect();
    if rows.is_empty() {
        // No tbody: treat the first row as the header.
        table.select(&row_selector).skip(1).collect()
    } else {
        rows
    }
}

fn row_to_record(row: ElementRef<'_>, fallback_rank: u32) -> Option<CityRanking> {
    let th_selector = Selector::parse("th").expect("valid selector");
    let cell_selector = Selector::parse("td").expect("valid selector");
    let anchor_selector = Selector::parse("a").expect("valid selector");

    let cells: Vec<ElementRef<'_>> = row.select(&cell_selector).collect();
    let city = cells
        .first()
        .map(|cell| sources::element_text(*cell))
        .unwrap_or_default();
    if city.is_empty() {
        return None;
    }
    let aqi = cells
        .get(1)
        .and_then(|cell| sources::parse_integer(&sources::element_text(*cell)))?;

    let rank = row
        .select(&th_selector)
        .next()
        .and_then(|cell| sources::parse_integer(&sources::element_text(cell)))
        .unwrap_or(fallback_rank);

    let url = row
        .select(&anchor_selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .last()
        .map_or_else(|| sources::PROVIDER_ORIGIN.to_string(), sources::absolutize);

    Some(CityRanking {
        rank,
        city,
        country_slug: sources::country_slug_of(&url),
        aqi,
        url,
    })
}
