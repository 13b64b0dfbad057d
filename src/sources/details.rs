use crate::error::ScrapeError;
use crate::sources::{self, CityDetails, CityRanking, Pollutant, ranking, resolve};
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

// The detail page wraps its live readings in a card whose class list
// carries one of these fragments across theme variants.
const CONTAINER_MARKERS: [&str; 2] = ["aqi-shadow", "aqi-bg"];

const LEVEL_VOCABULARY: [&str; 5] = ["good", "moderate", "unhealthy", "hazardous", "sensitive"];
const MAIN_POLLUTANT_LABEL: &str = "Main pollutant";
const POLLUTANT_TABLE_TITLE: &str = "Pollutants concentration";
const KNOWN_POLLUTANTS: [&str; 6] = ["PM2.5", "PM10", "O3", "NO2", "SO2", "CO"];
const KNOWN_UNITS: [&str; 6] = ["µg/m³", "ug/m3", "mg/m³", "mg/m3", "ppm", "ppb"];

const MAX_PLAUSIBLE_AQI: u32 = 500;
const AQI_LABEL: &str = "AQI";
const AQI_NEIGHBOR_RADIUS: usize = 2;
const SHORT_TEXT_MAX: usize = 20;
const LEVEL_TEXT_MAX: usize = 40;
const UNIT_TEXT_MAX: usize = 8;

static AQI_SWEEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"AQI[:\s]*(\d{1,3})").expect("valid regex"));
static MEASUREMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    let units = KNOWN_UNITS.join("|");
    Regex::new(&format!(r"(\d+(?:[.,]\d+)?)\s*({units})")).expect("valid regex")
});

/// Resolves a city and extracts its full report. With no name, the
/// configured default city is used; with neither, the current
/// top-ranked city of the world listing.
pub async fn fetch_city_details(
    client: &Client,
    name: Option<&str>,
    default_city: Option<&str>,
) -> Result<CityDetails, ScrapeError> {
    let baseline = match requested_name(name, default_city) {
        Some(query) => resolve::resolve_city(client, query)
            .await?
            .ok_or_else(|| ScrapeError::NotFound {
                query: query.to_string(),
            })?,
        None => top_ranked_city(client).await?,
    };
    let body = sources::fetch_text(client, &baseline.url).await?;
    extract_city_details(&body, &baseline)
}

/// An explicitly passed name always wins, even a blank one (it will be
/// rejected downstream). A blank configured default is the same as no
/// default.
fn requested_name<'a>(name: Option<&'a str>, default_city: Option<&'a str>) -> Option<&'a str> {
    name.or_else(|| default_city.map(str::trim).filter(|city| !city.is_empty()))
}

async fn top_ranked_city(client: &Client) -> Result<CityRanking, ScrapeError> {
    let mut top = ranking::fetch_top_cities(client, 1).await?;
    top.pop()
        .ok_or_else(|| ScrapeError::Parse("ranking page yielded no cities".to_string()))
}

/// Extracts the live readings from a city detail page, scoped to the
/// primary AQI container. Every field degrades independently through
/// its own strategy chain; only a missing container is fatal.
pub fn extract_city_details(
    html: &str,
    baseline: &CityRanking,
) -> Result<CityDetails, ScrapeError> {
    let document = Html::parse_document(html);
    let container = find_aqi_container(&document).ok_or_else(|| {
        ScrapeError::Parse(format!(
            "city page for {} has no recognizable AQI container",
            baseline.city
        ))
    })?;

    let fragments = text_fragments(container);
    let aqi = extract_aqi(&fragments, baseline.aqi);
    let level = extract_level(container, &fragments);
    let pollutants = extract_pollutants(container);
    let main_pollutant = extract_main_pollutant(container, &pollutants);

    Ok(CityDetails {
        ranking: CityRanking {
            aqi,
            ..baseline.clone()
        },
        level,
        main_pollutant,
        pollutants,
    })
}

fn find_aqi_container(document: &Html) -> Option<ElementRef<'_>> {
    let selector = Selector::parse("[class]").expect("valid selector");
    document.select(&selector).find(|element| {
        element.value().attr("class").is_some_and(|class| {
            CONTAINER_MARKERS
                .iter()
                .any(|marker| class.contains(marker))
        })
    })
}

fn text_fragments(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect()
}

/// First strategy that yields a value wins; the baseline AQI from the
/// ranking or search record is the terminal fallback.
fn extract_aqi(fragments: &[String], baseline_aqi: u32) -> u32 {
    let strategies: [fn(&[String]) -> Option<u32>; 3] =
        [aqi_near_label, aqi_max_plausible, aqi_regex_sweep];
    strategies
        .iter()
        .find_map(|strategy| strategy(fragments))
        .unwrap_or(baseline_aqi)
}

/// Nearest plausible number within two fragments of an "AQI" label,
/// checked ahead then behind at each distance.
fn aqi_near_label(fragments: &[String]) -> Option<u32> {
    for (idx, fragment) in fragments.iter().enumerate() {
        if !fragment.contains(AQI_LABEL) {
            continue;
        }
        for offset in 1..=AQI_NEIGHBOR_RADIUS {
            if let Some(value) = fragments.get(idx + offset).and_then(|text| plausible_aqi(text)) {
                return Some(value);
            }
            if let Some(value) = idx
                .checked_sub(offset)
                .and_then(|behind| plausible_aqi(&fragments[behind]))
            {
                return Some(value);
            }
        }
    }
    None
}

fn aqi_max_plausible(fragments: &[String]) -> Option<u32> {
    fragments
        .iter()
        .filter_map(|text| plausible_aqi(text))
        .max()
}

fn aqi_regex_sweep(fragments: &[String]) -> Option<u32> {
    let joined = fragments.join(" ");
    let captures = AQI_SWEEP_RE.captures(&joined)?;
    let value: u32 = captures.get(1)?.as_str().parse().ok()?;
    (value > 0).then_some(value)
}

/// A standalone fragment of 1-3 digits inside the index range. Years
/// and station counts fall outside it.
fn plausible_aqi(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.len() > 3 || !trimmed.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    let value: u32 = trimmed.parse().ok()?;
    (value > 0 && value <= MAX_PLAUSIBLE_AQI).then_some(value)
}

/// The level label sits in an emphasized status element; failing that,
/// any short fragment using the level vocabulary is taken verbatim.
/// An empty string is an accepted outcome.
fn extract_level(container: ElementRef<'_>, fragments: &[String]) -> String {
    let selector = Selector::parse(r#"[class*="aqi-status"] b, [class*="aqi-status"] strong"#)
        .expect("valid selector");
    if let Some(element) = container.select(&selector).next() {
        let text = sources::element_text(element);
        if !text.is_empty() {
            return text;
        }
    }

    fragments
        .iter()
        .find(|text| {
            text.chars().count() <= LEVEL_TEXT_MAX && {
                let lowered = text.to_lowercase();
                LEVEL_VOCABULARY.iter().any(|word| lowered.contains(word))
            }
        })
        .cloned()
        .unwrap_or_default()
}

fn extract_main_pollutant(
    container: ElementRef<'_>,
    pollutants: &[Pollutant],
) -> Option<Pollutant> {
    find_labeled_row(container, MAIN_POLLUTANT_LABEL)
        .and_then(main_pollutant_from_row)
        .or_else(|| pollutants.first().cloned())
}

fn find_labeled_row<'a>(container: ElementRef<'a>, label: &str) -> Option<ElementRef<'a>> {
    let row_selector = Selector::parse("tr, li").expect("valid selector");
    container
        .select(&row_selector)
        .find(|row| sources::element_text(*row).contains(label))
}

/// The name is the first short non-label, non-numeric fragment of the
/// row. A row with no such fragment is treated as not found.
fn main_pollutant_from_row(row: ElementRef<'_>) -> Option<Pollutant> {
    let fragments = text_fragments(row);
    let name = fragments
        .iter()
        .filter(|text| !text.contains(MAIN_POLLUTANT_LABEL))
        .filter(|text| !is_value_shaped(text))
        .find(|text| text.chars().count() < SHORT_TEXT_MAX)?
        .clone();

    let (value, unit) = fragments
        .iter()
        .find_map(|text| parse_measurement(text))
        .or_else(|| parse_measurement(&fragments.join(" ")))
        .unwrap_or((0.0, sources::DEFAULT_UNIT.to_string()));

    Some(Pollutant {
        name,
        description: String::new(),
        value,
        unit,
    })
}

fn is_value_shaped(text: &str) -> bool {
    sources::parse_decimal(text).is_some() || MEASUREMENT_RE.is_match(text)
}

fn parse_measurement(text: &str) -> Option<(f64, String)> {
    let captures = MEASUREMENT_RE.captures(text)?;
    let value = sources::parse_decimal(captures.get(1)?.as_str())?;
    Some((value, captures.get(2)?.as_str().to_string()))
}

/// Walks the pollutant table row by row. Rows without a usable
/// positive reading are dropped entirely.
fn extract_pollutants(container: ElementRef<'_>) -> Vec<Pollutant> {
    let Some(table) = pollutant_table(container) else {
        return Vec::new();
    };
    let body_selector = Selector::parse("tbody tr").expect("valid selector");
    let any_selector = Selector::parse("tr").expect("valid selector");
    let mut rows: Vec<ElementRef<'_>> = table.select(&body_selector).collect();
    if rows.is_empty() {
        // No tbody: header rows carry no button cell and fall out in
        // pollutant_from_row anyway.
        rows = table.select(&any_selector).collect();
    }
    rows.into_iter().filter_map(pollutant_from_row).collect()
}

fn pollutant_table(container: ElementRef<'_>) -> Option<ElementRef<'_>> {
    let titled = Selector::parse("table[title]").expect("valid selector");
    container
        .select(&titled)
        .find(|table| table.value().attr("title") == Some(POLLUTANT_TABLE_TITLE))
        .or_else(|| {
            container.select(&titled).find(|table| {
                table
                    .value()
                    .attr("title")
                    .is_some_and(|title| title.to_lowercase().contains("pollutant"))
            })
        })
}

fn pollutant_from_row(row: ElementRef<'_>) -> Option<Pollutant> {
    let button_selector = Selector::parse(r#"button, [role="button"]"#).expect("valid selector");
    let button = row.select(&button_selector).next()?;

    let button_fragments = text_fragments(button);
    let description = button_description(button);
    let name = pollutant_code(&button_fragments, &description);

    let (value, unit) = measurement_from_spans(row)
        .or_else(|| parse_measurement(&button_fragments.join(" ")))
        .or_else(|| parse_measurement(&text_fragments(row).join(" ")))?;
    if value <= 0.0 {
        return None;
    }

    Some(Pollutant {
        name,
        description,
        value,
        unit,
    })
}

/// The second direct child block of the button holds the long-form
/// pollutant description.
fn button_description(button: ElementRef<'_>) -> String {
    let blocks: Vec<String> = button
        .children()
        .filter_map(ElementRef::wrap)
        .map(sources::element_text)
        .filter(|text| !text.is_empty())
        .collect();
    blocks
        .get(1)
        .filter(|text| !is_value_shaped(text))
        .cloned()
        .unwrap_or_default()
}

/// A fragment matching the known pollutant set wins; otherwise the
/// longest short fragment that is neither the description nor a value.
fn pollutant_code(fragments: &[String], description: &str) -> String {
    for fragment in fragments {
        if let Some(known) = KNOWN_POLLUTANTS
            .iter()
            .find(|code| fragment.eq_ignore_ascii_case(code))
        {
            return (*known).to_string();
        }
    }
    fragments
        .iter()
        .filter(|text| text.as_str() != description)
        .filter(|text| !is_value_shaped(text))
        .filter(|text| text.chars().count() < SHORT_TEXT_MAX)
        .max_by_key(|text| text.chars().count())
        .cloned()
        .unwrap_or_default()
}

/// Value and unit rendered as two adjacent spans.
fn measurement_from_spans(row: ElementRef<'_>) -> Option<(f64, String)> {
    let span_selector = Selector::parse("span").expect("valid selector");
    let spans: Vec<String> = row.select(&span_selector).map(sources::element_text).collect();
    spans.windows(2).find_map(|pair| {
        let value = sources::parse_decimal(&pair[0])?;
        let unit = unit_text(&pair[1])?;
        Some((value, unit))
    })
}

/// Short non-numeric text next to a value is its unit. Unrecognized
/// unit text falls back to the provider's default unit.
fn unit_text(text: &str) -> Option<String> {
    if text.is_empty()
        || text.chars().count() > UNIT_TEXT_MAX
        || sources::parse_decimal(text).is_some()
    {
        return None;
    }
    let known = KNOWN_UNITS.iter().find(|unit| text.eq_ignore_ascii_case(unit));
    Some(known.map_or_else(|| sources::DEFAULT_UNIT.to_string(), |unit| (*unit).to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> CityRanking {
        CityRanking {
            rank: 3,
            city: "Lahore".to_string(),
            country_slug: "pakistan".to_string(),
            aqi: 42,
            url: "https://www.iqair.com/pakistan/punjab/lahore".to_string(),
        }
    }

    const CITY_PAGE: &str = r#"
    <html><body>
      <div class="nav-bar"><span>960</span></div>
      <div class="aqi-shadow-card">
        <p class="aqi-status-line"><b>Unhealthy</b></p>
        <div class="aqi-value"><span>US AQI</span><span>187</span></div>
        <div class="station-count"><span>320</span></div>
        <table class="overview">
          <tbody>
            <tr><td>Main pollutant</td><td>PM2.5</td><td>124.3 µg/m³</td></tr>
          </tbody>
        </table>
        <table title="Pollutants concentration">
          <thead><tr><th>Pollutant</th><th>Concentration</th></tr></thead>
          <tbody>
            <tr>
              <td><button><span>PM2.5</span><span>Fine particulate matter</span></button></td>
              <td><span>124.3</span><span>µg/m³</span></td>
            </tr>
            <tr>
              <td><button><span>O3</span><span>Ozone</span> 85.1 µg/m³</button></td>
              <td></td>
            </tr>
            <tr>
              <td><button><span>NO2</span><span>Nitrogen dioxide</span></button></td>
              <td>18,9 µg/m³</td>
            </tr>
            <tr>
              <td><button><span>SO2</span><span>Sulfur dioxide</span></button></td>
              <td><span>0</span><span>µg/m³</span></td>
            </tr>
            <tr>
              <td><button><span>PM10</span><span>Coarse dust particles</span></button></td>
              <td>µg/m³</td>
            </tr>
          </tbody>
        </table>
      </div>
    </body></html>"#;

    #[test]
    fn extracts_a_full_city_report() {
        let details = extract_city_details(CITY_PAGE, &baseline()).expect("details");

        assert_eq!(details.ranking.aqi, 187);
        assert_eq!(details.ranking.rank, 3);
        assert_eq!(details.ranking.city, "Lahore");
        assert_eq!(details.ranking.country_slug, "pakistan");
        assert_eq!(details.level, "Unhealthy");

        let main = details.main_pollutant.expect("main pollutant");
        assert_eq!(main.name, "PM2.5");
        assert!((main.value - 124.3).abs() < 1e-9);
        assert_eq!(main.unit, "µg/m³");
    }

    #[test]
    fn labeled_number_beats_the_container_maximum() {
        // 320 and 960 are larger, but 187 sits next to the AQI label
        // (and 960 is outside the container entirely).
        let details = extract_city_details(CITY_PAGE, &baseline()).expect("details");
        assert_eq!(details.ranking.aqi, 187);
    }

    #[test]
    fn zero_and_valueless_rows_are_dropped() {
        let details = extract_city_details(CITY_PAGE, &baseline()).expect("details");
        let names: Vec<&str> = details
            .pollutants
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["PM2.5", "O3", "NO2"]);
    }

    #[test]
    fn value_strategies_cover_spans_button_text_and_row_text() {
        let details = extract_city_details(CITY_PAGE, &baseline()).expect("details");
        let values: Vec<f64> = details.pollutants.iter().map(|p| p.value).collect();
        assert!((values[0] - 124.3).abs() < 1e-9);
        assert!((values[1] - 85.1).abs() < 1e-9);
        assert!((values[2] - 18.9).abs() < 1e-9);
    }

    #[test]
    fn descriptions_come_from_the_nested_block() {
        let details = extract_city_details(CITY_PAGE, &baseline()).expect("details");
        let descriptions: Vec<&str> = details
            .pollutants
            .iter()
            .map(|p| p.description.as_str())
            .collect();
        assert_eq!(
            descriptions,
            vec!["Fine particulate matter", "Ozone", "Nitrogen dioxide"]
        );
    }

    #[test]
    fn missing_container_is_fatal() {
        let err = extract_city_details("<html><body><p>503</p></body></html>", &baseline())
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Parse(_)));
        assert!(err.to_string().contains("AQI container"));
    }

    #[test]
    fn bare_container_degrades_to_baseline_and_empty_fields() {
        let html = r#"<div class="aqi-bg-widget"><p>Data temporarily unavailable</p></div>"#;
        let details = extract_city_details(html, &baseline()).expect("details");
        assert_eq!(details.ranking.aqi, 42);
        assert_eq!(details.level, "");
        assert!(details.main_pollutant.is_none());
        assert!(details.pollutants.is_empty());
    }

    #[test]
    fn level_falls_back_to_vocabulary_text() {
        let html = r#"<div class="aqi-shadow"><span>Unhealthy for sensitive groups</span></div>"#;
        let details = extract_city_details(html, &baseline()).expect("details");
        assert_eq!(details.level, "Unhealthy for sensitive groups");
    }

    #[test]
    fn aqi_falls_back_to_the_container_maximum() {
        let html = r#"<div class="aqi-shadow"><span>12</span><span>460</span><span>88</span></div>"#;
        let details = extract_city_details(html, &baseline()).expect("details");
        assert_eq!(details.ranking.aqi, 460);
    }

    #[test]
    fn aqi_falls_back_to_the_regex_sweep() {
        let html = r#"<div class="aqi-shadow"><span>Live AQI: 87 currently</span></div>"#;
        let details = extract_city_details(html, &baseline()).expect("details");
        assert_eq!(details.ranking.aqi, 87);
    }

    #[test]
    fn missing_main_row_borrows_the_list_head() {
        let html = r#"
        <div class="aqi-shadow">
          <table title="Pollutants concentration"><tbody>
            <tr>
              <td><button><span>PM2.5</span><span>Fine particulate matter</span></button></td>
              <td><span>57.2</span><span>µg/m³</span></td>
            </tr>
          </tbody></table>
        </div>"#;
        let details = extract_city_details(html, &baseline()).expect("details");
        let main = details.main_pollutant.expect("main pollutant");
        assert_eq!(main.name, "PM2.5");
        assert_eq!(main.description, "Fine particulate matter");
        assert!((main.value - 57.2).abs() < 1e-9);
    }

    #[test]
    fn main_row_without_a_value_reports_zero_with_default_unit() {
        let html = r#"
        <div class="aqi-shadow">
          <table><tbody>
            <tr><td>Main pollutant</td><td>PM2.5</td></tr>
          </tbody></table>
        </div>"#;
        let details = extract_city_details(html, &baseline()).expect("details");
        let main = details.main_pollutant.expect("main pollutant");
        assert_eq!(main.name, "PM2.5");
        assert!((main.value - 0.0).abs() < 1e-9);
        assert_eq!(main.unit, "µg/m³");
    }

    #[test]
    fn unknown_codes_derive_from_the_longest_fragment() {
        let html = r#"
        <div class="aqi-shadow">
          <table title="Pollutants concentration"><tbody>
            <tr>
              <td><button><span>NH3</span><span>Ammonia</span></button></td>
              <td><span>12.4</span><span>µg/m³</span></td>
            </tr>
          </tbody></table>
        </div>"#;
        let details = extract_city_details(html, &baseline()).expect("details");
        assert_eq!(details.pollutants[0].name, "NH3");
        assert_eq!(details.pollutants[0].description, "Ammonia");
    }

    #[test]
    fn pollutant_table_matches_by_title_fallback() {
        let html = r#"
        <div class="aqi-shadow">
          <table title="Current pollutant levels"><tbody>
            <tr>
              <td><button><span>CO</span><span>Carbon monoxide</span></button></td>
              <td><span>604</span><span>ppb</span></td>
            </tr>
          </tbody></table>
        </div>"#;
        let details = extract_city_details(html, &baseline()).expect("details");
        assert_eq!(details.pollutants[0].name, "CO");
        assert_eq!(details.pollutants[0].unit, "ppb");
    }

    #[test]
    fn unrecognized_unit_text_falls_back_to_the_default() {
        let html = r#"
        <div class="aqi-shadow">
          <table title="Pollutants concentration"><tbody>
            <tr>
              <td><button><span>PM10</span><span>Coarse dust particles</span></button></td>
              <td><span>91,4</span><span>ug/m^3</span></td>
            </tr>
          </tbody></table>
        </div>"#;
        let details = extract_city_details(html, &baseline()).expect("details");
        assert!((details.pollutants[0].value - 91.4).abs() < 1e-9);
        assert_eq!(details.pollutants[0].unit, "µg/m³");
    }

    #[test]
    fn explicit_name_takes_priority_over_the_default() {
        assert_eq!(
            requested_name(Some("lahore"), Some("delhi")),
            Some("lahore")
        );
        assert_eq!(requested_name(None, Some("delhi")), Some("delhi"));
        assert_eq!(requested_name(None, Some("   ")), None);
        assert_eq!(requested_name(None, None), None);
    }

    #[tokio::test]
    async fn blank_explicit_name_is_rejected_before_any_request() {
        let client = Client::new();
        let err = fetch_city_details(&client, Some("  "), Some("lahore"))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::InvalidInput(_)));
    }
}
