use colored::Color;

/// Color band for a US AQI value, following the EPA breakpoints.
pub fn aqi_color(aqi: u32) -> Color {
    match aqi {
        0..=50 => Color::BrightGreen,
        51..=100 => Color::BrightYellow,
        101..=150 => Color::Yellow,
        151..=200 => Color::BrightRed,
        201..=300 => Color::Red,
        _ => Color::Magenta,
    }
}

/// Color for a textual level label. Checked from most to least severe
/// so "Unhealthy for sensitive groups" is not painted as plain
/// "Unhealthy".
pub fn level_color(level: &str) -> Color {
    let lowered = level.to_lowercase();
    if lowered.contains("hazardous") {
        Color::Magenta
    } else if lowered.contains("very unhealthy") {
        Color::Red
    } else if lowered.contains("sensitive") {
        Color::Yellow
    } else if lowered.contains("unhealthy") {
        Color::BrightRed
    } else if lowered.contains("moderate") {
        Color::BrightYellow
    } else {
        Color::BrightGreen
    }
}

pub fn format_value(value: f64) -> String {
    format!("{value:.1}")
}

/// AQI table cell: "-" when the scan found nothing, "~" prefix for
/// station-estimated readings.
pub fn format_aqi_cell(aqi: u32, estimated: bool) -> String {
    if aqi == 0 {
        "-".to_string()
    } else if estimated {
        format!("~{aqi}")
    } else {
        aqi.to_string()
    }
}

pub fn format_followers(count: u64) -> String {
    if count == 0 {
        "-".to_string()
    } else {
        count.to_string()
    }
}

/// Search rows point either at a city page (3 path segments) or a
/// broader region page.
pub fn scope_label(depth: usize) -> &'static str {
    if depth == 3 { "city" } else { "region" }
}
