use aqirank::sources::{self, CityDetails, CityRanking, Pollutant, SearchResult};
use chrono::{DateTime, Local};
use colored::Colorize;
use std::path::Path;

use crate::formatting::{
    aqi_color, format_aqi_cell, format_followers, format_value, level_color, scope_label,
};

pub fn print_top(records: &[CityRanking], fetched_at: &DateTime<Local>, csv_path: Option<&Path>) {
    println!();
    println!(
        "{}",
        "==================== World AQI Ranking ===================="
            .bold()
            .bright_cyan()
    );
    println!(
        "{} {}",
        "Fetched".bright_yellow().bold(),
        fetched_at
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
            .bright_white()
    );
    print_save_line("Ranking CSV", csv_path, "not saved (use --save-csv)");
    println!();
    let width = print_ranking_table(records);
    if width > 0 {
        println!("{}", "=".repeat(width).bright_cyan());
    }
}

fn print_ranking_table(records: &[CityRanking]) -> usize {
    if records.is_empty() {
        let message = "No ranking data available.";
        println!("{}", message.bright_black());
        return message.len();
    }
    let header = format!(
        "{:>4} | {:<24} | {:<18} | {:>5}",
        "Rank", "City", "Country", "AQI"
    );
    let separator = "-----+--------------------------+--------------------+------";
    let mut max_width = header.len().max(separator.len());
    println!("{}", header.bold().bright_white());
    println!("{}", separator.bright_black());
    for record in records {
        let line = format!(
            "{:>4} | {:<24} | {:<18} | {:>5}",
            record.rank,
            record.city,
            sources::capitalize_slug(&record.country_slug),
            record.aqi
        );
        max_width = max_width.max(line.len());
        println!("{}", line.color(aqi_color(record.aqi)));
    }
    max_width
}

pub fn print_search_results(query: &str, results: &[SearchResult], csv_path: Option<&Path>) {
    println!();
    println!(
        "{}",
        "====================== City Search ======================"
            .bold()
            .bright_cyan()
    );
    println!("{} {}", "Query".bright_yellow().bold(), query.bright_white());
    println!(
        "{} {}",
        "Matches".bright_yellow().bold(),
        results.len().to_string().bright_white()
    );
    print_save_line("Search CSV", csv_path, "not saved (use --save-csv)");
    println!();
    let width = print_search_table(results);
    if width > 0 {
        println!("{}", "=".repeat(width).bright_cyan());
    }
}

fn print_search_table(results: &[SearchResult]) -> usize {
    if results.is_empty() {
        let message = "No cities matched.";
        println!("{}", message.bright_black());
        return message.len();
    }
    let header = format!(
        "{:>3} | {:<22} | {:<18} | {:<18} | {:<6} | {:>6} | {:>9}",
        "#", "City", "Region", "Country", "Scope", "AQI", "Followers"
    );
    let separator = "----+------------------------+--------------------+--------------------+--------+--------+----------";
    let mut max_width = header.len().max(separator.len());
    println!("{}", header.bold().bright_white());
    println!("{}", separator.bright_black());
    for (idx, result) in results.iter().enumerate() {
        let line = format!(
            "{:>3} | {:<22} | {:<18} | {:<18} | {:<6} | {:>6} | {:>9}",
            idx + 1,
            result.name,
            result.state,
            result.country,
            scope_label(sources::path_depth(&result.url)),
            format_aqi_cell(result.aqi, result.estimated),
            format_followers(result.followers_count)
        );
        max_width = max_width.max(line.len());
        // Rows the scan could not attach a reading to stay dim.
        if result.aqi == 0 {
            println!("{}", line.bright_black());
        } else {
            println!("{}", line.color(aqi_color(result.aqi)));
        }
    }
    max_width
}

pub fn print_city_details(details: &CityDetails) {
    println!();
    println!(
        "{}",
        format!("==================== {} ====================", details.ranking.city)
            .bold()
            .bright_cyan()
    );
    println!(
        "{} {}",
        "US AQI".bright_yellow().bold(),
        details
            .ranking
            .aqi
            .to_string()
            .color(aqi_color(details.ranking.aqi))
            .bold()
    );
    if details.level.is_empty() {
        println!(
            "{} {}",
            "Level".bright_yellow().bold(),
            "not reported".bright_black()
        );
    } else {
        println!(
            "{} {}",
            "Level".bright_yellow().bold(),
            details.level.color(level_color(&details.level)).bold()
        );
    }
    match details.main_pollutant.as_ref() {
        Some(pollutant) => println!(
            "{} {}",
            "Main pollutant".bright_yellow().bold(),
            format_pollutant_inline(pollutant).bright_white()
        ),
        None => println!(
            "{} {}",
            "Main pollutant".bright_yellow().bold(),
            "not reported".bright_black()
        ),
    }
    println!(
        "{} {}",
        "Page".bright_yellow().bold(),
        details.ranking.url.bright_white()
    );

    if !details.pollutants.is_empty() {
        println!();
        println!("{}", "Pollutants".bold().bright_magenta());
        print_pollutant_table(&details.pollutants);
    }
}

fn print_pollutant_table(pollutants: &[Pollutant]) {
    let header = format!(
        "{:<8} | {:<28} | {:>8} | {:<7}",
        "Code", "Description", "Value", "Unit"
    );
    println!("{}", header.bold().bright_white());
    println!(
        "{}",
        "---------+------------------------------+----------+--------".bright_black()
    );
    for pollutant in pollutants {
        let line = format!(
            "{:<8} | {:<28} | {:>8.1} | {:<7}",
            pollutant.name, pollutant.description, pollutant.value, pollutant.unit
        );
        println!("{}", line.bright_green());
    }
}

fn format_pollutant_inline(pollutant: &Pollutant) -> String {
    if pollutant.value > 0.0 {
        format!(
            "{} ({} {})",
            pollutant.name,
            format_value(pollutant.value),
            pollutant.unit
        )
    } else {
        pollutant.name.clone()
    }
}

fn print_save_line(label: &str, path: Option<&Path>, hint: &str) {
    let label_colored = label.bright_yellow().bold();
    match path {
        Some(path) => println!(
            "{} {}",
            label_colored,
            format!("{}", path.display()).bright_white()
        ),
        None => println!("{} {}", label_colored, hint.bright_black()),
    }
}
