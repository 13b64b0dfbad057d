use crate::cli::{Cli, Commands};
use crate::progress::{ProgressState, run_with_spinner};
use crate::summary::{print_city_details, print_search_results, print_top};
use anyhow::{Context, Result, bail};
use aqirank::sources::{self, CityDetails, CityRanking, SearchResult};
use chrono::Local;
use clap::Parser;
use colored::Colorize;
use csv::Writer;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

mod cli;
mod formatting;
mod progress;
mod summary;

const HTTP_TIMEOUT_SECONDS: u64 = 20;
const USER_AGENT: &str = concat!("aqirank/", env!("CARGO_PKG_VERSION"));

struct RunContext {
    json: bool,
    default_city: Option<String>,
    progress: ProgressState,
}

#[tokio::main]
async fn main() -> Result<()> {
    colored::control::set_override(true);

    let Cli {
        json,
        no_progress,
        default_city,
        command,
    } = Cli::parse();

    let context = RunContext {
        json,
        default_city,
        progress: ProgressState::new(true, !(json || no_progress)),
    };

    match command.unwrap_or_default() {
        Commands::Completions {
            shell,
            output_dir,
            install,
        } => cli::generate_completions(shell, output_dir, install),
        Commands::Top { limit, save_csv } => run_top(limit, save_csv.as_deref(), &context).await,
        Commands::City { names } => run_city(&names, &context).await,
        Commands::Search { query, save_csv } => {
            run_search(&query, save_csv.as_deref(), &context).await
        }
    }
}

fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
        .build()
        .context("failed to build HTTP client")
}

async fn run_top(limit: usize, save_csv: Option<&Path>, context: &RunContext) -> Result<()> {
    if !(1..=cli::MAX_TOP_LIMIT).contains(&limit) {
        bail!("--limit must be between 1 and {}", cli::MAX_TOP_LIMIT);
    }

    let client = http_client()?;
    let fetched_at = Local::now();
    let records = run_with_spinner(
        &context.progress,
        "Fetching",
        &format!("top {limit} polluted cities"),
        async { Ok(sources::fetch_top_cities(&client, limit).await?) },
    )
    .await?;
    context.progress.clear();

    if let Some(path) = save_csv {
        save_ranking_csv(&records, path).await?;
    }

    if context.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    print_top(&records, &fetched_at, save_csv);
    Ok(())
}

async fn run_city(names: &[String], context: &RunContext) -> Result<()> {
    let client = http_client()?;

    if names.is_empty() {
        let subject = context.default_city.as_deref().map_or_else(
            || "the top-ranked city".to_string(),
            |city| format!("report for {city}"),
        );
        let details = run_with_spinner(&context.progress, "Fetching", &subject, async {
            Ok(sources::fetch_city_details(&client, None, context.default_city.as_deref()).await?)
        })
        .await?;
        context.progress.clear();
        return output_city_reports(&[details], context.json);
    }

    let mut handles = Vec::with_capacity(names.len());
    for name in names {
        let progress = context.progress.clone();
        let client = client.clone();
        let name = name.clone();
        handles.push(tokio::spawn(async move {
            let subject = format!("report for {name}");
            run_with_spinner(&progress, "Fetching", &subject, async {
                Ok(sources::fetch_city_details(&client, Some(&name), None).await?)
            })
            .await
        }));
    }

    let mut reports = Vec::with_capacity(names.len());
    let mut failed = Vec::new();
    for (name, handle) in names.iter().zip(handles) {
        match handle.await.context("city report task stopped unexpectedly")? {
            Ok(details) => reports.push(details),
            Err(err) => failed.push((name.clone(), err)),
        }
    }
    context.progress.clear();

    for (name, err) in &failed {
        eprintln!("{}", format!("{name}: {err:#}").bright_red());
    }
    output_city_reports(&reports, context.json)?;
    if !failed.is_empty() {
        bail!("{} of {} city reports failed", failed.len(), names.len());
    }
    Ok(())
}

async fn run_search(query: &str, save_csv: Option<&Path>, context: &RunContext) -> Result<()> {
    let client = http_client()?;
    let results = run_with_spinner(
        &context.progress,
        "Searching",
        &format!("city index for {query:?}"),
        async { Ok(sources::fetch_search_results(&client, query).await?) },
    )
    .await?;
    context.progress.clear();

    if let Some(path) = save_csv {
        save_search_csv(&results, path).await?;
    }

    if context.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    print_search_results(query, &results, save_csv);
    Ok(())
}

fn output_city_reports(reports: &[CityDetails], json: bool) -> Result<()> {
    if json {
        if let [only] = reports {
            println!("{}", serde_json::to_string_pretty(only)?);
        } else {
            println!("{}", serde_json::to_string_pretty(reports)?);
        }
        return Ok(());
    }
    for details in reports {
        print_city_details(details);
    }
    Ok(())
}

async fn save_ranking_csv(records: &[CityRanking], path: &Path) -> Result<()> {
    let mut writer = Writer::from_writer(Vec::new());
    for record in records {
        writer
            .serialize(record)
            .context("failed to serialize ranking record")?;
    }
    let serialized = finalize_writer(writer, "ranking CSV writer")?;
    write_output_file(path, &serialized).await
}

async fn save_search_csv(results: &[SearchResult], path: &Path) -> Result<()> {
    let mut writer = Writer::from_writer(Vec::new());
    for result in results {
        writer
            .serialize(result)
            .context("failed to serialize search record")?;
    }
    let serialized = finalize_writer(writer, "search CSV writer")?;
    write_output_file(path, &serialized).await
}

fn finalize_writer(mut writer: Writer<Vec<u8>>, label: &str) -> Result<Vec<u8>> {
    writer
        .flush()
        .with_context(|| format!("failed to flush {label}"))?;
    writer
        .into_inner()
        .with_context(|| format!("failed to finalize {label}"))
}

async fn write_output_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}
