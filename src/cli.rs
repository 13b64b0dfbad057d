use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate, generate_to};

pub const DEFAULT_TOP_LIMIT: usize = 10;
pub const MAX_TOP_LIMIT: usize = 200;

pub const DEFAULT_TOP_CSV_PATH: &str = "data/top_cities.csv";
pub const DEFAULT_SEARCH_CSV_PATH: &str = "data/search_results.csv";

pub const SAVE_TOP_HELP: &str = "Save the fetched ranking to the given CSV file (defaults to data/top_cities.csv when no path is provided).";
pub const SAVE_SEARCH_HELP: &str = "Save the search results to the given CSV file (defaults to data/search_results.csv when no path is provided).";

#[derive(Debug, Parser)]
#[command(
    name = "aqirank",
    about = "Fetch city air-quality rankings, search the provider's city index, and pull per-city pollutant reports.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        help = "Print machine-readable JSON instead of tables."
    )]
    pub json: bool,
    #[arg(long, global = true, help = "Disable progress spinner output.")]
    pub no_progress: bool,
    #[arg(
        long,
        global = true,
        value_name = "NAME",
        help = "City to report on when `city` is invoked without a name."
    )]
    pub default_city: Option<String>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the current world ranking of most polluted cities.
    Top {
        #[arg(
            long,
            value_name = "N",
            default_value_t = DEFAULT_TOP_LIMIT,
            help = "How many ranking rows to fetch (1-200)."
        )]
        limit: usize,
        #[arg(
            long,
            value_name = "FILE",
            num_args = 0..=1,
            default_missing_value = DEFAULT_TOP_CSV_PATH,
            help = SAVE_TOP_HELP
        )]
        save_csv: Option<PathBuf>,
    },
    /// Show the live air-quality report for one or more cities.
    City {
        #[arg(
            value_name = "NAME",
            help = "City names; omit to use the configured default or the current top-ranked city."
        )]
        names: Vec<String>,
    },
    /// Search the provider's city index.
    Search {
        #[arg(value_name = "QUERY", help = "Free-form city name or fragment.")]
        query: String,
        #[arg(
            long,
            value_name = "FILE",
            num_args = 0..=1,
            default_missing_value = DEFAULT_SEARCH_CSV_PATH,
            help = SAVE_SEARCH_HELP
        )]
        save_csv: Option<PathBuf>,
    },
    /// Generate shell completion scripts, optionally installing them for the current user.
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for.")]
        shell: Shell,
        #[arg(
            long,
            value_name = "DIR",
            help = "Directory to write the completion script to."
        )]
        output_dir: Option<PathBuf>,
        #[arg(
            long,
            help = "Install the completion script into the default location for the selected shell."
        )]
        install: bool,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Self::Top {
            limit: DEFAULT_TOP_LIMIT,
            save_csv: None,
        }
    }
}

pub fn generate_completions(shell: Shell, output_dir: Option<PathBuf>, install: bool) -> Result<()> {
    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();

    let target_dir = if let Some(dir) = output_dir {
        Some(dir)
    } else if install {
        Some(default_install_dir(shell)?)
    } else {
        None
    };

    if let Some(dir) = target_dir {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create completion directory {}", dir.display()))?;
        let path = generate_to(shell, &mut command, bin_name, &dir)
            .context("failed to write completion file")?;
        println!("Installed {shell:?} completions to {}", path.display());
    } else {
        let mut stdout = io::stdout().lock();
        generate(shell, &mut command, bin_name, &mut stdout);
        stdout
            .flush()
            .context("failed to flush completion output")?;
    }

    Ok(())
}

fn default_install_dir(shell: Shell) -> Result<PathBuf> {
    let home = std::env::var_os("HOME").ok_or_else(|| {
        anyhow!("HOME environment variable is not set; use --output-dir to specify a path")
    })?;
    let mut path = PathBuf::from(home);

    match shell {
        Shell::Bash => {
            path.push(".local/share/bash-completion/completions");
            Ok(path)
        }
        Shell::Elvish => {
            path.push(".elvish/lib/completions");
            Ok(path)
        }
        Shell::Fish => {
            path.push(".config/fish/completions");
            Ok(path)
        }
        Shell::PowerShell => {
            path.push(".local/share/powershell/Scripts");
            Ok(path)
        }
        Shell::Zsh => {
            path.push(".local/share/zsh/site-functions");
            Ok(path)
        }
        other => Err(anyhow!(
            "no default install location for {other:?}; specify --output-dir"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_invocation_defaults_to_the_top_listing() {
        let cli = Cli::parse_from(["aqirank"]);
        assert!(cli.command.is_none());
        assert!(matches!(
            Commands::default(),
            Commands::Top {
                limit: DEFAULT_TOP_LIMIT,
                save_csv: None
            }
        ));
    }

    #[test]
    fn save_csv_defaults_when_given_without_a_path() {
        let cli = Cli::parse_from(["aqirank", "top", "--save-csv"]);
        let Some(Commands::Top { save_csv, .. }) = cli.command else {
            panic!("expected top subcommand");
        };
        assert_eq!(save_csv, Some(PathBuf::from(DEFAULT_TOP_CSV_PATH)));
    }

    #[test]
    fn limit_defaults_and_parses() {
        let cli = Cli::parse_from(["aqirank", "top"]);
        let Some(Commands::Top { limit, .. }) = cli.command else {
            panic!("expected top subcommand");
        };
        assert_eq!(limit, DEFAULT_TOP_LIMIT);

        let cli = Cli::parse_from(["aqirank", "top", "--limit", "25"]);
        let Some(Commands::Top { limit, .. }) = cli.command else {
            panic!("expected top subcommand");
        };
        assert_eq!(limit, 25);
    }

    #[test]
    fn global_flags_apply_after_the_subcommand() {
        let cli = Cli::parse_from(["aqirank", "city", "lahore", "--json"]);
        assert!(cli.json);
        let Some(Commands::City { names }) = cli.command else {
            panic!("expected city subcommand");
        };
        assert_eq!(names, vec!["lahore".to_string()]);
    }
}
