// Entry point and high-level CLI flow.
//
// - `load` reads and normalizes the hazard tables, printing per-file
//   diagnostics.
// - `rank` (the default) runs the full pipeline, writes the state ranking,
//   the per-county values and a JSON summary, and previews the top states.
mod config;
mod corrections;
mod error;
mod filter;
mod join;
mod loader;
mod normalize;
mod output;
mod pipeline;
mod reports;
#[cfg(test)]
mod test_support;
mod types;
mod util;
mod values;

use clap::{Args, Parser, Subcommand};
use config::{load_config_file, AnalysisConfig, ConfigLayer};
use error::Result;
use filter::Preset;
use reports::ScoringPolicy;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "agri_risk_rank",
    about = "Rank states for agricultural investment from hazard-risk and 2050 yield projections"
)]
struct Cli {
    /// TOML config file; flags override its values
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing NRI_<year> and Expected_<year> CSV files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and normalize the datasets, printing diagnostics
    Load,
    /// Run the full pipeline and write the ranking
    Rank(RankArgs),
}

#[derive(Args, Debug, Default)]
struct RankArgs {
    /// Directory for state_ranking.csv, county_values.csv and summary.json
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Tolerance and scoring preset
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Override the preset's scoring policy
    #[arg(long, value_enum)]
    scoring: Option<ScoringPolicy>,

    /// Expected-value floor: "mean" or an amount
    #[arg(long)]
    threshold: Option<String>,

    /// Number of states in the preview and summary
    #[arg(long)]
    top_n: Option<usize>,

    /// Hazard snapshot year joined against the projection table
    #[arg(long)]
    base_year: Option<u16>,
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match verbose {
        0 if quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// File layer first, then whatever the command line sets.
fn resolve_config(cli: &Cli, rank: &RankArgs) -> Result<AnalysisConfig> {
    let file = match &cli.config {
        Some(path) => load_config_file(path)?,
        None => ConfigLayer::default(),
    };
    let flags = ConfigLayer {
        data_dir: cli.data_dir.clone(),
        output_dir: rank.output_dir.clone(),
        base_year: rank.base_year,
        preset: rank.preset,
        scoring: rank.scoring,
        value_threshold: rank.threshold.clone().map(toml::Value::String),
        top_n: rank.top_n,
        ceilings: Default::default(),
    };
    AnalysisConfig::from_layer(file.overlay(flags))
}

fn handle_load(cli: &Cli) -> Result<()> {
    let cfg = resolve_config(cli, &RankArgs::default())?;
    let rows = pipeline::inspect(&cfg.data_dir)?;
    output::preview_table(
        "Loaded datasets",
        Some(
            "RowsKept: rows in the 48 contiguous states; \
             CellsFilled: blank or absent cells filled by the null policy",
        ),
        &rows,
        rows.len(),
    );
    Ok(())
}

fn handle_rank(cli: &Cli, rank: &RankArgs) -> Result<()> {
    let cfg = resolve_config(cli, rank)?;
    let result = pipeline::run(&cfg)?;
    let paths = pipeline::write_outputs(&result, &cfg.output_dir)?;

    let note = format!(
        "preset {}, scoring {}, {} states, {} of {} counties pass, threshold {}",
        cfg.preset.name(),
        cfg.scoring.name(),
        result.ranked.len(),
        util::format_int(result.summary.value_survivors),
        util::format_int(result.summary.joined_counties),
        util::format_number(result.summary.value_threshold, 2),
    );
    output::preview_table(
        &format!("Top {} States for Agricultural Investment", cfg.top_n),
        Some(&note),
        &result.rows,
        cfg.top_n,
    );
    println!("(Full table exported to {})", paths.ranking.display());
    println!("(County values exported to {})", paths.counties.display());
    println!("(Summary exported to {})", paths.summary.display());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let outcome = match &cli.command {
        Some(Command::Load) => handle_load(&cli),
        Some(Command::Rank(rank)) => handle_rank(&cli, rank),
        None => handle_rank(&cli, &RankArgs::default()),
    };
    if let Err(e) = outcome {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
