//! Propmark CLI
//!
//! Runs the property-to-markup pipeline against a JSON snapshot of a viewer session:
//! - `discover` ranks the fields found on the selected objects
//! - `apply` composes labels from chosen fields, creates markups and prints the
//!   condensed summary

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use propmark_markup::{FileSink, MarkupSession, WriterSink};
use propmark_model::{
    FieldSelection, Layout, MarkupConfig, PipelineConfig, Position, TracingSink,
};
use propmark_provider::{SnapshotProvider, ViewerProvider};
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "propmark")]
#[command(author, version, about = "Label model objects with their property values")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Pipeline configuration JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List candidate fields over the selection, most common first.
    Discover {
        #[command(flatten)]
        source: SourceArgs,
        /// Print every discovered field instead of the selectable list
        #[arg(long)]
        all: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Create one markup per selected object from the chosen fields.
    Apply {
        #[command(flatten)]
        source: SourceArgs,
        /// Field keys in label order (repeatable)
        #[arg(short, long = "field", required = true)]
        fields: Vec<String>,
        #[arg(long)]
        prefix: Option<String>,
        #[arg(long)]
        separator: Option<String>,
        /// Put each value on its own line
        #[arg(long)]
        newline: bool,
        #[arg(long, value_enum)]
        position: Option<PositionArg>,
        /// Write the condensed summary here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
struct SourceArgs {
    /// Provider snapshot JSON (models, objects, selection)
    #[arg(short, long)]
    snapshot: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
enum PositionArg {
    Center,
    Top,
}

impl From<PositionArg> for Position {
    fn from(arg: PositionArg) -> Self {
        match arg {
            PositionArg::Center => Position::Center,
            PositionArg::Top => Position::Top,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Discover { source, all, json } => cmd_discover(&source, config, all, json).await,
        Commands::Apply {
            source,
            fields,
            prefix,
            separator,
            newline,
            position,
            out,
        } => {
            let mut markup = config.markup.clone();
            if let Some(prefix) = prefix {
                markup.prefix = prefix;
            }
            if let Some(separator) = separator {
                markup.separator = separator;
            }
            if newline {
                markup.line_break = true;
                markup.layout = Layout::Lines;
            }
            if let Some(position) = position {
                markup.position = position.into();
            }
            cmd_apply(&source, config, FieldSelection::new(fields), markup, out.as_ref()).await
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            PipelineConfig::from_json(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };
    Ok(config.with_overrides(|name| std::env::var(name).ok()))
}

fn open_session(source: &SourceArgs, config: PipelineConfig) -> Result<MarkupSession> {
    let text = fs::read_to_string(&source.snapshot)
        .with_context(|| format!("reading snapshot {}", source.snapshot.display()))?;
    let provider = SnapshotProvider::from_json(&text)
        .with_context(|| format!("parsing snapshot {}", source.snapshot.display()))?;
    let provider: Arc<dyn ViewerProvider> = Arc::new(provider);
    Ok(MarkupSession::new(Some(provider), config, TracingSink::shared())?)
}

async fn cmd_discover(
    source: &SourceArgs,
    config: PipelineConfig,
    all: bool,
    json: bool,
) -> Result<()> {
    let session = open_session(source, config)?;
    let report = session.discover().await?;
    let fields = if all {
        report.outcome.fields.clone()
    } else {
        report.selectable.clone()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&fields)?);
        return Ok(());
    }
    eprintln!("{} {}", "ok".green().bold(), report.message);
    for field in &fields {
        let samples = if field.value_samples.is_empty() {
            "-".dimmed().to_string()
        } else {
            field.value_samples.join(", ")
        };
        println!(
            "{:>4}%  {}  {}",
            field.frequency,
            field.key.bold(),
            samples
        );
    }
    Ok(())
}

async fn cmd_apply(
    source: &SourceArgs,
    config: PipelineConfig,
    selection: FieldSelection,
    markup: MarkupConfig,
    out: Option<&PathBuf>,
) -> Result<()> {
    let session = open_session(source, config)?;
    let summary = session.apply(&selection, &markup).await?;

    eprintln!("{} {}", "ok".green().bold(), summary.message);
    for (object_id, message) in &summary.report.failed {
        eprintln!("{} object {object_id}: {message}", "warn:".yellow().bold());
    }
    if summary.report.skipped > 0 {
        eprintln!(
            "{} {} objects had no value for the selected fields",
            "info:".yellow().bold(),
            summary.report.skipped
        );
    }

    // A summary that cannot be written is reported, not fatal.
    let written = match out {
        Some(path) => session
            .write_summary(&summary.condensed, &FileSink::new(path))
            .map(|()| {
                eprintln!("{} {}", "wrote".green().bold(), path.display().to_string().bold())
            }),
        None => session.write_summary(&summary.condensed, &WriterSink::new(io::stdout())),
    };
    if let Err(err) = written {
        eprintln!("{} {err}", "warn:".yellow().bold());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_args_parse() {
        let cli = Cli::try_parse_from([
            "propmark", "apply", "--snapshot", "s.json", "-f", "Pset1.Name", "-f", "Type",
            "--position", "top", "--newline",
        ])
        .unwrap();
        match cli.command {
            Commands::Apply {
                fields,
                position,
                newline,
                ..
            } => {
                assert_eq!(fields, ["Pset1.Name", "Type"]);
                assert!(matches!(position, Some(PositionArg::Top)));
                assert!(newline);
            }
            Commands::Discover { .. } => panic!("expected apply"),
        }
    }

    #[test]
    fn apply_requires_a_field() {
        assert!(Cli::try_parse_from(["propmark", "apply", "--snapshot", "s.json"]).is_err());
    }

    #[test]
    fn missing_config_is_an_error() {
        assert!(load_config(Some(&PathBuf::from("/nonexistent/propmark.json"))).is_err());
    }
}
