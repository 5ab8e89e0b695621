use std::convert::Infallible;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use common::file_utils::force_file_name_extension;
use common::log_setup::setup_logging;
use linkage::{Compression, LinkConfig, LinkManager, ReportOptions};

/// Prints the link report of a saved link file.
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about = "Report of the links stored in a link file.")]
struct Args {
    /// Link file to read
    #[arg()]
    links_file: PathBuf,

    /// Settings file (toml, json or yaml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Column separator, defaults to the one in the settings.
    /// A typed \t stands for a tab.
    #[arg(long, value_parser = unescape_separator)]
    separator: Option<String>,

    /// Leave out the caption line
    #[arg(long)]
    no_header: bool,

    /// Report only the selected links
    #[arg(long = "selected")]
    only_selected: bool,

    /// Write the report to this file instead of stdout. `.txt` is appended if missing.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Also write log files to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

// shells pass a typed \t through literally
fn unescape_separator(separator: &str) -> std::result::Result<String, Infallible> {
    Ok(separator.replace("\\t", "\t"))
}

fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging("info", args.log_dir.as_deref()).context("failed to set up logging")?;

    let config = match &args.config {
        Some(path) => LinkConfig::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => LinkConfig::default(),
    };
    let separator = args
        .separator
        .clone()
        .unwrap_or_else(|| config.report_separator.clone());

    let mut manager = LinkManager::new(config.clone());
    manager
        .load_from_file(&args.links_file)
        .with_context(|| format!("failed to read {}", args.links_file.display()))?;

    if args.only_selected {
        let selected = manager.serialize_points(true, Compression::None)?;
        manager = LinkManager::new(config);
        manager.deserialize_points(&selected)?;
    }

    let report = manager.format_report(&ReportOptions {
        separator: Some(&separator),
        with_header: !args.no_header,
        ..ReportOptions::default()
    });

    match &args.output {
        Some(output) => {
            let path =
                PathBuf::from(force_file_name_extension(&output.to_string_lossy(), "txt"));
            std::fs::write(&path, report)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(
                "Report of {} links written to {}",
                manager.link_count(),
                path.display()
            );
        }
        None => print!("{report}"),
    }

    Ok(())
}
