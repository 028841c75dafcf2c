use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tally_core::{Direction, Document, DocumentKind, ExtractionResult};
use tally_finance::export::{metadata_json, to_csv, to_json};
use tally_ingest::{Extractor, PdftoppmRenderer, TesseractOcr};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod state;

use config::Config;

#[derive(Parser, Debug)]
#[command(
    name = "tally",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TALLY_BUILD_SHA"), ")"),
    about = "Extract transactions from bank statement PDFs and scans"
)]
struct Cli {
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log filter, e.g. "debug" or "tally_ingest=trace" (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Config file (default: ~/.tally/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract a statement to CSV and/or JSON next to the input (or in --out-dir)
    Extract {
        file: PathBuf,

        /// Document kind; guessed from the extension when omitted
        #[arg(long, value_enum)]
        kind: Option<KindArg>,

        #[arg(long)]
        out_dir: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = Format::Both)]
        format: Format,
    },

    /// Print normalized lines with how each one is classified
    Lines {
        file: PathBuf,

        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Manage ~/.tally/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config file if none exists
    Init,
    /// Print the effective config
    Show,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Pdf,
    Png,
    Jpeg,
    Tiff,
    Bmp,
}

impl From<KindArg> for DocumentKind {
    fn from(k: KindArg) -> Self {
        match k {
            KindArg::Pdf => DocumentKind::Pdf,
            KindArg::Png => DocumentKind::Png,
            KindArg::Jpeg => DocumentKind::Jpeg,
            KindArg::Tiff => DocumentKind::Tiff,
            KindArg::Bmp => DocumentKind::Bmp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Csv,
    Json,
    Both,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_level.as_deref());

    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Extract {
            file,
            kind,
            out_dir,
            format,
        } => {
            let cfg = config::load_config(config_path)?;
            extract(&cfg, &file, kind, out_dir.as_deref(), format).await?;
        }

        Command::Lines { file, kind } => {
            let cfg = config::load_config(config_path)?;
            let document = open(&file, kind)?;
            let extractor = build_extractor(&cfg);
            let pages = extractor
                .pages(&document)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            for (line, label) in extractor.annotate(&pages) {
                println!("p{:<3} {:>4}  {:<28} {}", line.page + 1, line.line + 1, label, line.text);
            }
        }

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config(config_path)?,
            ConfigCommand::Show => {
                let cfg = config::load_config(config_path)?;
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

/// Logs go to stderr so stdout stays usable for data.
fn init_tracing(verbose: u8, log_level: Option<&str>) {
    let filter = match log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(match verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            })
        }),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open(file: &Path, kind: Option<KindArg>) -> Result<Document> {
    if !file.exists() {
        bail!("file not found: {}", file.display());
    }
    Document::open(file, kind.map(DocumentKind::from)).with_context(|| format!("opening {}", file.display()))
}

fn build_extractor(cfg: &Config) -> Extractor {
    let extractor = Extractor::new(cfg.extract.clone());
    if !cfg.ocr.enabled {
        debug!("OCR disabled in config");
        return extractor;
    }
    extractor
        .with_renderer(Arc::new(PdftoppmRenderer::new(&cfg.render.command, cfg.render.dpi)))
        .with_ocr(Arc::new(TesseractOcr::new(
            &cfg.ocr.command,
            &cfg.ocr.language,
            cfg.ocr.args.clone(),
        )))
}

async fn extract(
    cfg: &Config,
    file: &Path,
    kind: Option<KindArg>,
    out_dir: Option<&Path>,
    format: Format,
) -> Result<()> {
    let document = open(file, kind)?;
    info!(file = %file.display(), kind = document.kind().as_str(), bytes = document.len(), "extracting");

    let result = build_extractor(cfg)
        .extract(&document)
        .await
        .with_context(|| format!("extracting {}", file.display()))?;

    let dir = state::output_dir(out_dir, file)?;
    if matches!(format, Format::Csv | Format::Both) {
        let csv_path = state::output_path(&dir, file, "csv");
        let csv = to_csv(&result, cfg.extract.currency_minor_units)?;
        state::write_file(&csv_path, &csv)?;
        let meta_path = state::output_path(&dir, file, "metadata.json");
        state::write_file(&meta_path, &metadata_json(&result.metadata)?)?;
        println!("Wrote {}", csv_path.display());
        println!("Wrote {}", meta_path.display());
    }
    if matches!(format, Format::Json | Format::Both) {
        let json_path = state::output_path(&dir, file, "json");
        state::write_file(&json_path, &to_json(&result)?)?;
        println!("Wrote {}", json_path.display());
    }

    print_summary(&result);
    Ok(())
}

fn print_summary(result: &ExtractionResult) {
    let meta = &result.metadata;
    println!();
    for (key, value) in meta.present_fields() {
        println!("{key:>16}: {value}");
    }
    println!(
        "\n{} transactions | debits {} | credits {} | net {}",
        result.transactions.len(),
        result.total(Direction::Debit),
        result.total(Direction::Credit),
        result.net_change()
    );

    if result.findings.is_empty() {
        println!("No findings.");
        return;
    }
    println!("\n{} finding(s):", result.findings.len());
    for finding in &result.findings {
        println!("- {finding}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_extract() {
        let cli = Cli::try_parse_from([
            "tally", "-v", "extract", "stmt.pdf", "--format", "json", "--out-dir", "out",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Command::Extract {
                file, format, out_dir, kind,
            } => {
                assert_eq!(file, PathBuf::from("stmt.pdf"));
                assert_eq!(format, Format::Json);
                assert_eq!(out_dir, Some(PathBuf::from("out")));
                assert_eq!(kind, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_kind_maps_to_document_kind() {
        let cli = Cli::try_parse_from(["tally", "lines", "scan.bin", "--kind", "tiff"]).unwrap();
        match cli.command {
            Command::Lines { kind, .. } => assert_eq!(kind.map(DocumentKind::from), Some(DocumentKind::Tiff)),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
