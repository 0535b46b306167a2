//! # docverter CLI
//!
//! Command-line interface for docverter.
//!
//! Converts PDF, DOCX, HTML, text and image files to plain text or Markdown,
//! running OCR on scanned input when the advanced provider is selected.
//!
//! ## Commands
//!
//! - `docverter convert <FILE>` - Convert a document and print its text
//! - `docverter metadata <FILE>` - Show file and format metadata
//! - `docverter providers` - List providers and their capabilities
//! - `docverter config show|init|path` - Inspect configuration
//!
//! ## Examples
//!
//! ```bash
//! # Plain conversion
//! docverter convert report.pdf
//!
//! # OCR a scanned document, tables as Markdown
//! docverter convert scan.pdf --provider advanced --markdown --lang eng
//!
//! # Machine-readable result
//! docverter --format json convert invoice.docx
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use docverter_convert::ConverterRegistry;
use docverter_core::{ConversionSummary, ConvertOptions, OutputFormat};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "docverter")]
#[command(about = "Convert documents to text, with OCR for scanned input")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/docverter/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: Format,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum Format {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a document to text
    Convert(ConvertArgs),

    /// Show metadata of a document
    Metadata {
        /// File to inspect
        file: PathBuf,
    },

    /// List conversion providers and their capabilities
    Providers,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct ConvertArgs {
    /// File to convert
    file: PathBuf,

    /// Provider to use (default: from config)
    #[arg(short, long)]
    provider: Option<String>,

    /// Do not fall back to the standard provider
    #[arg(long)]
    no_fallback: bool,

    /// Render structured content (tables) as Markdown
    #[arg(long)]
    markdown: bool,

    /// Disable OCR
    #[arg(long)]
    no_ocr: bool,

    /// Disable table detection
    #[arg(long)]
    no_tables: bool,

    /// Disable image cleanup before OCR
    #[arg(long)]
    no_preprocess: bool,

    /// OCR language (tesseract code, e.g. "eng" or "fra+eng")
    #[arg(long)]
    lang: Option<String>,

    /// Image resolution hint for OCR
    #[arg(long)]
    dpi: Option<u32>,

    /// Write the text to a file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print only a preview of at most this many characters
    #[arg(long)]
    preview: Option<usize>,
}

impl ConvertArgs {
    fn options(&self) -> ConvertOptions {
        let defaults = ConvertOptions::default();
        ConvertOptions {
            output_format: if self.markdown {
                OutputFormat::Markdown
            } else {
                OutputFormat::Text
            },
            ocr: !self.no_ocr,
            detect_tables: !self.no_tables,
            preprocess_images: !self.no_preprocess,
            lang: self.lang.clone().unwrap_or(defaults.lang),
            dpi: self.dpi.unwrap_or(defaults.dpi),
        }
    }
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for a conversion.
#[derive(Serialize)]
struct ConvertOutput {
    file: String,
    provider: String,
    #[serde(flatten)]
    summary: ConversionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// Output structure for a provider.
#[derive(Serialize)]
struct ProviderOutput {
    name: String,
    ready: bool,
    capabilities: BTreeMap<String, bool>,
    supported_file_types: Vec<String>,
}

/// Verbose wins, then the configured level, then `info`.
fn log_level(verbose: bool, configured: &str) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::from_str(configured.trim()).unwrap_or(Level::INFO)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config from file or CLI-specified path
    let config = if let Some(ref path) = cli.config {
        Config::load_from(Some(path.clone()))
            .context(format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load().context("Failed to load config")?
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(cli.verbose, &config.logging.level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let registry = ConverterRegistry::default();

    match cli.command {
        Commands::Convert(args) => {
            if !args.file.exists() {
                anyhow::bail!("File does not exist: {}", args.file.display());
            }

            let converter = registry
                .get_document_converter(
                    args.provider.as_deref(),
                    Some(config.converter.clone()),
                    !args.no_fallback,
                )
                .await
                .context("No usable conversion provider")?;
            info!(
                "Converting {} with '{}'",
                args.file.display(),
                converter.provider_name()
            );

            let result = converter.convert_file(&args.file, &args.options()).await;

            match cli.format {
                Format::Json => {
                    let output = ConvertOutput {
                        file: args.file.to_string_lossy().to_string(),
                        provider: converter.provider_name().to_string(),
                        summary: result.to_summary(),
                        text: match args.preview {
                            Some(max) => Some(result.text_preview(max)),
                            None => result.into_text(),
                        },
                    };
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                Format::Text => {
                    if !result.is_success() {
                        anyhow::bail!(
                            "Conversion failed: {}",
                            result.error_message().unwrap_or("unknown error")
                        );
                    }
                    info!(
                        "{}/{} pages in {:.2}s",
                        result.pages_processed(),
                        result.total_pages(),
                        result.processing_time()
                    );
                    let text = match args.preview {
                        Some(max) => result.text_preview(max),
                        None => result.into_text().unwrap_or_default(),
                    };
                    if let Some(ref output) = args.output {
                        std::fs::write(output, &text)
                            .with_context(|| format!("Failed to write {}", output.display()))?;
                        info!(
                            "Wrote {} characters to {}",
                            text.chars().count(),
                            output.display()
                        );
                    } else {
                        println!("{text}");
                    }
                }
            }
        }

        Commands::Metadata { file } => {
            if !file.exists() {
                anyhow::bail!("File does not exist: {}", file.display());
            }

            let converter = registry
                .get_document_converter(None, Some(config.converter.clone()), true)
                .await
                .context("No usable conversion provider")?;
            let metadata = converter.extract_metadata(&file).await;

            match cli.format {
                Format::Json => {
                    println!("{}", serde_json::to_string_pretty(&metadata)?);
                }
                Format::Text => {
                    println!("Metadata for {}", file.display());
                    for (key, value) in &metadata {
                        println!("  {key}: {value}");
                    }
                }
            }
        }

        Commands::Providers => {
            let mut providers = Vec::new();
            for name in registry.list_available_converters() {
                let Some(converter) = registry.create_converter(&name, config.converter.clone())
                else {
                    warn!("Provider '{}' disappeared from the registry", name);
                    continue;
                };
                let ready = converter.initialize().await;
                providers.push(ProviderOutput {
                    name,
                    ready,
                    capabilities: converter
                        .capabilities()
                        .iter()
                        .map(|(key, usable)| (key.to_string(), usable))
                        .collect(),
                    supported_file_types: converter.supported_file_types(),
                });
            }

            match cli.format {
                Format::Json => {
                    println!("{}", serde_json::to_string_pretty(&providers)?);
                }
                Format::Text => {
                    for provider in &providers {
                        let status = if provider.ready { "ready" } else { "unavailable" };
                        println!("{} ({status})", provider.name);
                        for (key, usable) in &provider.capabilities {
                            println!("  {key}: {}", if *usable { "yes" } else { "no" });
                        }
                        if !provider.supported_file_types.is_empty() {
                            println!("  types: {}", provider.supported_file_types.join(", "));
                        }
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                Format::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                Format::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}
