//! memoria — harvest dissertation records and grade the extracted text of
//! their PDFs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use memoria_common::{HttpClient, MemoriaConfig};
use memoria_ingestion::export::write_csv;
use memoria_ingestion::language::{detect_languages, StopwordDetector};
use memoria_ingestion::pipeline::{apply_date_filter, build_corpus, DocumentAnalyzer};
use memoria_ingestion::sources::jsonl::{write_records, JsonlSource};
use memoria_ingestion::sources::oai::OaiClient;
use memoria_ingestion::sources::RecordSource;
use memoria_ingestion::tokenizer::RegexTokenizer;
use memoria_ingestion::DocumentFetcher;

#[derive(Parser, Debug)]
#[command(name = "memoria", version, about = "Dissertation harvester and PDF text-quality analyzer")]
struct Cli {
    /// Config file (defaults to $MEMORIA_CONFIG, then ./memoria.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Harvest records, build the corpus, analyze its documents and export it
    Harvest(HarvestArgs),
    /// Analyze one PDF and print its metrics
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
struct HarvestArgs {
    /// Read records from a JSON-lines dump instead of the repository
    #[arg(long)]
    records: Option<PathBuf>,
    /// Also write the harvested records to a JSON-lines dump
    #[arg(long)]
    dump: Option<PathBuf>,
    #[arg(long)]
    limit: Option<usize>,
    /// Export right after language detection
    #[arg(long)]
    skip_analysis: bool,
    /// CSV path, overrides export.path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    url: String,
    #[arg(long)]
    language: String,
    /// Where to write the sanitized text
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("memoria=info,warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => MemoriaConfig::load_from(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => MemoriaConfig::load_or_default()?,
    };

    match cli.command {
        Command::Harvest(args) => harvest(&config, args).await,
        Command::Analyze(args) => analyze(&config, args).await,
    }
}

fn analyzer(config: &MemoriaConfig, client: HttpClient) -> DocumentAnalyzer {
    let tokenizer = Arc::new(RegexTokenizer::from_config(&config.analysis));
    DocumentAnalyzer::new(DocumentFetcher::new(client), tokenizer, config)
}

async fn harvest(config: &MemoriaConfig, args: HarvestArgs) -> Result<()> {
    let client = HttpClient::new(&config.http)?;

    let source: Box<dyn RecordSource> = match &args.records {
        Some(path) => {
            info!(path = %path.display(), "Reading records from dump");
            Box::new(JsonlSource::new(path))
        }
        None => {
            if config.repository.url.is_empty() {
                anyhow::bail!("repository.url is not set; pass --records or configure a repository");
            }
            info!(url = %config.repository.url, set = ?config.repository.set, "Harvesting repository");
            Box::new(OaiClient::new(client.clone(), &config.repository))
        }
    };
    let records = source.records(args.limit).await?;

    if let Some(dump) = &args.dump {
        write_records(dump, &records)?;
    }

    let mut corpus = build_corpus(&records, &config.documents.server_base);
    apply_date_filter(&mut corpus, &config.analysis);
    let detector = StopwordDetector::new(config.analysis.supported_languages.iter().map(String::as_str));
    detect_languages(&mut corpus, &detector)?;

    if args.skip_analysis {
        info!("Skipping document analysis");
    } else {
        let summary = analyzer(config, client).analyze_corpus(&mut corpus).await?;
        if summary.failed > 0 {
            warn!(failed = summary.failed, "Some documents could not be analyzed");
        }
    }

    let output = args.output.unwrap_or_else(|| config.export.path.clone());
    write_csv(&corpus, &output)?;
    println!("{} dissertations written to {}", corpus.len(), output.display());
    Ok(())
}

async fn analyze(config: &MemoriaConfig, args: AnalyzeArgs) -> Result<()> {
    let analyzer = analyzer(config, HttpClient::new(&config.http)?);

    let mut doc = analyzer.document(&args.url).await;
    if let Some(output) = args.output {
        doc = doc.with_output_path(output);
    }
    doc.set_language(&args.language);

    let report = analyzer.analyze(doc).await?;
    let doc = &report.document;
    let metrics = serde_json::json!({
        "url": doc.source_url(),
        "file_name": doc.file_name(),
        "language": doc.language(),
        "page_count": doc.page_count,
        "image_count": doc.image_count,
        "ocr_quality": doc.ocr_quality,
        "token_count": doc.token_count,
        "text_path": doc.output_text_path().map(|p| p.display().to_string()),
        "outcome": report.outcome,
    });
    println!("{}", serde_json::to_string_pretty(&metrics)?);

    if !report.is_complete() {
        anyhow::bail!("analysis of {} did not complete", args.url);
    }
    Ok(())
}
