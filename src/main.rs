// statement-ingest - extract and ingest bank statement PDFs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use statement_ingest::ingestion::InMemoryLedger;
use statement_ingest::types::RawDocument;
use statement_ingest::{
    parse_statement_period, DocumentExtractor, IngestConfig, IngestRequest, LedgerServices,
    StatementIngestor,
};

#[derive(Parser)]
#[command(name = "statement-ingest")]
#[command(author, version, about = "Turn bank statement PDFs into classified transactions")]
struct Cli {
    /// TOML file overriding the default thresholds and tools
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract text lines and statement metadata
    Extract {
        /// Path to PDF file
        pdf: PathBuf,
    },
    /// Extract, parse and classify transactions against a ledger
    Ingest {
        /// Path to PDF file
        pdf: PathBuf,
        /// Company the statement belongs to
        #[arg(long)]
        company: i64,
        /// Fiscal period the statement must fall in
        #[arg(long)]
        fiscal_period: Option<i64>,
        /// JSON ledger with fiscal periods and stored transactions
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Write accepted transactions back to the ledger file
        #[arg(long, requires = "ledger")]
        save: bool,
    },
    /// Parse a statement period such as "16 February 2024 to 18 March 2024"
    Period {
        text: String,
    },
}

fn main() -> Result<()> {
    // stdout carries JSON; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("statement_ingest=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = IngestConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Extract { pdf } => extract(&pdf, &config),
        Commands::Ingest {
            pdf,
            company,
            fiscal_period,
            ledger,
            save,
        } => ingest(&pdf, &config, company, fiscal_period, ledger.as_deref(), save),
        Commands::Period { text } => {
            let period = parse_statement_period(&text);
            println!("{}", serde_json::to_string_pretty(&period)?);
            Ok(())
        }
    }
}

fn read_document(path: &Path) -> Result<RawDocument> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(RawDocument::new(filename, bytes))
}

fn extract(pdf: &Path, config: &IngestConfig) -> Result<()> {
    let document = read_document(pdf)?;
    let extractor = DocumentExtractor::from_config(config);
    let result = extractor.parse_document(&document)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn ingest(
    pdf: &Path,
    config: &IngestConfig,
    company: i64,
    fiscal_period: Option<i64>,
    ledger_path: Option<&Path>,
    save: bool,
) -> Result<()> {
    let document = read_document(pdf)?;
    let ledger = match ledger_path {
        Some(path) => InMemoryLedger::load(path)?,
        None => InMemoryLedger::default(),
    };
    let ledger = Arc::new(ledger);

    let ingestor = StatementIngestor::from_config(config, LedgerServices::in_memory(ledger.clone()));
    let request = IngestRequest {
        company_id: company,
        target_fiscal_period: fiscal_period,
    };
    let result = ingestor.process(&document, &request)?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if let (true, Some(path)) = (save, ledger_path) {
        ledger.save(path)?;
    }
    Ok(())
}
