use clap::Parser;
use equity_dossier::{render::render_markdown, Config, DossierService, UploadedDocument};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Build a research dossier for an NSE/BSE listed company.
#[derive(Parser, Debug)]
#[command(name = "dossier", version, about)]
struct Cli {
    /// Ticker or company symbol, e.g. INFY or RELIANCE.NS
    query: String,

    /// Investor presentation or transcript to analyze (.pdf or .pptx)
    #[arg(short, long = "document", value_name = "PATH")]
    documents: Vec<PathBuf>,

    /// Print the dossier as JSON instead of Markdown
    #[arg(long)]
    json: bool,
}

fn read_documents(paths: &[PathBuf]) -> std::io::Result<Vec<UploadedDocument>> {
    paths
        .iter()
        .map(|path| {
            let file_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            Ok(UploadedDocument {
                file_name,
                bytes: std::fs::read(path)?,
            })
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so stdout stays clean for the dossier
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;
    let uploads = read_documents(&cli.documents)?;
    let service = DossierService::from_config(&config)?;

    info!(query = %cli.query, documents = uploads.len(), "Building dossier");

    match service.build(&cli.query, &uploads).await {
        Ok(dossier) => {
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&dossier)?);
            } else {
                println!("{}", render_markdown(&dossier));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Dossier failed: {}", e);
            Err(Box::new(e) as Box<dyn std::error::Error>)
        }
    }
}
