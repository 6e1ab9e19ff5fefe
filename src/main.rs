use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::info;

use wordgen_rs::core::template::FsTemplateSource;
use wordgen_rs::core::writer::DocxWriter;
use wordgen_rs::utils::artifact_store::FsArtifactStore;
use wordgen_rs::utils::image_fetcher::HttpImageSource;
use wordgen_rs::{DocumentAssembler, GenerateRequest, Presets};

#[derive(Parser, Debug)]
#[command(name = "wordgen", version, about = "Generate .docx documents from JSON requests")]
struct Cli {
    /// Directory generated documents are written to
    #[arg(long, env = "WORDGEN_OUTPUT_DIR", default_value = "exports")]
    output_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a request file into a .docx
    Generate {
        /// JSON request: title, header, footer, sections, wordConfig
        request: PathBuf,

        /// Directory holding the .dotx templates
        #[arg(long, env = "WORDGEN_TEMPLATES_DIR", default_value = "templates")]
        templates_dir: PathBuf,

        /// Base URL the download link is built from
        #[arg(long, env = "WORDGEN_PUBLIC_URL", default_value = "http://localhost:8080")]
        public_url: String,

        #[arg(long, env = "WORDGEN_IMAGE_TIMEOUT_SECS", default_value_t = 10)]
        image_timeout_secs: u64,
    },
    /// Delete generated documents older than the retention window
    Sweep {
        #[arg(long, env = "WORDGEN_RETENTION_SECS", default_value_t = 3600)]
        retention_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let store = FsArtifactStore::new(&cli.output_dir);

    match cli.command {
        Command::Generate {
            request,
            templates_dir,
            public_url,
            image_timeout_secs,
        } => {
            let json = tokio::fs::read_to_string(&request).await?;
            let request = GenerateRequest::from_json(&json)?;
            request.validate()?;

            let assembler = DocumentAssembler::new(
                Presets::builtin(),
                Arc::new(HttpImageSource::new(Duration::from_secs(image_timeout_secs))?),
                Arc::new(FsTemplateSource::new(templates_dir)),
                Arc::new(DocxWriter::new()),
                Arc::new(store),
            );
            let name = assembler.generate(&request).await?;
            info!("Generated {} in {}", name, cli.output_dir.display());

            println!("✅ {}", name);
            println!("{}/word-generator/downloads/{}", public_url.trim_end_matches('/'), name);
        }
        Command::Sweep { retention_secs } => {
            let removed = store.sweep_expired(Duration::from_secs(retention_secs)).await?;
            println!("✅ Removed {} expired document(s)", removed);
        }
    }

    Ok(())
}
