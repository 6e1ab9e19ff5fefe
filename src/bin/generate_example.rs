use std::path::Path;
use std::sync::Arc;

use wordgen_rs::core::template::FsTemplateSource;
use wordgen_rs::core::writer::DocxWriter;
use wordgen_rs::utils::artifact_store::FsArtifactStore;
use wordgen_rs::utils::image_fetcher::NoImages;
use wordgen_rs::{DocumentAssembler, GenerateRequest, Presets};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = Path::new("./data");
    if !data_dir.exists() {
        println!("No data/ directory found. Create data/ and place request .json files there.");
        return Ok(());
    }

    // Images are not fetched here; they render as placeholders.
    let assembler = DocumentAssembler::new(
        Presets::builtin(),
        Arc::new(NoImages),
        Arc::new(FsTemplateSource::new("./templates")),
        Arc::new(DocxWriter::new()),
        Arc::new(FsArtifactStore::new(data_dir.join("out"))),
    );

    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        let path = entry.path();
        if let Some(ext) = path.extension() {
            if ext == "json" {
                println!("Rendering {}", path.display());
                let request = GenerateRequest::from_json(&std::fs::read_to_string(&path)?)?;
                println!("Found {} sections", request.sections.len());
                let name = assembler.generate(&request).await?;
                println!("-> data/out/{}", name);
            }
        }
    }

    Ok(())
}
