//! Index command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::create_embedder;
use crate::indexer::Indexer;
use crate::vector_store::create_vector_store;
use anyhow::Result;

/// Run the index command.
pub async fn run_index(dir: &str, clear: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let embedder = create_embedder(&settings.embedding)?;
    let vector_store = create_vector_store(&settings)?;
    let indexer = Indexer::new(&settings, embedder, vector_store.clone());

    let dir = Settings::expand_path(dir);
    let spinner = Output::spinner(&format!("Indexing {}...", dir.display()));

    let result = indexer.add_course_folder(&dir, clear).await;
    spinner.finish_and_clear();

    match result {
        Ok((courses, chunks)) => {
            if courses == 0 {
                Output::info("No new courses found.");
            } else {
                Output::success(&format!("Indexed {} courses ({} chunks)", courses, chunks));
            }
            Output::kv("Total courses", &vector_store.course_count().await?.to_string());
            Output::kv("Total chunks", &vector_store.document_count().await?.to_string());
        }
        Err(e) => {
            Output::error(&format!("Indexing failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
