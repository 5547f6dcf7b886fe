//! Question answering over the course catalog.
//!
//! [`RagSystem`] wires the search provider, the tools, the [`Generator`] and
//! session history together. One query is one run of the tool-use loop;
//! runs are serialised so that citations collected after a run always
//! belong to it.

mod generator;
mod session;

pub use generator::{Generator, DEFAULT_MAX_ROUNDS, TOOL_FAILURE_MESSAGE};
pub use session::SessionManager;

#[cfg(test)]
pub(crate) use generator::testing;

use crate::config::{Prompts, Settings};
use crate::embedding::{create_embedder, Embedder};
use crate::error::Result;
use crate::indexer::Indexer;
use crate::llm::{create_llm_client, LlmClient};
use crate::search::{CourseSearch, SearchProvider};
use crate::tools::{CourseOutlineTool, CourseSearchTool, Source, ToolDispatcher, ToolRegistry};
use crate::vector_store::{create_vector_store, VectorStore};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};

/// Catalog summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

/// Answer text plus the citations gathered while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

pub struct RagSystem {
    prompts: Prompts,
    generator: Generator,
    tools: ToolRegistry,
    sessions: SessionManager,
    indexer: Indexer,
    vector_store: Arc<dyn VectorStore>,
    run_lock: Mutex<()>,
}

impl RagSystem {
    /// Build the system from settings: OpenAI embeddings, the configured
    /// vector store and LLM provider.
    pub fn new(settings: &Settings) -> Result<Self> {
        let embedder = create_embedder(&settings.embedding)?;
        let vector_store = create_vector_store(settings)?;
        let llm = create_llm_client(&settings.llm)?;

        Self::with_components(settings, embedder, vector_store, llm)
    }

    /// Build the system from explicit components.
    pub fn with_components(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        vector_store: Arc<dyn VectorStore>,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let search: Arc<dyn SearchProvider> = Arc::new(CourseSearch::new(
            vector_store.clone(),
            embedder.clone(),
            settings.vector_store.max_results,
        ));

        let mut tools = ToolRegistry::new();
        tools.register(Box::new(CourseSearchTool::new(search.clone())))?;
        tools.register(Box::new(CourseOutlineTool::new(search)))?;

        let generator = Generator::from_settings(llm, &settings.llm, prompts.system_prompt());

        Ok(Self {
            prompts,
            generator,
            tools,
            sessions: SessionManager::new(settings.session.max_history),
            indexer: Indexer::new(settings, embedder, vector_store.clone()),
            vector_store,
            run_lock: Mutex::new(()),
        })
    }

    /// Answer a question, recording the exchange in the session when given.
    #[instrument(skip(self))]
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<QueryResponse> {
        let _run = self.run_lock.lock().await;

        let prompt = self.prompts.render_query(query);
        let history = session_id.and_then(|id| self.sessions.get_conversation_history(id));

        // Drop citations left over from a run that failed before collection
        self.tools.reset_sources();

        let answer = self
            .generator
            .generate(
                &prompt,
                history.as_deref(),
                &self.tools.definitions(),
                Some(&self.tools as &dyn ToolDispatcher),
            )
            .await?;

        // A failed tool round answers with no citations
        let sources = if answer == TOOL_FAILURE_MESSAGE {
            Vec::new()
        } else {
            self.tools.last_sources()
        };
        self.tools.reset_sources();

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &answer);
        }

        info!("Answered with {} sources", sources.len());
        Ok(QueryResponse { answer, sources })
    }

    pub async fn course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.vector_store.course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: course_titles.len(),
            course_titles,
        })
    }

    /// Index every course file in `dir`. See [`Indexer::add_course_folder`].
    pub async fn add_course_folder(&self, dir: &Path, clear_existing: bool) -> Result<(usize, usize)> {
        self.indexer.add_course_folder(dir, clear_existing).await
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn indexer(&self) -> &Indexer {
        &self.indexer
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }
}
