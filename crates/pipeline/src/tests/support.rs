//! In-memory doubles for the external services the controller drives.

use crate::bootstrap::{CompletionHandle, Credentials, PipelineBootstrap};
use medrag_core::{AppError, AppResult};
use medrag_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use medrag_prompt::{BuiltinTemplateSource, PromptTemplate, TemplateSource, DEFAULT_TEMPLATE_ID};
use medrag_retrieval::{
    document::sort_by_score, Document, RetrieverOptions, SearchConstraint, SearchService,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Ranks a fixed corpus by its stored scores.
pub struct StaticSearch {
    docs: Vec<Document>,
    constrained: bool,
    pub calls: AtomicUsize,
}

impl StaticSearch {
    pub fn new(docs: Vec<Document>, constrained: bool) -> Arc<Self> {
        Arc::new(Self {
            docs,
            constrained,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl SearchService for StaticSearch {
    fn name(&self) -> &str {
        "static"
    }

    fn supports_constraints(&self) -> bool {
        self.constrained
    }

    async fn search(
        &self,
        _query: &str,
        constraint: Option<&SearchConstraint>,
        k: usize,
    ) -> AppResult<Vec<Document>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut docs: Vec<Document> = self
            .docs
            .iter()
            .filter(|d| constraint.map_or(true, |c| c.admits(d)))
            .cloned()
            .collect();
        sort_by_score(&mut docs);
        docs.truncate(k);
        Ok(docs)
    }
}

/// Echoes a fixed answer and records every prompt. When gated, signals
/// `entered` and waits for `release` before replying.
pub struct ScriptedLlm {
    reply: String,
    pub prompts: Mutex<Vec<String>>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedLlm {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    pub fn gated(reply: &str, entered: Arc<Notify>, release: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
            gate: Some((entered, release)),
        })
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }
        Ok(LlmResponse {
            content: self.reply.clone(),
            model: request.model.clone(),
            usage: LlmUsage::default(),
        })
    }
}

/// Which step of `FakeBootstrap` should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Credentials,
    Search,
    Template,
}

pub struct FakeBootstrap {
    pub search: Arc<StaticSearch>,
    pub llm: Arc<ScriptedLlm>,
    pub credential_calls: AtomicUsize,
    fail_at: Mutex<Option<FailAt>>,
    panic_on_credentials: AtomicBool,
    /// When set, the search step waits for a notification.
    search_gate: Option<Arc<Notify>>,
}

impl FakeBootstrap {
    pub fn new(search: Arc<StaticSearch>, llm: Arc<ScriptedLlm>) -> Self {
        Self {
            search,
            llm,
            credential_calls: AtomicUsize::new(0),
            fail_at: Mutex::new(None),
            panic_on_credentials: AtomicBool::new(false),
            search_gate: None,
        }
    }

    pub fn failing_at(self, step: FailAt) -> Self {
        *self.fail_at.lock().unwrap() = Some(step);
        self
    }

    pub fn panicking(self) -> Self {
        self.panic_on_credentials.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_search_gate(mut self, gate: Arc<Notify>) -> Self {
        self.search_gate = Some(gate);
        self
    }

    pub fn heal(&self) {
        *self.fail_at.lock().unwrap() = None;
    }

    fn fails(&self, step: FailAt) -> bool {
        *self.fail_at.lock().unwrap() == Some(step)
    }
}

#[async_trait::async_trait]
impl PipelineBootstrap for FakeBootstrap {
    async fn acquire_credentials(&self) -> AppResult<Credentials> {
        self.credential_calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_on_credentials.load(Ordering::SeqCst) {
            panic!("credential store exploded");
        }
        if self.fails(FailAt::Credentials) {
            return Err(AppError::Config("API key not found".to_string()));
        }
        Ok(Credentials::default())
    }

    async fn completion_service(&self, _credentials: &Credentials) -> AppResult<CompletionHandle> {
        Ok(CompletionHandle {
            client: self.llm.clone(),
            model: "test-model".to_string(),
            timeout: Duration::from_secs(30),
        })
    }

    async fn search_service(&self) -> AppResult<Arc<dyn SearchService>> {
        if let Some(gate) = &self.search_gate {
            gate.notified().await;
        }
        if self.fails(FailAt::Search) {
            return Err(AppError::RetrievalFailed("index unreachable".to_string()));
        }
        Ok(self.search.clone())
    }

    async fn prompt_template(&self) -> AppResult<PromptTemplate> {
        if self.fails(FailAt::Template) {
            return Err(AppError::Prompt("template missing".to_string()));
        }
        BuiltinTemplateSource.fetch(DEFAULT_TEMPLATE_ID).await
    }

    fn retriever_options(&self) -> RetrieverOptions {
        RetrieverOptions {
            top_k: 20,
            ..RetrieverOptions::default()
        }
    }
}

/// Corpus where the out-of-range article outranks the in-range ones.
pub fn corpus() -> Vec<Document> {
    vec![
        Document::new("123", "123-0", "European capitals", "Paris is the capital of France.")
            .with_score(0.95)
            .with_year(2015),
        Document::new("123", "123-1", "European capitals", "France borders Spain.")
            .with_score(0.90)
            .with_year(2015),
        Document::new("456", "456-0", "Metformin outcomes", "Metformin lowers glucose.")
            .with_score(0.60)
            .with_year(2019)
            .with_keywords(["Diabetes"]),
        Document::new("789", "789-0", "Asthma cohort", "Inhaled steroids reduce exacerbations.")
            .with_score(0.40)
            .with_year(2020)
            .with_keywords(["Asthma"]),
        Document::new("321", "321-0", "Old survey", "A survey from the nineties.")
            .with_score(0.30)
            .with_year(1999),
    ]
}
