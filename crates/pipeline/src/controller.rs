//! Pipeline lifecycle and request entry points.
//!
//! `PipelineController` owns the readiness state machine
//! (`Uninitialized -> Initializing -> {Ready, Failed}`) and the active
//! pipeline. The active pipeline is an immutable `Snapshot` behind an
//! `Arc`; requests clone the `Arc` and run against it without holding any
//! lock, and `reconfigure` replaces the whole snapshot at once.

use crate::bootstrap::PipelineBootstrap;
use crate::references::ReferenceBuilder;
use crate::synthesizer::AnswerSynthesizer;
use crate::types::{AnswerResult, PipelineState, PipelineStatus};
use medrag_core::{AppError, AppResult};
use medrag_retrieval::{FilteredRetriever, RetrievalFilter};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::watch;

const MSG_CREDENTIALS: &str = "Setting up API keys...";
const MSG_LLM: &str = "Initializing LLM model...";
const MSG_SEARCH: &str = "Initializing search backend...";
const MSG_PIPELINE: &str = "Setting up RAG pipeline...";
const MSG_FINISHED: &str = "Setup finished!";

/// A retriever and the synthesizer it feeds, always swapped together.
#[derive(Debug)]
struct Snapshot {
    retriever: FilteredRetriever,
    synthesizer: AnswerSynthesizer,
}

struct Inner {
    bootstrap: Arc<dyn PipelineBootstrap>,
    status: watch::Sender<PipelineStatus>,
    active: RwLock<Option<Arc<Snapshot>>>,
}

/// Shared handle to the answer pipeline. Clones refer to the same pipeline.
#[derive(Clone)]
pub struct PipelineController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PipelineController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineController")
            .field("status", &*self.inner.status.borrow())
            .finish()
    }
}

impl PipelineController {
    pub fn new(bootstrap: Arc<dyn PipelineBootstrap>) -> Self {
        let (status, _) = watch::channel(PipelineStatus::uninitialized());
        Self {
            inner: Arc::new(Inner {
                bootstrap,
                status,
                active: RwLock::new(None),
            }),
        }
    }

    /// Start initialization on a background task.
    ///
    /// Only the caller that moves the state out of `Uninitialized` or
    /// `Failed` starts a run; everyone else gets `false`. Must be called
    /// from within a Tokio runtime.
    pub fn request_initialization(&self) -> bool {
        let claimed = self.inner.status.send_if_modified(|status| match status.state {
            PipelineState::Uninitialized | PipelineState::Failed => {
                *status = PipelineStatus::new(PipelineState::Initializing, MSG_CREDENTIALS);
                true
            }
            PipelineState::Initializing | PipelineState::Ready => false,
        });

        if claimed {
            tracing::info!("Pipeline initialization started");
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move { Inner::run_initialization(inner).await });
        } else {
            tracing::debug!("Pipeline initialization already requested");
        }

        claimed
    }

    /// Latest state and message. Never blocks on initialization.
    pub fn get_status(&self) -> PipelineStatus {
        self.inner.status.borrow().clone()
    }

    /// Receive every status change from now on.
    pub fn subscribe(&self) -> watch::Receiver<PipelineStatus> {
        self.inner.status.subscribe()
    }

    /// Wait until the pipeline is `Ready` or `Failed`, or `timeout` elapses,
    /// and return the status at that point. Does not trigger initialization.
    pub async fn wait_until_settled(&self, timeout: Duration) -> PipelineStatus {
        let mut receiver = self.subscribe();
        // The sender lives as long as `self`, so `wait_for` cannot fail here.
        let _ = tokio::time::timeout(timeout, receiver.wait_for(|s| s.state.is_settled())).await;
        self.get_status()
    }

    /// Retrieve, synthesize and cite against the active pipeline.
    pub async fn answer(&self, query: &str) -> AppResult<AnswerResult> {
        let snapshot = self.ready_snapshot()?;

        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::InvalidArgument("query must not be empty".to_string()));
        }

        let documents = snapshot.retriever.retrieve_configured(query).await?;
        let answer_text = snapshot.synthesizer.synthesize(query, &documents).await?;

        let references = ReferenceBuilder::citations(&documents);
        let citations = ReferenceBuilder::render(&references);

        tracing::info!(
            filter = %snapshot.retriever.filter(),
            documents = documents.len(),
            sources = references.len(),
            "Answered query"
        );

        Ok(AnswerResult {
            answer_text,
            supporting_documents: documents,
            citations,
            references,
            filter: snapshot.retriever.filter().clone(),
        })
    }

    /// Replace the active retriever with one using `filter`.
    ///
    /// Requests already running keep the snapshot they started with.
    pub fn reconfigure(&self, filter: RetrievalFilter) -> AppResult<()> {
        self.ensure_ready()?;

        let mut active = self
            .inner
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let current = active
            .as_ref()
            .ok_or_else(|| AppError::NotReady("No active pipeline".to_string()))?;

        let next = Snapshot {
            retriever: current.retriever.with_filter(filter),
            synthesizer: current.synthesizer.clone(),
        };
        tracing::info!(
            from = %current.retriever.filter(),
            to = %next.retriever.filter(),
            "Reconfigured retrieval filter"
        );
        *active = Some(Arc::new(next));

        Ok(())
    }

    /// The filter new requests will be retrieved under.
    pub fn current_filter(&self) -> AppResult<RetrievalFilter> {
        Ok(self.ready_snapshot()?.retriever.filter().clone())
    }

    fn ensure_ready(&self) -> AppResult<()> {
        let status = self.inner.status.borrow();
        if status.state == PipelineState::Ready {
            Ok(())
        } else {
            Err(AppError::NotReady(format!(
                "pipeline is {} ({})",
                status.state, status.message
            )))
        }
    }

    fn ready_snapshot(&self) -> AppResult<Arc<Snapshot>> {
        self.ensure_ready()?;
        self.inner
            .active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| AppError::NotReady("No active pipeline".to_string()))
    }
}

impl Inner {
    async fn run_initialization(inner: Arc<Inner>) {
        // A panicking bootstrap must still leave the controller in `Failed`.
        let task = tokio::spawn(Inner::build_snapshot(Arc::clone(&inner)));
        let outcome = match task.await {
            Ok(result) => result,
            Err(join_error) => Err(AppError::InitializationFailed(format!(
                "initialization task aborted: {}",
                join_error
            ))),
        };

        match outcome {
            Ok(snapshot) => {
                *inner.active.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::new(snapshot));
                inner.set_status(PipelineState::Ready, MSG_FINISHED);
                tracing::info!("Pipeline ready");
            }
            Err(err) => {
                tracing::error!("Pipeline initialization failed: {}", err);
                inner.set_status(PipelineState::Failed, err.to_string());
            }
        }
    }

    async fn build_snapshot(inner: Arc<Inner>) -> AppResult<Snapshot> {
        let bootstrap = &inner.bootstrap;

        inner.progress(MSG_CREDENTIALS);
        let credentials = bootstrap
            .acquire_credentials()
            .await
            .map_err(|e| step_failed("setting up API keys", e))?;

        inner.progress(MSG_LLM);
        let completion = bootstrap
            .completion_service(&credentials)
            .await
            .map_err(|e| step_failed("initializing LLM model", e))?;

        inner.progress(MSG_SEARCH);
        let search = bootstrap
            .search_service()
            .await
            .map_err(|e| step_failed("initializing search backend", e))?;
        let retriever = FilteredRetriever::with_options(
            search,
            RetrievalFilter::none(),
            bootstrap.retriever_options(),
        );

        inner.progress(MSG_PIPELINE);
        let template = bootstrap
            .prompt_template()
            .await
            .map_err(|e| step_failed("loading prompt template", e))?;
        let synthesizer = AnswerSynthesizer::new(
            completion.client,
            completion.model,
            template,
            completion.timeout,
        );

        Ok(Snapshot {
            retriever,
            synthesizer,
        })
    }

    fn progress(&self, message: &str) {
        tracing::debug!("{}", message);
        self.set_status(PipelineState::Initializing, message);
    }

    fn set_status(&self, state: PipelineState, message: impl Into<String>) {
        self.status.send_replace(PipelineStatus::new(state, message));
    }
}

fn step_failed(step: &str, err: AppError) -> AppError {
    AppError::InitializationFailed(format!("{}: {}", step, err))
}
