//! Ask command handler.
//!
//! Answers one question through the retrieval-and-answer pipeline.

use super::session::{parse_filter, start_pipeline};
use clap::Args;
use medrag_core::{config::AppConfig, AppError, AppResult};
use medrag_pipeline::AnswerResult;

/// Ask a question about the indexed corpus
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Retrieval filter: none, years:START-END, keywords:a,b or JSON
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Seconds to wait for the pipeline to initialize
    #[arg(long, default_value = "120")]
    pub wait_secs: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        // Reject a bad filter before paying for initialization
        let filter = self.filter.as_deref().map(parse_filter).transpose()?;

        let controller = start_pipeline(config, self.wait_secs).await?;
        if let Some(filter) = filter {
            controller.reconfigure(filter)?;
        }

        let result = controller.answer(&self.question).await?;

        if self.json {
            let json = serde_json::to_string_pretty(&json_output(&result))
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            print_answer(&result);
        }

        Ok(())
    }
}

pub(crate) fn print_answer(result: &AnswerResult) {
    println!("{}", result.answer_text);
    if !result.citations.is_empty() {
        println!();
        println!("Sources: {}", result.citations);
    }
    tracing::debug!(
        "Retrieved {} documents under filter {}",
        result.supporting_documents.len(),
        result.filter
    );
}

fn json_output(result: &AnswerResult) -> serde_json::Value {
    let documents: Vec<serde_json::Value> = result
        .supporting_documents
        .iter()
        .map(|doc| {
            serde_json::json!({
                "pmid": doc.pmid,
                "chunkId": doc.chunk_id,
                "title": doc.title,
                "score": doc.score,
                "year": doc.metadata.year,
            })
        })
        .collect();

    serde_json::json!({
        "answer": result.answer_text,
        "citations": result.citations,
        "references": result.references,
        "filter": result.filter,
        "documents": documents,
    })
}
