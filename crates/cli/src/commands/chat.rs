//! Interactive question session.

use super::ask::print_answer;
use super::session::{parse_filter, start_pipeline};
use clap::Args;
use medrag_core::{config::AppConfig, AppResult};
use medrag_pipeline::PipelineController;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Answer questions read line by line from stdin
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Seconds to wait for the pipeline to initialize
    #[arg(long, default_value = "120")]
    pub wait_secs: u64,
}

/// What a line of input asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Question(&'a str),
    Filter(&'a str),
    Status,
    Quit,
    Empty,
}

fn classify(line: &str) -> Input<'_> {
    let line = line.trim();
    match line.split_once(' ').unwrap_or((line, "")) {
        ("", _) => Input::Empty,
        ("/filter", spec) => Input::Filter(spec.trim()),
        ("/status", _) => Input::Status,
        ("/quit" | "/exit", _) => Input::Quit,
        _ => Input::Question(line),
    }
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let controller = start_pipeline(config, self.wait_secs).await?;
        eprintln!("Ready. Ask a question, or use /filter SPEC, /status, /quit.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            eprint!("> ");
            std::io::stderr().flush().ok();

            let Some(line) = lines.next_line().await? else {
                break;
            };

            match classify(&line) {
                Input::Empty => continue,
                Input::Quit => break,
                Input::Status => eprintln!("{}", controller.get_status()),
                Input::Filter(spec) => match self.apply_filter(&controller, spec) {
                    Ok(()) => eprintln!("Filter set."),
                    Err(e) => eprintln!("Error: {}", e),
                },
                // Errors are reported and the session continues
                Input::Question(question) => match controller.answer(question).await {
                    Ok(result) => print_answer(&result),
                    Err(e) => eprintln!("Error: {}", e),
                },
            }
        }

        Ok(())
    }

    fn apply_filter(&self, controller: &PipelineController, spec: &str) -> AppResult<()> {
        controller.reconfigure(parse_filter(spec)?)?;
        tracing::info!("Active filter: {}", controller.current_filter()?);
        Ok(())
    }
}
