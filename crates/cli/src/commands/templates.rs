//! Templates command handler.

use clap::Args;
use medrag_core::{config::AppConfig, AppError, AppResult};
use medrag_prompt::{list_templates, DEFAULT_TEMPLATE_ID};

/// List available prompt templates
#[derive(Args, Debug)]
pub struct TemplatesCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl TemplatesCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let dir = config.templates_dir();
        let workspace = if dir.is_dir() {
            list_templates(&dir)?
        } else {
            tracing::debug!("Templates directory {:?} does not exist", dir);
            Vec::new()
        };

        if self.json {
            let output = serde_json::json!({
                "directory": dir,
                "workspace": workspace,
                "builtin": [DEFAULT_TEMPLATE_ID],
                "active": config.prompt.template_id,
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        for id in &workspace {
            let marker = if *id == config.prompt.template_id { "*" } else { " " };
            println!("{} {}", marker, id);
        }
        if !workspace.iter().any(|id| id == DEFAULT_TEMPLATE_ID) {
            let marker = if config.prompt.template_id == DEFAULT_TEMPLATE_ID { "*" } else { " " };
            println!("{} {} (builtin)", marker, DEFAULT_TEMPLATE_ID);
        }

        Ok(())
    }
}
