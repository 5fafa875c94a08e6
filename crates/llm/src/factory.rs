//! Completion provider factory.
//!
//! Resolves a provider name plus optional endpoint and secret into a shared
//! `LlmClient` handle.

use crate::client::LlmClient;
use crate::providers::{OllamaClient, OpenAiClient};
use std::sync::Arc;
use std::time::Duration;

/// Create a completion client based on the provider name.
///
/// # Arguments
/// * `provider` - Provider identifier ("ollama", "openai")
/// * `endpoint` - Optional custom endpoint URL
/// * `api_key` - Optional API key (required by "openai")
/// * `timeout` - Optional transport-level timeout
///
/// # Errors
/// Returns a message if the provider is unknown, a required secret is
/// missing, or the HTTP client cannot be built.
pub fn create_client(
    provider: &str,
    endpoint: Option<&str>,
    api_key: Option<&str>,
    timeout: Option<Duration>,
) -> Result<Arc<dyn LlmClient>, String> {
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let mut client = OllamaClient::with_base_url(endpoint.unwrap_or("http://localhost:11434"));
            if let Some(timeout) = timeout {
                client = client.with_timeout(timeout).map_err(|e| e.to_string())?;
            }
            Ok(Arc::new(client))
        }
        "openai" => {
            let api_key = api_key.ok_or_else(|| "OpenAI provider requires API key".to_string())?;
            let mut client = match endpoint {
                Some(endpoint) => OpenAiClient::with_endpoint(endpoint, api_key),
                None => OpenAiClient::new(api_key),
            };
            if let Some(timeout) = timeout {
                client = client.with_timeout(timeout).map_err(|e| e.to_string())?;
            }
            Ok(Arc::new(client))
        }
        _ => Err(format!("Unknown provider: {}", provider)),
    }
}
