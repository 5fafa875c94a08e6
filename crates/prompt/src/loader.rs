//! Loader for YAML prompt definitions.

use crate::types::PromptDefinition;
use medrag_core::{AppError, AppResult};
use std::path::Path;

/// Load a prompt definition by ID from a templates directory.
///
/// Looks for `<templates_dir>/<id>.yml`.
pub fn load_definition(templates_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = templates_dir.join(format!("{}.yml", prompt_id));

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    if !prompt_file.exists() {
        return Err(AppError::Prompt(format!(
            "Prompt file not found: {:?}",
            prompt_file
        )));
    }

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to parse prompt YAML {:?}: {}",
            prompt_file, e
        ))
    })?;

    validate_definition(&definition, prompt_id)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List all template IDs in a templates directory.
pub fn list_templates(templates_dir: &Path) -> AppResult<Vec<String>> {
    if !templates_dir.exists() {
        return Ok(Vec::new());
    }

    let mut ids = Vec::new();

    for entry in walkdir::WalkDir::new(templates_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("yml") {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
    }

    ids.sort();
    Ok(ids)
}

fn validate_definition(def: &PromptDefinition, requested_id: &str) -> AppResult<()> {
    if def.id != requested_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {}.yml declares id '{}'",
            requested_id, def.id
        )));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, id: &str, template: &str) {
        fs::create_dir_all(dir).unwrap();
        let content = format!(
            "id: {}\ntitle: \"Test Prompt\"\napiVersion: \"1.0\"\ntemplate: \"{}\"\n",
            id, template
        );
        fs::write(dir.join(format!("{}.yml", id)), content).unwrap();
    }

    #[test]
    fn test_load_valid_definition() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "pubmed-qa", "Q: {{question}} C: {{context}}");

        let def = load_definition(temp_dir.path(), "pubmed-qa").unwrap();
        assert_eq!(def.id, "pubmed-qa");
        assert_eq!(def.title, "Test Prompt");
    }

    #[test]
    fn test_load_nonexistent_definition() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_definition(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("broken.yml"), "invalid: yaml: content:").unwrap();
        assert!(load_definition(temp_dir.path(), "broken").is_err());
    }

    #[test]
    fn test_id_mismatch_rejected() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "other", "{{question}} {{context}}");
        fs::rename(
            temp_dir.path().join("other.yml"),
            temp_dir.path().join("renamed.yml"),
        )
        .unwrap();

        let err = load_definition(temp_dir.path(), "renamed").unwrap_err();
        assert!(err.to_string().contains("declares id 'other'"));
    }

    #[test]
    fn test_list_templates_sorted() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "zeta", "{{question}} {{context}}");
        write_prompt(temp_dir.path(), "alpha", "{{question}} {{context}}");
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let ids = list_templates(temp_dir.path()).unwrap();
        assert_eq!(ids, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn test_list_templates_missing_dir() {
        let temp_dir = TempDir::new().unwrap();
        let ids = list_templates(&temp_dir.path().join("absent")).unwrap();
        assert!(ids.is_empty());
    }
}
