//! Loader for YAML prompt overrides.

use crate::types::PromptDefinition;
use ragchat_core::{AppError, AppResult};
use std::path::{Path, PathBuf};

const PROMPT_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Load a prompt definition by id from a prompts directory.
///
/// Looks for `<id>.yml`, then `<id>.yaml`.
///
/// # Example
/// ```no_run
/// use ragchat_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("prompts"), "answer.grounded")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = PROMPT_EXTENSIONS
        .iter()
        .map(|ext| prompts_dir.join(format!("{}.{}", prompt_id, ext)))
        .find(|path| path.exists())
        .ok_or_else(|| {
            AppError::Prompt(format!(
                "Prompt file not found for '{}' in {:?}",
                prompt_id, prompts_dir
            ))
        })?;

    let definition = load_prompt_file(&prompt_file)?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}', expected '{}'",
            prompt_file, definition.id, prompt_id
        )));
    }

    Ok(definition)
}

/// Load and validate a single prompt file.
pub fn load_prompt_file(path: &Path) -> AppResult<PromptDefinition> {
    tracing::debug!("Loading prompt from: {:?}", path);

    let contents = std::fs::read_to_string(path)
        .map_err(|e| AppError::Prompt(format!("Failed to read prompt file {:?}: {}", path, e)))?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML {:?}: {}", path, e)))?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// List the prompt files in a prompts directory.
pub fn list_prompts(prompts_dir: &Path) -> AppResult<Vec<PathBuf>> {
    if !prompts_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(prompts_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|s| s.to_str())
                    .is_some_and(|ext| PROMPT_EXTENSIONS.contains(&ext))
        })
        .collect();

    files.sort();
    Ok(files)
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.trim().is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.trim().is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
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

    fn write_prompt(dir: &Path, file: &str, id: &str) {
        let content = format!(
            "id: {}\ntitle: \"Custom\"\ntemplate: \"Q: {{{{question}}}}\"\n",
            id
        );
        fs::write(dir.join(file), content).unwrap();
    }

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "query.rephrase.yaml", "query.rephrase");

        let prompt = load_prompt(temp_dir.path(), "query.rephrase").unwrap();
        assert_eq!(prompt.title, "Custom");
        assert_eq!(prompt.template, "Q: {{question}}");
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        assert!(load_prompt(temp_dir.path(), "nonexistent").is_err());
    }

    #[test]
    fn test_load_mismatched_id() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "answer.grounded.yml", "something.else");
        assert!(load_prompt(temp_dir.path(), "answer.grounded").is_err());
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("bad.yml"), "invalid: yaml: content:").unwrap();
        assert!(load_prompt_file(&temp_dir.path().join("bad.yml")).is_err());
    }

    #[test]
    fn test_list_prompts() {
        let temp_dir = TempDir::new().unwrap();
        write_prompt(temp_dir.path(), "a.yml", "a");
        write_prompt(temp_dir.path(), "b.yaml", "b");
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let prompts = list_prompts(temp_dir.path()).unwrap();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].ends_with("a.yml"));
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(list_prompts(&temp_dir.path().join("absent")).unwrap().is_empty());
    }
}
