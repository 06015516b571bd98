//! Domain configuration loading and process-level settings.
//!
//! Domain configs are declarative YAML files describing an evaluation domain:
//! its categories, generation context, and scenario ID prefix. Validation is
//! explicit so a missing field is reported by name rather than as an opaque
//! deserialization failure.

use std::path::{Path, PathBuf};

use serde_yaml::Value;

use crate::error::ConfigError;

/// Configuration for a single physics category within a domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryConfig {
    pub name: String,
    pub description: String,
    pub example_scenarios: Vec<String>,
}

/// Configuration for a physics domain (e.g. autonomous driving).
///
/// Loaded fresh per generation run from a YAML file; read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    pub domain_id: String,
    pub domain_name: String,
    pub description: String,
    pub context_prompt: String,
    pub id_prefix: String,
    pub categories: Vec<CategoryConfig>,
}

impl DomainConfig {
    /// Names of all categories declared by this domain, in order.
    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }
}

const REQUIRED_FIELDS: [&str; 6] = [
    "domain_id",
    "domain_name",
    "description",
    "context_prompt",
    "id_prefix",
    "categories",
];

/// Load and validate a domain configuration from a YAML file.
pub fn load_domain_config(config_path: &Path) -> Result<DomainConfig, ConfigError> {
    if !config_path.exists() {
        return Err(ConfigError::NotFound(config_path.to_path_buf()));
    }

    let raw_text = std::fs::read_to_string(config_path)?;
    let raw: Value = serde_yaml::from_str(&raw_text).map_err(|e| ConfigError::InvalidYaml {
        path: config_path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mapping = raw.as_mapping().ok_or_else(|| ConfigError::NotAMapping {
        path: config_path.to_path_buf(),
    })?;

    for field in REQUIRED_FIELDS {
        if !mapping.contains_key(&Value::from(field)) {
            return Err(ConfigError::MissingField {
                path: config_path.to_path_buf(),
                field: field.to_string(),
            });
        }
    }

    let categories = parse_categories(&raw["categories"], config_path)?;

    Ok(DomainConfig {
        domain_id: string_field(&raw, "domain_id"),
        domain_name: string_field(&raw, "domain_name"),
        description: string_field(&raw, "description"),
        context_prompt: string_field(&raw, "context_prompt"),
        id_prefix: string_field(&raw, "id_prefix"),
        categories,
    })
}

fn string_field(raw: &Value, field: &str) -> String {
    raw[field].as_str().unwrap_or_default().to_string()
}

fn parse_categories(value: &Value, config_path: &Path) -> Result<Vec<CategoryConfig>, ConfigError> {
    let entries = value.as_sequence().cloned().unwrap_or_default();
    let mut categories = Vec::with_capacity(entries.len());

    for (index, entry) in entries.iter().enumerate() {
        let name = entry["name"]
            .as_str()
            .ok_or_else(|| ConfigError::MissingCategoryName {
                path: config_path.to_path_buf(),
                index,
            })?
            .to_string();
        let description = entry["description"].as_str().unwrap_or_default().to_string();
        let example_scenarios = entry["example_scenarios"]
            .as_sequence()
            .map(|seq| {
                seq.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();

        categories.push(CategoryConfig {
            name,
            description,
            example_scenarios,
        });
    }

    Ok(categories)
}

/// List available domain config names (file stems) across search directories.
pub fn list_available_domains(search_dirs: &[PathBuf]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for dir in search_dirs {
        let Ok(entries) = std::fs::read_dir(dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "yaml") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
    }
    names.sort();
    names.dedup();
    names
}

/// Resolve the YAML config path for a domain name, if it exists.
pub fn resolve_domain_config_path(domain: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    search_dirs
        .iter()
        .map(|dir| dir.join(format!("{domain}.yaml")))
        .find(|path| path.exists())
}

/// Process-level settings, built once by the CLI layer and passed by
/// reference to every component that needs them. Business logic never reads
/// environment variables directly.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Google AI Studio API key.
    pub api_key: String,
    /// Text model used for scenario generation and video judgment.
    pub text_model: String,
    /// Video model used for scenario rendering.
    pub video_model: String,
    /// Root directory for datasets, videos, results, and configs.
    pub data_dir: PathBuf,
}

impl Settings {
    pub fn configs_dir(&self) -> PathBuf {
        self.data_dir.join("configs")
    }

    pub fn datasets_dir(&self) -> PathBuf {
        self.data_dir.join("datasets")
    }

    pub fn videos_dir(&self) -> PathBuf {
        self.data_dir.join("videos")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.data_dir.join("results")
    }

    /// Config search order: the data dir first, then a repo-local `configs/`.
    pub fn config_search_dirs(&self) -> Vec<PathBuf> {
        vec![self.configs_dir(), PathBuf::from("configs")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const VALID_CONFIG: &str = r#"
domain_id: autonomous_driving
domain_name: Autonomous Driving
description: Physics scenarios around road vehicles.
context_prompt: You are designing physics tests for driving scenes.
id_prefix: AD
categories:
  - name: vehicle_collision
    description: Collisions between vehicles and obstacles.
    example_scenarios:
      - A sedan rear-ends a stationary truck.
  - name: braking
"#;

    fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).expect("create config");
        file.write_all(contents.as_bytes()).expect("write config");
        path
    }

    #[test]
    fn test_load_valid_config() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "autonomous_driving.yaml", VALID_CONFIG);

        let config = load_domain_config(&path).expect("config should load");
        assert_eq!(config.domain_id, "autonomous_driving");
        assert_eq!(config.id_prefix, "AD");
        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.categories[0].example_scenarios.len(), 1);
        // Optional fields default to empty
        assert_eq!(config.categories[1].description, "");
        assert!(config.categories[1].example_scenarios.is_empty());
        assert_eq!(config.category_names(), vec!["vehicle_collision", "braking"]);
    }

    #[test]
    fn test_missing_context_prompt_names_the_field() {
        let dir = TempDir::new().unwrap();
        let without_context = VALID_CONFIG.replace("context_prompt:", "other_prompt:");
        let path = write_config(&dir, "broken.yaml", &without_context);

        let err = load_domain_config(&path).expect_err("load should fail");
        match err {
            ConfigError::MissingField { field, .. } => assert_eq!(field, "context_prompt"),
            other => panic!("expected MissingField, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file() {
        let err = load_domain_config(Path::new("/nonexistent/x.yaml")).expect_err("should fail");
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "bad.yaml", "categories: [unterminated");

        let err = load_domain_config(&path).expect_err("should fail");
        assert!(matches!(err, ConfigError::InvalidYaml { .. }));
    }

    #[test]
    fn test_non_mapping_root() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "list.yaml", "- just\n- a\n- list\n");

        let err = load_domain_config(&path).expect_err("should fail");
        assert!(matches!(err, ConfigError::NotAMapping { .. }));
    }

    #[test]
    fn test_list_and_resolve_domains() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "autonomous_driving.yaml", VALID_CONFIG);
        write_config(&dir, "public_safety.yaml", VALID_CONFIG);
        write_config(&dir, "notes.txt", "not a config");

        let dirs = vec![dir.path().to_path_buf()];
        assert_eq!(
            list_available_domains(&dirs),
            vec!["autonomous_driving", "public_safety"]
        );
        assert!(resolve_domain_config_path("public_safety", &dirs).is_some());
        assert!(resolve_domain_config_path("missing", &dirs).is_none());
    }
}
