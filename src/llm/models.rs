//! Role to model-name lookup, keyed by deployment environment.
//!
//! The table lives in a JSON file shaped as
//! `{ "<environment>": { "<ROLE>": "<model>" } }`.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

/// Environment used when the requested one is not configured.
pub const DEFAULT_ENVIRONMENT: &str = "development";

/// Model returned for roles that have no assignment.
pub const FALLBACK_MODEL: &str = "gemini-1.5-flash";

/// Roles that need a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    /// Synthetic conversation generation.
    DataGenerator,
    /// Live coaching chat.
    CoachChat,
}

impl ModelRole {
    /// Key used in the configuration file.
    pub fn key(&self) -> &'static str {
        match self {
            Self::DataGenerator => "DATA_GENERATOR",
            Self::CoachChat => "AI_COACH_CHAT",
        }
    }
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

type RoleTable = HashMap<String, String>;

/// Loaded model assignments with an active environment.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    environments: HashMap<String, RoleTable>,
    active_env: String,
    active: RoleTable,
}

impl ModelRegistry {
    /// Built-in table used when no configuration file can be read.
    pub fn builtin() -> Self {
        let mut table = RoleTable::new();
        table.insert(
            ModelRole::DataGenerator.key().to_string(),
            "gemini-2.0-flash".to_string(),
        );
        table.insert(
            ModelRole::CoachChat.key().to_string(),
            "gemini-1.5-flash".to_string(),
        );

        let mut environments = HashMap::new();
        environments.insert(DEFAULT_ENVIRONMENT.to_string(), table.clone());

        Self {
            environments,
            active_env: DEFAULT_ENVIRONMENT.to_string(),
            active: table,
        }
    }

    /// Build from a JSON document and select `env`.
    pub fn from_json(json: &str, env: &str) -> Result<Self, serde_json::Error> {
        let environments: HashMap<String, RoleTable> = serde_json::from_str(json)?;
        Ok(Self::select(environments, env))
    }

    /// Load from `path`, falling back to [`ModelRegistry::builtin`] when the
    /// file is missing or malformed.
    pub fn load(path: &Path, env: &str) -> Self {
        let loaded = std::fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|raw| Self::from_json(&raw, env).map_err(|e| e.to_string()));

        match loaded {
            Ok(registry) => {
                tracing::info!(
                    path = %path.display(),
                    environment = %registry.active_env,
                    "Loaded model configuration"
                );
                registry
            }
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %error,
                    "Could not load model configuration, using built-in defaults"
                );
                Self::builtin()
            }
        }
    }

    fn select(environments: HashMap<String, RoleTable>, env: &str) -> Self {
        let (active_env, active) = match environments.get(env) {
            Some(table) => (env.to_string(), table.clone()),
            None => {
                let table = environments
                    .get(DEFAULT_ENVIRONMENT)
                    .cloned()
                    .unwrap_or_default();
                (DEFAULT_ENVIRONMENT.to_string(), table)
            }
        };

        Self {
            environments,
            active_env,
            active,
        }
    }

    /// Name of the active environment.
    pub fn environment(&self) -> &str {
        &self.active_env
    }

    /// Switch environments. Returns `false` and keeps the current one if
    /// `env` is not configured.
    pub fn set_environment(&mut self, env: &str) -> bool {
        match self.environments.get(env) {
            Some(table) => {
                self.active_env = env.to_string();
                self.active = table.clone();
                tracing::info!(environment = env, "Switched model environment");
                true
            }
            None => {
                tracing::warn!(environment = env, "Model environment not found in config");
                false
            }
        }
    }

    /// Model assigned to `role` in the active environment.
    pub fn model_for(&self, role: ModelRole) -> &str {
        match self.active.get(role.key()) {
            Some(model) => model.as_str(),
            None => {
                tracing::warn!(
                    role = %role,
                    environment = %self.active_env,
                    fallback = FALLBACK_MODEL,
                    "No model assigned for role"
                );
                FALLBACK_MODEL
            }
        }
    }

    /// All assignments of the active environment, sorted by role key.
    pub fn assignments(&self) -> Vec<(&str, &str)> {
        let mut pairs: Vec<_> = self
            .active
            .iter()
            .map(|(role, model)| (role.as_str(), model.as_str()))
            .collect();
        pairs.sort();
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CONFIG: &str = r#"{
        "development": { "DATA_GENERATOR": "gemini-2.0-flash", "AI_COACH_CHAT": "gemini-1.5-flash" },
        "production": { "DATA_GENERATOR": "gemini-2.5-pro" }
    }"#;

    #[test]
    fn test_selects_requested_environment() {
        let registry = ModelRegistry::from_json(CONFIG, "production").unwrap();
        assert_eq!(registry.environment(), "production");
        assert_eq!(registry.model_for(ModelRole::DataGenerator), "gemini-2.5-pro");
    }

    #[test]
    fn test_unknown_environment_falls_back_to_development() {
        let registry = ModelRegistry::from_json(CONFIG, "staging").unwrap();
        assert_eq!(registry.environment(), "development");
        assert_eq!(registry.model_for(ModelRole::DataGenerator), "gemini-2.0-flash");
    }

    #[test]
    fn test_missing_role_uses_fallback_model() {
        let registry = ModelRegistry::from_json(CONFIG, "production").unwrap();
        assert_eq!(registry.model_for(ModelRole::CoachChat), FALLBACK_MODEL);
    }

    #[test]
    fn test_set_environment() {
        let mut registry = ModelRegistry::from_json(CONFIG, "development").unwrap();
        assert!(registry.set_environment("production"));
        assert_eq!(registry.environment(), "production");
        assert!(!registry.set_environment("nope"));
        assert_eq!(registry.environment(), "production");
    }

    #[test]
    fn test_load_missing_file_uses_builtin() {
        let registry = ModelRegistry::load(Path::new("/nonexistent/models.json"), "production");
        assert_eq!(registry.environment(), "development");
        assert_eq!(registry.model_for(ModelRole::DataGenerator), "gemini-2.0-flash");
        assert_eq!(registry.model_for(ModelRole::CoachChat), "gemini-1.5-flash");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let registry = ModelRegistry::load(file.path(), "production");
        assert_eq!(registry.model_for(ModelRole::DataGenerator), "gemini-2.5-pro");
        assert_eq!(
            registry.assignments(),
            vec![("DATA_GENERATOR", "gemini-2.5-pro")]
        );
    }
}
