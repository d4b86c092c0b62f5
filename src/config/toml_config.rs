use crate::config::AppConfig;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use std::path::Path;

impl AppConfig {
    /// Loads a TOML file; missing sections fall back to defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn apply_process_env(&mut self) {
        self.apply_env_overrides(|key| std::env::var(key).ok());
    }

    /// Applies the deployment-platform variables on top of file settings.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = get("MONGO_URI") {
            self.mongo.uri = uri;
        }
        if let Some(db) = get("MONGO_DB") {
            self.mongo.database = db;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.embedding.endpoint = url;
        }
        if let Some(url) = get("SCJN_API_URL") {
            self.source.endpoint = url;
        }
        if let Some(addr) = get("ACERVO_BIND_ADDR") {
            self.dashboard.bind_addr = addr;
        } else if let Some(port) = get("PORT") {
            self.dashboard.bind_addr = format!("0.0.0.0:{}", port.trim());
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_mongo_uri("mongo.uri", &self.mongo.uri)?;
        validation::validate_non_empty_string("mongo.database", &self.mongo.database)?;
        validation::validate_non_empty_string("mongo.queue_collection", &self.mongo.queue_collection)?;
        validation::validate_non_empty_string(
            "mongo.archive_collection",
            &self.mongo.archive_collection,
        )?;
        validation::validate_non_empty_string("mongo.meta_collection", &self.mongo.meta_collection)?;

        validation::validate_url("source.endpoint", &self.source.endpoint)?;
        validation::validate_range("source.timeout_seconds", self.source.timeout_seconds, 1, 300)?;

        validation::validate_url("embedding.endpoint", &self.embedding.endpoint)?;
        validation::validate_non_empty_string("embedding.model", &self.embedding.model)?;
        validation::validate_range("embedding.attempts", self.embedding.attempts, 1, 10)?;

        validation::validate_positive_number("worker.seed_batch_size", self.worker.seed_batch_size, 1)?;
        validation::validate_range(
            "worker.throughput_window",
            self.worker.throughput_window,
            2,
            10_000,
        )?;
        validation::validate_positive_number(
            "worker.max_consecutive_errors",
            self.worker.max_consecutive_errors as usize,
            1,
        )?;
        for block in &self.worker.blocks {
            if block.is_empty() {
                return Err(EtlError::InvalidConfigValueError {
                    field: "worker.blocks".to_string(),
                    value: format!("{}..{}", block.start, block.end),
                    reason: "Range end must be greater than its start".to_string(),
                });
            }
        }

        validation::validate_socket_addr("dashboard.bind_addr", &self.dashboard.bind_addr)?;
        validation::validate_positive_number("dashboard.recent_limit", self.dashboard.recent_limit, 1)?;

        Ok(())
    }

    /// Worker modes also need credentials for the embedding API.
    pub fn validate_for_worker(&self) -> Result<()> {
        self.validate_config()?;
        let key = validation::validate_required_field("embedding.api_key", &self.embedding.api_key)?;
        validation::validate_non_empty_string("embedding.api_key", key)?;
        if key.starts_with("${") {
            return Err(EtlError::InvalidConfigValueError {
                field: "embedding.api_key".to_string(),
                value: key.clone(),
                reason: "environment variable is not set".to_string(),
            });
        }
        Ok(())
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
