//! Application paths and configuration.
//!
//! Configuration lives in `config.yml` inside the data directory; every field
//! has a default so a missing file yields a usable local setup.

use std::env;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let data_dir = env::var("RAGDOC_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data"));
        let log_dir = data_dir.join("logs");
        let db_path = data_dir.join("ragdoc.db");

        for dir in [&data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            data_dir,
            log_dir,
            db_path,
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.yml")
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL of the OpenAI-compatible provider endpoint.
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Deployment-wide retrieval threshold. Per-query requests may override.
    pub similarity_threshold: f32,
    pub max_chunks_per_query: usize,
    pub temperature: f64,
    pub max_tokens: i32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            embedding_model: "embed-english-v3.0".to_string(),
            chat_model: "command-r-plus".to_string(),
            chunk_size: 1000,
            chunk_overlap: 200,
            similarity_threshold: 0.3,
            max_chunks_per_query: 5,
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

impl AppConfig {
    pub fn load(paths: &AppPaths) -> Result<Self, ApiError> {
        let path = paths.config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path).map_err(ApiError::internal)?;
        let config: AppConfig =
            serde_yaml::from_str(&contents).map_err(|err| {
                ApiError::BadRequest(format!("invalid config {}: {}", path.display(), err))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// API key is kept out of the config file.
    pub fn api_key() -> Option<String> {
        env::var("RAGDOC_API_KEY").ok().filter(|key| !key.is_empty())
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.chunk_size == 0 {
            return Err(ApiError::BadRequest("chunk_size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ApiError::BadRequest(
                "chunk_overlap must be smaller than chunk_size".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ApiError::BadRequest(
                "similarity_threshold must be within [0, 1]".to_string(),
            ));
        }
        if self.max_chunks_per_query == 0 {
            return Err(ApiError::BadRequest(
                "max_chunks_per_query must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
