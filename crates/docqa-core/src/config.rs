//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nested keys, e.g.
//! `APP_SEARCH__TOP_K=8`). Components never read this globally; callers pull
//! the typed sections out of [`AppConfig`] and pass them to constructors.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};
use crate::types::SearchMethod;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            other => tracing::warn!("Unknown RUST_ENV '{other}', using config.toml only"),
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));
        Ok(Self { figment })
    }

    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract and validate the full typed configuration.
    pub fn settings(&self) -> anyhow::Result<AppConfig> {
        let settings: AppConfig = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub data: DataConfig,
    pub chunking: ChunkingConfig,
    pub search: SearchConfig,
    pub embedding: EmbeddingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        self.search.validate()?;
        self.embedding.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub documents_dir: String,
    /// On-disk lexical index; an in-memory index is used when unset.
    pub text_index_dir: Option<String>,
    pub lance_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            documents_dir: "./documents".to_string(),
            text_index_dir: None,
            lance_dir: "./indexes/lancedb".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub top_k: usize,
    /// Weight of the vector ranking in `[0, 1]`; the keyword ranking gets `1 - alpha`.
    pub alpha: f64,
    /// Rank damping constant of reciprocal rank fusion.
    pub k_rrf: u32,
    pub method: SearchMethod,
    /// Upper bound for each retrieval adapter call on the concurrent path.
    pub adapter_timeout_ms: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { top_k: 5, alpha: 0.5, k_rrf: 60, method: SearchMethod::Hybrid, adapter_timeout_ms: 10_000 }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(Error::InvalidConfig("search.top_k must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.alpha) {
            return Err(Error::InvalidConfig(format!("search.alpha must be within [0, 1], got {}", self.alpha)));
        }
        if self.k_rrf == 0 {
            return Err(Error::InvalidConfig("search.k_rrf must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory holding `tokenizer.json`, `config.json` and the weights.
    pub model_dir: Option<String>,
    /// Use the deterministic hashing embedder instead of a model.
    pub fake: bool,
    pub fake_dim: usize,
    pub batch_size: usize,
    pub max_len: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model_dir: None, fake: false, fake_dim: 384, batch_size: 32, max_len: 256 }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("embedding.batch_size must be positive".into()));
        }
        if self.max_len == 0 || self.fake_dim == 0 {
            return Err(Error::InvalidConfig("embedding.max_len and embedding.fake_dim must be positive".into()));
        }
        Ok(())
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::PageMarkerPolicy;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let settings = AppConfig::default();
        settings.validate().expect("defaults validate");
        assert_eq!(settings.chunking.chunk_size, 1000);
        assert_eq!(settings.chunking.chunk_overlap, 200);
        assert_eq!(settings.search.k_rrf, 60);
        assert!((settings.search.alpha - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn files_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
                [chunking]
                chunk_size = 400
                chunk_overlap = 50
                page_markers = "strict"

                [search]
                method = "vector"
                "#,
            )?;
            jail.create_file("config.test.toml", "[search]\ntop_k = 7\n")?;
            jail.set_env("APP_SEARCH__ALPHA", "0.25");

            let settings = Config::load_for_env("test")
                .and_then(|c| c.settings())
                .map_err(|e| e.to_string())?;
            assert_eq!(settings.chunking.chunk_size, 400);
            assert_eq!(settings.chunking.page_markers, PageMarkerPolicy::Strict);
            assert_eq!(settings.search.method, SearchMethod::Vector);
            assert_eq!(settings.search.top_k, 7);
            assert!((settings.search.alpha - 0.25).abs() < 1e-9);
            assert_eq!(settings.search.k_rrf, 60);
            Ok(())
        });
    }

    #[test]
    fn invalid_overlap_is_rejected_at_load() {
        Jail::expect_with(|jail| {
            jail.set_env("APP_CHUNKING__CHUNK_SIZE", "100");
            jail.set_env("APP_CHUNKING__CHUNK_OVERLAP", "100");
            let err = Config::load_for_env("dev").and_then(|c| c.settings()).expect_err("invalid");
            assert!(err.to_string().contains("chunk_overlap"));
            Ok(())
        });
    }

    #[test]
    fn alpha_outside_unit_interval_is_rejected() {
        let search = SearchConfig { alpha: 1.5, ..SearchConfig::default() };
        assert!(matches!(search.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = Path::new("/base");
        assert_eq!(resolve_with_base(base, "/abs/dir"), PathBuf::from("/abs/dir"));
        assert_eq!(resolve_with_base(base, "rel"), PathBuf::from("/base/rel"));
    }
}
