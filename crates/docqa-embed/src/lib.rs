//! docqa-embed
//!
//! Embedding capability behind the core `Embedder` trait: a candle BERT
//! sentence encoder and a dependency-free hashing embedder.

pub mod device;
pub mod hash;
pub mod model;
pub mod pool;
pub mod tokenize;

use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use docqa_core::config::{expand_path, EmbeddingConfig};
use docqa_core::traits::Embedder;

pub use hash::HashEmbedder;
pub use model::BertEmbedder;
pub use pool::masked_mean_l2;

const DEFAULT_MODEL_DIR: &str = "models/all-MiniLM-L6-v2";

/// Pick the embedder for `config`.
///
/// The hashing embedder is used when `config.fake` is set or
/// `APP_USE_FAKE_EMBEDDINGS` is `1`/`true`; otherwise the BERT model is loaded
/// from the resolved model directory.
pub fn get_default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let env_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));
    if config.fake || env_fake {
        info!("Using HashEmbedder (dim {})", config.fake_dim);
        return Ok(Arc::new(HashEmbedder::new(config.fake_dim)));
    }
    let model_dir = resolve_model_dir(config)?;
    Ok(Arc::new(BertEmbedder::load(&model_dir, config.max_len, config.batch_size)?))
}

fn resolve_model_dir(config: &EmbeddingConfig) -> Result<PathBuf> {
    let candidates = config
        .model_dir
        .clone()
        .into_iter()
        .chain(std::env::var("APP_MODEL_DIR").ok())
        .chain(std::env::var("MODEL_DIR").ok())
        .chain(std::iter::once(DEFAULT_MODEL_DIR.to_string()));
    for candidate in candidates {
        let p = expand_path(&candidate);
        if p.exists() {
            info!("Using model dir: {}", p.display());
            return Ok(p);
        }
    }
    Err(anyhow!("Could not locate an embedding model directory (set embedding.model_dir or APP_MODEL_DIR)"))
}
