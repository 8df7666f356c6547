use anyhow::{anyhow, Result};
use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use docqa_core::traits::Embedder;

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::tokenize_batch;

/// The few shape fields of `config.json` the embedder needs for itself.
#[derive(Deserialize)]
struct ModelShape {
    hidden_size: usize,
    max_position_embeddings: usize,
}

/// Sentence encoder for BERT-family checkpoints (e.g. all-MiniLM-L6-v2):
/// masked mean pooling over the last hidden state, then L2 normalization.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    batch_size: usize,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path, max_len: usize, batch_size: usize) -> Result<Self> {
        let device = select_device();
        info!("Loading embedding model from {}", model_dir.display());
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_json = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: BertConfig = serde_json::from_str(&config_json)?;
        let shape: ModelShape = serde_json::from_str(&config_json)?;
        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb, &config)?;
        let name = model_dir.file_name().map_or_else(|| "model".to_string(), |n| n.to_string_lossy().into_owned());
        info!("Embedding model ready (dim {})", shape.hidden_size);
        Ok(Self {
            model,
            tokenizer,
            device,
            id: format!("bert:{}:d{}", name, shape.hidden_size),
            dim: shape.hidden_size,
            max_len: max_len.min(shape.max_position_embeddings),
            batch_size: batch_size.max(1),
        })
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(VarBuilder::from_buffered_safetensors(std::fs::read(&safetensors)?, DType::F32, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        let weights_map: std::collections::HashMap<String, candle_core::Tensor> = weights.into_iter().collect();
        return Ok(VarBuilder::from_tensors(weights_map, DType::F32, device));
    }
    Err(anyhow!("No model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

impl Embedder for BertEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, batch, self.max_len, &self.device)?;
            let token_type_ids = input_ids.zeros_like()?;
            let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
            let pooled = masked_mean_l2(&hidden, &attention_mask)?;
            let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
            out.extend(rows);
        }
        let elapsed = start.elapsed();
        debug!(texts = texts.len(), ms = elapsed.as_millis() as u64, "embedded batch");
        if texts.len() == 1 && elapsed.as_millis() > 100 { warn!("Slow embedding: {} ms", elapsed.as_millis()); }
        Ok(out)
    }
}
