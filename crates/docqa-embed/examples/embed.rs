use docqa_core::config::EmbeddingConfig;
use docqa_embed::get_default_embedder;

// Embed two sentences with the configured model and report the shape.
// Usage:
//   APP_MODEL_DIR=models/all-MiniLM-L6-v2 cargo run -p docqa-embed --example embed

fn main() -> anyhow::Result<()> {
    let embedder = get_default_embedder(&EmbeddingConfig::default())?;
    let texts = vec!["hello world".to_string(), "rust embeddings".to_string()];
    let embs = embedder.embed_batch(&texts)?;
    println!("embedder={} B={} dim={}", embedder.id(), embs.len(), embedder.dim());
    Ok(())
}
