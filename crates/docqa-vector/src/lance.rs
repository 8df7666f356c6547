//! LanceDB-backed vector store.
//!
//! Same contract as [`crate::flat::FlatIndex`] but the vectors live in a Lance
//! table on disk. The async LanceDB client is driven from a private
//! current-thread runtime so the store can sit behind the synchronous
//! [`Retriever`] trait.

use anyhow::{anyhow, Context, Result};
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray, UInt32Array};
use arrow_schema::{DataType, Field, Schema};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType};
use std::sync::{Arc, Mutex, RwLock};
use tokio::runtime::Runtime;
use tracing::{debug, info};

use docqa_core::error::Error;
use docqa_core::traits::{Embedder, Retriever};
use docqa_core::types::{Chunk, RankedChunk, SourceKind};

use crate::cache::EmbeddingCache;
use crate::embed::embed_chunks;

pub const DEFAULT_TABLE: &str = "chunks";

pub fn chunk_schema(dim: usize) -> Result<Arc<Schema>> {
    let dim = i32::try_from(dim).context("embedding dimension does not fit an arrow list size")?;
    Ok(Arc::new(Schema::new(vec![
        Field::new("text", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("page", DataType::UInt32, false),
        Field::new("chunk_id", DataType::UInt32, false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
    ])))
}

pub struct LanceStore {
    runtime: Runtime,
    db: Connection,
    table_name: String,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
    cache: Mutex<EmbeddingCache>,
    /// `Some(rows)` once a table built by this store is searchable.
    state: RwLock<Option<usize>>,
}

impl LanceStore {
    pub fn open(uri: &str, table_name: &str, embedder: Arc<dyn Embedder>, batch_size: usize) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        let db = runtime.block_on(async { connect(uri).execute().await })?;
        info!("Opened LanceDB at {uri}");
        let cache = Mutex::new(EmbeddingCache::new(embedder.id()));
        Ok(Self { runtime, db, table_name: table_name.to_string(), embedder, batch_size, cache, state: RwLock::new(None) })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    fn to_record_batch(&self, chunks: &[Chunk], vectors: Vec<Vec<f32>>) -> Result<RecordBatch> {
        let schema = chunk_schema(self.embedder.dim())?;
        let dim = i32::try_from(self.embedder.dim())?;
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let sources: Vec<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
        let pages: Vec<u32> = chunks.iter().map(|c| c.page).collect();
        let ids: Vec<u32> = chunks.iter().map(|c| c.chunk_id).collect();
        let vectors = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));
        Ok(RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(sources)),
                Arc::new(UInt32Array::from(pages)),
                Arc::new(UInt32Array::from(ids)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
            ],
        )?)
    }

    async fn replace_table(&self, batch: RecordBatch) -> Result<()> {
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if self.db.table_names().execute().await?.contains(&self.table_name) {
            let table = self.db.open_table(&self.table_name).execute().await?;
            table.delete("true").await?;
            table.add(reader).execute().await?;
        } else {
            self.db.create_table(&self.table_name, reader).execute().await?;
        }
        Ok(())
    }

    async fn nearest(&self, q: Vec<f32>, k: usize) -> Result<Vec<RankedChunk>> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        let mut stream = table.vector_search(q)?.distance_type(DistanceType::L2).limit(k).execute().await?;
        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await? {
            let texts = string_column(&batch, "text")?;
            let sources = string_column(&batch, "source")?;
            let pages = u32_column(&batch, "page")?;
            let ids = u32_column(&batch, "chunk_id")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow!("column '_distance' missing"))?;
            for i in 0..batch.num_rows() {
                let chunk = Chunk {
                    text: texts.value(i).to_string(),
                    source: sources.value(i).to_string(),
                    page: pages.value(i),
                    chunk_id: ids.value(i),
                };
                hits.push(RankedChunk::new(chunk, distances.value(i), SourceKind::Vector));
            }
        }
        hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        hits.truncate(k);
        Ok(hits)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("column '{name}' missing"))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    let col = batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| anyhow!("column '{name}' missing"))?;
    anyhow::ensure!(col.null_count() == 0, "column '{name}' has nulls");
    Ok(col)
}

fn lock_poisoned() -> Error {
    Error::Operation("lance store lock poisoned".into())
}

impl Retriever for LanceStore {
    fn index(&self, chunks: &[Chunk]) -> Result<()> {
        let vectors = {
            let mut cache = self.cache.lock().map_err(|_| lock_poisoned())?;
            embed_chunks(self.embedder.as_ref(), &mut cache, self.batch_size, chunks)?
        };
        let batch = self.to_record_batch(chunks, vectors)?;
        let mut guard = self.state.write().map_err(|_| lock_poisoned())?;
        *guard = None;
        self.runtime.block_on(self.replace_table(batch))?;
        *guard = Some(chunks.len());
        info!("Indexed {} chunks into LanceDB table {}", chunks.len(), self.table_name);
        Ok(())
    }

    fn search(&self, query: &str, k: usize) -> Result<Vec<RankedChunk>> {
        let guard = self.state.read().map_err(|_| lock_poisoned())?;
        let rows = guard.ok_or_else(|| Error::NotReady("lance store has not been built".into()))?;
        if k == 0 || rows == 0 { return Ok(vec![]); }
        let q = self.embedder.embed_batch(&[query.to_string()])?.pop().unwrap_or_default();
        anyhow::ensure!(q.len() == self.embedder.dim(), "query embedding has dim {} expected {}", q.len(), self.embedder.dim());
        let hits = self.runtime.block_on(self.nearest(q, k))?;
        debug!(query, hits = hits.len(), "lance search");
        Ok(hits)
    }

    fn is_ready(&self) -> bool {
        self.state.read().map(|g| g.is_some()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_embed::HashEmbedder;

    fn chunk(id: u32, page: u32, text: &str) -> Chunk {
        Chunk { text: text.to_string(), source: "manual.txt".to_string(), page, chunk_id: id }
    }

    #[test]
    fn builds_and_searches_a_table() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LanceStore::open(&tmp.path().to_string_lossy(), DEFAULT_TABLE, Arc::new(HashEmbedder::new(64)), 8).unwrap();
        assert!(Error::is_not_ready(&store.search("x", 1).unwrap_err()));

        let chunks = vec![chunk(0, 1, "install the pump"), chunk(1, 2, "calibrate the sensor"), chunk(2, 3, "replace the filter")];
        store.index(&chunks).unwrap();
        let hits = store.search("calibrate the sensor", 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!((hits[0].chunk.page, hits[0].chunk.chunk_id), (2, 1));
        assert!(hits[0].score <= hits[1].score);

        store.index(&chunks[..1]).unwrap();
        assert_eq!(store.search("sensor", 5).unwrap().len(), 1, "rebuild replaced the rows");
    }
}
