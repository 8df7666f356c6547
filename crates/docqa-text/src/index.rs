use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument};
use tracing::{debug, info, warn};

use docqa_core::error::Error;
use docqa_core::traits::Retriever;
use docqa_core::types::{Chunk, RankedChunk, SourceKind};

use crate::tantivy_utils::{build_schema, register_tokenizer, ChunkFields};

const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// Where a [`KeywordIndex`] keeps its segments.
#[derive(Debug, Clone)]
pub enum IndexLocation {
	Ram,
	/// Rebuilt in a sibling `<name>.staging` directory, then renamed into place.
	Dir(PathBuf),
}

struct Loaded {
	index: Index,
	reader: IndexReader,
	fields: ChunkFields,
}

/// BM25 keyword retrieval over chunk texts.
///
/// Every `index` call builds a brand-new index before it replaces the previous
/// one. A failed rebuild leaves the previous index serving queries.
pub struct KeywordIndex {
	location: IndexLocation,
	state: RwLock<Option<Loaded>>,
}

impl KeywordIndex {
	pub fn new(location: IndexLocation) -> Self {
		Self { location, state: RwLock::new(None) }
	}

	pub fn in_ram() -> Self {
		Self::new(IndexLocation::Ram)
	}

	pub fn in_dir(index_dir: PathBuf) -> Self {
		Self::new(IndexLocation::Dir(index_dir))
	}

	pub fn location(&self) -> &IndexLocation {
		&self.location
	}
}

fn sibling(index_dir: &Path, suffix: &str) -> Result<PathBuf> {
	let name = index_dir
		.file_name()
		.ok_or_else(|| anyhow!("index directory '{}' has no file name", index_dir.display()))?;
	Ok(index_dir.with_file_name(format!("{}.{suffix}", name.to_string_lossy())))
}

fn write_chunks(index: &Index, chunks: &[Chunk]) -> Result<()> {
	register_tokenizer(index);
	let fields = ChunkFields::from_schema(&index.schema())?;
	let mut index_writer: IndexWriter = index.writer(WRITER_MEMORY_BUDGET)?;
	for c in chunks {
		let doc = doc!(
			fields.text => c.text.clone(),
			fields.source => c.source.clone(),
			fields.page => u64::from(c.page),
			fields.chunk_id => u64::from(c.chunk_id),
		);
		index_writer.add_document(doc)?;
	}
	index_writer.commit()?;
	Ok(())
}

fn load(index: Index) -> Result<Loaded> {
	register_tokenizer(&index);
	let fields = ChunkFields::from_schema(&index.schema())?;
	let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
	Ok(Loaded { index, reader, fields })
}

/// Build into `<dir>.staging`, then move the old directory aside and the new
/// one into place. Open readers keep their mmaps across the renames.
fn rebuild_dir(index_dir: &Path, chunks: &[Chunk]) -> Result<Loaded> {
	let staging = sibling(index_dir, "staging")?;
	if staging.exists() { std::fs::remove_dir_all(&staging)?; }
	std::fs::create_dir_all(&staging)?;
	write_chunks(&Index::create_in_dir(&staging, build_schema())?, chunks)?;

	let retired = sibling(index_dir, "retired")?;
	if retired.exists() { std::fs::remove_dir_all(&retired)?; }
	if index_dir.exists() { std::fs::rename(index_dir, &retired)?; }
	if let Err(e) = std::fs::rename(&staging, index_dir) {
		if retired.exists() { std::fs::rename(&retired, index_dir)?; }
		return Err(e.into());
	}
	let loaded = load(Index::open_in_dir(index_dir)?)?;
	if retired.exists() {
		if let Err(e) = std::fs::remove_dir_all(&retired) {
			warn!("Could not remove retired keyword index {}: {}", retired.display(), e);
		}
	}
	Ok(loaded)
}

fn lock_poisoned() -> Error {
	Error::Operation("keyword index lock poisoned".into())
}

fn stored_u32(doc: &TantivyDocument, field: tantivy::schema::Field, name: &str) -> Result<u32> {
	let raw = doc.get_first(field).and_then(|v| v.as_u64()).ok_or_else(|| anyhow!("stored field '{}' missing", name))?;
	Ok(u32::try_from(raw)?)
}

impl Retriever for KeywordIndex {
	fn index(&self, chunks: &[Chunk]) -> Result<()> {
		let mut guard = self.state.write().map_err(|_| lock_poisoned())?;
		let fresh = match &self.location {
			IndexLocation::Ram => {
				let index = Index::create_in_ram(build_schema());
				write_chunks(&index, chunks)?;
				load(index)?
			}
			IndexLocation::Dir(index_dir) => rebuild_dir(index_dir, chunks)?,
		};
		*guard = Some(fresh);
		info!("Indexed {} chunks into the keyword index", chunks.len());
		Ok(())
	}

	fn search(&self, query: &str, k: usize) -> Result<Vec<RankedChunk>> {
		let guard = self.state.read().map_err(|_| lock_poisoned())?;
		let loaded = guard.as_ref().ok_or_else(|| Error::NotReady("keyword index has not been built".into()))?;
		if k == 0 { return Ok(vec![]); }

		let searcher = loaded.reader.searcher();
		let qp = QueryParser::for_index(&loaded.index, vec![loaded.fields.text]);
		// Questions are free text; syntax errors only drop the offending clause.
		let (q, errors) = qp.parse_query_lenient(query);
		if !errors.is_empty() { debug!(errors = errors.len(), "lenient query parse dropped clauses"); }

		let top_docs = searcher.search(&q, &TopDocs::with_limit(k))?;
		let mut hits = Vec::with_capacity(top_docs.len());
		for (score, addr) in top_docs {
			let doc: TantivyDocument = searcher.doc(addr)?;
			let f = &loaded.fields;
			let text = doc.get_first(f.text).and_then(|v| v.as_str()).unwrap_or("").to_string();
			let source = doc.get_first(f.source).and_then(|v| v.as_str()).ok_or_else(|| anyhow!("stored field 'source' missing"))?.to_string();
			let chunk = Chunk { text, source, page: stored_u32(&doc, f.page, "page")?, chunk_id: stored_u32(&doc, f.chunk_id, "chunk_id")? };
			hits.push(RankedChunk::new(chunk, score, SourceKind::Keyword));
		}
		debug!(query, hits = hits.len(), "keyword search");
		Ok(hits)
	}

	fn is_ready(&self) -> bool {
		self.state.read().map(|g| g.is_some()).unwrap_or(false)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn chunk(source: &str, page: u32, chunk_id: u32, text: &str) -> Chunk {
		Chunk { text: text.to_string(), source: source.to_string(), page, chunk_id }
	}

	fn corpus() -> Vec<Chunk> {
		vec![
			chunk("contract.pdf", 1, 0, "The tenant shall pay rent on the first day of each month."),
			chunk("contract.pdf", 2, 1, "Termination requires ninety days written notice by either party."),
			chunk("handbook.pdf", 1, 0, "Employees accrue vacation days monthly. Vacation requests need approval."),
			chunk("handbook.pdf", 3, 1, "Remote work is allowed two days per week."),
		]
	}

	#[test]
	fn search_before_index_is_not_ready() {
		let idx = KeywordIndex::in_ram();
		assert!(!idx.is_ready());
		let err = idx.search("rent", 3).unwrap_err();
		assert!(Error::is_not_ready(&err));
	}

	#[test]
	fn ranks_by_relevance_and_keeps_identity() {
		let idx = KeywordIndex::in_ram();
		idx.index(&corpus()).unwrap();
		assert!(idx.is_ready());

		let hits = idx.search("vacation approval", 3).unwrap();
		assert!(!hits.is_empty());
		let top = &hits[0];
		assert_eq!((top.chunk.source.as_str(), top.chunk.page, top.chunk.chunk_id), ("handbook.pdf", 1, 0));
		assert_eq!(top.kind, SourceKind::Keyword);
		for pair in hits.windows(2) { assert!(pair[0].score >= pair[1].score); }
	}

	#[test]
	fn free_text_questions_do_not_fail_parsing() {
		let idx = KeywordIndex::in_ram();
		idx.index(&corpus()).unwrap();
		let hits = idx.search("How much notice (days) is needed for termination?", 2).unwrap();
		assert_eq!(hits[0].chunk.chunk_id, 1);
		assert_eq!(hits[0].chunk.source, "contract.pdf");
	}

	#[test]
	fn respects_k_and_zero() {
		let idx = KeywordIndex::in_ram();
		idx.index(&corpus()).unwrap();
		assert!(idx.search("days", 0).unwrap().is_empty());
		assert!(idx.search("days", 1).unwrap().len() <= 1);
	}

	#[test]
	fn reindex_replaces_previous_contents() {
		let idx = KeywordIndex::in_ram();
		idx.index(&corpus()).unwrap();
		idx.index(&[chunk("other.pdf", 1, 0, "Completely different subject about gardening.")]).unwrap();
		assert!(idx.search("vacation", 5).unwrap().is_empty());
		assert_eq!(idx.search("gardening", 5).unwrap().len(), 1);
	}

	#[test]
	fn directory_index_is_recreated() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = tmp.path().join("tantivy");
		let idx = KeywordIndex::in_dir(dir.clone());
		idx.index(&corpus()).unwrap();
		idx.index(&corpus()).unwrap();
		assert!(dir.exists());
		assert_eq!(idx.search("tenant rent", 10).unwrap()[0].chunk.page, 1);
		assert_eq!(idx.search("remote", 10).unwrap().len(), 1, "second build did not duplicate documents");
	}

	#[test]
	fn failed_directory_rebuild_keeps_the_previous_index() {
		let tmp = tempfile::tempdir().unwrap();
		let dir = tmp.path().join("tantivy");
		let idx = KeywordIndex::in_dir(dir.clone());
		idx.index(&corpus()).unwrap();

		// A plain file where the staging directory goes makes the rebuild fail.
		let staging = tmp.path().join("tantivy.staging");
		std::fs::write(&staging, b"not a directory").unwrap();
		let replacement = [chunk("other.pdf", 1, 0, "Completely different subject about gardening.")];
		assert!(idx.index(&replacement).is_err());
		assert!(idx.is_ready());
		assert_eq!(idx.search("vacation", 5).unwrap()[0].chunk.source, "handbook.pdf");
		assert!(idx.search("gardening", 5).unwrap().is_empty());

		std::fs::remove_file(&staging).unwrap();
		idx.index(&replacement).unwrap();
		assert_eq!(idx.search("gardening", 5).unwrap().len(), 1);
		assert!(!staging.exists());
		assert!(!tmp.path().join("tantivy.retired").exists());
	}
}
