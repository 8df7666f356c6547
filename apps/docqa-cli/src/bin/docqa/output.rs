use docqa_core::types::Chunk;
use docqa_hybrid::QueryResponse;

const PREVIEW_CHARS: usize = 60;

fn preview(text: &str) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{cut}...")
    }
}

pub fn format_chunks(chunks: &[Chunk]) -> String {
    let width = chunks.iter().map(|c| c.source.len()).max().unwrap_or(6).max(6);
    let mut out = format!("{:<width$}  {:>5}  {:>5}  {:>6}  preview\n", "source", "page", "id", "chars");
    for c in chunks {
        out.push_str(&format!(
            "{:<width$}  {:>5}  {:>5}  {:>6}  {}\n",
            c.source,
            c.page,
            c.chunk_id,
            c.text.chars().count(),
            preview(&c.text)
        ));
    }
    out.push_str(&format!("{} chunks", chunks.len()));
    out
}

pub fn format_response(response: &QueryResponse) -> String {
    let mut out = format!("{}\n\nSources:\n", response.answer.trim_end());
    if response.sources.is_empty() {
        out.push_str("  (none)\n");
    }
    for s in &response.sources {
        out.push_str(&format!("  - {}, page {}\n", s.document, s.page));
    }
    out.push_str(&format!(
        "\nSearch method: {} ({} chunks retrieved)",
        response.search_method,
        response.retrieved_chunks.len()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::{RankedChunk, SearchMethod, SourceKind, SourceRef};

    fn chunk(text: &str) -> Chunk {
        Chunk { text: text.to_string(), source: "notes.md".to_string(), page: 2, chunk_id: 4 }
    }

    #[test]
    fn long_previews_are_cut() {
        let p = preview(&"word ".repeat(40));
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview("a\n  b"), "a b");
    }

    #[test]
    fn chunk_table_lists_provenance() {
        let table = format_chunks(&[chunk("Short text.")]);
        assert!(table.contains("notes.md"));
        assert!(table.contains("Short text."));
        assert!(table.ends_with("1 chunks"));
    }

    #[test]
    fn response_lists_sources_and_method() {
        let response = QueryResponse {
            answer: "Because.\n".to_string(),
            sources: vec![SourceRef { document: "notes.md".to_string(), page: 2 }],
            search_method: SearchMethod::Hybrid,
            retrieved_chunks: vec![RankedChunk::new(chunk("x"), 1.0, SourceKind::Keyword)],
        };
        let text = format_response(&response);
        assert!(text.starts_with("Because.\n\nSources:\n  - notes.md, page 2\n"));
        assert!(text.ends_with("Search method: hybrid (1 chunks retrieved)"));
    }
}
