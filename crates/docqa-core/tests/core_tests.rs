use std::fs;
use std::io::Write;
use tempfile::TempDir;

use docqa_core::loader::load_directory;
use docqa_core::{Chunker, ChunkingConfig, Error};

#[test]
fn load_directory_single_small_file() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let file_path = dir.join("a.txt");
    let mut f = fs::File::create(&file_path).unwrap();
    writeln!(f, "Short text").unwrap();

    let docs = load_directory(dir).expect("load");
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].source, "a.txt");

    let chunker = Chunker::new(ChunkingConfig::default()).unwrap();
    let chunks = chunker.chunk_documents(&docs).expect("chunk");
    assert_eq!(chunks.len(), 1, "one small file becomes one chunk");
    assert!(chunks[0].text.ends_with("Short text"));
    assert_eq!(chunks[0].page, 1, "loader marks the first page");
}

#[test]
fn form_feed_pages_reach_chunks() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    let page = "Rust is a systems language. ".repeat(10);
    fs::write(dir.join("book.txt"), format!("{page}\x0c{page}\x0c{page}")).unwrap();
    fs::write(dir.join("ignored.bin"), [0u8, 159, 146, 150]).unwrap();

    let docs = load_directory(dir).expect("load");
    assert_eq!(docs.len(), 1, "only supported extensions are loaded");

    let chunker = Chunker::new(ChunkingConfig::new(120, 20)).unwrap();
    let chunks = chunker.chunk(&docs[0].content, &docs[0].source).unwrap();
    let pages: Vec<u32> = chunks.iter().map(|c| c.page).collect();
    assert_eq!(pages.first(), Some(&1));
    assert_eq!(pages.last(), Some(&3));
    assert!(pages.windows(2).all(|w| w[0] <= w[1]));
}

#[test]
fn files_are_loaded_in_sorted_order() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::create_dir_all(dir.join("nested")).unwrap();
    fs::write(dir.join("b.md"), "bravo").unwrap();
    fs::write(dir.join("a.txt"), "alpha").unwrap();
    fs::write(dir.join("nested/c.txt"), "charlie").unwrap();

    let sources: Vec<String> = load_directory(dir).unwrap().into_iter().map(|d| d.source).collect();
    assert_eq!(sources, vec!["a.txt", "b.md", "c.txt"]);
}

#[test]
fn missing_directory_is_not_found() {
    let tmp = TempDir::new().unwrap();
    let err = load_directory(&tmp.path().join("nope")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn chunks_serialize_with_provenance_fields() {
    let chunks = docqa_core::chunker::chunk("Test sentence. ".repeat(50).as_str(), "test.pdf", 100, 20).unwrap();
    let json = serde_json::to_value(&chunks).unwrap();
    let first = &json[0];
    assert!(first.get("text").is_some());
    assert_eq!(first["source"], "test.pdf");
    assert_eq!(first["chunk_id"], 0);
    assert_eq!(first["page"], 0);
}
