//! Plain-text document loader.
//!
//! Reads `.txt` / `.md` files below a directory into [`Document`]s. Form feeds
//! (`\x0c`) separate pages, and each page is prefixed with its page marker the
//! same way extracted PDF text is, so chunks of text files carry pages too.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::page::page_marker;
use crate::types::Document;

const EXTENSIONS: &[&str] = &["txt", "md"];

/// Load every supported file under `dir`, sorted by path.
pub fn load_directory(dir: &Path) -> Result<Vec<Document>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!("document directory {}", dir.display())));
    }
    let files = list_files(dir);
    if files.is_empty() {
        warn!("No .txt or .md files found under {}", dir.display());
        return Ok(vec![]);
    }
    let mut documents = Vec::with_capacity(files.len());
    for file_path in &files {
        match read_file_content(file_path) {
            Ok(raw) => {
                let source = source_name(file_path);
                info!("Loaded: {source}");
                documents.push(Document { content: paginate(&raw), source });
            }
            Err(e) => warn!("Failed: {} - {e}", file_path.display()),
        }
    }
    Ok(documents)
}

/// Render raw text with one page marker per form-feed separated page.
pub fn paginate(raw: &str) -> String {
    let mut text = String::with_capacity(raw.len() + 32);
    for (page_num, page) in (1u32..).zip(raw.split('\x0c')) {
        text.push('\n');
        text.push_str(&page_marker(page_num));
        text.push('\n');
        text.push_str(page);
    }
    text
}

fn read_file_content(file_path: &Path) -> std::io::Result<String> {
    let bytes = fs::read(file_path)?;
    Ok(match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    })
}

fn source_name(file_path: &Path) -> String {
    file_path
        .file_name()
        .map_or_else(|| file_path.to_string_lossy().into_owned(), |n| n.to_string_lossy().into_owned())
}

fn list_files(root: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().and_then(|s| s.to_str()).is_some_and(|ext| EXTENSIONS.contains(&ext)))
        .collect();
    files.sort();
    files
}
