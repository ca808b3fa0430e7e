//! Discovering PDF textbooks in a user-chosen folder and pulling text out of them page by page.

use std::path::{Path, PathBuf};

use lopdf::Document;
use walkdir::WalkDir;

/// Text extracted from one page. `number` is 1-based, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

impl PageText {
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Lists every `.pdf` file (any letter case) directly inside `root`, sorted by path.
/// Hidden files are ignored; subfolders are not descended into.
pub fn scan_pdfs(root: &Path) -> Result<Vec<PathBuf>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }
    let mut pdfs = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| ScanError::Walk(e.to_string()))?;
        let path = entry.path();
        if entry.file_type().is_file() && is_pdf(path) {
            pdfs.push(path.to_path_buf());
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    // The root itself is always walked, whatever its name.
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|s| s.starts_with('.'))
            .unwrap_or(false)
}

/// File name used as the chunk source label.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Loads a PDF and returns the text of every page.
/// A page whose text can't be decoded comes back empty rather than failing the document.
pub fn extract_pages(path: &Path) -> Result<Vec<PageText>, PdfError> {
    let doc = Document::load(path).map_err(|e| PdfError::Load(path.to_path_buf(), e))?;
    let mut pages = Vec::new();
    for number in doc.get_pages().into_keys() {
        let text = match doc.extract_text(&[number]) {
            Ok(t) => t,
            Err(e) => {
                tracing::debug!(path = %path.display(), page = number, error = %e, "page text not extractable");
                String::new()
            }
        };
        pages.push(PageText { number, text });
    }
    Ok(pages)
}

/// Number of pages in a PDF, without extracting text.
pub fn page_count(path: &Path) -> Result<usize, PdfError> {
    let doc = Document::load(path).map_err(|e| PdfError::Load(path.to_path_buf(), e))?;
    Ok(doc.get_pages().len())
}

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("walk error: {0}")]
    Walk(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PdfError {
    #[error("failed to load PDF {0}: {1}")]
    Load(PathBuf, lopdf::Error),
}
