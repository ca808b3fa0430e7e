//! Where MathBot keeps its own state (config and the vector index).
//!
//! The PDF textbooks stay in whatever folder the user points us at.

use std::path::PathBuf;

/// File name of the SQLite-backed vector index inside the data directory.
pub const INDEX_FILENAME: &str = "index.sqlite3";

/// Returns the directory where MathBot stores config and the index.
/// On Linux: `~/.local/share/mathbot/`.
/// Creates the directory if it doesn't exist; returns `None` if we can't determine the path.
pub fn app_data_dir() -> Option<PathBuf> {
    let dir = directories::ProjectDirs::from("app", "MathBot", "MathBot")?
        .data_local_dir()
        .to_path_buf();
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Default location of the vector index, if the data directory is available.
pub fn default_index_path() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join(INDEX_FILENAME))
}
