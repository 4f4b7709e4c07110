use anyhow::Result;
use std::path::{Path, PathBuf};

/// Create a URL-friendly slug from a title
pub fn create_slug(title: &str) -> String {
    title
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c.to_ascii_lowercase())
            } else if c.is_whitespace() || c == '-' || c == '_' {
                Some('-')
            } else {
                None
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .take(50) // Limit length
        .collect()
}

/// Default export file name for a deck titled `title`, with the given
/// extension (no leading dot).
pub fn export_filename(title: &str, extension: &str) -> String {
    let slug = create_slug(title);
    let stem = if slug.is_empty() { "presentation" } else { slug.as_str() };
    format!("{stem}.{extension}")
}

/// Write `content` to `dir/filename`, creating `dir` when needed.
pub async fn write_in_dir<P: AsRef<Path>>(dir: P, filename: &str, content: &[u8]) -> Result<PathBuf> {
    let dir = dir.as_ref();
    if !dir.exists() {
        tokio::fs::create_dir_all(dir).await?;
    }

    let file_path = dir.join(filename);
    tokio::fs::write(&file_path, content).await?;

    Ok(file_path)
}
