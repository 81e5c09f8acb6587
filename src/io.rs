use std::path::PathBuf;

use anyhow::Context;
use tokio::fs::create_dir_all;

/// Path of the file behind a sqlite url, or `None` for in-memory databases.
pub fn database_file(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    if path.is_empty() || path.starts_with(":memory:") || query.contains("mode=memory") {
        return None;
    }
    Some(PathBuf::from(path))
}

pub fn is_in_memory(url: &str) -> bool {
    database_file(url).is_none()
}

/// Creates the directory that will hold the database file, if any.
pub async fn prepare_io(url: &str) -> anyhow::Result<()> {
    let Some(file) = database_file(url) else {
        return Ok(());
    };
    if let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent)
            .await
            .with_context(|| format!("creating database directory {}", parent.display()))?;
    }
    Ok(())
}
