//! SQLite URL handling for the binary.

use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidDbUrl {
    pub raw: String,
}

impl fmt::Display for InvalidDbUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid --db value: {}", self.raw)
    }
}

impl std::error::Error for InvalidDbUrl {}

/// Turn `quiz.sqlite3`, `sqlite:quiz.sqlite3` or an absolute path into a
/// `sqlite://` URL with an absolute path.
pub fn normalize_sqlite_url(raw: &str) -> Result<String, InvalidDbUrl> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InvalidDbUrl {
            raw: raw.to_string(),
        });
    }
    if trimmed == "sqlite::memory:" {
        return Ok(trimmed.to_string());
    }
    if let Some(rest) = trimmed.strip_prefix("sqlite://") {
        if rest.starts_with('/') {
            return Ok(trimmed.to_string());
        }
        return Ok(format!("sqlite://{}", absolute(rest).display()));
    }

    let path = trimmed.strip_prefix("sqlite:").unwrap_or(trimmed);
    Ok(format!("sqlite://{}", absolute(path).display()))
}

fn absolute(path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    }
}

/// Create the database file and its parent directories so the pool can open it.
pub fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}
