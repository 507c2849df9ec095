//! File-backed parameter store.
//!
//! One file per key under a root directory. Writes are atomic:
//! 1. Write to a temp file
//! 2. fsync the temp file
//! 3. Rename over the final file
//!
//! A reader therefore sees either the previous document or the new one,
//! never a torn write.

use std::io;
use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::ParameterStore;
use crate::service::{BoxFuture, ServiceError, ServiceResult};

/// Parameter store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileParameterStore {
    root: PathBuf,
}

impl FileParameterStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File holding `key`. Path separators and other unsafe characters
    /// are flattened to `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .trim_start_matches('/')
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{}.json", name))
    }

    async fn read(&self, key: &str) -> ServiceResult<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("failed to read parameter", e)),
        }
    }

    async fn write_atomic(&self, key: &str, value: &str) -> ServiceResult<()> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error("failed to create store directory", e))?;

        let path = self.path_for(key);
        let temp_path = path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| io_error("failed to create temp file", e))?;
        file.write_all(value.as_bytes())
            .await
            .map_err(|e| io_error("failed to write parameter", e))?;
        file.sync_all()
            .await
            .map_err(|e| io_error("failed to fsync parameter", e))?;
        drop(file);

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| io_error("failed to commit parameter", e))?;

        // Directory fsync makes the rename durable; not all platforms allow it.
        if let Ok(dir) = fs::File::open(&self.root).await {
            let _ = dir.sync_all().await;
        }

        Ok(())
    }
}

fn io_error(context: &str, e: io::Error) -> ServiceError {
    ServiceError::other("IoError", format!("{}: {}", context, e))
}

impl ParameterStore for FileParameterStore {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, ServiceResult<Option<String>>> {
        Box::pin(self.read(key))
    }

    fn put<'a>(&'a self, key: &'a str, value: &'a str) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(self.write_atomic(key, value))
    }
}
