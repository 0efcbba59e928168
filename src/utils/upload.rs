// src/utils/upload.rs

use std::{
    io,
    path::{Path, PathBuf},
};

use tokio::fs::{self, File};
use uuid::Uuid;

/// An uploaded file written to the staging directory.
///
/// `release` removes it; a guard that is dropped without being released
/// removes the file synchronously, so every exit path cleans up exactly once.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    file_name: String,
    released: bool,
}

impl StagedFile {
    /// Creates an empty staged file for an upload named `file_name` and
    /// returns it together with a handle for streaming the body in.
    pub async fn create(dir: impl AsRef<Path>, file_name: &str) -> io::Result<(Self, File)> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await?;

        let path = dir.join(format!("{}-{}", Uuid::new_v4(), sanitize_file_name(file_name)));
        let file = File::create(&path).await?;

        Ok((
            Self {
                path,
                file_name: file_name.to_string(),
                released: false,
            },
            file,
        ))
    }

    /// Name the client gave the file.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path).await
    }

    pub async fn release(mut self) {
        self.released = true;
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!("Failed to remove staged upload {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove staged upload {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Keeps ASCII alphanumerics, dots, dashes and underscores.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .take(100)
        .collect();

    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}
