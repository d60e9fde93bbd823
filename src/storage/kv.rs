//! Filesystem key-value store for page snapshots

use crate::storage::traits::{KeyValueStore, StorageResult};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use url::Url;

/// Stores each value as a file named after its key
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    root: PathBuf,
    public_base_url: Option<String>,
}

impl FileKeyValueStore {
    /// Opens a store rooted at `root`, creating the directory if needed
    ///
    /// # Arguments
    ///
    /// * `root` - Directory holding the values
    /// * `public_base_url` - Prefix for record URLs; `file://` URLs are used when `None`
    pub fn open(root: &Path, public_base_url: Option<String>) -> StorageResult<Self> {
        std::fs::create_dir_all(root)?;
        let root = root.canonicalize()?;

        Ok(Self {
            root,
            public_base_url,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // One file per key, always directly under the root
        let file_name: String = key
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        self.root.join(file_name)
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn set_value(&self, key: &str, value: &[u8], content_type: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        tokio::fs::write(&path, value).await?;
        tracing::debug!(key, content_type, bytes = value.len(), "Stored value");
        Ok(())
    }

    fn record_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => {
                let path = self.path_for(key);
                Url::from_file_path(&path)
                    .map(|u| u.to_string())
                    .unwrap_or_else(|_| path.display().to_string())
            }
        }
    }
}
