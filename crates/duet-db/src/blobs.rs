use anyhow::{Result, bail};
use std::path::PathBuf;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Longest accepted blob name.
const MAX_NAME_LEN: usize = 128;

/// On-disk storage for memory images.
///
/// Each blob is a flat file at `{dir}/{name}` and is served publicly at
/// `{public_base}/storage/memories/{name}`.
pub struct BlobStore {
    dir: PathBuf,
    public_base: String,
}

impl BlobStore {
    pub async fn new(dir: PathBuf, public_base: impl Into<String>) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Blob storage directory: {}", dir.display());
        Ok(Self {
            dir,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        })
    }

    /// Names are single path components of `[A-Za-z0-9._-]`, not starting with a dot.
    pub fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            bail!("Blob name length out of range: {}", name.len());
        }
        if name.starts_with('.') {
            bail!("Blob name may not start with '.': {}", name);
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            bail!("Blob name contains invalid characters: {}", name);
        }
        Ok(())
    }

    pub fn public_url(&self, name: &str) -> String {
        format!("{}/storage/memories/{}", self.public_base, name)
    }

    /// Write a blob, replacing any previous blob with the same name.
    pub async fn put(&self, name: &str, data: &[u8]) -> Result<String> {
        Self::validate_name(name)?;
        let path = self.dir.join(name);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;
        info!("Stored blob {} ({} bytes)", name, data.len());
        Ok(self.public_url(name))
    }

    /// Read a blob back. Returns `None` if no blob has that name.
    pub async fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Self::validate_name(name)?;
        match fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
