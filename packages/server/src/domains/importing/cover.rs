//! Best-effort cover download into the uploads directory.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::common::NovelId;
use crate::kernel::BaseAssetDownloader;

pub const MAX_COVER_BYTES: usize = 20 * 1024 * 1024;
const COVER_TIMEOUT: Duration = Duration::from_secs(25);

/// File extension for a cover URL, `.jpg` when the path has none we know.
pub fn cover_extension(url: &str) -> &'static str {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match ext {
        "jpeg" => ".jpeg",
        "png" => ".png",
        "webp" => ".webp",
        _ => ".jpg",
    }
}

pub fn cover_key(novel_id: NovelId, url: &str) -> String {
    format!("covers/{}{}", novel_id, cover_extension(url))
}

pub struct CoverDownloader {
    client: reqwest::Client,
}

impl CoverDownloader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(COVER_TIMEOUT)
            .build()
            .context("Failed to build cover download client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BaseAssetDownloader for CoverDownloader {
    async fn download_cover(&self, url: &str, novel_id: NovelId, upload_dir: &Path) -> Result<String> {
        let key = cover_key(novel_id, url);
        let target = upload_dir.join(&key);
        if let Some(dir) = target.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;
        let status = response.status();
        if !status.is_success() {
            bail!("cover download {url}: status={}", status.as_u16());
        }
        if response
            .content_length()
            .is_some_and(|len| len > MAX_COVER_BYTES as u64)
        {
            bail!("cover {url} exceeds {MAX_COVER_BYTES} bytes");
        }

        let tmp = target.with_extension("part");
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        let mut written = 0usize;
        let copied: Result<()> = async {
            while let Some(chunk) = response.chunk().await? {
                written += chunk.len();
                if written > MAX_COVER_BYTES {
                    bail!("cover {url} exceeds {MAX_COVER_BYTES} bytes");
                }
                file.write_all(&chunk).await?;
            }
            file.flush().await?;
            Ok(())
        }
        .await;
        drop(file);

        if let Err(e) = copied {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e);
        }
        tokio::fs::rename(&tmp, &target)
            .await
            .with_context(|| format!("Failed to move cover into {}", target.display()))?;

        debug!(novel_id = %novel_id, key = %key, bytes = written, "Cover saved");
        Ok(key)
    }
}
