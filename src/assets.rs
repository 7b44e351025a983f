use anyhow::{anyhow, Context};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

pub const ASSETS_DIR: &str = "assets";

#[derive(Debug, Clone)]
pub struct StoredAsset {
    /// Workspace-relative path stored on documents, e.g. `assets/<sha256>.png`.
    pub reference: String,
    pub sha256: String,
    pub size: u64,
}

fn sha256_file(path: &Path) -> anyhow::Result<(String, u64)> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open asset {}", path.to_string_lossy()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    let mut size = 0u64;
    loop {
        let n = f.read(&mut buf).context("failed to read asset")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        size += n as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}

/// Copies `src` into the workspace asset store, named by content hash.
/// Identical files share one blob.
pub fn store_asset(workspace: &Path, src: &Path) -> anyhow::Result<StoredAsset> {
    if !src.is_file() {
        return Err(anyhow!("asset file not found: {}", src.to_string_lossy()));
    }
    let (sha256, size) = sha256_file(src)?;
    let ext = src
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| format!(".{}", s.to_ascii_lowercase()))
        .unwrap_or_default();
    let file_name = format!("{}{}", sha256, ext);

    let dir = workspace.join(ASSETS_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.to_string_lossy()))?;
    let dst = dir.join(&file_name);
    if !dst.is_file() {
        let tmp = dir.join(format!("{}.copying", file_name));
        std::fs::copy(src, &tmp).with_context(|| {
            format!(
                "failed to copy asset from {} to {}",
                src.to_string_lossy(),
                tmp.to_string_lossy()
            )
        })?;
        std::fs::rename(&tmp, &dst)
            .with_context(|| format!("failed to move asset to {}", dst.to_string_lossy()))?;
    }

    Ok(StoredAsset {
        reference: format!("{}/{}", ASSETS_DIR, file_name),
        sha256,
        size,
    })
}
