use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// A model artifact: the file name it is cached under and where to fetch it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: &'static str,
    pub url: &'static str,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't send Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Finds a model on disk or fetches it.
///
/// Looks in the user cache directory, then in `bundled_dir`, and only then
/// downloads into the cache.
pub fn resolve(
    spec: &ModelSpec,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir()?;
    if let Some(found) = find_local(spec.name, &cache_dir, bundled_dir) {
        return Ok(found);
    }

    fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;
    let dest = cache_dir.join(spec.name);
    log::info!("Downloading {} from {}", spec.name, spec.url);
    download(spec.url, &dest, progress)?;
    Ok(dest)
}

fn find_local(name: &str, cache_dir: &Path, bundled_dir: Option<&Path>) -> Option<PathBuf> {
    std::iter::once(cache_dir)
        .chain(bundled_dir)
        .map(|dir| dir.join(name))
        .find(|path| path.is_file())
}

/// Platform-specific model cache directory (`<cache>/Moodcam/models`).
///
/// macOS keeps models under Application Support, since `~/Library/Caches`
/// may be purged by the system.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let download_err = |source| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };

    let response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(download_err)?;
    let total = response.content_length().unwrap_or(0);
    let bytes = response.bytes().map_err(download_err)?;

    // Written next to the destination and renamed, so a failed fetch never
    // leaves a truncated model where `resolve` would pick it up.
    let part = dest.with_extension("part");
    let result = write_chunks(&part, &bytes, total, progress.as_deref())
        .and_then(|_| {
            fs::rename(&part, dest).map_err(|source| ModelResolveError::Write {
                path: dest.to_path_buf(),
                source,
            })
        });
    if result.is_err() {
        let _ = fs::remove_file(&part);
    }
    result
}

fn write_chunks(
    path: &Path,
    bytes: &[u8],
    total: u64,
    progress: Option<&(dyn Fn(u64, u64) + Send)>,
) -> Result<(), ModelResolveError> {
    let write_err = |source| ModelResolveError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(path).map_err(write_err)?;
    let mut written: u64 = 0;
    for chunk in bytes.chunks(1024 * 1024) {
        file.write_all(chunk).map_err(write_err)?;
        written += chunk.len() as u64;
        if let Some(cb) = progress {
            cb(written, total);
        }
    }
    file.flush().map_err(write_err)
}
