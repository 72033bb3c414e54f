use std::path::{Path, PathBuf};

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{PipelineError, PipelineResult};
use crate::source::{ByteStream, MediaInfo, MediaSource};
use crate::util::{create_unique, guess_extension, sanitize_file_name};

/// A downloaded item waiting for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub url: String,
    pub path: PathBuf,
    pub title: String,
    pub author: String,
}

struct OpenedItem {
    info: MediaInfo,
    ext: &'static str,
    stream: ByteStream,
}

async fn open_best_audio(source: &dyn MediaSource, url: &str) -> PipelineResult<OpenedItem> {
    let info = source
        .metadata(url)
        .await
        .map_err(|e| PipelineError::fetch(url, format!("failed to get video info: {e:#}")))?;

    let variant = info
        .audio_variants
        .first()
        .cloned()
        .ok_or_else(|| PipelineError::NoAudioFormat {
            url: url.to_string(),
        })?;

    let stream = source
        .open_stream(&variant)
        .await
        .map_err(|e| PipelineError::fetch(url, format!("failed to get stream: {e:#}")))?;

    Ok(OpenedItem {
        info,
        ext: guess_extension(&variant.mime_type),
        stream,
    })
}

async fn drain(url: &str, stream: &mut ByteStream, file: &mut File) -> PipelineResult<u64> {
    let written = tokio::io::copy(stream, file)
        .await
        .map_err(|e| PipelineError::fetch(url, format!("failed to write stream to file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| PipelineError::fetch(url, format!("failed to close file: {e}")))?;
    Ok(written)
}

/// Download the best audio variant of `url` into a fresh temporary file.
///
/// The file is deleted when the returned [`TempPath`] is dropped.
pub async fn fetch_to_temp(
    source: &dyn MediaSource,
    url: &str,
) -> PipelineResult<(MediaInfo, TempPath)> {
    let OpenedItem {
        info,
        ext,
        mut stream,
    } = open_best_audio(source, url).await?;

    let tmp = tempfile::Builder::new()
        .prefix("mp3download-")
        .suffix(&format!(".{ext}"))
        .tempfile()
        .map_err(|e| PipelineError::fetch(url, format!("failed to create temp file: {e}")))?;
    let (file, path) = tmp.into_parts();
    let mut file = File::from_std(file);

    let written = drain(url, &mut stream, &mut file).await?;
    log::debug!("fetched {written} bytes from {url}");
    Ok((info, path))
}

/// Download the best audio variant of `url` into `dir`, named after the
/// sanitized title (or the item id) with a numeric suffix on collision.
pub async fn fetch_into_dir(
    source: &dyn MediaSource,
    url: &str,
    dir: &Path,
) -> PipelineResult<Fetched> {
    let OpenedItem {
        info,
        ext,
        mut stream,
    } = open_best_audio(source, url).await?;

    let mut base = sanitize_file_name(&info.title);
    if base.is_empty() {
        base = sanitize_file_name(&info.id);
    }
    if base.is_empty() {
        base = "download".to_string();
    }

    let (mut file, path) = create_unique(dir, &base, ext)
        .await
        .map_err(|e| PipelineError::fetch(url, format!("failed to create file: {e}")))?;

    if let Err(e) = drain(url, &mut stream, &mut file).await {
        drop(file);
        let _ = tokio::fs::remove_file(&path).await;
        return Err(e);
    }

    Ok(Fetched {
        url: url.to_string(),
        path,
        title: info.title,
        author: info.author,
    })
}
