//! Single-URL and batch download/convert pipelines.
//!
//! A batch run owns one temporary workspace. The fetch stage fills it with
//! uniquely named downloads, the convert stage turns each successful download
//! into `<out_dir>/<title>.mp3`, and the workspace is removed afterwards no
//! matter how many items failed.

use std::collections::HashSet;
use std::fmt;
use std::path::{self, Path, PathBuf};
use std::sync::Arc;

use crate::cli::read_url_list;
use crate::error::{PipelineError, PipelineResult};
use crate::fetch::{fetch_into_dir, fetch_to_temp, Fetched};
use crate::locator::ToolLocator;
use crate::pool::run_pool;
use crate::source::{MediaInfo, MediaSource};
use crate::transcode::convert;
use crate::util::{claim_name, sanitize_file_name};

const FALLBACK_NAME: &str = "download";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Convert,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Fetch => f.write_str("download"),
            Stage::Convert => f.write_str("conversion"),
        }
    }
}

#[derive(Debug)]
pub struct ItemFailure {
    pub url: String,
    pub stage: Stage,
    pub error: PipelineError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Converted {
    pub url: String,
    pub output: PathBuf,
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct BatchReport {
    pub total: usize,
    /// Temporary directory used for downloads; gone by the time the report
    /// is returned.
    pub workspace: PathBuf,
    pub converted: Vec<Converted>,
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    fn new(total: usize, workspace: &Path) -> Self {
        Self {
            total,
            workspace: workspace.to_path_buf(),
            converted: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> usize {
        self.converted.len()
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    fn record_failure(&mut self, url: String, stage: Stage, error: PipelineError) {
        log::warn!("{stage} failed for {url}: {error}");
        self.failures.push(ItemFailure { url, stage, error });
    }
}

/// Fails unless `out_dir` exists and is a directory.
pub async fn check_output_dir(out_dir: &Path) -> PipelineResult<()> {
    match tokio::fs::metadata(out_dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(PipelineError::Setup(format!(
            "output must be a directory when using -list: {}",
            out_dir.display()
        ))),
    }
}

pub struct Pipeline {
    source: Arc<dyn MediaSource>,
    locator: Arc<ToolLocator>,
    workspace_root: Option<PathBuf>,
}

impl Pipeline {
    pub fn new(source: Arc<dyn MediaSource>, locator: Arc<ToolLocator>) -> Self {
        Self {
            source,
            locator,
            workspace_root: None,
        }
    }

    /// Create batch workspaces under `dir` instead of the system temp dir.
    pub fn with_workspace_root(mut self, dir: PathBuf) -> Self {
        self.workspace_root = Some(dir);
        self
    }

    /// Fetch one URL and convert it. Returns the path of the written MP3.
    pub async fn fetch_and_convert(
        &self,
        url: &str,
        output: Option<&Path>,
    ) -> PipelineResult<PathBuf> {
        let tool = self.locator.resolve()?;

        let (info, downloaded) = fetch_to_temp(&*self.source, url).await?;
        println!(
            "Downloaded stream to: {}",
            path::absolute(&downloaded)
                .unwrap_or_else(|_| downloaded.to_path_buf())
                .display()
        );

        let output = single_output_path(output, &info);
        if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                PipelineError::Setup(format!(
                    "failed to create output directory {}: {e}",
                    dir.display()
                ))
            })?;
        }

        convert(&downloaded, &output, &tool, &info.title, &info.author).await?;
        drop(downloaded);

        println!("Conversion complete - output: {}", output.display());
        Ok(output)
    }

    /// Fetch and convert every URL with `workers` concurrent tasks per stage.
    ///
    /// Only setup problems (bad output directory, missing transcoder, no
    /// workspace) are returned as `Err`; per-item failures land in the report.
    pub async fn run_batch(
        &self,
        urls: Vec<String>,
        out_dir: &Path,
        workers: usize,
    ) -> PipelineResult<BatchReport> {
        check_output_dir(out_dir).await?;

        let tool = self.locator.resolve()?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("mp3download-batch-");
        let workspace = match &self.workspace_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| PipelineError::Setup(format!("failed to create temp dir: {e}")))?;
        log::debug!("batch workspace {}", workspace.path().display());

        let mut report = BatchReport::new(urls.len(), workspace.path());
        self.run_stages(urls, workspace.path(), out_dir, tool, workers.max(1), &mut report)
            .await;

        if let Err(e) = workspace.close() {
            log::warn!("failed to remove workspace {}: {e}", report.workspace.display());
        }

        log::info!(
            "batch finished: {} converted, {} failed, {} total",
            report.succeeded(),
            report.failed(),
            report.total
        );
        Ok(report)
    }

    /// Batch mode as driven from the command line: read URLs from `list` and
    /// run them into `out_dir`.
    ///
    /// The output directory is checked before the list is read. A list with
    /// no URLs returns `Ok(None)` without resolving the transcoder or creating
    /// a workspace.
    pub async fn run_list(
        &self,
        list: &Path,
        out_dir: &Path,
        workers: usize,
    ) -> PipelineResult<Option<BatchReport>> {
        check_output_dir(out_dir).await?;

        let urls = read_url_list(list).map_err(|e| PipelineError::Setup(format!("{e:#}")))?;
        if urls.is_empty() {
            log::info!("no links found in list file");
            return Ok(None);
        }
        self.run_batch(urls, out_dir, workers).await.map(Some)
    }

    async fn run_stages(
        &self,
        urls: Vec<String>,
        workspace: &Path,
        out_dir: &Path,
        tool: PathBuf,
        workers: usize,
        report: &mut BatchReport,
    ) {
        if urls.is_empty() {
            return;
        }

        let source = self.source.clone();
        let dir = workspace.to_path_buf();
        let fetched = run_pool(urls, workers, move |url: String| {
            let source = source.clone();
            let dir = dir.clone();
            async move {
                let result = fetch_into_dir(&*source, &url, &dir).await;
                (url, result)
            }
        })
        .await;

        let mut ready = Vec::new();
        for (url, result) in fetched {
            match result {
                Ok(item) => {
                    log::info!("downloaded: {} -> {}", url, item.path.display());
                    ready.push(item);
                }
                Err(e) => report.record_failure(url, Stage::Fetch, e),
            }
        }
        if ready.is_empty() {
            log::info!("no successful downloads, nothing to convert");
            return;
        }

        let mut taken = HashSet::new();
        let jobs: Vec<(Fetched, PathBuf)> = ready
            .into_iter()
            .map(|item| {
                let name = claim_name(&mut taken, &batch_output_base(&item));
                let output = out_dir.join(format!("{name}.mp3"));
                (item, output)
            })
            .collect();

        let converted = run_pool(jobs, workers, move |(item, output): (Fetched, PathBuf)| {
            let tool = tool.clone();
            async move {
                let result = convert(&item.path, &output, &tool, &item.title, &item.author).await;
                let _ = tokio::fs::remove_file(&item.path).await;
                (item.url, output, result)
            }
        })
        .await;

        for (url, output, result) in converted {
            match result {
                Ok(()) => {
                    log::info!("converted: {} -> {}", url, output.display());
                    report.converted.push(Converted { url, output });
                }
                Err(e) => report.record_failure(url, Stage::Convert, e),
            }
        }
    }
}

/// Output path for single mode: the requested path (with `.mp3` added when it
/// has no extension), or `<title>.mp3` in the current directory.
pub fn single_output_path(requested: Option<&Path>, info: &MediaInfo) -> PathBuf {
    let mut output = match requested.filter(|p| !p.as_os_str().is_empty()) {
        Some(p) => p.to_path_buf(),
        None => {
            let mut base = sanitize_file_name(&info.title);
            if base.is_empty() {
                base = sanitize_file_name(&info.id);
            }
            if base.is_empty() {
                base = FALLBACK_NAME.to_string();
            }
            PathBuf::from(format!("{base}.mp3"))
        }
    };
    if output.extension().is_none() {
        output.set_extension("mp3");
    }
    output
}

// No item id survives the fetch stage, so an untitled item is named after
// its URL.
fn batch_output_base(item: &Fetched) -> String {
    let base = sanitize_file_name(&item.title);
    if !base.is_empty() {
        return base;
    }
    let from_url = sanitize_file_name(&item.url);
    if from_url.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        from_url
    }
}
