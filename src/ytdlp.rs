//! [`MediaSource`] backed by the `yt-dlp` executable.
//!
//! yt-dlp is only asked for metadata (`-J`); the chosen variant is then
//! streamed directly over HTTP so the pipeline sees a plain byte stream.

use std::collections::HashMap;
use std::io;
use std::process::Stdio;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::io::StreamReader;

use crate::config::FetchConfig;
use crate::source::{ByteStream, MediaInfo, MediaSource, Variant};

const STDERR_TAIL_LINES: usize = 8;

pub struct YtDlpSource {
    config: FetchConfig,
    http: reqwest::Client,
}

impl YtDlpSource {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &config.ytdlp_proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy).context("Invalid ytdlp_proxy")?);
        }
        if let Some(agent) = &config.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        let http = builder.build().context("Failed to build HTTP client")?;
        Ok(Self { config, http })
    }

    fn base_command(&self) -> Command {
        let cfg = &self.config;
        let mut cmd = Command::new(&cfg.ytdlp_bin);
        cmd.env("PATH", &cfg.ytdlp_path);

        if !cfg.inherit_proxy_env {
            // Avoid being accidentally bound to a dead local proxy (common in shell env).
            cmd.env_remove("http_proxy")
                .env_remove("https_proxy")
                .env_remove("HTTP_PROXY")
                .env_remove("HTTPS_PROXY")
                .env_remove("no_proxy")
                .env_remove("NO_PROXY");
        }

        if let Some(p) = &cfg.ytdlp_proxy {
            cmd.arg("--proxy").arg(p);
        }
        if let Some(cookies) = &cfg.cookies_file {
            cmd.arg("--cookies").arg(cookies);
        }

        cmd.arg("--no-playlist").arg("--no-cache-dir");
        cmd
    }
}

#[async_trait]
impl MediaSource for YtDlpSource {
    async fn metadata(&self, url: &str) -> Result<MediaInfo> {
        let mut cmd = self.base_command();
        cmd.arg("--no-warnings")
            .arg("-J")
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let out = cmd.output().await.with_context(|| {
            format!("Failed to run {}", self.config.ytdlp_bin.display())
        })?;
        if !out.status.success() {
            return Err(anyhow!(
                "yt-dlp exited with error (status={}): {}",
                out.status,
                stderr_tail(&out.stderr)
            ));
        }

        parse_info(&out.stdout)
    }

    async fn open_stream(&self, variant: &Variant) -> Result<ByteStream> {
        let mut req = self.http.get(&variant.url);
        for (name, value) in &variant.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("Failed to request format {}", variant.id))?
            .error_for_status()
            .with_context(|| format!("Server rejected format {}", variant.id))?;

        let body = resp.bytes_stream().map_err(io::Error::other);
        Ok(Box::pin(StreamReader::new(body)))
    }
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    id: String,
    #[serde(default)]
    title: String,
    uploader: Option<String>,
    channel: Option<String>,
    #[serde(default)]
    formats: Vec<FormatJson>,
}

#[derive(Debug, Deserialize)]
struct FormatJson {
    format_id: String,
    #[serde(default)]
    ext: String,
    acodec: Option<String>,
    vcodec: Option<String>,
    url: Option<String>,
    protocol: Option<String>,
    abr: Option<f64>,
    tbr: Option<f64>,
    #[serde(default)]
    http_headers: HashMap<String, String>,
}

impl FormatJson {
    fn has_audio(&self) -> bool {
        self.acodec.as_deref() != Some("none")
    }

    fn is_direct_http(&self) -> bool {
        matches!(self.protocol.as_deref(), None | Some("http") | Some("https"))
    }

    fn bitrate(&self) -> f64 {
        self.abr.or(self.tbr).unwrap_or(0.0)
    }

    fn mime_type(&self) -> String {
        let kind = if self.vcodec.as_deref() == Some("none") {
            "audio"
        } else {
            "video"
        };
        format!("{kind}/{}", self.ext)
    }
}

fn parse_info(raw: &[u8]) -> Result<MediaInfo> {
    let info: InfoJson = serde_json::from_slice(raw).context("Failed to parse yt-dlp JSON")?;

    let mut formats: Vec<FormatJson> = info
        .formats
        .into_iter()
        .filter(|f| f.has_audio() && f.is_direct_http() && f.url.is_some())
        .collect();
    // yt-dlp lists worst first.
    formats.sort_by(|a, b| b.bitrate().total_cmp(&a.bitrate()));

    let audio_variants = formats
        .into_iter()
        .map(|f| Variant {
            mime_type: f.mime_type(),
            id: f.format_id,
            url: f.url.unwrap_or_default(),
            headers: f.http_headers.into_iter().collect(),
        })
        .collect();

    Ok(MediaInfo {
        id: info.id,
        title: info.title,
        author: info.uploader.or(info.channel).unwrap_or_default(),
        audio_variants,
    })
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return "no stderr output captured".to_string();
    }
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join("\n")
}
