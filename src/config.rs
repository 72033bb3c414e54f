use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Settings for the yt-dlp backed fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub ytdlp_bin: PathBuf,
    pub ytdlp_path: String,
    // Explicit proxy (e.g. socks5://127.0.0.1:7890), used by yt-dlp and the HTTP client.
    pub ytdlp_proxy: Option<String>,
    // Whether yt-dlp may inherit http_proxy/https_proxy from our environment.
    pub inherit_proxy_env: bool,
    pub cookies_file: Option<PathBuf>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FetchConfigFile {
    ytdlp_bin: Option<String>,
    ytdlp_path: Option<String>,
    ytdlp_proxy: Option<String>,
    inherit_proxy_env: Option<bool>,
    cookies_file: Option<String>,
    user_agent: Option<String>,
}

fn default_ytdlp_path() -> String {
    std::env::var("PATH").unwrap_or_else(|_| "/usr/local/bin:/usr/bin:/bin".to_string())
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.and_then(|s| {
        let s = s.trim().to_string();
        if s.is_empty() { None } else { Some(s) }
    })
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self::from_file(FetchConfigFile::default())
    }
}

impl FetchConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let file: FetchConfigFile = toml::from_str(raw)?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: FetchConfigFile) -> Self {
        Self {
            ytdlp_bin: PathBuf::from(
                non_empty(file.ytdlp_bin).unwrap_or_else(|| "yt-dlp".to_string()),
            ),
            ytdlp_path: non_empty(file.ytdlp_path).unwrap_or_else(default_ytdlp_path),
            ytdlp_proxy: non_empty(file.ytdlp_proxy),
            inherit_proxy_env: file.inherit_proxy_env.unwrap_or(false),
            cookies_file: non_empty(file.cookies_file).map(PathBuf::from),
            user_agent: non_empty(file.user_agent),
        }
    }
}
