use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "mp3download",
    about = "Download media and convert it to tagged MP3",
    override_usage = "mp3download [-url URL | -list links.txt] [-o output.mp3 | -o out/dir/]"
)]
pub struct Cli {
    /// Source media URL
    #[arg(long = "url", value_name = "URL")]
    pub url: Option<String>,

    /// File with one URL per line; blank lines and lines starting with '#' are skipped
    #[arg(long = "list", value_name = "FILE")]
    pub list: Option<PathBuf>,

    /// Output MP3 path, or with -list an existing output directory
    #[arg(short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Concurrent workers per stage when using -list (default: number of CPUs)
    #[arg(long = "concurrency", value_name = "N", allow_negative_numbers = true)]
    pub concurrency: Option<i64>,

    /// TOML file with fetch client settings
    #[arg(long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// A list file given without -list (e.g. dropped onto the executable)
    #[arg(value_name = "LIST_FILE")]
    pub inputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Single {
        url: String,
        output: Option<PathBuf>,
    },
    Batch {
        list: PathBuf,
        out_dir: PathBuf,
        workers: usize,
    },
}

impl Cli {
    /// Pick the run mode, or `None` when there is nothing to do.
    pub fn mode(&self) -> Option<Mode> {
        let list = self.list.clone().or_else(|| {
            self.inputs
                .first()
                .filter(|p| fs::metadata(p).is_ok_and(|m| !m.is_dir()))
                .cloned()
        });

        if let Some(list) = list {
            return Some(Mode::Batch {
                list,
                out_dir: self.output.clone().unwrap_or_else(|| PathBuf::from(".")),
                workers: self.workers(),
            });
        }

        self.url
            .as_ref()
            .filter(|u| !u.trim().is_empty())
            .map(|url| Mode::Single {
                url: url.trim().to_string(),
                output: self.output.clone(),
            })
    }

    fn workers(&self) -> usize {
        let requested = self.concurrency.unwrap_or_else(|| {
            thread::available_parallelism().map_or(1, |n| n.get() as i64)
        });
        usize::try_from(requested.max(1)).unwrap_or(1)
    }
}

/// Rewrite single-dash long flags (`-url x`, `-list=f`) to the double-dash
/// form clap expects. `-o`, negative numbers and anything after `--` are left
/// alone.
pub fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    let mut passthrough = false;
    args.into_iter()
        .map(|arg| {
            if passthrough {
                return arg;
            }
            let Some(s) = arg.to_str() else { return arg };
            if s == "--" {
                passthrough = true;
                return arg;
            }
            let Some(rest) = s.strip_prefix('-') else { return arg };
            if rest.starts_with('-') {
                return arg;
            }
            let name = rest.split('=').next().unwrap_or_default();
            if name.chars().count() > 1 && !name.starts_with(|c: char| c.is_ascii_digit()) {
                OsString::from(format!("-{s}"))
            } else {
                arg
            }
        })
        .collect()
}

/// URLs from a list file's contents, one per line.
pub fn parse_url_list(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to open list file: {}", path.display()))?;
    Ok(parse_url_list(&raw))
}
