#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll};

use async_trait::async_trait;
use mp3download::locator::{ToolLocator, FFMPEG};
use mp3download::source::ByteStream;
use mp3download::{MediaInfo, MediaSource, Variant};
use tempfile::TempDir;
use tokio::io::{AsyncRead, ReadBuf};

enum Body {
    Bytes(Vec<u8>),
    Broken,
}

/// In-memory media service keyed by URL.
#[derive(Default)]
pub struct FakeSource {
    items: HashMap<String, MediaInfo>,
    bodies: HashMap<String, Body>,
    metadata_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, url: &str, title: &str, author: &str, mime: &str, body: &[u8]) -> Self {
        self.insert(url, title, author, Some((mime, Body::Bytes(body.to_vec()))))
    }

    pub fn with_broken_stream(self, url: &str, title: &str) -> Self {
        self.insert(url, title, "", Some(("audio/webm", Body::Broken)))
    }

    pub fn without_audio(self, url: &str, title: &str) -> Self {
        self.insert(url, title, "", None)
    }

    fn insert(mut self, url: &str, title: &str, author: &str, body: Option<(&str, Body)>) -> Self {
        let id = format!("id{}", self.items.len());
        let mut audio_variants = Vec::new();
        if let Some((mime, body)) = body {
            let variant_url = format!("mem://{id}");
            audio_variants.push(Variant {
                id: "251".to_string(),
                mime_type: mime.to_string(),
                url: variant_url.clone(),
                headers: Vec::new(),
            });
            self.bodies.insert(variant_url, body);
        }
        self.items.insert(
            url.to_string(),
            MediaInfo {
                id,
                title: title.to_string(),
                author: author.to_string(),
                audio_variants,
            },
        );
        self
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaSource for FakeSource {
    async fn metadata(&self, url: &str) -> anyhow::Result<MediaInfo> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.items
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unsupported url: {url}"))
    }

    async fn open_stream(&self, variant: &Variant) -> anyhow::Result<ByteStream> {
        match self.bodies.get(&variant.url) {
            Some(Body::Bytes(bytes)) => Ok(Box::pin(io::Cursor::new(bytes.clone()))),
            Some(Body::Broken) => Ok(Box::pin(BrokenReader)),
            None => Err(anyhow::anyhow!("no body for {}", variant.url)),
        }
    }
}

struct BrokenReader;

impl AsyncRead for BrokenReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset",
        )))
    }
}

// Stand-in transcoder: writes its working directory and arguments, then the
// input bytes, to the output. Inputs with "fail" in the name exit non-zero.
#[cfg(unix)]
const FAKE_FFMPEG: &str = r#"#!/bin/sh
in=""
out=""
prev=""
for a in "$@"; do
  if [ "$prev" = "-i" ]; then in="$a"; fi
  prev="$a"
  out="$a"
done
case "$in" in
  *fail*) echo "simulated failure" >&2; exit 3 ;;
esac
{ echo "cwd=$(pwd)"; printf '%s\n' "$@"; cat "$in"; } > "$out"
"#;

/// Directory holding the fake ffmpeg, written once per test binary so no
/// test execs it while it is still open for writing.
#[cfg(unix)]
pub fn fake_tool_dir() -> &'static Path {
    use std::os::unix::fs::PermissionsExt;

    static DIR: OnceLock<TempDir> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        let tool = dir.path().join(FFMPEG);
        std::fs::write(&tool, FAKE_FFMPEG).unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        dir
    })
    .path()
}

#[cfg(unix)]
pub fn fake_locator() -> Arc<ToolLocator> {
    Arc::new(ToolLocator::new(
        FFMPEG,
        Some(fake_tool_dir().to_path_buf()),
        None,
    ))
}

pub fn missing_locator(empty: &Path) -> Arc<ToolLocator> {
    Arc::new(ToolLocator::new(
        FFMPEG,
        Some(empty.to_path_buf()),
        Some(empty.as_os_str().to_owned()),
    ))
}

/// The `-i` argument the fake transcoder recorded in `output`.
pub fn recorded_input(output: &Path) -> PathBuf {
    let text = String::from_utf8_lossy(&std::fs::read(output).unwrap()).into_owned();
    let mut lines = text.lines();
    while let Some(line) = lines.next() {
        if line == "-i" {
            return PathBuf::from(lines.next().unwrap());
        }
    }
    panic!("no -i in {}", output.display());
}

pub fn recorded_text(output: &Path) -> String {
    String::from_utf8_lossy(&std::fs::read(output).unwrap()).into_owned()
}

pub fn mp3_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "mp3"))
        .collect();
    files.sort();
    files
}
