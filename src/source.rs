use std::pin::Pin;

use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Body of a selected variant.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// One encoded rendition of a media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub id: String,
    /// Declared media type, e.g. `audio/webm; codecs="opus"`.
    pub mime_type: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    /// Stable identifier of the item on the remote service.
    pub id: String,
    pub title: String,
    pub author: String,
    /// Audio-capable variants, best first.
    pub audio_variants: Vec<Variant>,
}

/// The remote service the pipeline pulls from.
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn metadata(&self, url: &str) -> anyhow::Result<MediaInfo>;

    async fn open_stream(&self, variant: &Variant) -> anyhow::Result<ByteStream>;
}
