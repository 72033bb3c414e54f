//! Fetch remote media and convert it to tagged MP3 files.
//!
//! The remote service sits behind [`source::MediaSource`]; conversion shells
//! out to ffmpeg, found by [`locator::ToolLocator`]. [`pipeline::Pipeline`]
//! ties the two together for one URL or a whole list.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod locator;
pub mod pipeline;
pub mod pool;
pub mod source;
pub mod transcode;
pub mod util;
pub mod ytdlp;

pub use error::{PipelineError, PipelineResult, ToolNotFound};
pub use pipeline::{BatchReport, Pipeline, Stage};
pub use source::{MediaInfo, MediaSource, Variant};
