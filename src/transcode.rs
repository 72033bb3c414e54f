//! MP3 conversion through the external transcoder.

use std::ffi::OsString;
use std::path::{self, Path, PathBuf};
use std::process::Stdio;
use std::thread;

use tokio::process::Command;

use crate::error::{PipelineError, PipelineResult};

/// Arguments for an ffmpeg run producing a portable-player friendly MP3:
/// no video, LAME at 128k / 44.1kHz stereo, ID3v2.3 tags.
pub fn ffmpeg_args(
    input: &Path,
    output: &Path,
    title: &str,
    artist: &str,
    threads: usize,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "warning",
        "-nostdin",
        "-i",
    ]
    .into_iter()
    .map(OsString::from)
    .collect();
    args.push(input.into());
    args.extend(
        [
            "-vn",
            "-codec:a",
            "libmp3lame",
            "-b:a",
            "128k",
            "-ar",
            "44100",
            "-ac",
            "2",
            "-threads",
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.push(threads.to_string().into());
    if !title.is_empty() {
        args.push("-metadata".into());
        args.push(format!("title={title}").into());
    }
    if !artist.is_empty() {
        args.push("-metadata".into());
        args.push(format!("artist={artist}").into());
    }
    args.push("-id3v2_version".into());
    args.push("3".into());
    args.push(output.into());
    args
}

fn host_threads() -> usize {
    thread::available_parallelism().map_or(1, |n| n.get())
}

fn absolute(p: &Path) -> PathBuf {
    path::absolute(p).unwrap_or_else(|_| p.to_path_buf())
}

/// Convert `input` to an MP3 at `output` using the transcoder at `tool`.
///
/// The transcoder runs with its own directory as working directory so it can
/// pick up co-located libraries; its stdout/stderr go straight to ours.
pub async fn convert(
    input: &Path,
    output: &Path,
    tool: &Path,
    title: &str,
    artist: &str,
) -> PipelineResult<()> {
    let tool = absolute(tool);
    let input = absolute(input);
    let output = absolute(output);

    let mut cmd = Command::new(&tool);
    cmd.args(ffmpeg_args(&input, &output, title, artist, host_threads()))
        .stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    if let Some(dir) = tool.parent() {
        cmd.current_dir(dir);
    }

    let status = cmd.status().await.map_err(|e| PipelineError::Conversion {
        input: input.clone(),
        reason: format!("failed to start {}: {e}", tool.display()),
    })?;

    if !status.success() {
        return Err(PipelineError::Conversion {
            input,
            reason: format!("transcoder exited with {status}"),
        });
    }
    Ok(())
}
