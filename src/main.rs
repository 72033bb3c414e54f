use std::process::ExitCode;
use std::sync::Arc;

use clap::{CommandFactory, Parser};

use mp3download::cli::{normalize_args, Cli, Mode};
use mp3download::config::FetchConfig;
use mp3download::locator::ToolLocator;
use mp3download::ytdlp::YtDlpSource;
use mp3download::Pipeline;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    let Some(mode) = cli.mode() else {
        let _ = Cli::command().print_help();
        return ExitCode::FAILURE;
    };

    let config = match &cli.config {
        Some(path) => match FetchConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                log::error!("{e:#}");
                return ExitCode::FAILURE;
            }
        },
        None => FetchConfig::default(),
    };
    let source = match YtDlpSource::new(config) {
        Ok(s) => s,
        Err(e) => {
            log::error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    let pipeline = Pipeline::new(Arc::new(source), ToolLocator::ffmpeg());

    match mode {
        Mode::Single { url, output } => {
            if let Err(e) = pipeline.fetch_and_convert(&url, output.as_deref()).await {
                log::error!("error: {e}");
                return ExitCode::FAILURE;
            }
        }
        Mode::Batch {
            list,
            out_dir,
            workers,
        } => {
            // Per-item failures are already logged and do not affect the exit code.
            if let Err(e) = pipeline.run_list(&list, &out_dir, workers).await {
                log::error!("{e}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
