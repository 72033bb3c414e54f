//! Locating the external transcoder.
//!
//! The binary is never bundled or extracted by this program. It is looked up,
//! in order, in `vendor/` next to the running executable, directly next to the
//! executable, and on `PATH`. The first answer (found or not) is kept for the
//! rest of the process.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crate::error::ToolNotFound;

pub const FFMPEG: &str = "ffmpeg";

#[derive(Debug)]
pub struct ToolLocator {
    tool: String,
    exe_dir: Option<PathBuf>,
    search_path: Option<OsString>,
    resolved: OnceLock<Result<PathBuf, ToolNotFound>>,
    searches: AtomicUsize,
}

impl ToolLocator {
    /// `exe_dir` is where sidecars are looked for; `search_path` has the
    /// format of the `PATH` variable.
    pub fn new(tool: &str, exe_dir: Option<PathBuf>, search_path: Option<OsString>) -> Self {
        Self {
            tool: tool.to_string(),
            exe_dir,
            search_path,
            resolved: OnceLock::new(),
            searches: AtomicUsize::new(0),
        }
    }

    /// Locator rooted at the running executable and the process `PATH`.
    pub fn for_current_exe(tool: &str) -> Self {
        let exe_dir = env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self::new(tool, exe_dir, env::var_os("PATH"))
    }

    /// The process-wide ffmpeg locator.
    pub fn ffmpeg() -> Arc<ToolLocator> {
        static GLOBAL: OnceLock<Arc<ToolLocator>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(ToolLocator::for_current_exe(FFMPEG)))
            .clone()
    }

    /// Resolve the tool path. Concurrent first callers block until the single
    /// search finishes; later callers get the cached result.
    pub fn resolve(&self) -> Result<PathBuf, ToolNotFound> {
        self.resolved.get_or_init(|| self.search()).clone()
    }

    /// How many times the filesystem search actually ran.
    pub fn searches(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    fn binary_name(&self) -> String {
        format!("{}{}", self.tool, env::consts::EXE_SUFFIX)
    }

    fn search(&self) -> Result<PathBuf, ToolNotFound> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        let binary = self.binary_name();

        if let Some(dir) = &self.exe_dir {
            for candidate in [dir.join("vendor").join(&binary), dir.join(&binary)] {
                if candidate.is_file() {
                    log::debug!("using sidecar {}", candidate.display());
                    return Ok(candidate);
                }
            }
        }

        if let Some(path) = &self.search_path {
            // Empty and relative entries would resolve against our cwd.
            for dir in env::split_paths(path).filter(|d| d.is_absolute()) {
                let candidate = dir.join(&binary);
                if is_executable(&candidate) {
                    log::debug!("using {} from PATH", candidate.display());
                    return Ok(candidate);
                }
            }
        }

        Err(ToolNotFound {
            tool: self.tool.clone(),
            binary,
        })
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
