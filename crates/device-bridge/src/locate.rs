//! Tool Discovery
//!
//! Finds the adb and fastboot executables.

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;
use which::which;

/// One of the two wrapped executables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Adb,
    Fastboot,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Adb => "adb",
            Tool::Fastboot => "fastboot",
        }
    }

    /// Executable file name on this platform
    pub fn executable(&self) -> String {
        if cfg!(windows) {
            format!("{}.exe", self.name())
        } else {
            self.name().to_string()
        }
    }
}

/// Resolve a tool location.
///
/// Explicit overrides are tried in order and taken as given. Then the SDK
/// `platform-tools` directories, then `PATH`. Falls back to the bare name so a
/// missing tool surfaces as a spawn error on first use.
pub fn locate(tool: Tool, overrides: &[Option<&Path>]) -> PathBuf {
    if let Some(path) = overrides.iter().flatten().next() {
        debug!("{} from override: {}", tool.name(), path.display());
        return path.to_path_buf();
    }

    for root in sdk_candidates() {
        if let Some(path) = in_sdk_root(&root, tool) {
            debug!("{} from SDK: {}", tool.name(), path.display());
            return path;
        }
    }

    if let Ok(path) = which(tool.name()) {
        debug!("{} from PATH: {}", tool.name(), path.display());
        return path;
    }

    PathBuf::from(tool.executable())
}

/// `<root>/platform-tools/<tool>` if it exists
pub fn in_sdk_root(root: &Path, tool: Tool) -> Option<PathBuf> {
    let path = root.join("platform-tools").join(tool.executable());
    path.is_file().then_some(path)
}

/// Get SDK path candidates
fn sdk_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(android_home) = env::var("ANDROID_HOME") {
        candidates.push(PathBuf::from(android_home));
    }
    if let Ok(sdk_root) = env::var("ANDROID_SDK_ROOT") {
        candidates.push(PathBuf::from(sdk_root));
    }

    if let Some(home) = dirs::home_dir() {
        if cfg!(windows) {
            candidates.push(home.join("AppData").join("Local").join("Android").join("Sdk"));
        } else {
            candidates.push(home.join("Android").join("Sdk"));
        }
    }

    candidates
}
