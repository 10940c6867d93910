//! Session logger: routes `tracing` output to one file per user.
//!
//! The file is **truncated at each launch**, so it only ever holds the most
//! recent session.
//!
//! Log location:
//!   Windows:  `%APPDATA%\epigimp\epigimp.log`
//!   Linux:    `$XDG_DATA_HOME/epigimp/epigimp.log` (`~/.local/share/...`)
//!   macOS:    `~/Library/Application Support/epigimp/epigimp.log`
//!
//! When the file cannot be opened, output goes to stderr instead.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::Level;

/// Install the global subscriber. `verbose` lowers the level to DEBUG.
/// A second call is ignored.
///
/// On success a panic hook is chained in front of the default one so a
/// crash leaves its message in the session file.
pub fn init(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let target = session_file();
    let builder = tracing_subscriber::fmt().with_max_level(level).with_target(false);

    let installed = match open_session(&target) {
        Ok(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).try_init().is_ok(),
        Err(err) => {
            eprintln!("epigimp: cannot write log {}: {err}", target.display());
            builder.with_writer(std::io::stderr).try_init().is_ok()
        }
    };

    if installed {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!("PANIC: {info}");
            default_hook(info);
        }));
    }
}

/// Truncate (or create) the session file and stamp its header.
fn open_session(target: &Path) -> std::io::Result<File> {
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = File::create(target)?;
    let started = SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |d| d.as_secs());
    writeln!(file, "=== epigimp session started (unix {started}) ===")?;
    writeln!(file, "Log file: {}\n", target.display())?;
    Ok(file)
}

fn session_file() -> PathBuf {
    let env_dir = |var: &str| std::env::var_os(var).map(PathBuf::from);
    let base = if cfg!(target_os = "windows") {
        env_dir("APPDATA")
    } else if cfg!(target_os = "macos") {
        env_dir("HOME").map(|h| h.join("Library/Application Support"))
    } else {
        env_dir("XDG_DATA_HOME").or_else(|| env_dir("HOME").map(|h| h.join(".local/share")))
    };
    base.unwrap_or_else(|| PathBuf::from(".")).join("epigimp").join("epigimp.log")
}
