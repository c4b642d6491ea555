use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt};

#[macro_export]
macro_rules! dlog {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*);
    };
}

/// Initialize colorful logging.
///
/// Default level is INFO.
/// - `-v` => DEBUG
/// - `-vv` => TRACE
/// - `-q` => WARN
/// - `-qq` => ERROR
///
/// `RUST_LOG` overrides everything (e.g. `RUST_LOG=trace`).
pub fn init_logging(verbose: u8, quiet: u8) {
    let net = i16::from(verbose) - i16::from(quiet);
    let level = match net {
        i16::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        2..=i16::MAX => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,trkpt_import={level}")));

    let show_src = matches!(level, "debug" | "trace");

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_target(true)
        .with_level(true)
        .with_file(show_src)
        .with_line_number(show_src)
        .compact()
        .init();
}

/// Expands every pattern and returns the matching regular files.
///
/// Each file appears once, in pattern order and sorted within a pattern.
/// A pattern that matches no file is an error. A leading `~` is expanded
/// to `$HOME`, since quoted patterns never reach the shell's expansion.
pub fn glob_many_files<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<PathBuf>> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for pattern in patterns {
        let pattern = expand_home(pattern.as_ref(), home.as_deref());
        let pattern = pattern.as_str();
        let entries =
            glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

        let mut matched = 0usize;
        for entry in entries {
            let path = entry.with_context(|| format!("reading matches of {pattern}"))?;
            if !path.is_file() {
                dlog!("glob_skip_non_file path={}", path.display());
                continue;
            }
            matched += 1;
            if seen.insert(path.clone()) {
                out.push(path);
            }
        }

        if matched == 0 {
            bail!("No files match pattern: {pattern}");
        }
        dlog!("glob pattern={pattern} matched={matched}");
    }

    Ok(out)
}

fn expand_home(pattern: &str, home: Option<&Path>) -> String {
    let Some(home) = home else {
        return pattern.to_string();
    };
    match pattern.strip_prefix('~') {
        Some("") => home.display().to_string(),
        Some(rest) if rest.starts_with('/') => format!("{}{rest}", home.display()),
        _ => pattern.to_string(),
    }
}
