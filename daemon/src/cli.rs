use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "vidpaper")]
#[command(about = "Play a looping video as the desktop background on every display", long_about = None)]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// Path to the video file
    #[arg(long, value_name = "PATH", allow_hyphen_values = true)]
    pub video: String,
}

impl Cli {
    /// Parse argv of exactly `<program> --video <path>`; anything else is `None`
    pub fn parse_strict<I, T>(args: I) -> Option<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        if args.len() != 3 || args[1] != "--video" {
            return None;
        }
        Self::try_parse_from(args).ok()
    }

    pub fn usage() -> String {
        Self::command().render_usage().to_string()
    }
}

/// Expand `~`, make the path absolute and require an existing regular file
pub fn resolve_video_path(raw: &str) -> Result<PathBuf> {
    resolve_with_home(raw, || {
        dirs::home_dir().map(|home| home.to_string_lossy().into_owned())
    })
}

fn resolve_with_home<F>(raw: &str, home: F) -> Result<PathBuf>
where
    F: FnOnce() -> Option<String>,
{
    let expanded = shellexpand::tilde_with_context(raw, home);
    let path = Path::new(expanded.as_ref());

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to read current directory")?
            .join(path)
    };

    let resolved = std::fs::canonicalize(&absolute)
        .with_context(|| format!("video file not found: {}", absolute.display()))?;

    if !resolved.is_file() {
        anyhow::bail!("not a regular file: {}", resolved.display());
    }

    Ok(resolved)
}
