//! Saved default flags.
//!
//! Config files hold CLI flag tokens, one or more per line, with `#`
//! comments. The global file and a local `.changelogsrc` are merged with
//! the actual command line as `global ∪ local ∪ cli`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::output::OutputFormat;

const APP_DIR: &str = "changelogs";
const LOCAL_FILE: &str = ".changelogsrc";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub toc: bool,
    pub versions: bool,
    pub preamble: bool,
    pub perf: bool,
    pub format: Option<OutputFormat>,
    pub debug_log: Option<PathBuf>,
}

impl ConfigFlags {
    /// Booleans are OR-ed; options from `other` win.
    ///
    /// `toc` and `versions` pick one view, so a view chosen by `other`
    /// replaces the one chosen by `self`.
    pub fn union(&self, other: &Self) -> Self {
        let view = if other.has_view() { other } else { self };
        Self {
            watch: self.watch || other.watch,
            toc: view.toc,
            versions: view.versions,
            preamble: self.preamble || other.preamble,
            perf: self.perf || other.perf,
            format: other.format.or(self.format),
            debug_log: other.debug_log.clone().or_else(|| self.debug_log.clone()),
        }
    }

    const fn has_view(&self) -> bool {
        self.toc || self.versions
    }

    fn to_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for (on, flag) in [
            (self.watch, "--watch"),
            (self.toc, "--toc"),
            (self.versions, "--versions"),
            (self.preamble, "--preamble"),
            (self.perf, "--perf"),
        ] {
            if on {
                lines.push(flag.to_string());
            }
        }
        if let Some(format) = self.format {
            lines.push(format!("--format {}", format_name(format)));
        }
        if let Some(path) = &self.debug_log {
            lines.push(format!("--debug-log {}", path.display()));
        }
        lines
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join(APP_DIR).join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join(APP_DIR)
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join(APP_DIR).join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(".config").join(APP_DIR).join("config");
        }
    }

    PathBuf::from(LOCAL_FILE)
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(LOCAL_FILE)
}

/// Read flags from `path`; a missing file yields defaults.
///
/// # Errors
/// Returns an error if the file exists but cannot be read.
pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    let flags = parse_flag_tokens(&tokens);
    tracing::debug!(path = %path.display(), ?flags, "loaded config");
    Ok(flags)
}

/// # Errors
/// Returns an error if the config directory or file cannot be written.
pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# changelogs defaults (saved with --save)".to_string()];
    lines.extend(flags.to_lines());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

/// # Errors
/// Returns an error if an existing config file cannot be removed.
pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick the known flags out of a token list. Unknown tokens are ignored.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        match token {
            "--watch" | "-w" => flags.watch = true,
            "--toc" => flags.toc = true,
            "--versions" => flags.versions = true,
            "--preamble" => flags.preamble = true,
            "--perf" => flags.perf = true,
            "--format" => {
                if let Some(next) = tokens.get(i + 1) {
                    flags.format = parse_format(next);
                    i += 1;
                }
            }
            "--debug-log" => {
                if let Some(next) = tokens.get(i + 1) {
                    flags.debug_log = Some(PathBuf::from(next));
                    i += 1;
                }
            }
            _ => {
                if let Some(value) = token.strip_prefix("--format=") {
                    flags.format = parse_format(value);
                } else if let Some(value) = token.strip_prefix("--debug-log=") {
                    flags.debug_log = Some(PathBuf::from(value));
                }
            }
        }
        i += 1;
    }
    flags
}

fn parse_format(s: &str) -> Option<OutputFormat> {
    match s {
        "text" => Some(OutputFormat::Text),
        "json" => Some(OutputFormat::Json),
        _ => None,
    }
}

const fn format_name(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Text => "text",
        OutputFormat::Json => "json",
    }
}
