//! Changelogs - print the releases of a markdown changelog that match a
//! semver range.
//!
//! # Usage
//!
//! ```bash
//! changelogs CHANGELOG.md --filter '>=1.3.0'
//! changelogs node_modules/left-pad --toc
//! cat HISTORY.md | changelogs --versions --format json
//! changelogs --watch CHANGELOG.md --filter '^2'
//! ```

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;

use changelogs::config::{
    ConfigFlags, clear_config_flags, global_config_path, load_config_flags, local_override_path,
    save_config_flags,
};
use changelogs::output::{self, OutputFormat, RenderOptions, View};
use changelogs::perf;
use changelogs::pipeline::{self, FilterStatus, Loaded, Worker};
use changelogs::resolve::resolve_path;
use changelogs::watcher::{ChangelogWatcher, DEFAULT_DEBOUNCE};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Print the releases of a markdown changelog that match a semver range
#[derive(Parser, Debug)]
#[command(name = "changelogs", version, about, long_about = None)]
struct Cli {
    /// Changelog file or package directory; `-` or nothing reads stdin
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// npm-style semver range, e.g. ">=1.2.0 <2" or "^1 || ^2"
    #[arg(short, long, value_name = "RANGE", default_value = "")]
    filter: String,

    /// Print a table of contents instead of the changelog
    #[arg(long, conflicts_with = "versions")]
    toc: bool,

    /// Print only the matching version numbers
    #[arg(long)]
    versions: bool,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Include the text before the first version heading
    #[arg(long)]
    preamble: bool,

    /// Watch the file for changes and print again on every save
    #[arg(short, long)]
    watch: bool,

    /// Print stage timings to stderr
    #[arg(long)]
    perf: bool,

    /// Write detailed debug events to a file
    #[arg(long, value_name = "PATH")]
    debug_log: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

impl Cli {
    /// The saveable flags as clap parsed them, short and combined forms included.
    fn flags(&self) -> ConfigFlags {
        ConfigFlags {
            watch: self.watch,
            toc: self.toc,
            versions: self.versions,
            preamble: self.preamble,
            perf: self.perf,
            format: self.format,
            debug_log: self.debug_log.clone(),
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = cli.flags();

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf);
    let debug_log_path = effective
        .debug_log
        .clone()
        .or_else(|| std::env::var_os("CHANGELOGS_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(debug_log_path.as_deref()) {
        tracing::warn!(
            path = %debug_log_path
                .as_ref()
                .map_or_else(|| "<unset>".to_string(), |p| p.display().to_string()),
            %err,
            "failed to initialize debug log"
        );
    }

    let options = render_options(&effective);
    let input = match cli.path.as_deref() {
        None => None,
        Some(p) if p == Path::new("-") => None,
        Some(p) => Some(resolve_path(p)?),
    };

    if effective.watch {
        let path = input.context("--watch needs a changelog file, not stdin")?;
        return watch(&path, &cli.filter, options);
    }

    let source = match &input {
        Some(path) => read_changelog(path)?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read changelog from stdin")?;
            buf
        }
    };
    let loaded = pipeline::load(&source, &cli.filter);
    report_filter(&loaded);
    emit(&output::render(&loaded, options)?)
}

fn render_options(flags: &ConfigFlags) -> RenderOptions {
    let view = if flags.toc {
        View::Toc
    } else if flags.versions {
        View::Versions
    } else {
        View::Segments
    };
    RenderOptions {
        view,
        format: flags.format.unwrap_or_default(),
        preamble: flags.preamble,
    }
}

fn read_changelog(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn report_filter(loaded: &Loaded) {
    if let FilterStatus::Invalid { expr, reason } = &loaded.filter {
        tracing::warn!(%expr, %reason, "invalid version range; showing every release");
    }
}

fn emit(text: &str) -> Result<()> {
    let mut out = io::stdout().lock();
    match out.write_all(text.as_bytes()).and_then(|()| out.flush()) {
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other.context("Failed to write to stdout"),
    }
}

fn watch(path: &Path, filter: &str, options: RenderOptions) -> Result<()> {
    let mut watcher = ChangelogWatcher::new(path, DEFAULT_DEBOUNCE)?;
    let mut worker = Worker::spawn().context("Failed to start changelog loader")?;
    worker.submit(read_changelog(path)?, filter);

    let mut printed_once = false;
    loop {
        if let Some(response) = worker.recv_latest(POLL_INTERVAL) {
            report_filter(&response.loaded);
            let rendered = output::render(&response.loaded, options)?;
            if printed_once {
                emit("\n")?;
            }
            emit(&rendered)?;
            printed_once = true;
            perf::log_event("watch.render", format!("id={}", response.id));
        }
        if watcher.poll_changed() {
            match read_changelog(watcher.path()) {
                Ok(source) => {
                    let id = worker.submit(source, filter);
                    tracing::debug!(%id, "changelog changed; reloading");
                }
                // Mid-save the file can briefly vanish; the next event retries.
                Err(err) => tracing::warn!("{err:#}"),
            }
        }
    }
}
