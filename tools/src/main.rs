use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use glob::Pattern;
use rewind_tools::{collect_events, diagnostic_config, format_summary_pretty, summarize};
use wire::{EngineNetworkVersion, NetworkVersion, ReplayHeaderFlags, ReplayVersions};

#[derive(Parser)]
#[command(
    name = "rewind-tools",
    version,
    about = "rewind replay inspection tools"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Summarize guids, export groups and decode counters.
    Summary {
        /// Path to a decompressed replay data chunk, or a directory of them.
        data_path: PathBuf,
        #[command(flatten)]
        versions: VersionArgs,
        /// Optional glob filter when summarizing a directory.
        #[arg(long)]
        glob: Option<String>,
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },
    /// Print decode events in stream order as JSON.
    Events {
        /// Path to a decompressed replay data chunk.
        data_file: PathBuf,
        #[command(flatten)]
        versions: VersionArgs,
        /// Stop after this many events.
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Protocol versions from the replay container header.
#[derive(Args)]
struct VersionArgs {
    /// Replay network version.
    #[arg(long, default_value_t = NetworkVersion::LATEST.raw())]
    network_version: u32,
    /// Engine network version.
    #[arg(long, default_value_t = EngineNetworkVersion::LATEST.raw())]
    engine_version: u32,
    /// Replay header flags.
    #[arg(long, default_value_t = ReplayHeaderFlags::HAS_STREAMING_FIXES)]
    header_flags: u32,
}

impl VersionArgs {
    fn versions(&self) -> ReplayVersions {
        ReplayVersions::new(
            NetworkVersion::new(self.network_version),
            EngineNetworkVersion::new(self.engine_version),
            ReplayHeaderFlags::from_raw(self.header_flags),
        )
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Summary {
            data_path,
            versions,
            glob,
            format,
        } => {
            let versions = versions.versions();
            let paths = if data_path.is_dir() {
                collect_data_files(&data_path, glob.as_deref())?
            } else {
                vec![data_path]
            };
            let many = paths.len() > 1;
            for path in paths {
                let bytes =
                    fs::read(&path).with_context(|| format!("read replay data {}", path.display()))?;
                let summary = summarize(&bytes, diagnostic_config(versions))
                    .with_context(|| format!("decode {}", path.display()))?;
                if many {
                    println!("== {} ({} bytes) ==", path.display(), bytes.len());
                }
                match format {
                    OutputFormat::Json => {
                        let json =
                            serde_json::to_string_pretty(&summary).context("serialize json")?;
                        println!("{json}");
                    }
                    OutputFormat::Pretty => print!("{}", format_summary_pretty(&summary)),
                }
            }
        }
        Command::Events {
            data_file,
            versions,
            limit,
        } => {
            let bytes = fs::read(&data_file)
                .with_context(|| format!("read replay data {}", data_file.display()))?;
            let (events, summary) =
                collect_events(&bytes, diagnostic_config(versions.versions()), limit)
                    .with_context(|| format!("decode {}", data_file.display()))?;
            for event in &events {
                println!("{}", serde_json::to_string(event).context("serialize json")?);
            }
            log::info!(
                "{} events from {} frames",
                events.len(),
                summary.stats.frames
            );
        }
    }
    Ok(())
}

fn collect_data_files(dir: &Path, glob: Option<&str>) -> Result<Vec<PathBuf>> {
    let pattern = glob
        .map(|value| Pattern::new(value).context("invalid glob pattern"))
        .transpose()?;

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Some(pattern) = &pattern {
            let matches_path = pattern.matches_path(&path);
            let matches_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| pattern.matches(name));
            if !matches_path && !matches_name {
                continue;
            }
        }
        paths.push(path);
    }
    paths.sort();
    Ok(paths)
}
