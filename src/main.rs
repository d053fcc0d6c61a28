mod core;
mod plugins;
mod settings;

use crate::core::engine::{Engine, JobHandle};
use crate::core::error::JobError;
use crate::core::events::JobEvent;
use crate::core::model::{CanonicalEvent, JobRequest, JobStatus, ProgressStatus, QualityTier};
use crate::plugins::registry::PluginRegistry;
use crate::settings::Settings;
use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const UI_TICK: Duration = Duration::from_millis(100);

fn build_cli(registry: &PluginRegistry) -> Command {
    let download = Command::new("download")
        .about("Download one or more media URLs, one job after another")
        .arg(
            Arg::new("urls")
                .help("Video or playlist URLs")
                .action(ArgAction::Append)
                .num_args(1..)
                .required(true),
        )
        .arg(
            Arg::new("out_dir")
                .long("out-dir")
                .help("Destination folder (default: settings, then ./downloads)")
                .num_args(1),
        )
        .arg(
            Arg::new("quality")
                .long("quality")
                .help("Audio quality tier")
                .value_parser(["best", "semi", "worst"])
                .num_args(1),
        )
        .arg(
            Arg::new("playlist")
                .long("playlist")
                .help("Treat the URL as a playlist")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("video")
                .long("video")
                .help("Keep video (mp4) instead of extracting audio")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print one JSON event per line instead of progress bars")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log_level")
                .long("log-level")
                .help("Log filter when RUST_LOG is unset (default: warn)")
                .num_args(1),
        );

    let download = registry.augment_download_command(download);

    Command::new("tune-downloader")
        .about("Audio/video downloader with unified progress reporting")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(download)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    let registry = PluginRegistry::with_defaults();
    let app = build_cli(&registry);
    let matches = app.get_matches();

    let Some(("download", m)) = matches.subcommand() else {
        return Ok(());
    };

    let level = m
        .get_one::<String>("log_level")
        .or(settings.log_level.as_ref())
        .map(String::as_str)
        .unwrap_or("warn");
    init_tracing(level);

    let out_dir: PathBuf = m
        .get_one::<String>("out_dir")
        .or(settings.out_dir.as_ref())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./downloads"));
    tokio::fs::create_dir_all(&out_dir)
        .await
        .with_context(|| format!("create {}", out_dir.display()))?;

    let quality = match m.get_one::<String>("quality").or(settings.quality.as_ref()) {
        Some(q) => QualityTier::parse(q).with_context(|| format!("unknown quality tier {q:?}"))?,
        None => QualityTier::default(),
    };

    let mut cfg = settings.download_config();
    registry.apply_download_matches(m, &mut cfg)?;
    let engine = Engine::new(registry, cfg.engine_ctx);

    let closer = engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted: finishing the current job, skipping the rest");
            closer.close();
        }
    });

    let json = m.get_flag("json");
    let urls: Vec<String> = m
        .get_many::<String>("urls")
        .map(|v| v.cloned().collect())
        .unwrap_or_default();

    let mut summary: Vec<(String, Option<JobStatus>)> = Vec::new();
    for url in urls {
        let req = JobRequest {
            source_url: url.clone(),
            destination: out_dir.clone(),
            quality,
            is_playlist: m.get_flag("playlist"),
            want_video: m.get_flag("video"),
        };
        let handle = match engine.start_job(req).await {
            Ok(h) => h,
            Err(JobError::EngineClosed) => break,
            Err(e) => {
                eprintln!("Error: {url}: {e}");
                summary.push((url, None));
                continue;
            }
        };
        let job_id = handle.id();
        if json {
            print_json(handle).await?;
        } else {
            show_bar(handle).await;
        }
        summary.push((url, engine.job_status(job_id).await));
    }

    if !json && summary.len() > 1 {
        eprintln!("Summary:");
        for (url, status) in &summary {
            eprintln!("- {} {}", status_label(*status), url);
        }
    }
    let failed = summary
        .iter()
        .filter(|(_, s)| *s != Some(JobStatus::Completed))
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} job(s) failed");
    }
    Ok(())
}

async fn show_bar(mut handle: JobHandle) {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>3}% {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);

    while let Some(ev) = handle.recv_coalesced().await {
        match ev {
            JobEvent::Progress(e) => {
                pb.set_position(bar_position(&e));
                pb.set_message(describe(&e));
                tokio::time::sleep(UI_TICK).await;
            }
            JobEvent::Succeeded { title } => {
                pb.set_position(100);
                pb.finish_with_message(format!("{title} - Download Done!"));
            }
            JobEvent::Failed { message } => {
                pb.abandon_with_message(format!("Error: {message}"));
            }
        }
    }
    handle.join().await;
}

async fn print_json(mut handle: JobHandle) -> anyhow::Result<()> {
    let job = handle.id();
    while let Some(ev) = handle.recv().await {
        let line = serde_json::to_string(&serde_json::json!({ "job": job, "event": ev }))?;
        println!("{line}");
    }
    handle.join().await;
    Ok(())
}

fn status_label(status: Option<JobStatus>) -> &'static str {
    match status {
        Some(JobStatus::Completed) => "done",
        Some(JobStatus::Failed) => "failed",
        Some(JobStatus::Pending | JobStatus::Running) => "unfinished",
        None => "rejected",
    }
}

fn bar_position(e: &CanonicalEvent) -> u64 {
    e.overall_percent.or(e.file_percent).unwrap_or(0) as u64
}

fn describe(e: &CanonicalEvent) -> String {
    let verb = match e.status {
        ProgressStatus::Preparing => "Preparing",
        ProgressStatus::Downloading | ProgressStatus::DestinationChosen => "Downloading",
        ProgressStatus::Postprocessing => "Converting",
        ProgressStatus::Finished => "Downloaded",
    };
    let mut msg = verb.to_string();
    if let (Some(i), Some(n)) = (e.item_index, e.item_total) {
        msg.push_str(&format!(" {i}/{n}"));
    }
    if !e.title.is_empty() {
        msg.push_str(&format!(" - {}", e.title));
    }
    if let Some(p) = e.file_percent {
        msg.push_str(&format!(" ({p}%)"));
    }
    msg
}
