//! CLI entry point for fast-media-loader.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fast_media_loader::download::download_progress_bar;
use fast_media_loader::frames::DEFAULT_FRAME_RATE;
use fast_media_loader::{FetchKind, MediaLoader, RetryPolicy, detect_media_kind};
use tracing::{debug, info, warn};

mod app_config;
mod cli;

use app_config::{MediaType, load_default_file_config};
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    debug!(?args, "CLI arguments parsed");

    let (config_path, file_config) =
        load_default_file_config().context("Failed to load configuration file")?;
    if let Some(path) = &config_path {
        debug!(path = %path.display(), config = ?file_config, "configuration resolved");
    }

    // CLI flag > config file > built-in default
    let media_type = args
        .media_type
        .map(MediaType::from)
        .or(file_config.media_type)
        .unwrap_or_default();
    let batch_size = args.batch_size.map(usize::from).or(file_config.batch_size);
    let frame_rate = args
        .frame_rate
        .or(file_config.frame_rate)
        .unwrap_or(DEFAULT_FRAME_RATE);
    let extract_frames = args.extract_frames || file_config.extract_frames.unwrap_or(false);

    let kind = match media_type.fixed_kind() {
        Some(kind) => kind,
        None => detect_media_kind(&args.urls).unwrap_or_else(|| {
            warn!(
                url = %args.urls.first().map_or("", String::as_str),
                "could not determine media type from URL; defaulting to photo"
            );
            FetchKind::Photo
        }),
    };

    info!(
        kind = %kind,
        media_type = media_type.as_str(),
        urls = args.urls.len(),
        data_folder = %args.data_folder.display(),
        "fast-media-loader starting"
    );

    let retry_policy = file_config.apply_to_policy(RetryPolicy::default());
    let progress = download_progress_bar(kind);
    if args.quiet {
        progress.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let mut loader = MediaLoader::new()
        .with_retry_policy(retry_policy)
        .with_progress(Arc::new(progress));
    if let Some(batch_size) = batch_size {
        loader = loader.with_batch_size(batch_size);
    }

    match kind {
        FetchKind::Photo => {
            if extract_frames {
                warn!("--extract_frames only applies to videos; ignoring");
            }
            let paths = kind.destination_paths(&args.data_folder, args.urls.len());
            let stats = loader
                .load_photos(&args.urls, &paths, &args.data_folder)
                .await?;
            info!(
                completed = stats.completed(),
                failed = stats.failed(),
                retried = stats.retried(),
                total = stats.total(),
                "Download complete"
            );
        }
        FetchKind::Video => {
            let frames = loader
                .load_videos_and_extract_frames(
                    &args.urls,
                    &args.data_folder,
                    frame_rate,
                    extract_frames,
                )
                .await?;
            match frames {
                Some(frames) => info!(frames = frames.len(), "Download and frame extraction complete"),
                None => info!("Download complete"),
            }
        }
    }

    Ok(())
}
