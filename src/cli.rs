use std::path::PathBuf;

use anyhow::bail;
use clap::Args;

use crate::downloader::{self, ytdlp::YtDlp, Downloader, Resolution};

/// Arguments of the `download` subcommand.
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Video URL(s) to download
    #[arg(required = true, value_name = "URL")]
    pub urls: Vec<String>,

    /// Directory to save downloaded files
    #[arg(short, long, default_value = "downloads")]
    pub output_dir: PathBuf,

    /// Video resolution (e.g., 360p, 720p, 1080p, best)
    #[arg(short, long, default_value = "720p")]
    pub resolution: Resolution,

    /// Video container format (e.g., mp4, webm)
    #[arg(short, long, default_value = "mp4")]
    pub format: String,

    /// Extract audio only
    #[arg(short, long)]
    pub audio_only: bool,

    /// Audio format when using --audio-only (e.g., mp3, m4a)
    #[arg(long, default_value = "mp3")]
    pub audio_format: String,
}

/// Runs the download subcommand. Per-item failures are printed, not returned;
/// only a missing extractor or an unusable output directory is an error.
pub async fn run(args: DownloadArgs) -> anyhow::Result<()> {
    let Some(extractor) = YtDlp::locate().await else {
        bail!("yt-dlp is not installed. Please install it (e.g. 'pip install yt-dlp') and make sure it is on PATH");
    };
    let converter = downloader::ytdlp::converter_available().await;
    if !converter {
        tracing::warn!("ffmpeg not found; merging and audio conversion are unavailable");
    }

    let downloader = Downloader::new(&args.output_dir, extractor, converter).await?;
    tracing::debug!("Saving files to {}", downloader.output_dir().display());

    if let [url] = args.urls.as_slice() {
        if args.audio_only {
            downloader.extract_audio(url, &args.audio_format).await;
        } else {
            downloader.download_video(url, args.resolution, &args.format).await;
        }
    } else {
        downloader
            .batch_download(
                &args.urls,
                args.resolution,
                &args.format,
                args.audio_only,
                &args.audio_format,
            )
            .await;
    }
    Ok(())
}
