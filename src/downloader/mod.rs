//! Turns a download request into a fetch plan and runs it through an [`Extractor`],
//! degrading to merge-free selections when the media converter is unavailable.

pub mod selector;
pub mod ytdlp;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use selector::{FormatSelector, Resolution};

/// Bitrate handed to the converter when transcoding extracted audio.
pub const AUDIO_QUALITY: &str = "192K";

#[derive(Debug, Error)]
pub enum ExtractError {
    /// The converter (ffmpeg) was needed for merging or transcoding but is not usable.
    #[error("converter unavailable: {0}")]
    ConverterMissing(String),

    #[error("{0}")]
    Failed(String),

    #[error("failed to run extractor: {0}")]
    Io(#[from] std::io::Error),
}

/// Post-processing step that transcodes the fetched stream to an audio codec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTranscode {
    pub codec: String,
    pub quality: String,
}

/// Everything the extractor needs to fetch one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPlan {
    pub selector: FormatSelector,
    pub output_template: String,
    pub merge_format: Option<String>,
    pub transcode: Option<AudioTranscode>,
}

impl FetchPlan {
    /// Whether this plan depends on the converter at all.
    pub fn needs_converter(&self) -> bool {
        self.transcode.is_some() || !self.selector.is_merge_free()
    }
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn fetch(&self, url: &str, plan: &FetchPlan) -> Result<(), ExtractError>;
}

/// Result of a single video or audio operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Completed with the merge-free fallback plan.
    Degraded,
    Failed(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Outcome::Failed(_))
    }
}

/// What is being fetched, used for console wording.
#[derive(Clone, Copy)]
enum Media {
    Video,
    Audio,
}

pub struct Downloader<E> {
    output_dir: PathBuf,
    extractor: E,
    converter_available: bool,
}

impl<E: Extractor> Downloader<E> {
    /// Creates the downloader, making sure the output directory exists.
    pub async fn new(
        output_dir: impl Into<PathBuf>,
        extractor: E,
        converter_available: bool,
    ) -> std::io::Result<Self> {
        let output_dir = output_dir.into();
        tokio::fs::create_dir_all(&output_dir).await?;
        Ok(Self {
            output_dir,
            extractor,
            converter_available,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn output_template(&self) -> String {
        self.output_dir
            .join("%(title)s.%(ext)s")
            .to_string_lossy()
            .to_string()
    }

    pub async fn download_video(&self, url: &str, resolution: Resolution, container: &str) -> Outcome {
        println!("Downloading video: {}", url);
        println!("Resolution: {}, Format: {}", resolution, container);

        let plan = FetchPlan {
            selector: FormatSelector::video(resolution, container),
            output_template: self.output_template(),
            merge_format: Some(container.to_string()),
            transcode: None,
        };
        let fallback = FetchPlan {
            selector: FormatSelector::video_single(resolution, container),
            output_template: self.output_template(),
            merge_format: None,
            transcode: None,
        };

        self.run_with_fallback(url, plan, fallback, Media::Video).await
    }

    pub async fn extract_audio(&self, url: &str, audio_format: &str) -> Outcome {
        println!("Extracting audio from: {}", url);
        println!("Audio format: {}", audio_format);

        let plan = FetchPlan {
            selector: FormatSelector::audio(),
            output_template: self.output_template(),
            merge_format: None,
            transcode: Some(AudioTranscode {
                codec: audio_format.to_string(),
                quality: AUDIO_QUALITY.to_string(),
            }),
        };
        let fallback = FetchPlan {
            selector: FormatSelector::audio_single(),
            output_template: self.output_template(),
            merge_format: None,
            transcode: None,
        };

        self.run_with_fallback(url, plan, fallback, Media::Audio).await
    }

    /// Processes each URL in order. A failing item never stops the rest.
    pub async fn batch_download(
        &self,
        urls: &[String],
        resolution: Resolution,
        container: &str,
        audio_only: bool,
        audio_format: &str,
    ) -> Vec<Outcome> {
        println!("Batch downloading {} videos", urls.len());

        let mut outcomes = Vec::with_capacity(urls.len());
        for (i, url) in urls.iter().enumerate() {
            println!("\nProcessing video {}/{}", i + 1, urls.len());
            let outcome = if audio_only {
                self.extract_audio(url, audio_format).await
            } else {
                self.download_video(url, resolution, container).await
            };
            outcomes.push(outcome);
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!("Batch finished: {} of {} succeeded", outcomes.len() - failed, outcomes.len());
        outcomes
    }

    async fn run_with_fallback(&self, url: &str, plan: FetchPlan, fallback: FetchPlan, media: Media) -> Outcome {
        if !self.converter_available && plan.needs_converter() {
            print_converter_warning(media);
            return self.run_degraded(url, &fallback, media).await;
        }

        match self.extractor.fetch(url, &plan).await {
            Ok(()) => {
                print_success(media);
                Outcome::Completed
            }
            Err(ExtractError::ConverterMissing(reason)) => {
                tracing::warn!("Converter missing while fetching {}: {}", url, reason);
                print_converter_warning(media);
                self.run_degraded(url, &fallback, media).await
            }
            Err(e) => report_failure(media, e),
        }
    }

    async fn run_degraded(&self, url: &str, fallback: &FetchPlan, media: Media) -> Outcome {
        match self.extractor.fetch(url, fallback).await {
            Ok(()) => {
                match media {
                    Media::Video => println!("Download completed successfully!"),
                    Media::Audio => println!("Audio download completed successfully!"),
                }
                Outcome::Degraded
            }
            Err(e) => {
                let reason = e.to_string();
                match media {
                    Media::Video => println!("Error downloading video: {}", reason),
                    Media::Audio => println!("Error downloading audio: {}", reason),
                }
                Outcome::Failed(reason)
            }
        }
    }
}

fn print_success(media: Media) {
    match media {
        Media::Video => println!("Download completed successfully!"),
        Media::Audio => println!("Audio extraction completed successfully!"),
    }
}

fn print_converter_warning(media: Media) {
    match media {
        Media::Video => println!("Warning: ffmpeg not found. Trying single format download..."),
        Media::Audio => println!(
            "Warning: ffmpeg not found. Trying to download audio without post-processing..."
        ),
    }
}

fn report_failure(media: Media, err: ExtractError) -> Outcome {
    let reason = err.to_string();
    match media {
        Media::Video => println!("Error downloading video: {}", reason),
        Media::Audio => println!("Error extracting audio: {}", reason),
    }
    Outcome::Failed(reason)
}
