//! [`Extractor`] backed by the `yt-dlp` executable, with console progress rendering.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::{wrappers::SplitStream, StreamExt};

use super::{ExtractError, Extractor, FetchPlan};

const PROGRESS_PREFIX: &str = "ytfetch-progress:";

/// Emits one machine-readable line per progress tick (both "downloading" and "finished").
const PROGRESS_TEMPLATE: &str = "download:ytfetch-progress:%(progress.status)s|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s";

static PROGRESS_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^ytfetch-progress:(?P<status>[a-z_]+)\|(?P<percent>[^|]*)\|(?P<speed>[^|]*)\|(?P<eta>.*)$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressStatus {
    Downloading,
    Finished,
    Other,
}

/// A single progress tick reported by yt-dlp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub status: ProgressStatus,
    pub percent: String,
    pub speed: String,
    pub eta: String,
}

pub struct YtDlp {
    program: PathBuf,
}

impl YtDlp {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Locates a working `yt-dlp` on PATH.
    pub async fn locate() -> Option<Self> {
        probe("yt-dlp", "--version").await.then(|| Self::new("yt-dlp"))
    }

    fn command(&self, url: &str, plan: &FetchPlan) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(build_args(url, plan))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

/// Whether the converter (ffmpeg) can be run.
pub async fn converter_available() -> bool {
    probe("ffmpeg", "-version").await
}

async fn probe(program: &str, arg: &str) -> bool {
    match Command::new(program)
        .arg(arg)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
    {
        Ok(status) => status.success(),
        Err(e) => {
            tracing::debug!("Probe of {} failed: {}", program, e);
            false
        }
    }
}

/// The yt-dlp argument vector for one URL.
pub fn build_args(url: &str, plan: &FetchPlan) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--newline".into(),
        "--no-playlist".into(),
        "--progress-template".into(),
        PROGRESS_TEMPLATE.into(),
        "-f".into(),
        plan.selector.to_string(),
        "-o".into(),
        plan.output_template.clone(),
    ];
    if let Some(format) = &plan.merge_format {
        args.extend(["--merge-output-format".into(), format.clone()]);
    }
    if let Some(transcode) = &plan.transcode {
        args.extend([
            "--extract-audio".into(),
            "--audio-format".into(),
            transcode.codec.clone(),
            "--audio-quality".into(),
            transcode.quality.clone(),
        ]);
    }
    args.extend(["--".into(), url.to_string()]);
    args
}

pub fn parse_progress(line: &str) -> Option<ProgressUpdate> {
    if !line.starts_with(PROGRESS_PREFIX) {
        return None;
    }
    let caps = PROGRESS_REGEX.captures(line.trim_end())?;
    let field = |name: &str| caps.name(name).map_or_else(String::new, |m| m.as_str().trim().to_string());
    let status = match &caps["status"] {
        "downloading" => ProgressStatus::Downloading,
        "finished" => ProgressStatus::Finished,
        _ => ProgressStatus::Other,
    };
    Some(ProgressUpdate {
        status,
        percent: field("percent"),
        speed: field("speed"),
        eta: field("eta"),
    })
}

fn render_progress(update: &ProgressUpdate) {
    match update.status {
        ProgressStatus::Downloading => {
            print!(
                "\rDownloading... {} at {} ETA: {}",
                or_na(&update.percent),
                or_na(&update.speed),
                or_na(&update.eta)
            );
            let _ = std::io::stdout().flush();
        }
        ProgressStatus::Finished => println!("\nDownload finished, now converting..."),
        ProgressStatus::Other => {}
    }
}

fn or_na(value: &str) -> &str {
    if value.is_empty() || value == "NA" {
        "N/A"
    } else {
        value
    }
}

/// Maps a failed run's stderr onto an [`ExtractError`].
pub fn classify_failure(stderr: &str) -> ExtractError {
    let message = stderr
        .lines()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .unwrap_or_else(|| stderr.trim())
        .to_string();
    if message.to_lowercase().contains("ffmpeg") {
        ExtractError::ConverterMissing(message)
    } else {
        ExtractError::Failed(message)
    }
}

#[async_trait]
impl Extractor for YtDlp {
    async fn fetch(&self, url: &str, plan: &FetchPlan) -> Result<(), ExtractError> {
        tracing::debug!("Running {} -f {} for {}", self.program.display(), plan.selector, url);
        let mut child = self.command(url, plan).spawn()?;

        // Drained concurrently so a chatty stderr cannot block the child.
        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = stderr.read_to_string(&mut buf).await;
                buf
            })
        });

        // Raw byte lines: titles are not always valid UTF-8, and the pipe must
        // stay open until yt-dlp is done writing.
        if let Some(stdout) = child.stdout.take() {
            let mut lines = SplitStream::new(BufReader::new(stdout).split(b'\n'));
            while let Some(next) = lines.next().await {
                let raw = match next {
                    Ok(raw) => raw,
                    Err(e) => {
                        tracing::warn!("Failed reading yt-dlp output: {}", e);
                        break;
                    }
                };
                let line = String::from_utf8_lossy(&raw);
                let line = line.trim_end_matches('\r');
                match parse_progress(line) {
                    Some(update) => render_progress(&update),
                    None => tracing::trace!("yt-dlp: {}", line),
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if status.success() {
            Ok(())
        } else {
            tracing::debug!("yt-dlp exited with {}: {}", status, stderr.trim());
            Err(classify_failure(&stderr))
        }
    }
}
