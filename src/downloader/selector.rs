use std::fmt;
use std::str::FromStr;

/// Audio container requested when a video stream gets merged with a separate audio stream.
const MERGE_AUDIO_EXT: &str = "m4a";

/// Requested video resolution, either "best" or a maximum height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Best,
    MaxHeight(u32),
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().to_ascii_lowercase();
        if value == "best" {
            return Ok(Resolution::Best);
        }
        // "720p", "720" and "720pp" all mean a 720 pixel ceiling.
        value
            .trim_end_matches('p')
            .parse::<u32>()
            .map(Resolution::MaxHeight)
            .map_err(|_| format!("invalid resolution '{}': expected e.g. 360p, 720p, 1080p or best", s))
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Best => f.write_str("best"),
            Resolution::MaxHeight(h) => write!(f, "{}p", h),
        }
    }
}

/// An ordered list of yt-dlp format tiers; yt-dlp picks the first one it can satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelector {
    tiers: Vec<String>,
}

impl FormatSelector {
    /// Merged video+audio first, then single-file streams in the container.
    pub fn video(resolution: Resolution, container: &str) -> Self {
        let tiers = match resolution {
            Resolution::Best => vec![
                format!("bestvideo[ext={container}]+bestaudio[ext={MERGE_AUDIO_EXT}]"),
                format!("best[ext={container}]"),
            ],
            Resolution::MaxHeight(h) => vec![
                format!("bestvideo[height<={h}][ext={container}]+bestaudio[ext={MERGE_AUDIO_EXT}]"),
                format!("best[height<={h}][ext={container}]"),
                format!("best[ext={container}]"),
            ],
        };
        Self { tiers }
    }

    /// A single pre-merged stream; usable without the converter.
    pub fn video_single(resolution: Resolution, container: &str) -> Self {
        let tier = match resolution {
            Resolution::Best => format!("best[ext={container}]"),
            Resolution::MaxHeight(h) => format!("best[height<={h}][ext={container}]"),
        };
        Self { tiers: vec![tier] }
    }

    pub fn audio() -> Self {
        Self {
            tiers: vec!["bestaudio".to_string(), "best".to_string()],
        }
    }

    /// Raw best audio, preferring m4a since it needs no transcoding to play.
    pub fn audio_single() -> Self {
        Self {
            tiers: vec![
                format!("bestaudio[ext={MERGE_AUDIO_EXT}]"),
                "bestaudio".to_string(),
                "best".to_string(),
            ],
        }
    }

    /// True when no tier asks yt-dlp to merge separate streams.
    pub fn is_merge_free(&self) -> bool {
        self.tiers.iter().all(|t| !t.contains('+'))
    }
}

impl fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tiers.join("/"))
    }
}
