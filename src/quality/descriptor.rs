//! Quality descriptors parsed from release file names.
//!
//! Parsing is kept separate from ranking: [`ArtifactDescriptor::parse`] only
//! reads tags out of a name, and [`super::policy::decide`] compares the
//! resulting descriptors.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static RESOLUTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(2160p|4k|1080p|720p)\b").expect("resolution regex is valid")
});

#[allow(clippy::expect_used)]
static EFFICIENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(x265|hevc|h\.?265)\b").expect("codec regex is valid")
});

#[allow(clippy::expect_used)]
static THEATRICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(blu-?ray|bdrip|brrip)\b").expect("disc source regex is valid")
});

#[allow(clippy::expect_used)]
static WEB_CAPTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(web-?rip|web-?dl)\b").expect("web source regex is valid")
});

// Everything up to and including "(1999)".
#[allow(clippy::expect_used)]
static YEAR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?\(\d{4}\))").expect("year prefix regex is valid"));

/// Resolution tier, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Resolution {
    /// No recognizable resolution tag.
    #[default]
    Unknown,
    /// 720p.
    P720,
    /// 1080p.
    P1080,
    /// 2160p / 4K.
    P2160,
}

impl Resolution {
    fn from_tag(tag: &str) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "2160p" | "4k" => Self::P2160,
            "1080p" => Self::P1080,
            "720p" => Self::P720,
            _ => Self::Unknown,
        }
    }

    /// Directory-friendly label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "none",
            Self::P720 => "720p",
            Self::P1080 => "1080p",
            Self::P2160 => "2160p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Release source, ordered from least to most trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ReleaseSource {
    /// No source tag.
    #[default]
    Unknown,
    /// Web capture (WEBRip, WEB-DL).
    WebCapture,
    /// Disc source (BluRay, BDRip, BRRip).
    Theatrical,
}

/// Resolution plus the efficient-encoding modifier; names the storage bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct QualityTier {
    /// Resolution.
    pub resolution: Resolution,
    /// High-efficiency codec (x265/HEVC).
    pub efficient: bool,
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.efficient {
            write!(f, "{}.x265", self.resolution)
        } else {
            write!(f, "{}", self.resolution)
        }
    }
}

/// Everything the replacement policy needs to know about one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    /// Normalized title used to match re-releases.
    pub title: String,
    /// Storage bucket.
    pub tier: QualityTier,
    /// Release source.
    pub source: ReleaseSource,
    /// File name the descriptor was parsed from.
    pub file_name: String,
}

impl ArtifactDescriptor {
    /// Parses a descriptor from a release file name.
    ///
    /// ```
    /// use mediacrawl_core::quality::{ArtifactDescriptor, ReleaseSource, Resolution};
    ///
    /// let d = ArtifactDescriptor::parse("Big Movie (2021) [1080p] [x265] [BluRay] [YTS.MX].torrent");
    /// assert_eq!(d.title, "big movie (2021)");
    /// assert_eq!(d.tier.resolution, Resolution::P1080);
    /// assert!(d.tier.efficient);
    /// assert_eq!(d.source, ReleaseSource::Theatrical);
    /// assert_eq!(d.tier.to_string(), "1080p.x265");
    /// ```
    #[must_use]
    pub fn parse(file_name: &str) -> Self {
        let resolution = RESOLUTION
            .captures(file_name)
            .and_then(|c| c.get(1))
            .map_or(Resolution::Unknown, |m| Resolution::from_tag(m.as_str()));

        let source = if THEATRICAL.is_match(file_name) {
            ReleaseSource::Theatrical
        } else if WEB_CAPTURE.is_match(file_name) {
            ReleaseSource::WebCapture
        } else {
            ReleaseSource::Unknown
        };

        Self {
            title: normalize_title(file_name),
            tier: QualityTier {
                resolution,
                efficient: EFFICIENT.is_match(file_name),
            },
            source,
            file_name: file_name.to_string(),
        }
    }
}

/// Reduces a release name to the part shared by all its re-releases.
///
/// Everything after a parenthesized year is dropped. Names without a year
/// lose their extension, bracketed tags and anything from the first
/// resolution tag on.
#[must_use]
pub fn normalize_title(file_name: &str) -> String {
    let base = if let Some(m) = YEAR_PREFIX.captures(file_name).and_then(|c| c.get(1)) {
        m.as_str().to_string()
    } else {
        let mut stem = strip_extension(file_name);
        if let Some(idx) = stem.find('[') {
            stem = &stem[..idx];
        }
        if let Some(m) = RESOLUTION.find(stem) {
            stem = &stem[..m.start()];
        }
        stem.replace(['.', '_'], " ")
    };

    base.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && (1..=5).contains(&ext.len())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
                && !RESOLUTION.is_match(ext)
                && !EFFICIENT.is_match(ext) =>
        {
            stem
        }
        _ => name,
    }
}
