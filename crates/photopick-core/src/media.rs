//! Media item references returned by a picker session.
//!
//! A [`MediaItem`] is a pointer to a user-selected photo or video. Its
//! `base_url` is only valid for 60 minutes after it was issued and must never
//! be treated as a stable identifier or written to disk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How long a base URL stays usable after the listing call that issued it.
pub const BASE_URL_VALIDITY_MINUTES: i64 = 60;

/// The kind of media a picked item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A still image.
    Photo,
    /// A video clip.
    Video,
    /// The API did not say.
    #[default]
    Unspecified,
}

impl MediaKind {
    /// Maps the API's `type` field (`PHOTO`, `VIDEO`, ...) to a kind.
    pub fn from_api(value: &str) -> Self {
        match value {
            "PHOTO" => Self::Photo,
            "VIDEO" => Self::Video,
            _ => Self::Unspecified,
        }
    }

    /// Returns a short lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Unspecified => "media",
        }
    }
}

/// A reference to one item the user selected in the picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    /// Stable identifier of the picked item.
    pub id: String,
    /// Time-limited URL to the item bytes.
    pub base_url: String,
    /// MIME type of the underlying file.
    pub mime_type: String,
    /// Original filename, if the API reported one.
    pub filename: Option<String>,
    /// Pixel width, if known.
    pub width: Option<u32>,
    /// Pixel height, if known.
    pub height: Option<u32>,
    /// When the photo or video was taken.
    pub create_time: Option<DateTime<Utc>>,
    /// Photo or video.
    #[serde(default)]
    pub kind: MediaKind,
}

impl MediaItem {
    /// Creates a media item with the required fields only.
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            mime_type: mime_type.into(),
            filename: None,
            width: None,
            height: None,
            create_time: None,
            kind: MediaKind::Unspecified,
        }
    }

    /// Builder: set the filename.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Builder: set pixel dimensions.
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Builder: set the creation time.
    pub fn with_create_time(mut self, create_time: DateTime<Utc>) -> Self {
        self.create_time = Some(create_time);
        self
    }

    /// Builder: set the media kind.
    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns the filename, falling back to the item id.
    pub fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or(&self.id)
    }

    /// Returns `(width, height)` when both are known.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    /// Returns true if the item is a video.
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video || self.mime_type.starts_with("video/")
    }

    /// URL for a rendition bounded by the given size, preserving aspect ratio.
    pub fn sized_url(&self, max_width: u32, max_height: u32) -> String {
        format!("{}=w{}-h{}", self.base_url, max_width, max_height)
    }

    /// URL for the original bytes (`=d`, or `=dv` for video).
    pub fn download_url(&self) -> String {
        if self.is_video() {
            format!("{}=dv", self.base_url)
        } else {
            format!("{}=d", self.base_url)
        }
    }
}
