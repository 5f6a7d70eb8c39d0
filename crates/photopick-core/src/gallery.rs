//! Gallery rendering for picked media items.
//!
//! Rendering is pure: it takes the items fetched for the current view and
//! produces text. Nothing here fetches, caches, or persists base URLs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::media::{BASE_URL_VALIDITY_MINUTES, MediaItem};

/// Thumbnail bound used for the gallery's preview links.
pub const THUMBNAIL_SIZE: u32 = 512;

/// Text shown when the selection is empty.
pub const EMPTY_GALLERY_TEXT: &str = "No photos selected.";

/// The output format for the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GalleryFormat {
    /// Human-readable terminal listing.
    #[default]
    Tty,
    /// Machine-readable JSON array.
    Json,
}

/// One gallery row in JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    pub thumbnail_url: String,
    pub download_url: String,
}

impl From<&MediaItem> for GalleryEntry {
    fn from(item: &MediaItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.display_name().to_string(),
            mime_type: item.mime_type.clone(),
            kind: item.kind.as_str().to_string(),
            width: item.width,
            height: item.height,
            create_time: item.create_time,
            thumbnail_url: item.sized_url(THUMBNAIL_SIZE, THUMBNAIL_SIZE),
            download_url: item.download_url(),
        }
    }
}

/// Renders the selected items in the requested format.
pub fn render_gallery(items: &[MediaItem], format: GalleryFormat) -> String {
    match format {
        GalleryFormat::Tty => render_tty(items),
        GalleryFormat::Json => render_json(items),
    }
}

fn render_tty(items: &[MediaItem]) -> String {
    if items.is_empty() {
        return EMPTY_GALLERY_TEXT.to_string();
    }

    let noun = if items.len() == 1 { "item" } else { "items" };
    let mut lines = vec![format!("Selected {} {}:", items.len(), noun)];

    for (index, item) in items.iter().enumerate() {
        let mut row = format!("{:>3}. {}  {}", index + 1, item.display_name(), item.mime_type);
        if let Some((width, height)) = item.dimensions() {
            row.push_str(&format!("  {}x{}", width, height));
        }
        if let Some(created) = item.create_time {
            row.push_str(&format!("  {}", created.format("%Y-%m-%d %H:%M UTC")));
        }
        lines.push(row);
        lines.push(format!("     {}", item.sized_url(THUMBNAIL_SIZE, THUMBNAIL_SIZE)));
    }

    lines.push(format!(
        "Links expire {} minutes after selection.",
        BASE_URL_VALIDITY_MINUTES
    ));
    lines.join("\n")
}

fn render_json(items: &[MediaItem]) -> String {
    let entries: Vec<GalleryEntry> = items.iter().map(GalleryEntry::from).collect();
    serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;
    use chrono::TimeZone;

    fn sample_items() -> Vec<MediaItem> {
        vec![
            MediaItem::new("p1", "https://lh3.example.com/p1", "image/jpeg")
                .with_filename("IMG_0001.jpg")
                .with_dimensions(4032, 3024)
                .with_create_time(Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap())
                .with_kind(MediaKind::Photo),
            MediaItem::new("v2", "https://lh3.example.com/v2", "video/mp4")
                .with_kind(MediaKind::Video),
        ]
    }

    #[test]
    fn tty_empty() {
        assert_eq!(render_gallery(&[], GalleryFormat::Tty), EMPTY_GALLERY_TEXT);
    }

    #[test]
    fn tty_listing() {
        let output = render_gallery(&sample_items(), GalleryFormat::Tty);
        insta::assert_snapshot!(output, @r"
Selected 2 items:
  1. IMG_0001.jpg  image/jpeg  4032x3024  2024-03-15 10:00 UTC
     https://lh3.example.com/p1=w512-h512
  2. v2  video/mp4
     https://lh3.example.com/v2=w512-h512
Links expire 60 minutes after selection.
");
    }

    #[test]
    fn tty_singular_noun() {
        let items = &sample_items()[..1];
        let output = render_gallery(items, GalleryFormat::Tty);
        assert!(output.starts_with("Selected 1 item:"));
    }

    #[test]
    fn json_empty_is_empty_array() {
        assert_eq!(render_gallery(&[], GalleryFormat::Json), "[]");
    }

    #[test]
    fn json_listing() {
        let output = render_gallery(&sample_items(), GalleryFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0]["name"], "IMG_0001.jpg");
        assert_eq!(rows[0]["kind"], "photo");
        assert_eq!(rows[0]["width"], 4032);
        assert_eq!(rows[0]["create_time"], "2024-03-15T10:00:00Z");
        assert_eq!(rows[0]["download_url"], "https://lh3.example.com/p1=d");

        assert_eq!(rows[1]["name"], "v2");
        assert!(rows[1].get("width").is_none());
        assert_eq!(rows[1]["download_url"], "https://lh3.example.com/v2=dv");
    }
}
