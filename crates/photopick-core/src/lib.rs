//! Core types: media items, picker durations, gallery rendering, tracing

pub mod gallery;
pub mod media;
pub mod time;
pub mod tracing;

pub use gallery::{GalleryEntry, GalleryFormat, render_gallery};
pub use media::{MediaItem, MediaKind};
pub use time::{DurationParseError, parse_picker_duration, picker_duration_millis};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
