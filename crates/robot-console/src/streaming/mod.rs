//! Stream reference handling shared by the proxy and the playback controller

pub mod classification;
pub mod manifest;
pub mod playlist;

pub use classification::StreamUrlRewriter;
pub use manifest::ManifestRewriter;

/// Media type of segmented HLS playlists
pub const HLS_MIME: &str = "application/vnd.apple.mpegurl";

/// Whether a declared content type names a playlist format
pub fn is_playlist_content_type(content_type: &str) -> bool {
    let lowered = content_type.to_ascii_lowercase();
    lowered.contains("mpegurl") || lowered.contains("m3u8")
}
