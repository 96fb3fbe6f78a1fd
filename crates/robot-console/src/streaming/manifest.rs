//! Playlist rewriting so that every referenced resource routes through the proxy
//!
//! This is deliberately a line-based substitution rather than a full playlist
//! parser: unknown directives pass through untouched and a line that does not
//! match is simply left alone.

use regex::Regex;
use tracing::trace;

use crate::config::Config;
use crate::config::defaults::PROXY_BASE_PATH;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct ManifestRewriter {
    proxy_base: String,
    reference_pattern: Regex,
}

impl ManifestRewriter {
    /// Build a rewriter for references ending in one of `extensions`
    /// (given without the leading dot, e.g. `"ts"`).
    pub fn new<S: AsRef<str>>(proxy_base: &str, extensions: &[S]) -> AppResult<Self> {
        let alternation = extensions
            .iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("|");

        if alternation.is_empty() {
            return Err(AppError::configuration(
                "manifest rewriting needs at least one reference extension",
            ));
        }

        // A whole line made of one token whose path ends in a known extension,
        // optionally followed by a query string.
        let pattern = format!(r"^\S+\.(?:{alternation})(?:\?\S*)?$");
        let reference_pattern = Regex::new(&pattern).map_err(|e| {
            AppError::configuration(format!("invalid manifest reference pattern: {e}"))
        })?;

        Ok(Self {
            proxy_base: proxy_base.trim_end_matches('/').to_string(),
            reference_pattern,
        })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(PROXY_BASE_PATH, &config.proxy.rewrite_extensions)
    }

    pub fn proxy_base(&self) -> &str {
        &self.proxy_base
    }

    /// Rewrite every bare relative reference in `text`.
    ///
    /// Line order, line count and line terminators are preserved exactly.
    pub fn rewrite(&self, text: &str) -> String {
        self.rewrite_counted(text).0
    }

    /// Same as [`rewrite`](Self::rewrite), also returning how many lines changed
    pub fn rewrite_counted(&self, text: &str) -> (String, usize) {
        let mut output = String::with_capacity(text.len() + 64);
        let mut rewritten = 0usize;

        for raw_line in text.split_inclusive('\n') {
            let (line, terminator) = split_terminator(raw_line);
            match self.rewrite_line(line) {
                Some(replacement) => {
                    output.push_str(&replacement);
                    rewritten += 1;
                }
                None => output.push_str(line),
            }
            output.push_str(terminator);
        }

        if rewritten > 0 {
            trace!(rewritten, "Rewrote manifest references");
        }
        (output, rewritten)
    }

    fn rewrite_line(&self, line: &str) -> Option<String> {
        if line.is_empty() || line.starts_with('#') || self.is_passthrough(line) {
            return None;
        }
        if !self.reference_pattern.is_match(line) {
            return None;
        }

        let reference = line.strip_prefix('/').unwrap_or(line);
        Some(format!("{}/{}", self.proxy_base, reference))
    }

    /// Absolute or already proxied references are never touched
    fn is_passthrough(&self, line: &str) -> bool {
        line.starts_with("http://")
            || line.starts_with("https://")
            || line.contains("://")
            || line.starts_with("//")
            || line
                .strip_prefix(self.proxy_base.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

fn split_terminator(raw_line: &str) -> (&str, &str) {
    if let Some(line) = raw_line.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw_line.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw_line, "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    const MEDIA_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:2\n\
#EXT-X-MEDIA-SEQUENCE:41\n\
#EXTINF:2.000,\n\
segment41.ts\n\
#EXTINF:2.000,\n\
segment42.ts\n";

    fn rewriter() -> ManifestRewriter {
        ManifestRewriter::new("/api/stream", &["ts", "m4s", "mp4", "m3u8"]).unwrap()
    }

    #[test]
    fn test_rewrites_relative_segments() {
        let output = rewriter().rewrite(MEDIA_PLAYLIST);
        assert!(output.contains("\n/api/stream/segment41.ts\n"));
        assert!(output.contains("\n/api/stream/segment42.ts\n"));
        assert!(output.starts_with("#EXTM3U\n#EXT-X-VERSION:3\n"));
        assert!(output.contains("#EXT-X-MEDIA-SEQUENCE:41\n"));
    }

    #[test]
    fn test_rewrites_variant_playlists() {
        let master = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\nlow/index.m3u8\n";
        let output = rewriter().rewrite(master);
        assert_eq!(
            output,
            "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=800000\n/api/stream/low/index.m3u8\n"
        );
    }

    #[rstest]
    #[case("https://cdn.example.com/seg1.ts")]
    #[case("http://10.0.0.7:8000/seg1.ts")]
    #[case("/api/stream/seg1.ts")]
    #[case("#EXT-X-MAP:URI=\"init.mp4\"")]
    #[case("segment1.aac")]
    #[case("segment 1.ts")]
    #[case(" segment1.ts")]
    #[case("")]
    fn test_leaves_other_lines_untouched(#[case] line: &str) {
        assert_eq!(rewriter().rewrite(line), line);
    }

    #[rstest]
    #[case("seg1.ts?token=abc", "/api/stream/seg1.ts?token=abc")]
    #[case("/live/seg1.m4s", "/api/stream/live/seg1.m4s")]
    #[case("chunks/part.mp4", "/api/stream/chunks/part.mp4")]
    fn test_rewrites_reference_forms(#[case] line: &str, #[case] expected: &str) {
        assert_eq!(rewriter().rewrite(line), expected);
    }

    #[test]
    fn test_preserves_crlf_and_missing_trailing_newline() {
        let text = "#EXTM3U\r\n#EXTINF:2.0,\r\nseg1.ts\r\n#EXTINF:2.0,\r\nseg2.ts";
        let output = rewriter().rewrite(text);
        assert_eq!(
            output,
            "#EXTM3U\r\n#EXTINF:2.0,\r\n/api/stream/seg1.ts\r\n#EXTINF:2.0,\r\n/api/stream/seg2.ts"
        );
    }

    #[test]
    fn test_counts_rewritten_lines() {
        let (_, count) = rewriter().rewrite_counted(MEDIA_PLAYLIST);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_custom_extension_set() {
        let r = ManifestRewriter::new("/api/stream/", &[".aac"]).unwrap();
        assert_eq!(r.proxy_base(), "/api/stream");
        assert_eq!(r.rewrite("audio1.aac\nseg1.ts\n"), "/api/stream/audio1.aac\nseg1.ts\n");
    }

    #[test]
    fn test_empty_extension_set_is_rejected() {
        let empty: [&str; 0] = [];
        assert!(ManifestRewriter::new("/api/stream", &empty).is_err());
        assert!(ManifestRewriter::new("/api/stream", &[" ", "."]).is_err());
    }

    fn playlist_line() -> impl Strategy<Value = String> {
        prop_oneof![
            "#EXT[A-Z-]{1,12}(:[0-9.,]{1,8})?",
            "[a-z0-9_/]{1,16}\\.(ts|m4s|mp4|m3u8|aac)",
            "https://[a-z]{1,8}\\.example\\.com/[a-z0-9]{1,8}\\.ts",
            "/api/stream/[a-z0-9]{1,8}\\.ts",
            "[a-z ]{0,12}",
        ]
    }

    proptest! {
        #[test]
        fn prop_rewrite_is_idempotent(lines in prop::collection::vec(playlist_line(), 0..24), crlf in any::<bool>()) {
            let sep = if crlf { "\r\n" } else { "\n" };
            let text = lines.join(sep);
            let r = rewriter();
            let once = r.rewrite(&text);
            prop_assert_eq!(r.rewrite(&once), once);
        }

        #[test]
        fn prop_rewrite_preserves_line_count_and_directives(lines in prop::collection::vec(playlist_line(), 0..24)) {
            let text = lines.join("\n");
            let output = rewriter().rewrite(&text);
            let before: Vec<&str> = text.split('\n').collect();
            let after: Vec<&str> = output.split('\n').collect();
            prop_assert_eq!(before.len(), after.len());
            for (original, result) in before.iter().zip(after.iter()) {
                if original.starts_with('#') || original.starts_with("https://") || original.starts_with("/api/stream/") {
                    prop_assert_eq!(original, result);
                }
            }
        }
    }
}
