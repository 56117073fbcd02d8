//! Declared MIME types, derived from the file extension.
//!
//! Nothing here inspects file contents: a mislabeled file is taken at its
//! word.

use std::path::Path;

const FALLBACK_MIME: &str = "application/octet-stream";

const KNOWN_TYPES: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("mkv", "video/x-matroska"),
    ("avi", "video/x-msvideo"),
    ("wmv", "video/x-ms-wmv"),
    ("flv", "video/x-flv"),
    ("mpeg", "video/mpeg"),
    ("mpg", "video/mpeg"),
    ("ogv", "video/ogg"),
    ("3gp", "video/3gpp"),
    ("ts", "video/mp2t"),
    ("txt", "text/plain"),
    ("json", "application/json"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
];

/// Extensions offered by the file dialog's video filter.
pub fn video_extensions() -> Vec<&'static str> {
    KNOWN_TYPES
        .iter()
        .filter(|(_, mime)| is_video_mime(mime))
        .map(|(ext, _)| *ext)
        .collect()
}

pub fn declared_mime(file_name: &str) -> &'static str {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .and_then(|ext| {
            KNOWN_TYPES
                .iter()
                .find(|(known, _)| known.eq_ignore_ascii_case(ext))
                .map(|(_, mime)| *mime)
        })
        .unwrap_or(FALLBACK_MIME)
}

pub fn is_video_mime(mime: &str) -> bool {
    mime.starts_with("video/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_extensions_map_to_video_types() {
        assert_eq!(declared_mime("clip.mp4"), "video/mp4");
        assert_eq!(declared_mime("CLIP.MOV"), "video/quicktime");
        assert!(is_video_mime(declared_mime("holiday.webm")));
    }

    #[test]
    fn non_video_files_are_not_videos() {
        assert_eq!(declared_mime("notes.txt"), "text/plain");
        assert!(!is_video_mime(declared_mime("notes.txt")));
        assert!(!is_video_mime(declared_mime("no_extension")));
    }

    #[test]
    fn mislabeled_file_is_trusted() {
        // Text content behind a video extension still declares video.
        assert!(is_video_mime(declared_mime("actually_text.mp4")));
    }

    #[test]
    fn dialog_filter_lists_only_videos() {
        let exts = video_extensions();
        assert!(exts.contains(&"mp4"));
        assert!(!exts.contains(&"txt"));
    }
}
