const BLURRED_SUFFIX: &str = "_blurred";

/// Inserts `_blurred` before the final extension: `clip.mp4` becomes
/// `clip_blurred.mp4`. Names whose last segment is not a plain extension
/// (`[A-Za-z0-9_-]+`) are returned unchanged.
pub fn blurred_file_name(name: &str) -> String {
    match name.rfind('.') {
        Some(dot) if is_extension(&name[dot + 1..]) => {
            format!("{}{}{}", &name[..dot], BLURRED_SUFFIX, &name[dot..])
        }
        _ => name.to_string(),
    }
}

fn is_extension(ext: &str) -> bool {
    !ext.is_empty()
        && ext
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
