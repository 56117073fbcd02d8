use eframe::egui::Color32;

pub const ERROR_HEX: &str = "#f87171";
pub const SUCCESS_HEX: &str = "#4ade80";
pub const NEUTRAL_HEX: &str = "#9ca3af";
pub const LINK_HEX: &str = "#818cf8";

pub trait ColorExt {
    fn from_hex_rgb(hex: &str) -> Option<Self>
    where
        Self: Sized;

    /// Parses `hex`, falling back to `fallback` on malformed input.
    fn hex_or(hex: &str, fallback: Self) -> Self
    where
        Self: Sized,
    {
        Self::from_hex_rgb(hex).unwrap_or(fallback)
    }
}

impl ColorExt for Color32 {
    fn from_hex_rgb(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }

        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

        Some(Color32::from_rgb(r, g, b))
    }
}
