use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 24-bit sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn from_hex(value: &str) -> Option<Self> {
        let digits = value.strip_prefix('#').unwrap_or(value);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
        Some(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

/// Per-device trail colours, assigned by device order and cycled.
pub const PALETTE: [Color; 8] = [
    Color::rgb(0x33, 0x88, 0xff),
    Color::rgb(0xe7, 0x4c, 0x3c),
    Color::rgb(0x2e, 0xcc, 0x71),
    Color::rgb(0xf3, 0x9c, 0x12),
    Color::rgb(0x9b, 0x59, 0xb6),
    Color::rgb(0x1a, 0xbc, 0x9c),
    Color::rgb(0xe6, 0x7e, 0x22),
    Color::rgb(0x34, 0x49, 0x5e),
];

pub const LIVE_MARKER_COLOR: Color = Color::rgb(0xe7, 0x4c, 0x3c);
const SUBTLE_COLOR: Color = Color::rgb(0x95, 0xa5, 0xa6);

pub fn palette_color(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

/// Resolved stroke for one polyline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: Color,
    pub weight: f32,
    pub opacity: f32,
}

/// Named trail styles offered by the style control.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StylePreset {
    #[default]
    Normal,
    Highlighted,
    Subtle,
}

impl StylePreset {
    pub const ALL: [StylePreset; 3] = [
        StylePreset::Normal,
        StylePreset::Highlighted,
        StylePreset::Subtle,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StylePreset::Normal => "normal",
            StylePreset::Highlighted => "highlighted",
            StylePreset::Subtle => "subtle",
        }
    }

    /// Stroke for a trail whose palette colour is `device_color`.
    /// `subtle` overrides the colour; the other presets keep it.
    pub fn stroke(self, device_color: Color) -> StrokeStyle {
        match self {
            StylePreset::Normal => StrokeStyle {
                color: device_color,
                weight: 4.0,
                opacity: 0.8,
            },
            StylePreset::Highlighted => StrokeStyle {
                color: device_color,
                weight: 6.0,
                opacity: 1.0,
            },
            StylePreset::Subtle => StrokeStyle {
                color: SUBTLE_COLOR,
                weight: 2.0,
                opacity: 0.4,
            },
        }
    }
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StylePreset {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        StylePreset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown style preset '{value}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_cycles_past_its_length() {
        assert_eq!(palette_color(0), palette_color(PALETTE.len()));
        assert_ne!(palette_color(0), palette_color(1));
    }

    #[test]
    fn normal_preset_matches_default_stroke() {
        let stroke = StylePreset::default().stroke(PALETTE[2]);
        assert_eq!(stroke.weight, 4.0);
        assert_eq!(stroke.opacity, 0.8);
        assert_eq!(stroke.color, PALETTE[2]);
    }

    #[test]
    fn hex_parsing_accepts_optional_hash() {
        assert_eq!(Color::from_hex("#3388ff"), Some(PALETTE[0]));
        assert_eq!(Color::from_hex("3388FF"), Some(PALETTE[0]));
        assert_eq!(Color::from_hex("#38f"), None);
        assert_eq!("Subtle".parse::<StylePreset>(), Ok(StylePreset::Subtle));
    }
}
