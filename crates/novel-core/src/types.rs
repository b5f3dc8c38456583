use serde::{Deserialize, Serialize};

pub const MIN_FONT_SIZE_PT: u8 = 12;
pub const MAX_FONT_SIZE_PT: u8 = 24;
pub const DEFAULT_FONT_SIZE_PT: u8 = 16;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChapterKind {
    Heading,
    Preface,
    Epilogue,
    #[serde(alias = "full")]
    FullText,
}

/// A detected or synthesized chapter. `start..end` are byte offsets into the
/// decoded text; for `Heading` chapters the span is the heading line itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub title: String,
    pub kind: ChapterKind,
    pub start: usize,
    pub end: usize,
}

impl Chapter {
    pub fn new(title: impl Into<String>, kind: ChapterKind, start: usize, end: usize) -> Self {
        Self {
            title: title.into(),
            kind,
            start,
            end,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        !matches!(self.kind, ChapterKind::Heading)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub first_line: usize,
    pub line_count: usize,
}

impl Page {
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const BLACK: RgbColor = RgbColor::new(0x00, 0x00, 0x00);
    pub const RED: RgbColor = RgbColor::new(0xFF, 0x00, 0x00);
    pub const BLUE: RgbColor = RgbColor::new(0x00, 0x00, 0xFF);
    pub const WHITE: RgbColor = RgbColor::new(0xFF, 0xFF, 0xFF);
    pub const WARM: RgbColor = RgbColor::new(0xF5, 0xE6, 0xCA);
    pub const GREEN_TINT: RgbColor = RgbColor::new(0xE6, 0xF5, 0xEA);
    pub const LIGHT_GRAY: RgbColor = RgbColor::new(0xE0, 0xE0, 0xE0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Accepts `0xRRGGBB`; any alpha byte in the top bits is ignored.
    pub const fn from_packed(value: u32) -> Self {
        Self {
            r: ((value >> 16) & 0xFF) as u8,
            g: ((value >> 8) & 0xFF) as u8,
            b: (value & 0xFF) as u8,
        }
    }

    pub const fn packed(self) -> u32 {
        ((self.r as u32) << 16) | ((self.g as u32) << 8) | self.b as u32
    }

    /// Parses `#rrggbb`, `rrggbb` or `0xrrggbb`.
    pub fn parse_hex(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self::from_packed)
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

pub const TEXT_COLOR_PRESETS: [RgbColor; 3] = [RgbColor::BLACK, RgbColor::RED, RgbColor::BLUE];

pub const BACKGROUND_PRESETS: [RgbColor; 4] = [
    RgbColor::WHITE,
    RgbColor::WARM,
    RgbColor::GREEN_TINT,
    RgbColor::LIGHT_GRAY,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplaySettings {
    pub font_size_pt: u8,
    pub text_color: RgbColor,
    pub background_color: RgbColor,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            font_size_pt: DEFAULT_FONT_SIZE_PT,
            text_color: RgbColor::BLACK,
            background_color: RgbColor::WARM,
        }
    }
}

impl DisplaySettings {
    pub fn with_font_size(mut self, size: i64) -> Self {
        self.font_size_pt = clamp_font_size(size);
        self
    }

    /// Font size in device pixels for the given density (pixels per point).
    pub fn font_px(&self, density: f32) -> u32 {
        let density = if density.is_finite() && density > 0.0 {
            density
        } else {
            1.0
        };
        ((self.font_size_pt as f32 * density).round() as u32).max(1)
    }

    pub fn text_style(&self, density: f32) -> TextStyle {
        TextStyle {
            font_px: self.font_px(density),
            line_spacing: TextStyle::DEFAULT_LINE_SPACING,
            color: self.text_color,
        }
    }
}

pub fn clamp_font_size(size: i64) -> u8 {
    size.clamp(MIN_FONT_SIZE_PT as i64, MAX_FONT_SIZE_PT as i64) as u8
}

/// Paint attributes handed to the line-metrics oracle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_px: u32,
    pub line_spacing: f32,
    pub color: RgbColor,
}

impl TextStyle {
    pub const DEFAULT_LINE_SPACING: f32 = 1.2;
}

impl Default for TextStyle {
    fn default() -> Self {
        DisplaySettings::default().text_style(1.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadingPosition {
    pub file_identity: String,
    pub page_index: usize,
}
