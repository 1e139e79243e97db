//! Layer fill colors, text contrast and collaborator cursor colors.

use serde::{Deserialize, Serialize};

/// Luminance above which text drawn on a fill switches to black.
const CONTRAST_LUMINANCE_THRESHOLD: f64 = 182.0;

/// Cursor colors assigned to collaborators by connection id.
const CONNECTION_COLORS: [Color; 5] = [
    Color::new(0xDC, 0x26, 0x26),
    Color::new(0xD9, 0x77, 0x06),
    Color::new(0x05, 0x96, 0x69),
    Color::new(0x7C, 0x3A, 0xED),
    Color::new(0xDB, 0x27, 0x77),
];

/// RGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0, 0, 0)
    }

    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// Perceived luminance (ITU-R BT.601 weights), in 0..=255.
    pub fn luminance(&self) -> f64 {
        0.299 * f64::from(self.r) + 0.587 * f64::from(self.g) + 0.114 * f64::from(self.b)
    }

    /// Format as a CSS hex color, e.g. `#0a0b0c`.
    pub fn to_css(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

/// Text color that stays legible on top of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextColor {
    Black,
    White,
}

impl TextColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextColor::Black => "black",
            TextColor::White => "white",
        }
    }
}

/// Pick black or white text for the given fill.
pub fn contrasting_text_color(fill: Color) -> TextColor {
    if fill.luminance() > CONTRAST_LUMINANCE_THRESHOLD {
        TextColor::Black
    } else {
        TextColor::White
    }
}

/// Format a color as a CSS hex string.
pub fn color_to_css(color: Color) -> String {
    color.to_css()
}

/// Stable cursor color for a collaborator connection.
pub fn connection_id_to_color(connection_id: u64) -> Color {
    // Modulo keeps the index below the palette length.
    CONNECTION_COLORS[(connection_id % CONNECTION_COLORS.len() as u64) as usize]
}

/// Fixed palette handed out in rotation to newly inserted layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    colors: Vec<Color>,
    #[serde(skip)]
    next: usize,
}

impl Palette {
    /// Create a palette. An empty list falls back to black.
    pub fn new(colors: Vec<Color>) -> Self {
        let colors = if colors.is_empty() {
            vec![Color::black()]
        } else {
            colors
        };
        Self { colors, next: 0 }
    }

    /// Colors in rotation order.
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Take the next color, wrapping around at the end.
    pub fn next_color(&mut self) -> Color {
        let color = self.colors[self.next % self.colors.len()];
        self.next = (self.next + 1) % self.colors.len();
        color
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(CONNECTION_COLORS.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contrast_extremes() {
        assert_eq!(contrasting_text_color(Color::white()), TextColor::Black);
        assert_eq!(contrasting_text_color(Color::black()), TextColor::White);
        assert_eq!(TextColor::Black.as_str(), "black");
    }

    #[test]
    fn test_contrast_threshold_is_exclusive() {
        // The weights sum to 1.0, so a gray's luminance is its channel value.
        let gray = Color::new(182, 182, 182);
        assert_eq!(contrasting_text_color(gray), TextColor::White);
        let lighter = Color::new(183, 183, 183);
        assert_eq!(contrasting_text_color(lighter), TextColor::Black);
    }

    #[test]
    fn test_color_to_css_pads_channels() {
        assert_eq!(color_to_css(Color::new(10, 0, 255)), "#0a00ff");
    }

    #[test]
    fn test_connection_colors_wrap() {
        assert_eq!(connection_id_to_color(0), connection_id_to_color(5));
        assert_eq!(connection_id_to_color(1).to_css(), "#d97706");
    }

    #[test]
    fn test_palette_rotates() {
        let mut palette = Palette::new(vec![Color::black(), Color::white()]);
        assert_eq!(palette.next_color(), Color::black());
        assert_eq!(palette.next_color(), Color::white());
        assert_eq!(palette.next_color(), Color::black());
    }

    #[test]
    fn test_empty_palette_falls_back_to_black() {
        let mut palette = Palette::new(Vec::new());
        assert_eq!(palette.next_color(), Color::black());
    }
}
