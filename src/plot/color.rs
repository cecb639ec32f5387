//! Colour names accepted by `--colors`.
//!
//! Supports the common named colours (CSS / matplotlib spelling), matplotlib's
//! single-letter shorthands and `#rrggbb` hex codes.

use plotters::style::RGBColor;

use crate::plot::PlotError;

/// Default colour cycle for multi-dataset plots.
pub const DEFAULT_COLORS: [&str; 4] = ["mediumblue", "red", "green", "purple"];

const NAMED: &[(&str, (u8, u8, u8))] = &[
    ("black", (0, 0, 0)),
    ("white", (255, 255, 255)),
    ("gray", (128, 128, 128)),
    ("grey", (128, 128, 128)),
    ("darkgray", (169, 169, 169)),
    ("lightgray", (211, 211, 211)),
    ("red", (255, 0, 0)),
    ("darkred", (139, 0, 0)),
    ("crimson", (220, 20, 60)),
    ("tomato", (255, 99, 71)),
    ("coral", (255, 127, 80)),
    ("salmon", (250, 128, 114)),
    ("maroon", (128, 0, 0)),
    ("orange", (255, 165, 0)),
    ("darkorange", (255, 140, 0)),
    ("gold", (255, 215, 0)),
    ("yellow", (255, 255, 0)),
    ("olive", (128, 128, 0)),
    ("lime", (0, 255, 0)),
    ("green", (0, 128, 0)),
    ("darkgreen", (0, 100, 0)),
    ("forestgreen", (34, 139, 34)),
    ("teal", (0, 128, 128)),
    ("cyan", (0, 255, 255)),
    ("blue", (0, 0, 255)),
    ("mediumblue", (0, 0, 205)),
    ("darkblue", (0, 0, 139)),
    ("navy", (0, 0, 128)),
    ("royalblue", (65, 105, 225)),
    ("steelblue", (70, 130, 180)),
    ("skyblue", (135, 206, 235)),
    ("indigo", (75, 0, 130)),
    ("purple", (128, 0, 128)),
    ("magenta", (255, 0, 255)),
    ("violet", (238, 130, 238)),
    ("pink", (255, 192, 203)),
    ("brown", (165, 42, 42)),
    ("chocolate", (210, 105, 30)),
];

const SHORTHAND: &[(char, (u8, u8, u8))] = &[
    ('b', (0, 0, 255)),
    ('g', (0, 128, 0)),
    ('r', (255, 0, 0)),
    ('c', (0, 191, 191)),
    ('m', (191, 0, 191)),
    ('y', (191, 191, 0)),
    ('k', (0, 0, 0)),
    ('w', (255, 255, 255)),
];

/// Parse a colour name or `#rrggbb` code.
pub fn parse_color(raw: &str) -> Result<RGBColor, PlotError> {
    let name = raw.trim().to_ascii_lowercase();
    let unknown = || PlotError::UnknownColor(raw.to_string());

    if let Some(hex) = name.strip_prefix('#') {
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(unknown());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| unknown());
        return Ok(RGBColor(channel(0)?, channel(2)?, channel(4)?));
    }

    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some((_, (r, g, b))) = SHORTHAND.iter().find(|(k, _)| *k == c) {
            return Ok(RGBColor(*r, *g, *b));
        }
    }

    NAMED
        .iter()
        .find(|(k, _)| *k == name)
        .map(|(_, (r, g, b))| RGBColor(*r, *g, *b))
        .ok_or_else(unknown)
}
