use std::collections::BTreeMap;

use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::{OpinionCategory, RatingBand};

pub type Rgb8 = Srgb<u8>;

const GREEN: Rgb8 = Srgb::new(0x10, 0xB9, 0x81);
const AMBER: Rgb8 = Srgb::new(0xF5, 0x9E, 0x0B);
const RED: Rgb8 = Srgb::new(0xEF, 0x44, 0x44);
const SLATE: Rgb8 = Srgb::new(0x6B, 0x72, 0x80);
const GRAY: Rgb8 = Srgb::new(0x9C, 0xA3, 0xAF);
const VIOLET: Rgb8 = Srgb::new(0x8B, 0x5C, 0xF6);

// ---------------------------------------------------------------------------
// Fixed category colours
// ---------------------------------------------------------------------------

pub fn opinion_color(category: OpinionCategory) -> Rgb8 {
    match category {
        OpinionCategory::Positive => GREEN,
        OpinionCategory::Neutral => SLATE,
        OpinionCategory::Negative => RED,
        OpinionCategory::Attention => AMBER,
        OpinionCategory::NotEvaluated => GRAY,
        OpinionCategory::Other => VIOLET,
    }
}

pub fn band_color(band: RatingBand) -> Rgb8 {
    match band {
        RatingBand::High => GREEN,
        RatingBand::Medium => AMBER,
        RatingBand::Low => RED,
        RatingBand::NoRating => GRAY,
    }
}

/// `#RRGGBB`
pub fn to_hex(color: Rgb8) -> String {
    format!("#{:02X}{:02X}{:02X}", color.red, color.green, color.blue)
}

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Rgb8> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            rgb.into_format()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Color mapping for open label sets (kinds)
// ---------------------------------------------------------------------------

/// Maps labels without a fixed colour (e.g. report kinds) to distinct colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<String, Rgb8>,
    default_color: Rgb8,
}

impl ColorMap {
    pub fn new<'a>(labels: impl IntoIterator<Item = &'a String>) -> Self {
        let labels: Vec<&String> = labels.into_iter().collect();
        let palette = generate_palette(labels.len());
        let mapping = labels
            .into_iter()
            .zip(palette)
            .map(|(label, c)| (label.clone(), c))
            .collect();

        ColorMap {
            mapping,
            default_color: GRAY,
        }
    }

    pub fn color_for(&self, label: &str) -> Rgb8 {
        self.mapping
            .get(label)
            .copied()
            .unwrap_or(self.default_color)
    }

    /// Legend entries (label → colour) in label order.
    pub fn legend_entries(&self) -> impl Iterator<Item = (&str, Rgb8)> {
        self.mapping.iter().map(|(l, c)| (l.as_str(), *c))
    }
}
