// Label → colour mapping shared by the console, the PDF writer and any
// chart renderer. Nothing here touches a drawing surface.
use crate::quartile::Band;
use crate::types::Stage;
use crate::util::NOT_APPLICABLE;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    /// Header band of every exported table.
    pub const HEADER_BLUE: Rgb = Rgb(0, 51, 102);

    pub fn hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Named colours used by chart and table styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorToken {
    Red,
    Orange,
    Yellow,
    LightGreen,
    DarkGreen,
    Green,
    Blue,
    Black,
    White,
}

impl ColorToken {
    pub fn rgb(self) -> Rgb {
        match self {
            ColorToken::Red => Rgb(255, 0, 0),
            ColorToken::Orange => Rgb(255, 165, 0),
            ColorToken::Yellow => Rgb(255, 255, 0),
            ColorToken::LightGreen => Rgb(144, 238, 144),
            ColorToken::DarkGreen => Rgb(0, 100, 0),
            ColorToken::Green => Rgb(0, 128, 0),
            ColorToken::Blue => Rgb(0, 0, 255),
            ColorToken::Black => Rgb::BLACK,
            ColorToken::White => Rgb::WHITE,
        }
    }
}

/// Pale cell fill behind a band in exported tables.
pub fn band_fill(band: Band) -> Rgb {
    match band {
        Band::Q1 => Rgb(255, 204, 204),
        Band::Q2 => Rgb(255, 229, 204),
        Band::Q3 => Rgb(204, 255, 204),
        Band::Q4 => Rgb(204, 255, 255),
    }
}

/// Text colour for a band label in on-screen tables.
pub fn band_text_color(band: Band) -> ColorToken {
    match band {
        Band::Q1 => ColorToken::Red,
        Band::Q2 => ColorToken::Orange,
        Band::Q3 => ColorToken::LightGreen,
        Band::Q4 => ColorToken::DarkGreen,
    }
}

/// Colour of a formatted variation cell: gains green, losses red, the
/// not-applicable marker blue.
pub fn variation_color(value: &str) -> ColorToken {
    if value == NOT_APPLICABLE {
        ColorToken::Blue
    } else if value.starts_with('+') {
        ColorToken::Green
    } else if value.starts_with('-') {
        ColorToken::Red
    } else {
        ColorToken::Black
    }
}

/// Stacked-bar segment colours, aligned with `Stage::level_columns`.
pub fn level_colors(stage: Stage) -> &'static [ColorToken] {
    match stage {
        Stage::Second => &[
            ColorToken::Red,
            ColorToken::Orange,
            ColorToken::Yellow,
            ColorToken::LightGreen,
            ColorToken::DarkGreen,
        ],
        Stage::Fifth | Stage::Ninth => &[
            ColorToken::Red,
            ColorToken::Yellow,
            ColorToken::LightGreen,
            ColorToken::DarkGreen,
        ],
    }
}

/// Readable label colour on top of a segment.
pub fn label_text_color(segment: ColorToken) -> ColorToken {
    match segment {
        ColorToken::DarkGreen | ColorToken::Red => ColorToken::White,
        _ => ColorToken::Black,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_map_to_fixed_colours() {
        assert_eq!(band_text_color(Band::Q1), ColorToken::Red);
        assert_eq!(band_text_color(Band::Q2), ColorToken::Orange);
        assert_eq!(band_text_color(Band::Q3), ColorToken::LightGreen);
        assert_eq!(band_text_color(Band::Q4), ColorToken::DarkGreen);
        assert_eq!(band_fill(Band::Q1).hex(), "#ffcccc");
        assert_eq!(Rgb::HEADER_BLUE.hex(), "#003366");
    }

    #[test]
    fn variation_cells_are_coloured_by_sign() {
        assert_eq!(variation_color("+30.0"), ColorToken::Green);
        assert_eq!(variation_color("-4.5%"), ColorToken::Red);
        assert_eq!(variation_color("N/A"), ColorToken::Blue);
        assert_eq!(variation_color("0.0"), ColorToken::Black);
    }

    #[test]
    fn one_colour_per_level() {
        for stage in Stage::ALL {
            assert_eq!(level_colors(stage).len(), stage.level_columns().len());
        }
        assert_eq!(label_text_color(ColorToken::Red), ColorToken::White);
        assert_eq!(label_text_color(ColorToken::Yellow), ColorToken::Black);
    }
}
