use std::fmt;

use serde::{Serialize, Serializer};

/// An RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a color name or `#rrggbb`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Some(hex) = text.strip_prefix('#') {
            return parse_hex(hex);
        }

        let color = match text.to_ascii_lowercase().as_str() {
            "black" | "off" => Rgb::BLACK,
            "white" => Rgb::WHITE,
            "red" => Rgb::new(255, 0, 0),
            "green" => Rgb::new(0, 255, 0),
            "blue" => Rgb::new(0, 0, 255),
            "yellow" => Rgb::new(255, 255, 0),
            "cyan" => Rgb::new(0, 255, 255),
            "magenta" => Rgb::new(255, 0, 255),
            "orange" => Rgb::new(255, 128, 0),
            "purple" => Rgb::new(128, 0, 255),
            "pink" => Rgb::new(255, 96, 160),
            _ => return None,
        };
        Some(color)
    }

    /// Fully saturated color at `hue` degrees (wraps at 360).
    pub fn from_hue(hue: u32) -> Self {
        let hue = hue % 360;
        let rise = ((hue % 60) * 255 / 60) as u8;
        let fall = 255 - rise;
        match hue / 60 {
            0 => Rgb::new(255, rise, 0),
            1 => Rgb::new(fall, 255, 0),
            2 => Rgb::new(0, 255, rise),
            3 => Rgb::new(0, fall, 255),
            4 => Rgb::new(rise, 0, 255),
            _ => Rgb::new(255, 0, fall),
        }
    }

    /// Scale every component by `level / 255`.
    pub fn scaled(self, level: u8) -> Self {
        let scale = |c: u8| ((u16::from(c) * u16::from(level)) / 255) as u8;
        Rgb::new(scale(self.r), scale(self.g), scale(self.b))
    }
}

fn parse_hex(hex: &str) -> Option<Rgb> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let component = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(Rgb::new(component(0..2)?, component(2..4)?, component(4..6)?))
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// What an effect writes to its actuator: a color at a brightness level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Output {
    pub color: Rgb,
    pub level: u8,
}

impl Output {
    /// Dark output. Effects leave their channel in this state when they stop.
    pub const OFF: Output = Output {
        color: Rgb::BLACK,
        level: 0,
    };

    pub const fn new(color: Rgb, level: u8) -> Self {
        Self { color, level }
    }

    /// True if nothing is emitted.
    pub fn is_off(&self) -> bool {
        self.level == 0 || self.color == Rgb::BLACK
    }

    /// The color after applying the level.
    pub fn effective(&self) -> Rgb {
        self.color.scaled(self.level)
    }
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.color, self.level)
    }
}
