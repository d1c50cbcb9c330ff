use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Color representation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl TryFrom<String> for Color {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(val: Color) -> Self {
        val.to_string()
    }
}

impl Color {
    /// Transparent color: `#00000000`
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    /// Red color: `#FF0000FF`
    pub const RED: Color = Color::rgba(255, 0, 0, 255);
    /// Blue color: `#0000FFFF`
    pub const BLUE: Color = Color::rgba(0, 0, 255, 255);
    /// White color: `#FFFFFFFF`
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    /// Black color: `#000000FF`
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    /// Gray color: `#808080FF`, the default fill of polygons and buildings.
    pub const GRAY: Color = Color::rgba(128, 128, 128, 255);

    /// Constructs color from its RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Constructs an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Converts the color into u8 array (RGBA).
    pub fn to_u8_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Converts the color into f32 array with channels in `0..=1` range.
    pub fn to_f32_array(&self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    /// Converts the color into a hex string: `#rrggbb` for opaque colors, `#rrggbbaa` otherwise.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!(
                "#{:02x}{:02x}{:02x}{:02x}",
                self.r, self.g, self.b, self.a
            )
        }
    }

    /// Parses a color from a hex string: `#rgb`, `#rrggbb` or `#rrggbbaa`.
    pub fn try_from_hex(hex_string: &str) -> Option<Self> {
        let digits = hex_string.strip_prefix('#')?;
        if !digits.is_ascii() {
            return None;
        }

        let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        match digits.len() {
            3 => {
                let mut channels = [0; 3];
                for (i, c) in digits.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    channels[i] = v * 16 + v;
                }
                Some(Self::rgb(channels[0], channels[1], channels[2]))
            }
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    /// Returns a new color instance, copied from the base one but with the given alpha channel.
    pub fn with_alpha(&self, a: u8) -> Self {
        Self { a, ..*self }
    }

    /// Returns the color with its alpha multiplied by `opacity` (clamped to `0..=1`).
    pub fn with_opacity(&self, opacity: f64) -> Self {
        let opacity = opacity.clamp(0.0, 1.0);
        self.with_alpha((self.a as f64 * opacity).round() as u8)
    }

    /// Returns the color with RGB channels multiplied by `factor`. Alpha is unchanged.
    pub fn shade(&self, factor: f64) -> Self {
        let scale = |c: u8| (c as f64 * factor).clamp(0.0, 255.0) as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
            a: self.a,
        }
    }

    /// Linear interpolation between two colors, `t` in `0..=1`.
    pub fn lerp(&self, other: &Color, t: f64) -> Self {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: mix(self.a, other.a),
        }
    }

    /// Returns true if the color is fully transparent (`a == 0`).
    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Red component of the color in RGBA space.
    pub fn r(&self) -> u8 {
        self.r
    }

    /// Green component of the color in RGBA space.
    pub fn g(&self) -> u8 {
        self.g
    }

    /// Blue component of the color in RGBA space.
    pub fn b(&self) -> u8 {
        self.b
    }

    /// Opacity component of the color.
    pub fn a(&self) -> u8 {
        self.a
    }

    /// Alpha blends `fore` over `self`, returning the composite (source-over).
    pub fn blend(&self, fore: Color) -> Color {
        let fa = fore.a as f32 / 255.0;
        let ba = self.a as f32 / 255.0;
        let out_a = fa + ba * (1.0 - fa);
        if out_a <= 0.0 {
            return Color::TRANSPARENT;
        }

        let channel = |f: u8, b: u8| {
            let value = (f as f32 * fa + b as f32 * ba * (1.0 - fa)) / out_a;
            value.round().clamp(0.0, 255.0) as u8
        };

        Color {
            r: channel(fore.r, self.r),
            g: channel(fore.g, self.g),
            b: channel(fore.b, self.b),
            a: (out_a * 255.0).round() as u8,
        }
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Color {
    type Err = Error;

    /// Parses hex colors, `rgb(r, g, b)`, `rgba(r, g, b, a)` with alpha in `0..=1`, and CSS color
    /// names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let invalid = || Error::config(format!("failed to parse color value '{s}'"));

        if value.starts_with('#') {
            return Self::try_from_hex(value).ok_or_else(invalid);
        }

        let lower = value.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
        {
            let args = args.strip_suffix(')').ok_or_else(invalid)?;
            let parts: Vec<&str> = args.split(',').map(str::trim).collect();
            let channel = |part: &str| -> Option<u8> {
                match part.strip_suffix('%') {
                    Some(percent) => {
                        let p: f64 = percent.parse().ok()?;
                        Some((p.clamp(0.0, 100.0) * 2.55).round() as u8)
                    }
                    None => {
                        let v: f64 = part.parse().ok()?;
                        Some(v.clamp(0.0, 255.0) as u8)
                    }
                }
            };

            return match parts[..] {
                [r, g, b] if lower.starts_with("rgb(") => Ok(Self::rgb(
                    channel(r).ok_or_else(invalid)?,
                    channel(g).ok_or_else(invalid)?,
                    channel(b).ok_or_else(invalid)?,
                )),
                [r, g, b, a] if lower.starts_with("rgba(") => {
                    let alpha: f64 = a.parse().map_err(|_| invalid())?;
                    Ok(Self::rgba(
                        channel(r).ok_or_else(invalid)?,
                        channel(g).ok_or_else(invalid)?,
                        channel(b).ok_or_else(invalid)?,
                        (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
                    ))
                }
                _ => Err(invalid()),
            };
        }

        NAMED_COLORS
            .iter()
            .find(|(name, _)| *name == lower)
            .map(|(_, color)| *color)
            .ok_or_else(invalid)
    }
}

const NAMED_COLORS: &[(&str, Color)] = &[
    ("transparent", Color::TRANSPARENT),
    ("aqua", Color::rgb(0, 255, 255)),
    ("beige", Color::rgb(245, 245, 220)),
    ("black", Color::BLACK),
    ("blue", Color::BLUE),
    ("brown", Color::rgb(165, 42, 42)),
    ("cyan", Color::rgb(0, 255, 255)),
    ("darkblue", Color::rgb(0, 0, 139)),
    ("darkgray", Color::rgb(169, 169, 169)),
    ("darkgreen", Color::rgb(0, 100, 0)),
    ("darkgrey", Color::rgb(169, 169, 169)),
    ("darkred", Color::rgb(139, 0, 0)),
    ("fuchsia", Color::rgb(255, 0, 255)),
    ("gold", Color::rgb(255, 215, 0)),
    ("gray", Color::GRAY),
    ("green", Color::rgb(0, 128, 0)),
    ("grey", Color::GRAY),
    ("khaki", Color::rgb(240, 230, 140)),
    ("lightblue", Color::rgb(173, 216, 230)),
    ("lightgray", Color::rgb(211, 211, 211)),
    ("lightgreen", Color::rgb(144, 238, 144)),
    ("lightgrey", Color::rgb(211, 211, 211)),
    ("lime", Color::rgb(0, 255, 0)),
    ("magenta", Color::rgb(255, 0, 255)),
    ("maroon", Color::rgb(128, 0, 0)),
    ("navy", Color::rgb(0, 0, 128)),
    ("olive", Color::rgb(128, 128, 0)),
    ("orange", Color::rgb(255, 165, 0)),
    ("pink", Color::rgb(255, 192, 203)),
    ("purple", Color::rgb(128, 0, 128)),
    ("red", Color::RED),
    ("salmon", Color::rgb(250, 128, 114)),
    ("silver", Color::rgb(192, 192, 192)),
    ("steelblue", Color::rgb(70, 130, 180)),
    ("tan", Color::rgb(210, 180, 140)),
    ("teal", Color::rgb(0, 128, 128)),
    ("violet", Color::rgb(238, 130, 238)),
    ("wheat", Color::rgb(245, 222, 179)),
    ("white", Color::WHITE),
    ("yellow", Color::rgb(255, 255, 0)),
];
