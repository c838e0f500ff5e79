use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AppError;

/// An sRGB color. Always rendered as uppercase `#RRGGBB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Hue in degrees `[0, 360)`, saturation and lightness in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsl {
    pub h: f64,
    pub s: f64,
    pub l: f64,
}

/// Below this saturation a color has no meaningful hue.
const ACHROMATIC_EPSILON: f64 = 1e-9;

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xFF, 0xFF, 0xFF);
    pub const BLACK: Rgb = Rgb::new(0x00, 0x00, 0x00);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` or `#RGB` (case-insensitive).
    pub fn from_hex(text: &str) -> Result<Self, AppError> {
        let invalid = || AppError::InvalidThemeSeed(format!("'{}' is not a #RRGGBB or #RGB color", text));

        let digits = text.strip_prefix('#').ok_or_else(invalid)?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());
        match digits.len() {
            6 => Ok(Self::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 => {
                // #ABC expands to #AABBCC
                let nibble = |i: usize| channel(&digits[i..i + 1]).map(|v| v * 17);
                Ok(Self::new(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            _ => Err(invalid()),
        }
    }

    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    pub fn to_hsl(self) -> Hsl {
        let r = f64::from(self.r) / 255.0;
        let g = f64::from(self.g) / 255.0;
        let b = f64::from(self.b) / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let delta = max - min;

        if delta < ACHROMATIC_EPSILON {
            return Hsl { h: 0.0, s: 0.0, l };
        }

        let s = if l > 0.5 {
            delta / (2.0 - max - min)
        } else {
            delta / (max + min)
        };

        let h = if max == r {
            ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };

        Hsl {
            h: normalize_hue(h * 60.0),
            s,
            l,
        }
    }

    /// Relative luminance (WCAG), used to pick readable text colors.
    pub fn luminance(self) -> f64 {
        let linear = |c: u8| {
            let v = f64::from(c) / 255.0;
            if v <= 0.03928 {
                v / 12.92
            } else {
                ((v + 0.055) / 1.055).powf(2.4)
            }
        };
        0.2126 * linear(self.r) + 0.7152 * linear(self.g) + 0.0722 * linear(self.b)
    }
}

impl Hsl {
    pub fn to_rgb(self) -> Rgb {
        let h = normalize_hue(self.h);
        let s = self.s.clamp(0.0, 1.0);
        let l = self.l.clamp(0.0, 1.0);

        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
        let m = l - c / 2.0;

        let (r, g, b) = if h < 60.0 {
            (c, x, 0.0)
        } else if h < 120.0 {
            (x, c, 0.0)
        } else if h < 180.0 {
            (0.0, c, x)
        } else if h < 240.0 {
            (0.0, x, c)
        } else if h < 300.0 {
            (x, 0.0, c)
        } else {
            (c, 0.0, x)
        };

        let to_u8 = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
        Rgb::new(to_u8(r), to_u8(g), to_u8(b))
    }

    fn is_achromatic(&self) -> bool {
        self.s < ACHROMATIC_EPSILON
    }
}

fn normalize_hue(h: f64) -> f64 {
    let wrapped = h.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rgb::from_hex(s)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Rgb::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

pub fn lighten(color: Rgb, amount: f64) -> Rgb {
    let mut hsl = color.to_hsl();
    hsl.l = (hsl.l + amount).clamp(0.0, 1.0);
    hsl.to_rgb()
}

pub fn darken(color: Rgb, amount: f64) -> Rgb {
    lighten(color, -amount)
}

pub fn rotate_hue(color: Rgb, degrees: f64) -> Rgb {
    let mut hsl = color.to_hsl();
    hsl.h = normalize_hue(hsl.h + degrees);
    hsl.to_rgb()
}

pub fn complementary(color: Rgb) -> Rgb {
    rotate_hue(color, 180.0)
}

/// The two analogous hues, (-30°, +30°).
pub fn analogous(color: Rgb) -> (Rgb, Rgb) {
    (rotate_hue(color, -30.0), rotate_hue(color, 30.0))
}

fn mix_hsl(a: Hsl, b: Hsl, ratio: f64) -> Hsl {
    let t = ratio.clamp(0.0, 1.0);

    let (ha, hb) = match (a.is_achromatic(), b.is_achromatic()) {
        (true, false) => (b.h, b.h),
        (false, true) => (a.h, a.h),
        _ => (a.h, b.h),
    };
    // shortest arc around the hue circle
    let mut delta = hb - ha;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta < -180.0 {
        delta += 360.0;
    }

    Hsl {
        h: normalize_hue(ha + delta * t),
        s: a.s + (b.s - a.s) * t,
        l: a.l + (b.l - a.l) * t,
    }
}

/// Blend two colors in HSL space. `ratio` is the weight of `b`.
pub fn mix(a: Rgb, b: Rgb, ratio: f64) -> Rgb {
    if ratio <= 0.0 {
        return a;
    }
    if ratio >= 1.0 {
        return b;
    }
    mix_hsl(a.to_hsl(), b.to_hsl(), ratio).to_rgb()
}

/// Evenly spaced colors through `stops`; the first and last entries are the outer stops.
pub fn gradient(stops: &[Rgb], steps: usize) -> Vec<Rgb> {
    match (stops, steps) {
        ([], _) | (_, 0) => Vec::new(),
        ([only], _) => vec![*only; steps],
        (_, 1) => vec![stops[0]],
        _ => {
            let segments = (stops.len() - 1) as f64;
            (0..steps)
                .map(|i| {
                    let position = i as f64 / (steps - 1) as f64 * segments;
                    let index = (position.floor() as usize).min(stops.len() - 2);
                    mix(stops[index], stops[index + 1], position - index as f64)
                })
                .collect()
        }
    }
}
