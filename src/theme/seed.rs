use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::color::Rgb;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StyleName {
    #[default]
    Modern,
    Minimal,
    Dark,
    Corporate,
    Classic,
}

impl StyleName {
    pub fn as_str(self) -> &'static str {
        match self {
            StyleName::Modern => "modern",
            StyleName::Minimal => "minimal",
            StyleName::Dark => "dark",
            StyleName::Corporate => "corporate",
            StyleName::Classic => "classic",
        }
    }
}

impl fmt::Display for StyleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleName {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "modern" => Ok(StyleName::Modern),
            "minimal" => Ok(StyleName::Minimal),
            "dark" => Ok(StyleName::Dark),
            "corporate" => Ok(StyleName::Corporate),
            "classic" => Ok(StyleName::Classic),
            other => Err(AppError::InvalidThemeSeed(format!("unknown style '{}'", other))),
        }
    }
}

/// Figure chrome shared by every chart drawn with a given style.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Chrome {
    pub background: Rgb,
    pub text: Rgb,
    pub grid: Rgb,
    pub show_grid: bool,
    pub font_family: &'static str,
}

impl Chrome {
    pub fn for_style(style: StyleName) -> Self {
        match style {
            StyleName::Modern => Chrome {
                background: Rgb::WHITE,
                text: Rgb::new(0x1F, 0x29, 0x37),
                grid: Rgb::new(0xE5, 0xE7, 0xEB),
                show_grid: true,
                font_family: "DejaVu Sans",
            },
            StyleName::Minimal => Chrome {
                background: Rgb::WHITE,
                text: Rgb::new(0x37, 0x41, 0x51),
                grid: Rgb::new(0xF3, 0xF4, 0xF6),
                show_grid: false,
                font_family: "DejaVu Sans",
            },
            StyleName::Dark => Chrome {
                background: Rgb::new(0x11, 0x18, 0x27),
                text: Rgb::new(0xF9, 0xFA, 0xFB),
                grid: Rgb::new(0x37, 0x41, 0x51),
                show_grid: true,
                font_family: "DejaVu Sans",
            },
            StyleName::Corporate => Chrome {
                background: Rgb::new(0xF8, 0xFA, 0xFC),
                text: Rgb::new(0x0F, 0x17, 0x2A),
                grid: Rgb::new(0xCB, 0xD5, 0xE1),
                show_grid: true,
                font_family: "DejaVu Sans",
            },
            StyleName::Classic => Chrome {
                background: Rgb::WHITE,
                text: Rgb::BLACK,
                grid: Rgb::new(0xB0, 0xB0, 0xB0),
                show_grid: true,
                font_family: "DejaVu Serif",
            },
        }
    }
}

/// Raw, unvalidated form used for deserialization.
#[derive(Debug, Clone, Deserialize)]
struct RawThemeSeed {
    primary: String,
    secondary: String,
    tertiary: String,
    #[serde(default, alias = "style")]
    style_name: StyleName,
    #[serde(default = "default_use_gradient")]
    use_gradient: bool,
    #[serde(default = "default_transparency")]
    transparency: f64,
}

fn default_use_gradient() -> bool {
    true
}

fn default_transparency() -> f64 {
    0.8
}

/// The caller's three seed colors plus style flags. Validated on construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawThemeSeed")]
pub struct ThemeSeed {
    primary: Rgb,
    secondary: Rgb,
    tertiary: Rgb,
    style_name: StyleName,
    use_gradient: bool,
    transparency: f64,
}

impl TryFrom<RawThemeSeed> for ThemeSeed {
    type Error = AppError;

    fn try_from(raw: RawThemeSeed) -> Result<Self, Self::Error> {
        ThemeSeed::new(
            &raw.primary,
            &raw.secondary,
            &raw.tertiary,
            raw.style_name,
            raw.use_gradient,
            raw.transparency,
        )
    }
}

impl ThemeSeed {
    pub fn new(
        primary: &str,
        secondary: &str,
        tertiary: &str,
        style_name: StyleName,
        use_gradient: bool,
        transparency: f64,
    ) -> Result<Self, AppError> {
        if !transparency.is_finite() || !(0.0..=1.0).contains(&transparency) {
            return Err(AppError::InvalidThemeSeed(format!(
                "transparency {} is outside [0, 1]",
                transparency
            )));
        }
        Ok(Self {
            primary: Rgb::from_hex(primary)?,
            secondary: Rgb::from_hex(secondary)?,
            tertiary: Rgb::from_hex(tertiary)?,
            style_name,
            use_gradient,
            transparency,
        })
    }

    /// Load a theme preset from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, AppError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, AppError> {
        let spec: RawThemeSeed = serde_yaml::from_str(contents)?;
        ThemeSeed::try_from(spec)
    }

    pub fn primary(&self) -> Rgb {
        self.primary
    }

    pub fn secondary(&self) -> Rgb {
        self.secondary
    }

    pub fn tertiary(&self) -> Rgb {
        self.tertiary
    }

    pub fn style_name(&self) -> StyleName {
        self.style_name
    }

    pub fn use_gradient(&self) -> bool {
        self.use_gradient
    }

    pub fn transparency(&self) -> f64 {
        self.transparency
    }

    pub fn chrome(&self) -> Chrome {
        Chrome::for_style(self.style_name)
    }
}

impl Default for ThemeSeed {
    fn default() -> Self {
        Self {
            primary: Rgb::new(0x1E, 0x40, 0xAF),
            secondary: Rgb::new(0x10, 0xB9, 0x81),
            tertiary: Rgb::new(0xF5, 0x9E, 0x0B),
            style_name: StyleName::Modern,
            use_gradient: true,
            transparency: 0.8,
        }
    }
}
