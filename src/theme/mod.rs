pub mod color;
pub mod palette;
pub mod seed;
pub mod style;

pub use color::Rgb;
pub use palette::{derive_palette, DerivedPalette};
pub use seed::{StyleName, ThemeSeed};
pub use style::{style_for, style_for_with, StyleHints, StyleRecord};
