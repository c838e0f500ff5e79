use indexmap::IndexSet;
use serde::Serialize;

use super::color::{analogous, complementary, darken, gradient, lighten, mix, Rgb};
use super::seed::ThemeSeed;

/// Upper bound on `derive_palette` output: 3 seeds, 3 mixes, 4 shades, 3 hue variants.
pub const MAX_PALETTE_LEN: usize = 13;

const SHADE_STEP: f64 = 0.2;

/// Ordered, duplicate-free colors derived from a `ThemeSeed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DerivedPalette {
    colors: Vec<Rgb>,
}

/// Derive the palette for `seed`: the seeds, their pairwise mixes, light and
/// dark shades of primary and secondary, then the complement and analogous
/// pair of primary. Duplicates keep their first position.
///
/// Distinct seeds yield up to `MAX_PALETTE_LEN` (13) colors, one more than the
/// 12-slot Mermaid pie theme. Callers that feed fixed-width consumers cycle or
/// truncate; the diagram codegen only reads the first 12.
pub fn derive_palette(seed: &ThemeSeed) -> DerivedPalette {
    let (p, s, t) = (seed.primary(), seed.secondary(), seed.tertiary());
    let (analogous_minus, analogous_plus) = analogous(p);

    let candidates = [
        p,
        s,
        t,
        mix(p, s, 0.5),
        mix(s, t, 0.5),
        mix(p, t, 0.5),
        lighten(p, SHADE_STEP),
        darken(p, SHADE_STEP),
        lighten(s, SHADE_STEP),
        darken(s, SHADE_STEP),
        complementary(p),
        analogous_minus,
        analogous_plus,
    ];

    let unique: IndexSet<Rgb> = candidates.into_iter().collect();
    DerivedPalette {
        colors: unique.into_iter().collect(),
    }
}

impl DerivedPalette {
    pub fn colors(&self) -> &[Rgb] {
        &self.colors
    }

    pub fn hex_colors(&self) -> Vec<String> {
        self.colors.iter().map(|c| c.to_hex()).collect()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// First `n` colors. Past the end of the palette, further colors are
    /// synthesized by mixing neighbouring entries; a color repeats only once
    /// mixing stops producing anything new.
    pub fn take(&self, n: usize) -> Vec<Rgb> {
        if n <= self.colors.len() {
            return self.colors[..n].to_vec();
        }

        let mut out: IndexSet<Rgb> = self.colors.iter().copied().collect();
        while out.len() < n {
            let snapshot: Vec<Rgb> = out.iter().copied().collect();
            let before = out.len();
            for i in 0..snapshot.len() {
                let next = snapshot[(i + 1) % snapshot.len()];
                out.insert(mix(snapshot[i], next, 0.5));
                if out.len() == n {
                    break;
                }
            }
            if out.len() == before {
                break;
            }
        }

        let mut colors: Vec<Rgb> = out.into_iter().collect();
        if colors.is_empty() {
            return colors;
        }
        let distinct = colors.len();
        let mut i = 0;
        while colors.len() < n {
            colors.push(colors[i % distinct]);
            i += 1;
        }
        colors
    }
}

/// Primary to secondary.
pub fn gradient_two(seed: &ThemeSeed, steps: usize) -> Vec<Rgb> {
    gradient(&[seed.primary(), seed.secondary()], steps)
}

/// Primary through secondary to tertiary.
pub fn gradient_three(seed: &ThemeSeed, steps: usize) -> Vec<Rgb> {
    gradient(&[seed.primary(), seed.secondary(), seed.tertiary()], steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::seed::StyleName;
    use proptest::prelude::*;
    use regex::Regex;

    fn seed(p: &str, s: &str, t: &str) -> ThemeSeed {
        ThemeSeed::new(p, s, t, StyleName::Modern, true, 0.8).unwrap()
    }

    #[test]
    fn test_palette_starts_with_seeds() {
        let palette = derive_palette(&ThemeSeed::default());
        assert_eq!(&palette.hex_colors()[..3], ["#1E40AF", "#10B981", "#F59E0B"]);
    }

    #[test]
    fn test_palette_bounded_and_unique() {
        let palette = derive_palette(&ThemeSeed::default());
        assert!(palette.len() <= MAX_PALETTE_LEN);
        let unique: std::collections::HashSet<_> = palette.colors().iter().collect();
        assert_eq!(unique.len(), palette.len());
    }

    #[test]
    fn test_identical_seeds_collapse() {
        let palette = derive_palette(&seed("#1E40AF", "#1E40AF", "#1E40AF"));
        // seeds and their mixes are all the same color
        assert!(palette.len() < MAX_PALETTE_LEN);
        assert_eq!(palette.colors()[0].to_hex(), "#1E40AF");
        assert_eq!(palette.colors().iter().filter(|c| c.to_hex() == "#1E40AF").count(), 1);
    }

    #[test]
    fn test_take_within_palette_is_prefix() {
        let palette = derive_palette(&ThemeSeed::default());
        assert_eq!(palette.take(4), palette.colors()[..4].to_vec());
        assert!(palette.take(0).is_empty());
    }

    #[test]
    fn test_take_beyond_palette_synthesizes_distinct_colors() {
        let palette = derive_palette(&ThemeSeed::default());
        let n = palette.len() + 10;
        let colors = palette.take(n);
        assert_eq!(colors.len(), n);
        let unique: std::collections::HashSet<_> = colors.iter().collect();
        assert_eq!(unique.len(), n);
        assert_eq!(&colors[..palette.len()], palette.colors());
    }

    #[test]
    fn test_take_repeats_only_when_nothing_new_exists() {
        let palette = derive_palette(&seed("#000000", "#000000", "#000000"));
        let colors = palette.take(palette.len() + 3);
        assert_eq!(colors.len(), palette.len() + 3);
    }

    #[test]
    fn test_gradients() {
        let seed = ThemeSeed::default();
        let two = gradient_two(&seed, 5);
        assert_eq!(two.first(), Some(&seed.primary()));
        assert_eq!(two.last(), Some(&seed.secondary()));
        let three = gradient_three(&seed, 7);
        assert_eq!(three[3], seed.secondary());
        assert_eq!(three[6], seed.tertiary());
    }

    #[test]
    fn test_palette_serializes_as_hex_list() {
        let json = serde_json::to_string(&derive_palette(&ThemeSeed::default())).unwrap();
        assert!(json.starts_with("[\"#1E40AF\",\"#10B981\",\"#F59E0B\""));
    }

    fn hex_strategy() -> impl Strategy<Value = String> {
        (any::<u8>(), any::<u8>(), any::<u8>()).prop_map(|(r, g, b)| format!("#{:02x}{:02X}{:02x}", r, g, b))
    }

    proptest! {
        #[test]
        fn prop_palette_deterministic_unique_and_valid(
            p in hex_strategy(),
            s in hex_strategy(),
            t in hex_strategy(),
        ) {
            let seed = seed(&p, &s, &t);
            let a = derive_palette(&seed);
            let b = derive_palette(&seed);
            prop_assert_eq!(&a, &b);
            prop_assert!(a.len() <= MAX_PALETTE_LEN);

            let re = Regex::new(r"^#[0-9A-Fa-f]{6}$").unwrap();
            let hexes = a.hex_colors();
            for h in &hexes {
                prop_assert!(re.is_match(h));
            }
            let unique: std::collections::HashSet<_> = hexes.iter().collect();
            prop_assert_eq!(unique.len(), hexes.len());
        }

        #[test]
        fn prop_take_yields_requested_count(n in 0usize..40) {
            let palette = derive_palette(&ThemeSeed::default());
            prop_assert_eq!(palette.take(n).len(), n);
        }
    }
}
