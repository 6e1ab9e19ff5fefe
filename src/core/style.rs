//! Heading styles and the precedence rules used to pick one.
//!
//! A style set only counts when it is complete: all of `h1`, `h2` and `h3`
//! present, each with size, color, font and bold. Anything less is ignored as a
//! whole and the next source is consulted.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_HEADING_SIZE: f64 = 8.0;
pub const MAX_HEADING_SIZE: f64 = 72.0;

/// Fully specified style for one heading level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderStyle {
    /// Point size.
    pub size: f64,
    /// Six hex digits, no leading `#`.
    pub color: String,
    pub font: String,
    pub bold: bool,
}

impl HeaderStyle {
    fn new(size: f64, color: &str, font: &str, bold: bool) -> Self {
        Self {
            size,
            color: color.to_string(),
            font: font.to_string(),
            bold,
        }
    }

    /// Size in half-points, the unit Word stores run sizes in.
    pub fn half_points(&self) -> usize {
        (self.size * 2.0).round() as usize
    }

    pub fn check(&self, level: &'static str) -> Result<(), StyleError> {
        if !(MIN_HEADING_SIZE..=MAX_HEADING_SIZE).contains(&self.size) {
            return Err(StyleError::SizeOutOfRange { level, size: self.size });
        }
        if !is_hex_color(&self.color) {
            return Err(StyleError::InvalidColor {
                level,
                color: self.color.clone(),
            });
        }
        if self.font.trim().is_empty() {
            return Err(StyleError::EmptyFont { level });
        }
        Ok(())
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 6 && value.chars().all(|c| c.is_ascii_hexdigit())
}

/// Styles for the three heading levels that can be customised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderStyleSet {
    pub h1: HeaderStyle,
    pub h2: HeaderStyle,
    pub h3: HeaderStyle,
}

impl HeaderStyleSet {
    /// Compiled-in defaults: Outfit, black, bold, 14/12/10pt.
    pub fn builtin() -> Self {
        Self {
            h1: HeaderStyle::new(14.0, "000000", "Outfit", true),
            h2: HeaderStyle::new(12.0, "000000", "Outfit", true),
            h3: HeaderStyle::new(10.0, "000000", "Outfit", true),
        }
    }

    /// Style for `level`. Levels outside 1..=3 use the h1 style.
    pub fn for_level(&self, level: u32) -> &HeaderStyle {
        match level {
            2 => &self.h2,
            3 => &self.h3,
            _ => &self.h1,
        }
    }

    pub fn check(&self) -> Result<(), StyleError> {
        self.h1.check("h1")?;
        self.h2.check("h2")?;
        self.h3.check("h3")
    }
}

/// A style as supplied by a caller or read from a template; any field may be
/// missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HeaderStyleSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
}

impl HeaderStyleSpec {
    fn complete(&self, level: &'static str) -> Result<HeaderStyle, StyleError> {
        let missing = |field| StyleError::MissingField { level, field };
        let style = HeaderStyle {
            size: self.size.ok_or_else(|| missing("size"))?,
            color: self.color.clone().ok_or_else(|| missing("color"))?,
            font: self.font.clone().ok_or_else(|| missing("font"))?,
            bold: self.bold.ok_or_else(|| missing("bold"))?,
        };
        style.check(level)?;
        Ok(style)
    }

    /// Fills fields this spec leaves open from `base`.
    pub fn or(self, base: &HeaderStyleSpec) -> HeaderStyleSpec {
        HeaderStyleSpec {
            size: self.size.or(base.size),
            color: self.color.or_else(|| base.color.clone()),
            font: self.font.or_else(|| base.font.clone()),
            bold: self.bold.or(base.bold),
        }
    }
}

impl From<&HeaderStyle> for HeaderStyleSpec {
    fn from(style: &HeaderStyle) -> Self {
        Self {
            size: Some(style.size),
            color: Some(style.color.clone()),
            font: Some(style.font.clone()),
            bold: Some(style.bold),
        }
    }
}

/// Possibly partial style set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HeaderStyleSetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h1: Option<HeaderStyleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h2: Option<HeaderStyleSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub h3: Option<HeaderStyleSpec>,
}

impl HeaderStyleSetSpec {
    /// Returns the complete set, or the first reason it is not usable.
    pub fn validate(&self) -> Result<HeaderStyleSet, StyleError> {
        let level = |spec: &Option<HeaderStyleSpec>,
                     name: &'static str|
         -> Result<HeaderStyle, StyleError> {
            spec.as_ref()
                .ok_or(StyleError::MissingLevel(name))?
                .complete(name)
        };
        Ok(HeaderStyleSet {
            h1: level(&self.h1, "h1")?,
            h2: level(&self.h2, "h2")?,
            h3: level(&self.h3, "h3")?,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl From<&HeaderStyleSet> for HeaderStyleSetSpec {
    fn from(set: &HeaderStyleSet) -> Self {
        Self {
            h1: Some((&set.h1).into()),
            h2: Some((&set.h2).into()),
            h3: Some((&set.h3).into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StyleError {
    #[error("style set has no `{0}` entry")]
    MissingLevel(&'static str),
    #[error("`{level}` style is missing `{field}`")]
    MissingField {
        level: &'static str,
        field: &'static str,
    },
    #[error("`{level}` size {size} is outside 8..=72")]
    SizeOutOfRange { level: &'static str, size: f64 },
    #[error("`{level}` color `{color}` is not a 6-digit hex value")]
    InvalidColor { level: &'static str, color: String },
    #[error("`{level}` font name is empty")]
    EmptyFont { level: &'static str },
}

/// Picks the effective heading style: caller set, then template set, then
/// defaults.
#[derive(Debug, Clone)]
pub struct StyleResolver {
    defaults: HeaderStyleSet,
}

impl Default for StyleResolver {
    fn default() -> Self {
        Self::new(HeaderStyleSet::builtin())
    }
}

impl StyleResolver {
    pub fn new(defaults: HeaderStyleSet) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &HeaderStyleSet {
        &self.defaults
    }

    pub fn resolve(
        &self,
        level: u32,
        caller: Option<&HeaderStyleSetSpec>,
        template: Option<&HeaderStyleSetSpec>,
    ) -> HeaderStyle {
        [caller, template]
            .into_iter()
            .flatten()
            .find_map(|spec| spec.validate().ok())
            .map(|set| set.for_level(level).clone())
            .unwrap_or_else(|| self.defaults.for_level(level).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(size: f64, color: &str, font: &str) -> HeaderStyleSetSpec {
        let style = HeaderStyleSpec {
            size: Some(size),
            color: Some(color.to_string()),
            font: Some(font.to_string()),
            bold: Some(false),
        };
        HeaderStyleSetSpec {
            h1: Some(style.clone()),
            h2: Some(style.clone()),
            h3: Some(style),
        }
    }

    #[test]
    fn caller_set_beats_template_set() {
        let resolver = StyleResolver::default();
        let caller = uniform(20.0, "FF0000", "Georgia");
        let template = uniform(18.0, "00FF00", "Calibri");

        let style = resolver.resolve(2, Some(&caller), Some(&template));
        assert_eq!(style.font, "Georgia");
        assert_eq!(style.size, 20.0);
    }

    #[test]
    fn template_set_beats_defaults() {
        let resolver = StyleResolver::default();
        let template = uniform(18.0, "00ff00", "Calibri");

        let style = resolver.resolve(1, None, Some(&template));
        assert_eq!(style.font, "Calibri");
        assert_eq!(style.color, "00ff00");
    }

    #[test]
    fn defaults_when_nothing_valid() {
        let resolver = StyleResolver::default();
        let style = resolver.resolve(3, None, None);
        assert_eq!(style, HeaderStyleSet::builtin().h3);
    }

    #[test]
    fn partial_caller_set_is_rejected() {
        let resolver = StyleResolver::default();
        let mut caller = uniform(20.0, "FF0000", "Georgia");
        caller.h2.as_mut().unwrap().bold = None;
        let template = uniform(18.0, "00FF00", "Calibri");

        assert_eq!(
            caller.validate(),
            Err(StyleError::MissingField { level: "h2", field: "bold" })
        );
        // Rejected as a whole, even for levels it does define.
        assert_eq!(resolver.resolve(1, Some(&caller), Some(&template)).font, "Calibri");
        assert_eq!(resolver.resolve(1, Some(&caller), None).font, "Outfit");
    }

    #[test]
    fn missing_level_is_rejected() {
        let mut caller = uniform(20.0, "FF0000", "Georgia");
        caller.h3 = None;
        assert_eq!(caller.validate(), Err(StyleError::MissingLevel("h3")));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            uniform(90.0, "FF0000", "Georgia").validate(),
            Err(StyleError::SizeOutOfRange { level: "h1", .. })
        ));
        assert!(matches!(
            uniform(12.0, "#FF000", "Georgia").validate(),
            Err(StyleError::InvalidColor { .. })
        ));
        assert!(matches!(
            uniform(12.0, "FF0000", " ").validate(),
            Err(StyleError::EmptyFont { .. })
        ));
    }

    #[test]
    fn out_of_range_level_clamps_to_h1() {
        let resolver = StyleResolver::default();
        let defaults = HeaderStyleSet::builtin();
        assert_eq!(resolver.resolve(7, None, None), defaults.h1);
        assert_eq!(resolver.resolve(0, None, None), defaults.h1);
    }

    #[test]
    fn half_points_doubles_size() {
        assert_eq!(HeaderStyleSet::builtin().h1.half_points(), 28);
    }
}
