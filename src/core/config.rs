//! Per-request render configuration and the built-in lookup tables it is
//! resolved against.
//!
//! The tables (margins, line heights, numbering schemes, default heading
//! styles) live in [`Presets`], which is handed to the assembler when it is
//! constructed. Nothing here is global.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::core::model::WordConfig;
use crate::core::style::{HeaderStyleSet, HeaderStyleSetSpec};

pub const DEFAULT_FONT_FAMILY: &str = "Arial";
pub const DEFAULT_FONT_SIZE: f64 = 12.0;
pub const DEFAULT_LINE_HEIGHT: f64 = 1.15;
pub const DEFAULT_MARGINS: &str = "normal";
pub const BULLET_REFERENCE: &str = "my-listing-with-bullet-points";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Page margins in twips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageMargins {
    pub top: i32,
    pub bottom: i32,
    pub left: i32,
    pub right: i32,
}

impl PageMargins {
    pub const fn new(top: i32, bottom: i32, left: i32, right: i32) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }
}

/// Number format of one numbering level, named as in WordprocessingML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelFormat {
    Decimal,
    UpperRoman,
    LowerRoman,
    UpperLetter,
    LowerLetter,
    Bullet,
}

impl LevelFormat {
    pub fn as_ooxml(self) -> &'static str {
        match self {
            LevelFormat::Decimal => "decimal",
            LevelFormat::UpperRoman => "upperRoman",
            LevelFormat::LowerRoman => "lowerRoman",
            LevelFormat::UpperLetter => "upperLetter",
            LevelFormat::LowerLetter => "lowerLetter",
            LevelFormat::Bullet => "bullet",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingLevel {
    pub format: LevelFormat,
    /// Level text such as `%1.%2`.
    pub text: String,
}

/// A named numbering scheme. `label` is what callers pick from a menu,
/// `reference` is the id paragraphs point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingPreset {
    pub label: String,
    pub reference: String,
    pub levels: Vec<NumberingLevel>,
}

impl NumberingPreset {
    fn new(label: &str, reference: &str, levels: &[(LevelFormat, &str)]) -> Self {
        Self {
            label: label.to_string(),
            reference: reference.to_string(),
            levels: levels
                .iter()
                .map(|(format, text)| NumberingLevel {
                    format: *format,
                    text: text.to_string(),
                })
                .collect(),
        }
    }

    /// Deepest level index this scheme defines.
    pub fn max_depth(&self) -> u8 {
        self.levels.len().saturating_sub(1) as u8
    }
}

/// Immutable lookup tables used to turn caller options into a
/// [`RenderConfig`].
#[derive(Debug, Clone)]
pub struct Presets {
    pub margins: BTreeMap<String, PageMargins>,
    /// Line-height multiplier to line spacing in 240ths of a line.
    pub line_heights: Vec<(f64, i32)>,
    pub numbering: Vec<NumberingPreset>,
    pub bullet: NumberingPreset,
    pub header_styles: HeaderStyleSet,
}

impl Default for Presets {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Presets {
    pub fn builtin() -> Self {
        use LevelFormat::*;

        let margins = [
            ("normal", PageMargins::new(1440, 1440, 1440, 1440)),
            ("narrow", PageMargins::new(720, 720, 720, 720)),
            ("moderate", PageMargins::new(1440, 1440, 1080, 1080)),
            ("wide", PageMargins::new(1440, 1440, 2880, 2880)),
            ("mirrored", PageMargins::new(1440, 1440, 1800, 1440)),
        ]
        .into_iter()
        .map(|(name, margins)| (name.to_string(), margins))
        .collect();

        let numbering = vec![
            NumberingPreset::new(
                "1.1.1.1 (Decimal)",
                "decimal-numbering",
                &[(Decimal, "%1"), (Decimal, "%1.%2"), (Decimal, "%1.%2.%3"), (Decimal, "%1.%2.%3.%4")],
            ),
            NumberingPreset::new(
                "I.1.a.i (Roman -> Decimal > Lower Letter -> Lower Roman)",
                "roman-decimal-lower-letter-lower-roman",
                &[(UpperRoman, "%1."), (Decimal, "%2."), (LowerLetter, "%3."), (LowerRoman, "%4.")],
            ),
            NumberingPreset::new(
                "I.A.1.a (Roman -> Upper Letter -> Decimal -> Lower Letter)",
                "roman-upper-decimal-lower",
                &[(UpperRoman, "%1"), (UpperLetter, "%2"), (Decimal, "%3"), (LowerLetter, "%4")],
            ),
            NumberingPreset::new(
                "1)a)i)(i) (Decimal -> Lower Letter -> Lower Roman -> Lower Roman with Parentheses)",
                "decimal-lower-letter-lower-roman-parentheses",
                &[(Decimal, "%1)"), (LowerLetter, "%2)"), (LowerRoman, "%3)"), (LowerRoman, "(%4)")],
            ),
            NumberingPreset::new(
                "A.1.a.i (Upper Letter -> Decimal -> Lower Letter -> Lower Roman)",
                "upper-letter-decimal-lower-letter-lower-roman",
                &[(UpperLetter, "%1"), (Decimal, "%1.%2"), (LowerLetter, "%1.%2.%3"), (LowerRoman, "%1.%2.%3.%4")],
            ),
        ];

        Self {
            margins,
            line_heights: vec![(1.0, 240), (1.15, 276), (1.25, 300), (1.5, 360), (2.0, 480)],
            numbering,
            bullet: NumberingPreset::new("Bullet list", BULLET_REFERENCE, &[(Bullet, "\u{2022}")]),
            header_styles: HeaderStyleSet::builtin(),
        }
    }

    pub fn margins(&self, name: &str) -> Option<PageMargins> {
        self.margins.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn line_height(&self, multiplier: f64) -> Option<i32> {
        self.line_heights
            .iter()
            .find(|(m, _)| (m - multiplier).abs() < 1e-6)
            .map(|(_, twips)| *twips)
    }

    /// Looks a scheme up by its display label or its reference id.
    pub fn numbering(&self, key: &str) -> Option<&NumberingPreset> {
        self.numbering
            .iter()
            .find(|preset| preset.label == key || preset.reference == key)
    }
}

/// Options for one render pass. Built once per request and never mutated;
/// [`with_numbering_reference`](Self::with_numbering_reference) derives a copy.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub numbering_reference: Option<String>,
    pub show_page_number: bool,
    pub orientation: Orientation,
    pub font_family: String,
    /// Body font size in points.
    pub font_size: f64,
    /// Line spacing in 240ths of a line.
    pub line_height: i32,
    pub margins: PageMargins,
    pub show_table_of_contents: bool,
    pub header_styles: Option<HeaderStyleSetSpec>,
    pub template: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::from_word_config(&WordConfig::default(), &Presets::builtin())
    }
}

impl RenderConfig {
    pub fn from_word_config(config: &WordConfig, presets: &Presets) -> Self {
        let line_height = config.line_height.unwrap_or(DEFAULT_LINE_HEIGHT);
        let line_height = presets.line_height(line_height).unwrap_or_else(|| {
            warn!("Unknown line height {}, using {}", line_height, DEFAULT_LINE_HEIGHT);
            presets.line_height(DEFAULT_LINE_HEIGHT).unwrap_or(276)
        });

        let margins = config.margins.as_deref().unwrap_or(DEFAULT_MARGINS);
        let margins = presets.margins(margins).unwrap_or_else(|| {
            warn!("Unknown margin profile '{}', using '{}'", margins, DEFAULT_MARGINS);
            presets
                .margins(DEFAULT_MARGINS)
                .unwrap_or(PageMargins::new(1440, 1440, 1440, 1440))
        });

        let numbering_reference = if config.show_numbering_in_header.unwrap_or(false) {
            config.numbering_reference.clone().filter(|r| !r.is_empty())
        } else {
            None
        };

        let defaults = HeaderStyleSetSpec::from(&presets.header_styles);
        let header_styles = config
            .header_styles
            .clone()
            .or_else(|| config.flat_styles.to_style_set(&defaults));

        Self {
            numbering_reference,
            show_page_number: config.show_page_number.unwrap_or(false),
            orientation: config.page_orientation.unwrap_or_default(),
            font_family: config
                .font_family
                .clone()
                .filter(|f| !f.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string()),
            font_size: config
                .font_size
                .filter(|s| s.is_finite() && *s > 0.0)
                .unwrap_or(DEFAULT_FONT_SIZE),
            line_height,
            margins,
            show_table_of_contents: config.show_table_of_content.unwrap_or(false),
            header_styles,
            template: config.template.clone().filter(|t| !t.is_empty()),
        }
    }

    pub fn with_numbering_reference(&self, reference: Option<String>) -> Self {
        Self {
            numbering_reference: reference,
            ..self.clone()
        }
    }

    /// Body font size in half-points.
    pub fn font_half_points(&self) -> usize {
        (self.font_size * 2.0).round() as usize
    }

    /// Template id to load, `None` for the blank document.
    pub fn template_id(&self) -> Option<&str> {
        self.template.as_deref().filter(|t| *t != "default")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_service_defaults() {
        let config = RenderConfig::default();
        assert_eq!(config.font_family, "Arial");
        assert_eq!(config.font_half_points(), 24);
        assert_eq!(config.line_height, 276);
        assert_eq!(config.margins, PageMargins::new(1440, 1440, 1440, 1440));
        assert_eq!(config.orientation, Orientation::Portrait);
        assert!(!config.show_page_number);
        assert!(!config.show_table_of_contents);
        assert!(config.numbering_reference.is_none());
        assert!(config.header_styles.is_none());
        assert!(config.template_id().is_none());
    }

    #[test]
    fn numbering_needs_the_header_flag() {
        let presets = Presets::builtin();
        let mut word = WordConfig {
            numbering_reference: Some("1.1.1.1 (Decimal)".into()),
            ..WordConfig::default()
        };
        assert!(RenderConfig::from_word_config(&word, &presets).numbering_reference.is_none());

        word.show_numbering_in_header = Some(true);
        assert_eq!(
            RenderConfig::from_word_config(&word, &presets).numbering_reference.as_deref(),
            Some("1.1.1.1 (Decimal)")
        );
    }

    #[test]
    fn unknown_presets_fall_back() {
        let presets = Presets::builtin();
        let word = WordConfig {
            line_height: Some(3.7),
            margins: Some("enormous".into()),
            ..WordConfig::default()
        };
        let config = RenderConfig::from_word_config(&word, &presets);
        assert_eq!(config.line_height, 276);
        assert_eq!(config.margins, presets.margins("normal").unwrap());
    }

    #[test]
    fn known_presets_resolve() {
        let presets = Presets::builtin();
        let word = WordConfig {
            line_height: Some(2.0),
            margins: Some("Mirrored".into()),
            page_orientation: Some(Orientation::Landscape),
            template: Some("default".into()),
            ..WordConfig::default()
        };
        let config = RenderConfig::from_word_config(&word, &presets);
        assert_eq!(config.line_height, 480);
        assert_eq!(config.margins, PageMargins::new(1440, 1440, 1800, 1440));
        assert_eq!(config.orientation, Orientation::Landscape);
        assert_eq!(config.template_id(), None);
    }

    #[test]
    fn numbering_lookup_by_label_or_reference() {
        let presets = Presets::builtin();
        let by_label = presets.numbering("I.A.1.a (Roman -> Upper Letter -> Decimal -> Lower Letter)");
        let by_reference = presets.numbering("roman-upper-decimal-lower");
        assert_eq!(by_label, by_reference);
        assert_eq!(by_label.unwrap().max_depth(), 3);
        assert!(presets.numbering("nope").is_none());
    }

    #[test]
    fn derived_config_only_changes_numbering() {
        let config = RenderConfig::default();
        let derived = config.with_numbering_reference(Some("decimal-numbering".into()));
        assert_eq!(derived.numbering_reference.as_deref(), Some("decimal-numbering"));
        assert_eq!(derived.font_family, config.font_family);
        assert!(config.numbering_reference.is_none());
    }
}
