//! Wire model of a generation request.
//!
//! Field names follow the JSON the generator is fed (`sectionId`,
//! `parentSectionId`, `wordConfig`, ...). Everything except the title and the
//! section ids is optional; defaults are applied later by
//! [`RenderConfig`](crate::core::config::RenderConfig).

use serde::{Deserialize, Serialize};

use crate::core::config::Orientation;
use crate::core::style::{HeaderStyleSetSpec, HeaderStyleSpec};

/// A full request: title, optional page bands, sections and render options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header: Option<PageBandText>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<PageBandText>,
    #[serde(default)]
    pub sections: Vec<Section>,
    #[serde(default)]
    pub word_config: WordConfig,
}

impl GenerateRequest {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rejects requests that would only produce a title page.
    pub fn validate(&self) -> crate::Result<()> {
        if self.sections.is_empty() {
            return Err(crate::Error::NoSections);
        }
        Ok(())
    }
}

/// Header or footer text with its horizontal alignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PageBandText {
    pub text: String,
    #[serde(default)]
    pub alignment: Alignment,
}

/// Matched case-insensitively; anything unrecognised is left-aligned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

impl From<String> for Alignment {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "center" => Alignment::Center,
            "right" => Alignment::Right,
            _ => Alignment::Left,
        }
    }
}

/// One section of the flat input list. Nesting is expressed through
/// `parent_section_id` and rebuilt by the hierarchy builder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub section_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heading_level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_section_id: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentItem>,
}

impl Section {
    /// Heading text, ignoring empty strings.
    pub fn heading(&self) -> Option<&str> {
        self.heading.as_deref().filter(|h| !h.is_empty())
    }

    /// Heading level, defaulting to 1.
    pub fn level(&self) -> u32 {
        self.heading_level.unwrap_or(1).max(1)
    }

    /// Parent id, ignoring empty strings.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_section_id.as_deref().filter(|p| !p.is_empty())
    }
}

/// Kind tag of a content item. Unknown tags are kept rather than rejected so
/// they can be rendered as a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(from = "String", into = "String")]
pub enum ContentKind {
    #[default]
    Paragraph,
    Listing,
    Table,
    PageBreak,
    EmptyLine,
    Image,
    Unsupported(String),
}

impl From<String> for ContentKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "paragraph" => ContentKind::Paragraph,
            "listing" => ContentKind::Listing,
            "table" => ContentKind::Table,
            "pageBreak" => ContentKind::PageBreak,
            "emptyLine" => ContentKind::EmptyLine,
            "image" => ContentKind::Image,
            _ => ContentKind::Unsupported(tag),
        }
    }
}

impl From<ContentKind> for String {
    fn from(kind: ContentKind) -> Self {
        kind.as_str().to_string()
    }
}

impl ContentKind {
    pub fn as_str(&self) -> &str {
        match self {
            ContentKind::Paragraph => "paragraph",
            ContentKind::Listing => "listing",
            ContentKind::Table => "table",
            ContentKind::PageBreak => "pageBreak",
            ContentKind::EmptyLine => "emptyLine",
            ContentKind::Image => "image",
            ContentKind::Unsupported(tag) => tag,
        }
    }
}

/// A single renderable item inside a section. The payload fields are a union;
/// which ones matter depends on `kind`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: ContentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<TableRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footnote: Option<FootnoteText>,
}

impl ContentItem {
    pub fn paragraph(text: &str) -> Self {
        Self {
            kind: ContentKind::Paragraph,
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn of_kind(kind: ContentKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TableRow {
    #[serde(default)]
    pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TableCell {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FootnoteText {
    pub note: String,
}

/// Render options as sent by the caller. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct WordConfig {
    pub font_size: Option<f64>,
    pub line_height: Option<f64>,
    pub font_family: Option<String>,
    pub show_page_number: Option<bool>,
    pub show_table_of_content: Option<bool>,
    pub show_numbering_in_header: Option<bool>,
    pub numbering_reference: Option<String>,
    pub page_orientation: Option<Orientation>,
    pub margins: Option<String>,
    pub header_styles: Option<HeaderStyleSetSpec>,
    pub template: Option<String>,
    #[serde(flatten)]
    pub flat_styles: FlatHeaderStyles,
}

/// Per-level style settings given as individual fields (`h1Font`, `h2Size`,
/// `h3Bold`, ...). `hNBold` may arrive as a boolean or as the string
/// `"false"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct FlatHeaderStyles {
    pub h1_font: Option<String>,
    pub h1_size: Option<f64>,
    pub h1_bold: Option<serde_json::Value>,
    pub h1_color: Option<String>,
    pub h2_font: Option<String>,
    pub h2_size: Option<f64>,
    pub h2_bold: Option<serde_json::Value>,
    pub h2_color: Option<String>,
    pub h3_font: Option<String>,
    pub h3_size: Option<f64>,
    pub h3_bold: Option<serde_json::Value>,
    pub h3_color: Option<String>,
}

impl FlatHeaderStyles {
    fn is_empty(&self) -> bool {
        self.h1_font.is_none()
            && self.h1_size.is_none()
            && self.h1_bold.is_none()
            && self.h1_color.is_none()
            && self.h2_font.is_none()
            && self.h2_size.is_none()
            && self.h2_bold.is_none()
            && self.h2_color.is_none()
            && self.h3_font.is_none()
            && self.h3_size.is_none()
            && self.h3_bold.is_none()
            && self.h3_color.is_none()
    }

    /// Builds a complete style set from the flat fields, filling gaps from
    /// `defaults`. Returns `None` when no flat field was sent at all.
    pub fn to_style_set(&self, defaults: &HeaderStyleSetSpec) -> Option<HeaderStyleSetSpec> {
        if self.is_empty() {
            return None;
        }

        let level = |font: &Option<String>,
                     size: Option<f64>,
                     bold: &Option<serde_json::Value>,
                     color: &Option<String>,
                     fallback: &Option<HeaderStyleSpec>| {
            let fallback = fallback.clone().unwrap_or_default();
            HeaderStyleSpec {
                size: size.or(fallback.size),
                color: color.clone().or(fallback.color),
                font: font.clone().or(fallback.font),
                bold: bold.as_ref().map(flag).or(fallback.bold),
            }
        };

        Some(HeaderStyleSetSpec {
            h1: Some(level(&self.h1_font, self.h1_size, &self.h1_bold, &self.h1_color, &defaults.h1)),
            h2: Some(level(&self.h2_font, self.h2_size, &self.h2_bold, &self.h2_color, &defaults.h2)),
            h3: Some(level(&self.h3_font, self.h3_size, &self.h3_bold, &self.h3_color, &defaults.h3)),
        })
    }
}

// Anything but an explicit false counts as bold.
fn flag(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => !s.eq_ignore_ascii_case("false"),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_content_type_is_kept() {
        let item: ContentItem = serde_json::from_str(r#"{"type":"quiz"}"#).unwrap();
        assert_eq!(item.kind, ContentKind::Unsupported("quiz".to_string()));
        assert_eq!(item.kind.as_str(), "quiz");
    }

    #[test]
    fn parses_minimal_request() {
        let json = r#"{
            "title": "Report",
            "sections": [
                {"sectionId": "a", "heading": "Intro", "headingLevel": 1,
                 "content": [{"type": "paragraph", "text": "Hello"}]},
                {"sectionId": "b", "parentSectionId": "a"}
            ]
        }"#;
        let request = GenerateRequest::from_json(json).unwrap();
        assert_eq!(request.sections.len(), 2);
        assert_eq!(request.sections[0].heading(), Some("Intro"));
        assert_eq!(request.sections[1].parent_id(), Some("a"));
        assert!(request.sections[1].content.is_empty());
        assert_eq!(request.word_config, WordConfig::default());
    }

    #[test]
    fn alignment_ignores_case() {
        let band = |alignment: &str| -> PageBandText {
            serde_json::from_str(&format!(r#"{{"text": "t", "alignment": "{}"}}"#, alignment)).unwrap()
        };
        assert_eq!(band("Center").alignment, Alignment::Center);
        assert_eq!(band("RIGHT").alignment, Alignment::Right);
        assert_eq!(band("left").alignment, Alignment::Left);
        assert_eq!(band("justify").alignment, Alignment::Left);
        assert_eq!(serde_json::to_string(&Alignment::Center).unwrap(), r#""center""#);
    }

    #[test]
    fn request_without_sections_is_rejected() {
        let request = GenerateRequest::from_json(r#"{"title": "Empty"}"#).unwrap();
        assert!(matches!(request.validate(), Err(crate::Error::NoSections)));
    }

    #[test]
    fn empty_strings_count_as_absent() {
        let section = Section {
            section_id: "x".into(),
            heading: Some(String::new()),
            parent_section_id: Some(String::new()),
            ..Section::default()
        };
        assert_eq!(section.heading(), None);
        assert_eq!(section.parent_id(), None);
        assert_eq!(section.level(), 1);
    }

    #[test]
    fn flat_styles_fill_missing_fields_from_defaults() {
        let config: WordConfig =
            serde_json::from_str(r#"{"h1Font": "Georgia", "h2Bold": "false", "h3Size": 11}"#).unwrap();
        let defaults = HeaderStyleSetSpec::from(&crate::core::style::HeaderStyleSet::builtin());
        let set = config.flat_styles.to_style_set(&defaults).unwrap();

        let h1 = set.h1.unwrap();
        assert_eq!(h1.font.as_deref(), Some("Georgia"));
        assert_eq!(h1.size, Some(14.0));
        assert_eq!(set.h2.unwrap().bold, Some(false));
        assert_eq!(set.h3.unwrap().size, Some(11.0));
    }

    #[test]
    fn no_flat_styles_means_no_caller_set() {
        let defaults = HeaderStyleSetSpec::default();
        assert!(FlatHeaderStyles::default().to_style_set(&defaults).is_none());
    }
}
