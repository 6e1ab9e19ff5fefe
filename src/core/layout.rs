//! In-memory output tree, independent of the file format it is later written to.

use std::collections::{BTreeMap, HashMap};

use crate::core::config::{NumberingPreset, Orientation, PageMargins};
use crate::core::model::{Alignment, Section};
use crate::core::style::HeaderStyle;

pub const IMAGE_PLACEHOLDER: &str = "<place image here>";
pub const UNSUPPORTED_PLACEHOLDER: &str = "Unsupported content type.";
pub const TOC_TITLE: &str = "Table of Contents";
/// Deepest heading style the table of contents picks up.
pub const TOC_MAX_LEVEL: u8 = 4;

/// A section with its nested children. Built per request by the hierarchy
/// builder and dropped after rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionNode {
    /// Position of the section in the flat input list.
    pub index: usize,
    pub section: Section,
    pub children: Vec<SectionNode>,
}

impl SectionNode {
    /// Number of nodes in this subtree, including itself.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(SectionNode::len).sum::<usize>()
    }
}

/// Numbering attached to a paragraph: which scheme and at which depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumberingRef {
    pub reference: String,
    pub level: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    Title {
        text: String,
    },
    /// Styled section heading. `style` is `None` for the plain fallback.
    Heading {
        text: String,
        level: u8,
        style: Option<HeaderStyle>,
    },
    /// Heading repeated as an entry of the auto-numbering list.
    NumberedHeading {
        text: String,
        level: u8,
        numbering: NumberingRef,
    },
    Paragraph {
        text: String,
        footnote: Option<u32>,
    },
    ListItem {
        text: String,
        numbering: NumberingRef,
        footnote: Option<u32>,
    },
    Table(TableNode),
    Image(ImageNode),
    PageBreak,
    EmptyLine,
    /// Visible stand-in for content that could not be rendered.
    Placeholder {
        text: String,
    },
    TableOfContents {
        title: String,
        max_level: u8,
    },
    /// Footnote reference standing on its own line, for items whose nodes
    /// cannot carry one.
    FootnoteAnchor {
        id: u32,
    },
}

impl RenderNode {
    pub fn placeholder(text: &str) -> Self {
        RenderNode::Placeholder {
            text: text.to_string(),
        }
    }

    /// Puts footnote `id` on the last node when it is text that can hold a
    /// reference, otherwise appends a [`RenderNode::FootnoteAnchor`].
    pub fn attach_footnote(nodes: &mut Vec<RenderNode>, id: u32) {
        match nodes.last_mut() {
            Some(RenderNode::Paragraph { footnote, .. }) | Some(RenderNode::ListItem { footnote, .. })
                if footnote.is_none() =>
            {
                *footnote = Some(id);
            }
            _ => nodes.push(RenderNode::FootnoteAnchor { id }),
        }
    }

    pub fn is_heading(&self) -> bool {
        matches!(self, RenderNode::Heading { .. } | RenderNode::NumberedHeading { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableNode {
    pub rows: Vec<TableRowNode>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TableRowNode {
    pub cells: Vec<String>,
    /// Bold, centered and repeated at the top of every page.
    pub header: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageNode {
    pub data: Vec<u8>,
    /// Pixels.
    pub width: u32,
    pub height: u32,
    pub alt: Option<String>,
}

/// Content of the page header or footer.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageBand {
    pub lines: Vec<BandLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BandLine {
    Text { text: String, alignment: Alignment },
    /// "Page X of Y".
    PageNumbers,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageSetup {
    pub orientation: Orientation,
    pub margins: PageMargins,
}

/// Document-wide run and paragraph defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStyles {
    pub font_family: String,
    /// Half-points.
    pub font_size: usize,
    /// 240ths of a line.
    pub line_height: i32,
}

/// Footnote bodies keyed by sequential id, plus where each one was declared.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FootnoteTable {
    notes: BTreeMap<u32, String>,
    by_item: HashMap<(usize, usize), u32>,
}

impl FootnoteTable {
    /// Scans every section's items in input order, numbering footnotes from 1.
    pub fn collect(sections: &[Section]) -> Self {
        let mut table = Self::default();
        let mut next_id = 1;
        for (section_idx, section) in sections.iter().enumerate() {
            for (item_idx, item) in section.content.iter().enumerate() {
                if let Some(footnote) = &item.footnote {
                    table.notes.insert(next_id, footnote.note.clone());
                    table.by_item.insert((section_idx, item_idx), next_id);
                    next_id += 1;
                }
            }
        }
        table
    }

    /// Footnote id declared by item `item` of the section at input position
    /// `section`.
    pub fn id_for(&self, section: usize, item: usize) -> Option<u32> {
        self.by_item.get(&(section, item)).copied()
    }

    pub fn note(&self, id: u32) -> Option<&str> {
        self.notes.get(&id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.notes.iter().map(|(id, note)| (*id, note.as_str()))
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Everything the writer needs to produce the final file.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentTree {
    pub header: Option<PageBand>,
    pub footer: Option<PageBand>,
    pub body: Vec<RenderNode>,
    pub page: PageSetup,
    pub styles: GlobalStyles,
    /// Numbering schemes in registration order; the bullet scheme is first.
    pub numbering: Vec<NumberingPreset>,
    pub footnotes: FootnoteTable,
    /// Raw bytes of the template the document starts from, if any.
    pub base_template: Option<Vec<u8>>,
}

/// Counts used for logging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub total_nodes: usize,
    pub heading_count: usize,
    pub table_count: usize,
    pub image_count: usize,
    pub placeholder_count: usize,
}

impl DocumentTree {
    pub fn metadata(&self) -> DocumentMetadata {
        let mut metadata = DocumentMetadata {
            total_nodes: self.body.len(),
            ..DocumentMetadata::default()
        };
        for node in &self.body {
            match node {
                RenderNode::Heading { .. } | RenderNode::NumberedHeading { .. } => metadata.heading_count += 1,
                RenderNode::Table(_) => metadata.table_count += 1,
                RenderNode::Image(_) => metadata.image_count += 1,
                RenderNode::Placeholder { .. } => metadata.placeholder_count += 1,
                _ => {}
            }
        }
        metadata
    }
}
