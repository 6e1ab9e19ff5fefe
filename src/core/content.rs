//! Turns one content item into render nodes.
//!
//! Each item yields an [`ItemOutcome`] instead of an error, so one bad item can
//! never take its siblings or its section down with it.

use thiserror::Error;

use crate::core::layout::{
    ImageNode, NumberingRef, RenderNode, TableNode, TableRowNode, IMAGE_PLACEHOLDER,
    UNSUPPORTED_PLACEHOLDER,
};
use crate::core::model::{ContentItem, ContentKind};
use crate::utils::image_fetcher::ImageSource;

pub const DEFAULT_IMAGE_WIDTH: u32 = 400;
pub const DEFAULT_IMAGE_HEIGHT: u32 = 300;
/// Largest width or height, in pixels, an image may be drawn at.
pub const MAX_IMAGE_DIMENSION: u32 = 4000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ItemError {
    #[error("unsupported content type `{0}`")]
    Unsupported(String),
    #[error("image `{0}` could not be loaded")]
    ImageUnavailable(String),
    #[error("`{kind}` item has no `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("table has neither headers nor rows")]
    EmptyTable,
}

/// Result of rendering a single item.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Rendered(Vec<RenderNode>),
    /// The item failed but left a visible placeholder.
    Recovered {
        nodes: Vec<RenderNode>,
        reason: ItemError,
    },
    /// The item produced nothing.
    Skipped(ItemError),
}

impl ItemOutcome {
    pub fn nodes(&self) -> &[RenderNode] {
        match self {
            ItemOutcome::Rendered(nodes) | ItemOutcome::Recovered { nodes, .. } => nodes,
            ItemOutcome::Skipped(_) => &[],
        }
    }

    /// Places footnote `id` on the outcome's nodes. A skipped item keeps its
    /// note as a bare anchor, so every numbered footnote reaches the document.
    pub fn with_footnote(self, id: u32) -> Self {
        match self {
            ItemOutcome::Rendered(mut nodes) => {
                RenderNode::attach_footnote(&mut nodes, id);
                ItemOutcome::Rendered(nodes)
            }
            ItemOutcome::Recovered { mut nodes, reason } => {
                RenderNode::attach_footnote(&mut nodes, id);
                ItemOutcome::Recovered { nodes, reason }
            }
            ItemOutcome::Skipped(reason) => ItemOutcome::Recovered {
                nodes: vec![RenderNode::FootnoteAnchor { id }],
                reason,
            },
        }
    }

    pub fn into_nodes(self) -> Vec<RenderNode> {
        match self {
            ItemOutcome::Rendered(nodes) | ItemOutcome::Recovered { nodes, .. } => nodes,
            ItemOutcome::Skipped(_) => Vec::new(),
        }
    }
}

pub struct ContentRenderer<'a> {
    images: &'a dyn ImageSource,
    bullet_reference: &'a str,
}

impl<'a> ContentRenderer<'a> {
    pub fn new(images: &'a dyn ImageSource, bullet_reference: &'a str) -> Self {
        Self {
            images,
            bullet_reference,
        }
    }

    /// Renders `item`. `footnote` is the id the item's footnote was given, if
    /// it declares one.
    pub async fn render(&self, item: &ContentItem, footnote: Option<u32>) -> ItemOutcome {
        let outcome = self.render_item(item).await;
        match footnote {
            Some(id) => outcome.with_footnote(id),
            None => outcome,
        }
    }

    async fn render_item(&self, item: &ContentItem) -> ItemOutcome {
        match &item.kind {
            ContentKind::Paragraph => match item.text.as_deref().filter(|t| !t.is_empty()) {
                Some(text) => ItemOutcome::Rendered(vec![RenderNode::Paragraph {
                    text: text.to_string(),
                    footnote: None,
                }]),
                None => ItemOutcome::Rendered(Vec::new()),
            },
            ContentKind::Listing => self.listing(item),
            ContentKind::Table => table(item),
            ContentKind::PageBreak => ItemOutcome::Rendered(vec![RenderNode::PageBreak]),
            ContentKind::EmptyLine => ItemOutcome::Rendered(vec![RenderNode::EmptyLine]),
            ContentKind::Image => self.image(item).await,
            ContentKind::Unsupported(tag) => ItemOutcome::Recovered {
                nodes: vec![RenderNode::placeholder(UNSUPPORTED_PLACEHOLDER)],
                reason: ItemError::Unsupported(tag.clone()),
            },
        }
    }

    fn listing(&self, item: &ContentItem) -> ItemOutcome {
        let Some(entries) = &item.items else {
            return ItemOutcome::Skipped(ItemError::MissingField {
                kind: "listing",
                field: "items",
            });
        };

        ItemOutcome::Rendered(
            entries
                .iter()
                .map(|entry| RenderNode::ListItem {
                    text: entry.clone(),
                    numbering: NumberingRef {
                        reference: self.bullet_reference.to_string(),
                        level: 0,
                    },
                    footnote: None,
                })
                .collect(),
        )
    }

    async fn image(&self, item: &ContentItem) -> ItemOutcome {
        let Some(url) = item.url.as_deref().filter(|u| !u.is_empty()) else {
            return ItemOutcome::Skipped(ItemError::MissingField {
                kind: "image",
                field: "url",
            });
        };

        match self.images.fetch_and_resize(url).await {
            Some(data) => ItemOutcome::Rendered(vec![RenderNode::Image(ImageNode {
                data,
                width: dimension(item.width, DEFAULT_IMAGE_WIDTH),
                height: dimension(item.height, DEFAULT_IMAGE_HEIGHT),
                alt: item.alt.clone(),
            })]),
            None => ItemOutcome::Recovered {
                nodes: vec![RenderNode::placeholder(IMAGE_PLACEHOLDER)],
                reason: ItemError::ImageUnavailable(url.to_string()),
            },
        }
    }
}

// Row widths are not checked against the header; rows render as given.
fn table(item: &ContentItem) -> ItemOutcome {
    if item.headers.is_none() && item.rows.is_none() {
        return ItemOutcome::Skipped(ItemError::EmptyTable);
    }

    let mut rows = Vec::new();
    if let Some(headers) = &item.headers {
        rows.push(TableRowNode {
            cells: headers.clone(),
            header: true,
        });
    }
    for row in item.rows.iter().flatten() {
        rows.push(TableRowNode {
            cells: row.cells.iter().map(|cell| cell.text.clone()).collect(),
            header: false,
        });
    }

    ItemOutcome::Rendered(vec![RenderNode::Table(TableNode { rows })])
}

fn dimension(value: Option<f64>, default: u32) -> u32 {
    match value {
        Some(v) if v.is_finite() && v >= 1.0 => v.round().min(MAX_IMAGE_DIMENSION as f64) as u32,
        _ => default,
    }
}
