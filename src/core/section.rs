use log::{debug, warn};

use crate::core::config::RenderConfig;
use crate::core::content::{ContentRenderer, ItemOutcome};
use crate::core::layout::{FootnoteTable, NumberingRef, RenderNode, SectionNode};
use crate::core::style::{HeaderStyleSetSpec, StyleResolver};

/// Deepest heading paragraph style the writer defines.
pub const MAX_HEADING_STYLE: u32 = 4;
/// Deepest numbering level used for heading repeats (0-based).
pub const MAX_NUMBERING_DEPTH: u32 = 3;

/// Renders a section subtree depth-first: heading, items, numbered heading
/// repeat, then every child in order.
pub struct SectionRenderer<'a> {
    config: &'a RenderConfig,
    resolver: &'a StyleResolver,
    template_styles: Option<&'a HeaderStyleSetSpec>,
    content: ContentRenderer<'a>,
    footnotes: &'a FootnoteTable,
}

impl<'a> SectionRenderer<'a> {
    pub fn new(
        config: &'a RenderConfig,
        resolver: &'a StyleResolver,
        template_styles: Option<&'a HeaderStyleSetSpec>,
        content: ContentRenderer<'a>,
        footnotes: &'a FootnoteTable,
    ) -> Self {
        Self {
            config,
            resolver,
            template_styles,
            content,
            footnotes,
        }
    }

    /// Renders `root` and its descendants in document order. Walks the tree
    /// with an explicit stack, so nesting depth never grows the call stack.
    pub async fn render(&self, root: &SectionNode) -> Vec<RenderNode> {
        let mut out = Vec::new();
        let mut pending = vec![root];
        while let Some(node) = pending.pop() {
            let before = out.len();
            self.render_own(node, &mut out).await;
            debug!(
                "Rendered section '{}' ({} children, {} nodes)",
                node.section.section_id,
                node.children.len(),
                out.len() - before
            );
            pending.extend(node.children.iter().rev());
        }
        out
    }

    // Heading, items and numbered repeat of one section, without its children.
    async fn render_own(&self, node: &SectionNode, out: &mut Vec<RenderNode>) {
        let section = &node.section;

        if let Some(heading) = section.heading() {
            out.push(self.heading(heading, section.level()));
        }

        for (item_idx, item) in section.content.iter().enumerate() {
            let footnote = self.footnotes.id_for(node.index, item_idx);
            match self.content.render(item, footnote).await {
                ItemOutcome::Rendered(nodes) => out.extend(nodes),
                ItemOutcome::Recovered { nodes, reason } => {
                    warn!(
                        "Section '{}' item {} ({}): {}",
                        section.section_id,
                        item_idx,
                        item.kind.as_str(),
                        reason
                    );
                    out.extend(nodes);
                }
                ItemOutcome::Skipped(reason) => {
                    warn!(
                        "Section '{}' item {} ({}) skipped: {}",
                        section.section_id,
                        item_idx,
                        item.kind.as_str(),
                        reason
                    );
                }
            }
        }

        if let (Some(reference), Some(heading)) = (&self.config.numbering_reference, section.heading()) {
            out.push(RenderNode::NumberedHeading {
                text: heading.to_string(),
                level: heading_style_level(section.level()),
                numbering: NumberingRef {
                    reference: reference.clone(),
                    level: numbering_depth(section.level()),
                },
            });
        }
    }

    fn heading(&self, text: &str, level: u32) -> RenderNode {
        let style = self
            .resolver
            .resolve(level, self.config.header_styles.as_ref(), self.template_styles);

        let style = match style.check("heading") {
            Ok(()) => Some(style),
            Err(e) => {
                warn!("Heading '{}' falls back to the plain heading style: {}", text, e);
                None
            }
        };

        RenderNode::Heading {
            text: text.to_string(),
            level: heading_style_level(level),
            style,
        }
    }
}

/// Heading paragraph style for `level`; levels without a style use 1.
pub fn heading_style_level(level: u32) -> u8 {
    if (1..=MAX_HEADING_STYLE).contains(&level) {
        level as u8
    } else {
        1
    }
}

/// Numbering level for a heading at `level`.
pub fn numbering_depth(level: u32) -> u8 {
    level.saturating_sub(1).min(MAX_NUMBERING_DEPTH) as u8
}
