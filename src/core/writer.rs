use std::collections::HashMap;
use std::io::Cursor;

use anyhow::Result;
use docx_rs::{
    read_docx, AbstractNumbering, AlignmentType, BreakType, Docx, Footer, Footnote, Header, IndentLevel, Level,
    LevelJc, LevelText, LineSpacing, NumPages, NumberFormat, Numbering, NumberingId, PageMargin, PageNum,
    PageOrientationType, Paragraph, Pic, Run, RunFonts, Start, Style, StyleType, Table, TableCell,
    TableOfContents, TableRow, WidthType,
};
use log::{debug, warn};

use crate::core::config::{NumberingPreset, Orientation};
use crate::core::layout::{
    BandLine, DocumentTree, FootnoteTable, ImageNode, NumberingRef, PageBand, RenderNode, TableNode,
    IMAGE_PLACEHOLDER, TOC_MAX_LEVEL,
};
use crate::core::model::Alignment;
use crate::core::style::HeaderStyle;

/// A4 in twips.
const PAGE_SHORT_EDGE: u32 = 11906;
const PAGE_LONG_EDGE: u32 = 16838;
const EMU_PER_PIXEL: u32 = 9525;
const TITLE_SIZE: usize = 64;
const TOC_TITLE_SIZE: usize = 32;

/// Turns a finished [`DocumentTree`] into file bytes.
pub trait DocumentSerializer: Send + Sync {
    fn serialize(&self, tree: &DocumentTree) -> Result<Vec<u8>>;
}

/// Writes `.docx` packages through `docx-rs`.
#[derive(Debug, Default)]
pub struct DocxWriter;

impl DocumentSerializer for DocxWriter {
    fn serialize(&self, tree: &DocumentTree) -> Result<Vec<u8>> {
        let docx = self.base_document(tree);
        let docx = self.apply_page_setup(docx, tree);
        let (docx, numbering_ids) = self.register_numbering(docx, &tree.numbering);

        let mut docx = docx;
        if let Some(band) = &tree.header {
            docx = docx.header(band_paragraphs(band).into_iter().fold(Header::new(), Header::add_paragraph));
        }
        if let Some(band) = &tree.footer {
            docx = docx.footer(band_paragraphs(band).into_iter().fold(Footer::new(), Footer::add_paragraph));
        }

        let body = BodyWriter {
            numbering_ids: &numbering_ids,
            footnotes: &tree.footnotes,
        };
        for node in &tree.body {
            docx = body.write(docx, node);
        }

        let mut out = Cursor::new(Vec::new());
        docx.build().pack(&mut out)?;
        let bytes = out.into_inner();
        debug!("Serialized {} nodes into {} bytes", tree.body.len(), bytes.len());
        Ok(bytes)
    }
}

impl DocxWriter {
    pub fn new() -> Self {
        Self
    }

    fn base_document(&self, tree: &DocumentTree) -> Docx {
        if let Some(bytes) = &tree.base_template {
            match read_docx(bytes) {
                Ok(docx) => return docx,
                Err(e) => warn!("Template package could not be opened, starting blank: {}", e),
            }
        }
        heading_styles(Docx::new())
    }

    fn apply_page_setup(&self, docx: Docx, tree: &DocumentTree) -> Docx {
        let margins = &tree.page.margins;
        let docx = match tree.page.orientation {
            Orientation::Portrait => docx.page_size(PAGE_SHORT_EDGE, PAGE_LONG_EDGE),
            Orientation::Landscape => docx
                .page_size(PAGE_LONG_EDGE, PAGE_SHORT_EDGE)
                .page_orient(PageOrientationType::Landscape),
        };

        let font = &tree.styles.font_family;
        docx.page_margin(
            PageMargin::new()
                .top(margins.top)
                .bottom(margins.bottom)
                .left(margins.left)
                .right(margins.right),
        )
        .default_fonts(RunFonts::new().ascii(font).hi_ansi(font))
        .default_size(tree.styles.font_size)
        .default_line_spacing(LineSpacing::new().line(tree.styles.line_height))
    }

    // Numbering ids start at 1, in registration order.
    fn register_numbering(&self, mut docx: Docx, presets: &[NumberingPreset]) -> (Docx, HashMap<String, usize>) {
        let mut ids = HashMap::new();
        for (idx, preset) in presets.iter().enumerate() {
            let id = idx + 1;
            let abstract_numbering = preset
                .levels
                .iter()
                .enumerate()
                .fold(AbstractNumbering::new(id), |abs, (lvl, level)| {
                    abs.add_level(Level::new(
                        lvl,
                        Start::new(1),
                        NumberFormat::new(level.format.as_ooxml()),
                        LevelText::new(&level.text),
                        LevelJc::new("left"),
                    ))
                });
            docx = docx
                .add_abstract_numbering(abstract_numbering)
                .add_numbering(Numbering::new(id, id));
            ids.insert(preset.reference.clone(), id);
        }
        (docx, ids)
    }
}

// Named styles for the blank document so the table of contents can find the
// headings. Templates bring their own.
fn heading_styles(docx: Docx) -> Docx {
    let docx = docx.add_style(Style::new("Title", StyleType::Paragraph).name("Title"));
    (1..=TOC_MAX_LEVEL).fold(docx, |docx, level| {
        docx.add_style(
            Style::new(&format!("Heading{}", level), StyleType::Paragraph)
                .name(&format!("Heading {}", level))
                .bold(),
        )
    })
}

fn alignment(alignment: Alignment) -> AlignmentType {
    match alignment {
        Alignment::Left => AlignmentType::Left,
        Alignment::Center => AlignmentType::Center,
        Alignment::Right => AlignmentType::Right,
    }
}

fn band_paragraphs(band: &PageBand) -> Vec<Paragraph> {
    band.lines
        .iter()
        .map(|line| match line {
            BandLine::Text { text, alignment: align } => Paragraph::new()
                .add_run(Run::new().add_text(text))
                .align(alignment(*align)),
            BandLine::PageNumbers => Paragraph::new()
                .add_run(Run::new().add_text("Page "))
                .add_page_num(PageNum::new())
                .add_run(Run::new().add_text(" of "))
                .add_num_pages(NumPages::new()),
        })
        .collect()
}

fn styled_run(text: &str, style: &HeaderStyle) -> Run {
    let run = Run::new()
        .add_text(text)
        .size(style.half_points())
        .color(&style.color)
        .fonts(RunFonts::new().ascii(&style.font).hi_ansi(&style.font));
    if style.bold {
        run.bold()
    } else {
        run
    }
}

struct BodyWriter<'a> {
    numbering_ids: &'a HashMap<String, usize>,
    footnotes: &'a FootnoteTable,
}

impl BodyWriter<'_> {
    fn write(&self, docx: Docx, node: &RenderNode) -> Docx {
        match node {
            RenderNode::Title { text } => docx.add_paragraph(
                Paragraph::new()
                    .style("Title")
                    .add_run(Run::new().add_text(text).size(TITLE_SIZE))
                    .line_spacing(LineSpacing::new().after(240)),
            ),
            RenderNode::Heading { text, level, style } => {
                let run = match style {
                    Some(style) => styled_run(text, style),
                    None => Run::new().add_text(text).bold(),
                };
                docx.add_paragraph(
                    Paragraph::new()
                        .style(&format!("Heading{}", level))
                        .add_run(run),
                )
            }
            RenderNode::NumberedHeading { text, level, numbering } => {
                let paragraph = Paragraph::new()
                    .style(&format!("Heading{}", level))
                    .add_run(Run::new().add_text(text));
                docx.add_paragraph(self.numbered(paragraph, numbering))
            }
            RenderNode::ListItem { text, numbering, footnote } => {
                let paragraph = self.with_footnote(Paragraph::new().add_run(Run::new().add_text(text)), *footnote);
                docx.add_paragraph(self.numbered(paragraph, numbering))
            }
            RenderNode::Paragraph { text, footnote } => {
                let paragraph = Paragraph::new().add_run(Run::new().add_text(text));
                docx.add_paragraph(self.with_footnote(paragraph, *footnote))
            }
            RenderNode::FootnoteAnchor { id } => docx.add_paragraph(self.with_footnote(Paragraph::new(), Some(*id))),
            RenderNode::Table(table) => docx.add_table(build_table(table)),
            RenderNode::Image(image) => docx.add_paragraph(image_paragraph(image)),
            RenderNode::PageBreak => {
                docx.add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page)))
            }
            RenderNode::EmptyLine => docx.add_paragraph(Paragraph::new()),
            RenderNode::Placeholder { text } => {
                docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(text).italic()))
            }
            RenderNode::TableOfContents { title, max_level } => docx
                .add_paragraph(
                    Paragraph::new()
                        .add_run(Run::new().add_text(title).bold().size(TOC_TITLE_SIZE))
                        .line_spacing(LineSpacing::new().after(120)),
                )
                .add_table_of_contents(TableOfContents::new().heading_styles_range(1, *max_level as usize)),
        }
    }

    fn numbered(&self, paragraph: Paragraph, numbering: &NumberingRef) -> Paragraph {
        match self.numbering_ids.get(&numbering.reference) {
            Some(id) => paragraph.numbering(NumberingId::new(*id), IndentLevel::new(numbering.level as usize)),
            None => {
                warn!("Numbering '{}' is not registered, writing plain text", numbering.reference);
                paragraph
            }
        }
    }

    fn with_footnote(&self, paragraph: Paragraph, footnote: Option<u32>) -> Paragraph {
        match footnote.and_then(|id| self.footnotes.note(id)) {
            Some(note) => paragraph.add_run(Run::new().add_footnote_reference(
                Footnote::new().add_content(Paragraph::new().add_run(Run::new().add_text(note))),
            )),
            None => paragraph,
        }
    }
}

fn build_table(table: &TableNode) -> Table {
    let rows = table
        .rows
        .iter()
        .map(|row| {
            let cells: Vec<TableCell> = if row.cells.is_empty() {
                vec![TableCell::new().add_paragraph(Paragraph::new())]
            } else {
                row.cells
                    .iter()
                    .map(|text| {
                        let run = Run::new().add_text(text);
                        let paragraph = if row.header {
                            Paragraph::new().add_run(run.bold()).align(AlignmentType::Center)
                        } else {
                            Paragraph::new().add_run(run)
                        };
                        TableCell::new().add_paragraph(paragraph)
                    })
                    .collect()
            };
            TableRow::new(cells)
        })
        .collect();
    Table::new(rows).width(5000, WidthType::Pct)
}

// docx-rs decodes the picture itself and does not recover from bad bytes,
// so they are checked first.
fn image_paragraph(image: &ImageNode) -> Paragraph {
    if let Err(e) = image::load_from_memory(&image.data) {
        warn!("Image data is not decodable, writing placeholder: {}", e);
        return Paragraph::new().add_run(Run::new().add_text(IMAGE_PLACEHOLDER).italic());
    }
    let pic = Pic::new(&image.data).size(emu(image.width), emu(image.height));
    Paragraph::new().add_run(Run::new().add_image(pic))
}

fn emu(pixels: u32) -> u32 {
    pixels.saturating_mul(EMU_PER_PIXEL)
}
