//! Builds the whole document for one request and hands it off for storage.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};

use crate::core::config::{Presets, RenderConfig};
use crate::core::content::ContentRenderer;
use crate::core::hierarchy::SectionHierarchy;
use crate::core::layout::{
    BandLine, DocumentTree, FootnoteTable, GlobalStyles, PageBand, PageSetup, RenderNode, TOC_MAX_LEVEL,
    TOC_TITLE,
};
use crate::core::model::{GenerateRequest, PageBandText, Section};
use crate::core::section::SectionRenderer;
use crate::core::style::StyleResolver;
use crate::core::template::{TemplateDocument, TemplateSource};
use crate::core::writer::DocumentSerializer;
use crate::error::{Error, Result};
use crate::utils::artifact_store::{artifact_name, ArtifactStore};
use crate::utils::image_fetcher::ImageSource;

pub struct DocumentAssembler {
    presets: Presets,
    resolver: StyleResolver,
    images: Arc<dyn ImageSource>,
    templates: Arc<dyn TemplateSource>,
    serializer: Arc<dyn DocumentSerializer>,
    store: Arc<dyn ArtifactStore>,
}

impl DocumentAssembler {
    pub fn new(
        presets: Presets,
        images: Arc<dyn ImageSource>,
        templates: Arc<dyn TemplateSource>,
        serializer: Arc<dyn DocumentSerializer>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let resolver = StyleResolver::new(presets.header_styles.clone());
        Self {
            presets,
            resolver,
            images,
            templates,
            serializer,
            store,
        }
    }

    pub fn presets(&self) -> &Presets {
        &self.presets
    }

    /// Renders `request`, stores the file and returns its name.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let config = RenderConfig::from_word_config(&request.word_config, &self.presets);
        self.assemble(
            &request.title,
            request.header.as_ref(),
            request.footer.as_ref(),
            &request.sections,
            &config,
        )
        .await
    }

    /// If the full document cannot be serialized, a title-only document is
    /// stored instead. Errors are returned only when nothing could be stored.
    pub async fn assemble(
        &self,
        title: &str,
        header: Option<&PageBandText>,
        footer: Option<&PageBandText>,
        sections: &[Section],
        config: &RenderConfig,
    ) -> Result<String> {
        let tree = self.build_tree(title, header, footer, sections, config).await;
        let metadata = tree.metadata();
        info!(
            "Assembled '{}': {} nodes, {} headings, {} tables, {} images, {} placeholders",
            title,
            metadata.total_nodes,
            metadata.heading_count,
            metadata.table_count,
            metadata.image_count,
            metadata.placeholder_count
        );

        let bytes = match self.serializer.serialize(&tree) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize '{}', storing a title-only document: {:#}", title, e);
                self.serializer
                    .serialize(&self.fallback_tree(title, config))
                    .map_err(Error::Serialize)?
            }
        };

        let name = artifact_name(Utc::now());
        self.store
            .persist(&name, &bytes)
            .await
            .map_err(|source| Error::Persist {
                name: name.clone(),
                source,
            })?;
        Ok(name)
    }

    /// Every step here has a local fallback, so a tree is always produced.
    pub async fn build_tree(
        &self,
        title: &str,
        header: Option<&PageBandText>,
        footer: Option<&PageBandText>,
        sections: &[Section],
        config: &RenderConfig,
    ) -> DocumentTree {
        let template = self.load_template(config).await;
        let template_styles = template.as_ref().and_then(|t| t.header_styles.as_ref());

        if let Some(Err(e)) = config.header_styles.as_ref().map(|s| s.validate()) {
            warn!("Ignoring caller heading styles: {}", e);
        }
        if let Some(Err(e)) = template_styles.map(|s| s.validate()) {
            warn!("Ignoring template heading styles: {}", e);
        }

        let header = header_band(header);
        let footer = footer_band(footer, config.show_page_number);

        let footnotes = FootnoteTable::collect(sections);
        debug!("Collected {} footnote(s)", footnotes.len());

        let selected = config.numbering_reference.as_deref().and_then(|key| {
            let preset = self.presets.numbering(key);
            if preset.is_none() {
                warn!("Unknown numbering scheme '{}', headings will not be numbered", key);
            }
            preset
        });
        let mut numbering = vec![self.presets.bullet.clone()];
        numbering.extend(selected.cloned());
        let config = config.with_numbering_reference(selected.map(|p| p.reference.clone()));

        let mut body = vec![RenderNode::Title {
            text: title.to_string(),
        }];
        if config.show_table_of_contents {
            body.push(RenderNode::TableOfContents {
                title: TOC_TITLE.to_string(),
                max_level: TOC_MAX_LEVEL,
            });
        }

        let roots = SectionHierarchy::build(sections);
        let renderer = SectionRenderer::new(
            &config,
            &self.resolver,
            template_styles,
            ContentRenderer::new(self.images.as_ref(), &self.presets.bullet.reference),
            &footnotes,
        );
        for root in &roots {
            body.extend(renderer.render(root).await);
        }

        DocumentTree {
            header,
            footer,
            body,
            page: PageSetup {
                orientation: config.orientation,
                margins: config.margins,
            },
            styles: global_styles(&config),
            numbering,
            footnotes,
            base_template: template.map(|t| t.bytes),
        }
    }

    /// One page holding only the title.
    pub fn fallback_tree(&self, title: &str, config: &RenderConfig) -> DocumentTree {
        DocumentTree {
            header: None,
            footer: None,
            body: vec![RenderNode::Title {
                text: title.to_string(),
            }],
            page: PageSetup {
                orientation: config.orientation,
                margins: config.margins,
            },
            styles: global_styles(config),
            numbering: Vec::new(),
            footnotes: FootnoteTable::default(),
            base_template: None,
        }
    }

    async fn load_template(&self, config: &RenderConfig) -> Option<TemplateDocument> {
        let id = config.template_id()?;
        let template = self.templates.load_template(id).await;
        if template.is_none() {
            warn!("Template '{}' is unavailable, using a blank document", id);
        }
        template
    }
}

fn global_styles(config: &RenderConfig) -> GlobalStyles {
    GlobalStyles {
        font_family: config.font_family.clone(),
        font_size: config.font_half_points(),
        line_height: config.line_height,
    }
}

fn header_band(header: Option<&PageBandText>) -> Option<PageBand> {
    let header = header.filter(|h| !h.text.is_empty())?;
    Some(PageBand {
        lines: vec![BandLine::Text {
            text: header.text.clone(),
            alignment: header.alignment,
        }],
    })
}

fn footer_band(footer: Option<&PageBandText>, show_page_number: bool) -> Option<PageBand> {
    let mut lines = Vec::new();
    if let Some(footer) = footer.filter(|f| !f.text.is_empty()) {
        lines.push(BandLine::Text {
            text: footer.text.clone(),
            alignment: footer.alignment,
        });
    }
    if show_page_number {
        lines.push(BandLine::PageNumbers);
    }
    (!lines.is_empty()).then_some(PageBand { lines })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::layout::{IMAGE_PLACEHOLDER, UNSUPPORTED_PLACEHOLDER};
    use crate::core::model::{Alignment, ContentItem, ContentKind, TableCell, TableRow, WordConfig};
    use crate::core::style::{HeaderStyleSet, HeaderStyleSetSpec, HeaderStyleSpec};
    use crate::core::template::NoTemplates;
    use crate::utils::image_fetcher::NoImages;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        files: Mutex<Vec<(String, Vec<u8>)>>,
    }

    #[async_trait]
    impl ArtifactStore for MemoryStore {
        async fn persist(&self, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
            self.files.lock().unwrap().push((name.to_string(), bytes.to_vec()));
            Ok(())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ArtifactStore for BrokenStore {
        async fn persist(&self, _name: &str, _bytes: &[u8]) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    /// Encodes the node count, and fails on anything bigger than `limit`.
    struct CountingSerializer {
        limit: usize,
    }

    impl DocumentSerializer for CountingSerializer {
        fn serialize(&self, tree: &DocumentTree) -> anyhow::Result<Vec<u8>> {
            if tree.body.len() > self.limit {
                anyhow::bail!("too many nodes");
            }
            Ok(vec![tree.body.len() as u8])
        }
    }

    struct FixedTemplate(TemplateDocument);

    #[async_trait]
    impl TemplateSource for FixedTemplate {
        async fn load_template(&self, id: &str) -> Option<TemplateDocument> {
            (id == self.0.id).then(|| self.0.clone())
        }
    }

    fn assembler_with(
        templates: Arc<dyn TemplateSource>,
        serializer: Arc<dyn DocumentSerializer>,
        store: Arc<dyn ArtifactStore>,
    ) -> DocumentAssembler {
        DocumentAssembler::new(Presets::builtin(), Arc::new(NoImages), templates, serializer, store)
    }

    fn assembler() -> DocumentAssembler {
        assembler_with(
            Arc::new(NoTemplates),
            Arc::new(CountingSerializer { limit: usize::MAX }),
            Arc::new(MemoryStore::default()),
        )
    }

    fn section(id: &str, heading: Option<&str>, parent: Option<&str>, content: Vec<ContentItem>) -> Section {
        Section {
            section_id: id.to_string(),
            heading: heading.map(str::to_string),
            parent_section_id: parent.map(str::to_string),
            content,
            ..Section::default()
        }
    }

    fn uniform_styles(font: &str) -> HeaderStyleSetSpec {
        let style = HeaderStyleSpec {
            size: Some(16.0),
            color: Some("112233".into()),
            font: Some(font.into()),
            bold: Some(true),
        };
        HeaderStyleSetSpec {
            h1: Some(style.clone()),
            h2: Some(style.clone()),
            h3: Some(style),
        }
    }

    fn heading_font(tree: &DocumentTree) -> Option<String> {
        tree.body.iter().find_map(|node| match node {
            RenderNode::Heading { style, .. } => style.as_ref().map(|s| s.font.clone()),
            _ => None,
        })
    }

    #[tokio::test]
    async fn minimal_report() {
        let sections = vec![section("a", Some("Intro"), None, vec![ContentItem::paragraph("Hello")])];
        let tree = assembler()
            .build_tree("Report", None, None, &sections, &RenderConfig::default())
            .await;

        assert_eq!(
            tree.body,
            vec![
                RenderNode::Title { text: "Report".into() },
                RenderNode::Heading {
                    text: "Intro".into(),
                    level: 1,
                    style: Some(HeaderStyleSet::builtin().h1),
                },
                RenderNode::Paragraph {
                    text: "Hello".into(),
                    footnote: None,
                },
            ]
        );
        assert!(tree.header.is_none());
        assert!(tree.footer.is_none());
        assert_eq!(tree.numbering.len(), 1);
        assert_eq!(tree.styles.font_size, 24);
        assert!(tree.base_template.is_none());
    }

    #[tokio::test]
    async fn child_content_follows_parent_content() {
        let sections = vec![
            section("a", None, None, vec![ContentItem::paragraph("from a")]),
            section("b", None, Some("a"), vec![ContentItem::paragraph("from b")]),
        ];
        let tree = assembler()
            .build_tree("Report", None, None, &sections, &RenderConfig::default())
            .await;
        let texts: Vec<_> = tree
            .body
            .iter()
            .filter_map(|node| match node {
                RenderNode::Paragraph { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, ["from a", "from b"]);
    }

    #[tokio::test]
    async fn table_of_contents_sits_right_after_the_title() {
        let config = RenderConfig::from_word_config(
            &WordConfig {
                show_table_of_content: Some(true),
                ..WordConfig::default()
            },
            &Presets::builtin(),
        );
        let sections = vec![section("a", Some("Intro"), None, vec![])];
        let tree = assembler().build_tree("Report", None, None, &sections, &config).await;

        assert!(matches!(tree.body[0], RenderNode::Title { .. }));
        assert_eq!(
            tree.body[1],
            RenderNode::TableOfContents {
                title: "Table of Contents".into(),
                max_level: 4,
            }
        );
        assert!(tree.body[2].is_heading());
    }

    #[tokio::test]
    async fn bad_items_are_contained() {
        let table = ContentItem {
            headers: Some(vec!["A".into(), "B".into(), "C".into()]),
            rows: Some(vec![TableRow {
                cells: vec![TableCell { text: "only one".into() }],
            }]),
            ..ContentItem::of_kind(ContentKind::Table)
        };
        let image = ContentItem {
            url: Some("https://example.com/a.png".into()),
            ..ContentItem::of_kind(ContentKind::Image)
        };
        let sections = vec![section(
            "a",
            None,
            None,
            vec![
                ContentItem::of_kind(ContentKind::Unsupported("quiz".into())),
                image,
                table,
                ContentItem::paragraph("still here"),
            ],
        )];
        let tree = assembler()
            .build_tree("Report", None, None, &sections, &RenderConfig::default())
            .await;

        assert_eq!(tree.body.len(), 5);
        assert_eq!(tree.body[1], RenderNode::placeholder(UNSUPPORTED_PLACEHOLDER));
        assert_eq!(tree.body[2], RenderNode::placeholder(IMAGE_PLACEHOLDER));
        assert!(matches!(tree.body[3], RenderNode::Table(_)));
        assert_eq!(
            tree.body[4],
            RenderNode::Paragraph {
                text: "still here".into(),
                footnote: None,
            }
        );
        assert_eq!(tree.metadata().placeholder_count, 2);
    }

    #[tokio::test]
    async fn bands_and_page_numbers() {
        let config = RenderConfig::from_word_config(
            &WordConfig {
                show_page_number: Some(true),
                ..WordConfig::default()
            },
            &Presets::builtin(),
        );
        let header = PageBandText {
            text: "Confidential".into(),
            alignment: Alignment::Right,
        };
        let empty_footer = PageBandText {
            text: String::new(),
            alignment: Alignment::Left,
        };
        let tree = assembler()
            .build_tree("Report", Some(&header), Some(&empty_footer), &[], &config)
            .await;

        assert_eq!(
            tree.header.unwrap().lines,
            vec![BandLine::Text {
                text: "Confidential".into(),
                alignment: Alignment::Right,
            }]
        );
        assert_eq!(tree.footer.unwrap().lines, vec![BandLine::PageNumbers]);
    }

    #[tokio::test]
    async fn numbering_is_resolved_by_label() {
        let config = RenderConfig::from_word_config(
            &WordConfig {
                show_numbering_in_header: Some(true),
                numbering_reference: Some("1.1.1.1 (Decimal)".into()),
                ..WordConfig::default()
            },
            &Presets::builtin(),
        );
        let sections = vec![section("a", Some("Intro"), None, vec![])];
        let tree = assembler().build_tree("Report", None, None, &sections, &config).await;

        assert_eq!(tree.numbering.len(), 2);
        assert_eq!(tree.numbering[1].reference, "decimal-numbering");
        let numbered = tree.body.iter().find_map(|node| match node {
            RenderNode::NumberedHeading { numbering, .. } => Some(numbering.reference.clone()),
            _ => None,
        });
        assert_eq!(numbered.as_deref(), Some("decimal-numbering"));
    }

    #[tokio::test]
    async fn unknown_numbering_scheme_is_dropped() {
        let config = RenderConfig::default().with_numbering_reference(Some("roman-soup".into()));
        let sections = vec![section("a", Some("Intro"), None, vec![])];
        let tree = assembler().build_tree("Report", None, None, &sections, &config).await;

        assert_eq!(tree.numbering.len(), 1);
        assert!(!tree.body.iter().any(|n| matches!(n, RenderNode::NumberedHeading { .. })));
    }

    #[tokio::test]
    async fn template_styles_and_caller_styles() {
        let template = TemplateDocument {
            id: "shoq".into(),
            bytes: vec![1, 2, 3],
            header_styles: Some(uniform_styles("Calibri")),
        };
        let assembler = assembler_with(
            Arc::new(FixedTemplate(template)),
            Arc::new(CountingSerializer { limit: usize::MAX }),
            Arc::new(MemoryStore::default()),
        );
        let sections = vec![section("a", Some("Intro"), None, vec![])];

        let mut word = WordConfig {
            template: Some("shoq".into()),
            ..WordConfig::default()
        };
        let config = RenderConfig::from_word_config(&word, assembler.presets());
        let tree = assembler.build_tree("Report", None, None, &sections, &config).await;
        assert_eq!(heading_font(&tree).as_deref(), Some("Calibri"));
        assert_eq!(tree.base_template, Some(vec![1, 2, 3]));

        word.header_styles = Some(uniform_styles("Georgia"));
        let config = RenderConfig::from_word_config(&word, assembler.presets());
        let tree = assembler.build_tree("Report", None, None, &sections, &config).await;
        assert_eq!(heading_font(&tree).as_deref(), Some("Georgia"));
    }

    #[tokio::test]
    async fn missing_template_uses_blank_document() {
        let config = RenderConfig::from_word_config(
            &WordConfig {
                template: Some("datahive".into()),
                ..WordConfig::default()
            },
            &Presets::builtin(),
        );
        let sections = vec![section("a", Some("Intro"), None, vec![])];
        let tree = assembler().build_tree("Report", None, None, &sections, &config).await;
        assert!(tree.base_template.is_none());
        assert_eq!(heading_font(&tree).as_deref(), Some("Outfit"));
    }

    #[tokio::test]
    async fn generate_stores_the_artifact() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler_with(
            Arc::new(NoTemplates),
            Arc::new(CountingSerializer { limit: usize::MAX }),
            store.clone(),
        );
        let request = GenerateRequest::from_json(
            r#"{"title": "Report", "sections": [{"sectionId": "a", "heading": "Intro", "content": [{"type": "paragraph", "text": "Hello"}]}]}"#,
        )
        .unwrap();

        let name = assembler.generate(&request).await.unwrap();
        assert!(name.starts_with("word-file-") && name.ends_with(".docx"));

        let files = store.files.lock().unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, name);
        assert_eq!(files[0].1, vec![3]);
    }

    #[tokio::test]
    async fn serialization_failure_stores_title_only_document() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler_with(
            Arc::new(NoTemplates),
            Arc::new(CountingSerializer { limit: 1 }),
            store.clone(),
        );
        let sections = vec![section("a", Some("Intro"), None, vec![ContentItem::paragraph("Hello")])];

        let name = assembler
            .assemble("Report", None, None, &sections, &RenderConfig::default())
            .await
            .unwrap();

        let files = store.files.lock().unwrap();
        assert_eq!(files[0].0, name);
        assert_eq!(files[0].1, vec![1]);
    }

    #[tokio::test]
    async fn unserializable_fallback_is_an_error() {
        let assembler = assembler_with(
            Arc::new(NoTemplates),
            Arc::new(CountingSerializer { limit: 0 }),
            Arc::new(MemoryStore::default()),
        );
        let result = assembler
            .assemble("Report", None, None, &[], &RenderConfig::default())
            .await;
        assert!(matches!(result, Err(Error::Serialize(_))));
    }

    #[tokio::test]
    async fn persist_failure_is_an_error() {
        let assembler = assembler_with(
            Arc::new(NoTemplates),
            Arc::new(CountingSerializer { limit: usize::MAX }),
            Arc::new(BrokenStore),
        );
        let result = assembler
            .assemble("Report", None, None, &[], &RenderConfig::default())
            .await;
        match result {
            Err(Error::Persist { name, source }) => {
                assert!(name.starts_with("word-file-"));
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
