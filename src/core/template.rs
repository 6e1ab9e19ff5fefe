//! Named base documents and the heading styles they define.

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use roxmltree::Node;
use zip::ZipArchive;

use crate::core::style::{HeaderStyleSetSpec, HeaderStyleSpec};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Template ids callers may ask for and the file each one is stored in.
pub const TEMPLATE_CATALOG: &[(&str, &str)] = &[
    ("default", "default.dotx"),
    ("traffic-builders", "traffic-builders.dotx"),
    ("shoq", "shoq.dotx"),
    ("datahive", "datahive.dotx"),
    ("unbound-group", "unbound-group.dotx"),
];

pub fn template_file(id: &str) -> Option<&'static str> {
    TEMPLATE_CATALOG
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, file)| *file)
}

/// A loaded template: its raw package and, when it defines them completely,
/// its heading styles.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateDocument {
    pub id: String,
    pub bytes: Vec<u8>,
    pub header_styles: Option<HeaderStyleSetSpec>,
}

impl TemplateDocument {
    pub fn from_bytes(id: &str, bytes: Vec<u8>) -> Self {
        let header_styles = match extract_header_styles(&bytes) {
            Ok(styles) => styles,
            Err(e) => {
                warn!("Could not read heading styles from template '{}': {}", id, e);
                None
            }
        };
        Self {
            id: id.to_string(),
            bytes,
            header_styles,
        }
    }
}

#[async_trait]
pub trait TemplateSource: Send + Sync {
    /// Returns `None` when the template is unknown or cannot be read.
    async fn load_template(&self, id: &str) -> Option<TemplateDocument>;
}

/// Reads catalog templates from a directory.
pub struct FsTemplateSource {
    root: PathBuf,
}

impl FsTemplateSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl TemplateSource for FsTemplateSource {
    async fn load_template(&self, id: &str) -> Option<TemplateDocument> {
        let Some(file) = template_file(id) else {
            warn!("Unknown template '{}'", id);
            return None;
        };

        let path = self.root.join(file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                info!("Loaded template '{}' from {} ({} bytes)", id, path.display(), bytes.len());
                Some(TemplateDocument::from_bytes(id, bytes))
            }
            Err(e) => {
                warn!("Failed to read template '{}' at {}: {}", id, path.display(), e);
                None
            }
        }
    }
}

/// Never has a template; every document starts blank.
pub struct NoTemplates;

#[async_trait]
impl TemplateSource for NoTemplates {
    async fn load_template(&self, _id: &str) -> Option<TemplateDocument> {
        None
    }
}

/// Reads `Heading1`..`Heading3` from the package's `word/styles.xml`.
///
/// Returns `Ok(None)` when the package has no styles part or the headings
/// are not all present. The set returned may still be incomplete field-wise;
/// the style resolver decides whether it is usable.
pub fn extract_header_styles(package: &[u8]) -> Result<Option<HeaderStyleSetSpec>> {
    let mut archive = ZipArchive::new(Cursor::new(package))?;
    let mut styles_xml = String::new();
    match archive.by_name("word/styles.xml") {
        Ok(mut file) => {
            file.read_to_string(&mut styles_xml)?;
        }
        Err(_) => return Ok(None),
    };

    let sheet = StyleSheet::parse(&styles_xml)?;
    let h1 = sheet.resolve("Heading1");
    let h2 = sheet.resolve("Heading2");
    let h3 = sheet.resolve("Heading3");
    debug!("Template heading styles: h1={:?} h2={:?} h3={:?}", h1, h2, h3);

    if h1.is_none() || h2.is_none() || h3.is_none() {
        return Ok(None);
    }
    Ok(Some(HeaderStyleSetSpec { h1, h2, h3 }))
}

#[derive(Debug, Clone, Default)]
struct StyleEntry {
    based_on: Option<String>,
    run: HeaderStyleSpec,
}

#[derive(Debug, Default)]
struct StyleSheet {
    styles: HashMap<String, StyleEntry>,
    defaults: HeaderStyleSpec,
}

impl StyleSheet {
    fn parse(xml: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse(xml)?;
        let root = doc.root_element();
        if root.tag_name().name() != "styles" {
            return Err(anyhow!("unexpected root element <{}>", root.tag_name().name()));
        }

        let mut sheet = StyleSheet::default();

        if let Some(rpr) = root
            .children()
            .find(|n| n.tag_name().name() == "docDefaults")
            .and_then(|d| d.children().find(|n| n.tag_name().name() == "rPrDefault"))
            .and_then(|d| d.children().find(|n| n.tag_name().name() == "rPr"))
        {
            sheet.defaults = parse_run_properties(rpr);
        }

        for style_node in root.children().filter(|n| n.tag_name().name() == "style") {
            let Some(style_id) = style_node.attribute((W_NS, "styleId")) else {
                continue;
            };
            let based_on = style_node
                .children()
                .find(|n| n.tag_name().name() == "basedOn")
                .and_then(|n| n.attribute((W_NS, "val")))
                .map(str::to_string);
            let run = style_node
                .children()
                .find(|n| n.tag_name().name() == "rPr")
                .map(parse_run_properties)
                .unwrap_or_default();

            sheet
                .styles
                .insert(style_id.to_string(), StyleEntry { based_on, run });
        }
        Ok(sheet)
    }

    /// Run properties of `style_id` with its `basedOn` chain and the document
    /// defaults filled in. `None` if the style is not defined.
    fn resolve(&self, style_id: &str) -> Option<HeaderStyleSpec> {
        let entry = self.styles.get(style_id)?;
        let mut resolved = entry.run.clone();
        let mut visited = vec![style_id];
        let mut next = entry.based_on.as_deref();

        while let Some(base_id) = next {
            // basedOn loops are broken at the first repeat
            if visited.contains(&base_id) {
                break;
            }
            visited.push(base_id);
            let Some(base) = self.styles.get(base_id) else {
                break;
            };
            resolved = resolved.or(&base.run);
            next = base.based_on.as_deref();
        }

        let mut resolved = resolved.or(&self.defaults);
        // A style that never mentions bold is not bold.
        resolved.bold = resolved.bold.or(Some(false));
        Some(resolved)
    }
}

fn parse_run_properties(rpr: Node) -> HeaderStyleSpec {
    let mut props = HeaderStyleSpec::default();

    for child in rpr.children() {
        match child.tag_name().name() {
            "sz" => {
                props.size = child
                    .attribute((W_NS, "val"))
                    .and_then(|v| v.parse::<f64>().ok())
                    .map(|half_points| half_points / 2.0);
            }
            "color" => {
                props.color = child
                    .attribute((W_NS, "val"))
                    .filter(|v| *v != "auto")
                    .map(str::to_string);
            }
            "rFonts" => {
                props.font = child.attribute((W_NS, "ascii")).map(str::to_string);
            }
            "b" => {
                props.bold = Some(!matches!(child.attribute((W_NS, "val")), Some("0" | "false")));
            }
            _ => {}
        }
    }
    props
}
