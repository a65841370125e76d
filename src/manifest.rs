//! IIIF Presentation v3 manifest construction
//!
//! `build_manifest` is a pure mapping from a reconciled tree to the output
//! document. Everything institution-specific (provider, attribution, rights,
//! dimensions) comes from `ManifestConfig`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::reconcile::{ReconciledCanvas, ReconciledManifest};
use crate::vocab::IIIF_CONTEXT;

/// Language tag → values
pub type LanguageMap = BTreeMap<String, Vec<String>>;

/// Language map with a single entry
pub fn language_map(language: &str, value: impl Into<String>) -> LanguageMap {
    let mut map = LanguageMap::new();
    map.insert(language.to_string(), vec![value.into()]);
    map
}

fn bilingual(no: &str, en: &str) -> LanguageMap {
    let mut map = language_map("no", no);
    map.insert("en".to_string(), vec![en.to_string()]);
    map
}

/// A linked resource (image, web page, dataset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl Resource {
    fn image(id: &str, format: &str, width: u32, height: u32) -> Self {
        Self {
            id: id.to_string(),
            kind: "Image".to_string(),
            label: None,
            format: Some(format.to_string()),
            width: Some(width),
            height: Some(height),
        }
    }

    fn linked(id: &str, kind: &str, label: LanguageMap, format: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: kind.to_string(),
            label: Some(label),
            format: Some(format.to_string()),
            width: None,
            height: None,
        }
    }
}

/// The institution providing the object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    #[serde(rename = "type", default = "agent_type")]
    pub kind: String,
    pub label: LanguageMap,
    #[serde(default)]
    pub homepage: Vec<Resource>,
    #[serde(default)]
    pub logo: Vec<Resource>,
}

fn agent_type() -> String {
    "Agent".to_string()
}

/// Label/value pair, as in `requiredStatement`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelValue {
    pub label: LanguageMap,
    pub value: LanguageMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(rename = "@context")]
    pub context: String,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: LanguageMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<LanguageMap>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thumbnail: Vec<Resource>,
    pub viewing_direction: String,
    pub behavior: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub homepage: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub see_also: Vec<Resource>,
    pub provider: Vec<Agent>,
    pub rights: String,
    pub required_statement: LabelValue,
    pub items: Vec<Canvas>,
    pub structures: Vec<Range>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: LanguageMap,
    pub width: u32,
    pub height: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thumbnail: Vec<Resource>,
    pub items: Vec<AnnotationPage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationPage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub items: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub motivation: String,
    pub target: String,
    pub body: Resource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: LanguageMap,
    pub items: Vec<StructureItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Optional manifest blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Blocks {
    pub summary: bool,
    pub homepage: bool,
    pub see_also: bool,
}

impl Default for Blocks {
    fn default() -> Self {
        Self {
            summary: true,
            homepage: true,
            see_also: true,
        }
    }
}

/// Machine-readable description linked from `seeAlso`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeeAlsoConfig {
    /// Endpoint answering `DESCRIBE <subject>` queries
    pub describe_endpoint: String,
    pub label: LanguageMap,
    pub format: String,
}

impl Default for SeeAlsoConfig {
    fn default() -> Self {
        Self {
            describe_endpoint: "http://sparql.ub.uib.no/sparql/query".to_string(),
            label: bilingual("Objekt beskrivelse i RDF", "Object Description in RDF"),
            format: "application/rdf+xml".to_string(),
        }
    }
}

/// Institution constants and layout of the generated manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub context: String,
    pub label_language: String,
    pub summary_language: String,
    pub canvas_label_language: String,
    pub required_statement: LabelValue,
    pub provider: Agent,
    pub rights: String,
    pub behavior: Vec<String>,
    pub viewing_direction: String,
    pub range_label: LanguageMap,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub image_format: String,
    pub thumbnail_format: String,
    pub blocks: Blocks,
    /// Homepage label per language; `{label}` is replaced by the object label
    pub homepage_label: LanguageMap,
    pub see_also: SeeAlsoConfig,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        let homepage_label = {
            let mut map = language_map("en", "Home page for {label}");
            map.insert("no".to_string(), vec!["Nettside for {label}".to_string()]);
            map
        };

        Self {
            context: IIIF_CONTEXT.to_string(),
            label_language: "no".to_string(),
            summary_language: "none".to_string(),
            canvas_label_language: "none".to_string(),
            required_statement: LabelValue {
                label: bilingual("Kreditering", "Attribution"),
                value: bilingual(
                    "Tilgjengeliggjort av Universitetsbiblioteket i Bergen",
                    "Provided by University of Bergen Library",
                ),
            },
            provider: Agent {
                id: "https://www.uib.no/ub".to_string(),
                kind: agent_type(),
                label: bilingual(
                    "Universitetsbiblioteket i Bergen",
                    "University of Bergen Library",
                ),
                homepage: vec![Resource::linked(
                    "https://www.uib.no/ub",
                    "Text",
                    bilingual(
                        "Universitetsbiblioteket i Bergen hjemmeside",
                        "University of Bergen Library Homepage",
                    ),
                    "text/html",
                )],
                logo: vec![Resource::image(
                    "https://marcus-manifest-api.vercel.app/uib-logo.png",
                    "image/png",
                    200,
                    200,
                )],
            },
            rights: "http://creativecommons.org/licenses/by/4.0/".to_string(),
            behavior: vec!["paged".to_string()],
            viewing_direction: "left-to-right".to_string(),
            range_label: bilingual("Standard innholdsfortegnelse", "Default"),
            canvas_width: 1024,
            canvas_height: 1024,
            thumbnail_width: 200,
            thumbnail_height: 200,
            image_format: "image/jpeg".to_string(),
            thumbnail_format: "image/jpeg".to_string(),
            blocks: Blocks::default(),
            homepage_label,
            see_also: SeeAlsoConfig::default(),
        }
    }
}

impl ManifestConfig {
    fn thumbnail(&self, id: &str) -> Resource {
        Resource::image(
            id,
            &self.thumbnail_format,
            self.thumbnail_width,
            self.thumbnail_height,
        )
    }

    fn homepage(&self, id: &str, label: &str) -> Resource {
        let labels: LanguageMap = self
            .homepage_label
            .iter()
            .map(|(lang, templates)| {
                let values: Vec<String> =
                    templates.iter().map(|t| t.replace("{label}", label)).collect();
                (lang.clone(), values)
            })
            .collect();
        Resource::linked(id, "Text", labels, "text/html")
    }

    fn see_also(&self, subject: &str) -> Option<Resource> {
        let query = format!("DESCRIBE <{}>", subject);
        match Url::parse_with_params(&self.see_also.describe_endpoint, &[("query", query)]) {
            Ok(url) => Some(Resource::linked(
                url.as_str(),
                "Dataset",
                self.see_also.label.clone(),
                &self.see_also.format,
            )),
            Err(e) => {
                warn!(
                    endpoint = %self.see_also.describe_endpoint,
                    error = %e,
                    "Invalid DESCRIBE endpoint, omitting seeAlso"
                );
                None
            }
        }
    }
}

fn build_canvas(canvas: &ReconciledCanvas, config: &ManifestConfig) -> Canvas {
    let body = Resource::image(
        &canvas.image,
        &config.image_format,
        config.canvas_width,
        config.canvas_height,
    );

    Canvas {
        id: canvas.id.clone(),
        kind: "Canvas".to_string(),
        label: language_map(&config.canvas_label_language, canvas.label.as_str()),
        width: config.canvas_width,
        height: config.canvas_height,
        thumbnail: canvas
            .thumbnail
            .iter()
            .map(|t| config.thumbnail(t))
            .collect(),
        items: vec![AnnotationPage {
            id: canvas.annotation.clone(),
            kind: "AnnotationPage".to_string(),
            items: vec![Annotation {
                id: format!("{}/annotation/1", canvas.id),
                kind: "Annotation".to_string(),
                motivation: "painting".to_string(),
                target: canvas.id.clone(),
                body,
            }],
        }],
    }
}

/// Build the IIIF manifest for a reconciled tree
pub fn build_manifest(tree: &ReconciledManifest, config: &ManifestConfig) -> Manifest {
    let summary = match (&tree.description, config.blocks.summary) {
        (Some(desc), true) => Some(language_map(&config.summary_language, desc.as_str())),
        _ => None,
    };

    let homepage = match (&tree.homepage, config.blocks.homepage) {
        (Some(id), true) => vec![config.homepage(id, &tree.label)],
        _ => Vec::new(),
    };

    let see_also = match (&tree.see_also, config.blocks.see_also) {
        (Some(subject), true) => config.see_also(subject).into_iter().collect(),
        _ => Vec::new(),
    };

    Manifest {
        context: config.context.clone(),
        id: tree.id.clone(),
        kind: "Manifest".to_string(),
        label: language_map(&config.label_language, tree.label.as_str()),
        summary,
        thumbnail: tree.thumbnail.iter().map(|t| config.thumbnail(t)).collect(),
        viewing_direction: config.viewing_direction.clone(),
        behavior: config.behavior.clone(),
        homepage,
        see_also,
        provider: vec![config.provider.clone()],
        rights: config.rights.clone(),
        required_statement: config.required_statement.clone(),
        items: tree.items.iter().map(|c| build_canvas(c, config)).collect(),
        structures: vec![Range {
            id: tree.structures.id.clone(),
            kind: "Range".to_string(),
            label: config.range_label.clone(),
            items: tree
                .structures
                .items
                .iter()
                .map(|id| StructureItem {
                    id: id.clone(),
                    kind: "Canvas".to_string(),
                })
                .collect(),
        }],
    }
}
