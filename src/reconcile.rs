//! Shape reconciliation of framed trees
//!
//! The framed tree cannot tell a one-element collection from a bare value.
//! Decoding it goes through `OneOrMany<T>`, and reconciliation turns every
//! collection into an ordered `Vec`:
//!
//! - canvases are ordered by their sequence label (numeric when it parses)
//! - range entries are ordered by the page number after the last `_p` in the id
//!
//! Problems with the data that do not prevent building a manifest are
//! collected as `IntegrityWarning`s instead of failing the request.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ManifestError;
use crate::frame::strip_context;
use crate::vocab::{PAGE_MARKER, SINGLE_PAGE_LABEL};

/// A field that may hold one value or a list of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    pub fn len(&self) -> usize {
        match self {
            OneOrMany::Many(items) => items.len(),
            OneOrMany::One(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::Many(items) => items.first(),
            OneOrMany::One(item) => Some(item),
        }
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        value.into_vec()
    }
}

/// A literal as it appears in a framed tree
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
    Value {
        #[serde(alias = "@value")]
        value: Value,
    },
    Node {
        #[serde(alias = "@id")]
        id: String,
    },
}

impl Scalar {
    /// Lexical form of the value
    pub fn lexical(&self) -> String {
        match self {
            Scalar::Text(s) | Scalar::Node { id: s } => s.clone(),
            Scalar::Number(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Value { value: Value::String(s) } => s.clone(),
            Scalar::Value { value } => value.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramedManifest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OneOrMany<String>,
    pub label: OneOrMany<Scalar>,
    #[serde(default)]
    pub description: Option<OneOrMany<Scalar>>,
    #[serde(default)]
    pub thumbnail: Option<OneOrMany<Scalar>>,
    #[serde(default)]
    pub see_also: Option<OneOrMany<String>>,
    #[serde(default)]
    pub homepage: Option<OneOrMany<String>>,
    pub items: OneOrMany<FramedCanvas>,
    pub structures: OneOrMany<FramedRange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FramedCanvas {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OneOrMany<String>,
    pub label: OneOrMany<Scalar>,
    #[serde(default)]
    pub thumbnail: Option<OneOrMany<Scalar>>,
    pub items: OneOrMany<FramedAnnotation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FramedAnnotation {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<OneOrMany<String>>,
    #[serde(default)]
    pub body: OneOrMany<Scalar>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FramedRange {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: OneOrMany<String>,
    #[serde(default)]
    pub items: OneOrMany<String>,
}

impl FramedManifest {
    /// Decode a framed tree, dropping its framing context
    pub fn from_document(tree: Value) -> Result<Self, ManifestError> {
        serde_json::from_value(strip_context(tree))
            .map_err(|e| ManifestError::shape("$", e.to_string()))
    }
}

/// Non-fatal data problem found while reconciling
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityWarning {
    /// A single-valued field held several values; the first was kept
    AmbiguousValue { path: String, count: usize },
    /// A range entry without a `_p<N>` suffix; placed last
    UnorderableReference { id: String },
    /// A range entry that is not a canvas of the manifest
    DanglingReference { id: String },
    /// Label order and id-suffix order disagree
    OrderingDivergence {
        by_label: Vec<String>,
        by_reference: Vec<String>,
    },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityWarning::AmbiguousValue { path, count } => {
                write!(f, "{} has {} values, keeping the first", path, count)
            }
            IntegrityWarning::UnorderableReference { id } => {
                write!(f, "range entry {} has no page number suffix", id)
            }
            IntegrityWarning::DanglingReference { id } => {
                write!(f, "range entry {} is not a canvas of the manifest", id)
            }
            IntegrityWarning::OrderingDivergence { .. } => {
                write!(f, "canvas order by label differs from range order by page number")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledManifest {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub see_also: Option<String>,
    pub homepage: Option<String>,
    pub items: Vec<ReconciledCanvas>,
    pub structures: ReconciledRange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledCanvas {
    pub id: String,
    pub label: String,
    pub thumbnail: Option<String>,
    /// Id of the annotation, used for the canvas' annotation page
    pub annotation: String,
    /// Image painted onto the canvas
    pub image: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledRange {
    pub id: String,
    pub items: Vec<String>,
}

/// Result of reconciliation
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub manifest: ReconciledManifest,
    pub warnings: Vec<IntegrityWarning>,
}

/// Sort key of a canvas label
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SequenceKey {
    Number(i64),
    Text(String),
}

fn sequence_key(label: &str) -> SequenceKey {
    label
        .trim()
        .parse::<i64>()
        .map(SequenceKey::Number)
        .unwrap_or_else(|_| SequenceKey::Text(label.to_string()))
}

/// Page number after the last `_p` marker of a canvas id
pub fn page_number(id: &str) -> Option<u64> {
    let (_, suffix) = id.rsplit_once(PAGE_MARKER)?;
    let end = suffix
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(suffix.len());
    suffix[..end].parse().ok()
}

/// Keep the first of several values, recording the ambiguity
fn single<T>(values: Vec<T>, path: &str, warnings: &mut Vec<IntegrityWarning>) -> Option<T> {
    if values.len() > 1 {
        warnings.push(IntegrityWarning::AmbiguousValue {
            path: path.to_string(),
            count: values.len(),
        });
    }
    values.into_iter().next()
}

/// Lexical forms of the values, without repeats
///
/// The same literal can arrive with different datatypes (`1` and
/// `"1"^^xsd:int`); those count as one value.
fn distinct_lexical(values: OneOrMany<Scalar>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_vec()
        .iter()
        .map(Scalar::lexical)
        .filter(|lexical| seen.insert(lexical.clone()))
        .collect()
}

fn single_lexical(
    values: Option<OneOrMany<Scalar>>,
    path: &str,
    warnings: &mut Vec<IntegrityWarning>,
) -> Option<String> {
    values.and_then(|v| single(distinct_lexical(v), path, warnings))
}

/// Sequence label of a canvas
///
/// The single-page query variant labels the first page `1` in addition to
/// whatever sequence number the catalog holds for it. A catalog label wins.
fn canvas_label(
    canvas_id: &str,
    values: OneOrMany<Scalar>,
    path: &str,
    warnings: &mut Vec<IntegrityWarning>,
) -> Option<String> {
    let mut labels = distinct_lexical(values);
    if labels.len() > 1 && page_number(canvas_id) == Some(1) {
        labels.retain(|label| label != SINGLE_PAGE_LABEL);
    }
    single(labels, path, warnings)
}

/// Normalize collections, order canvases and range entries
pub fn reconcile(framed: FramedManifest) -> Result<Reconciled, ManifestError> {
    let mut warnings = Vec::new();

    let label = single(distinct_lexical(framed.label), "label", &mut warnings)
        .ok_or_else(|| ManifestError::shape("label", "manifest has no label"))?;
    let description = single_lexical(framed.description, "description", &mut warnings);
    let thumbnail = single_lexical(framed.thumbnail, "thumbnail", &mut warnings);
    let see_also = framed
        .see_also
        .and_then(|v| single(v.into_vec(), "seeAlso", &mut warnings));
    let homepage = framed
        .homepage
        .and_then(|v| single(v.into_vec(), "homepage", &mut warnings));

    let mut items = Vec::new();
    for canvas in framed.items.into_vec() {
        items.push(reconcile_canvas(canvas, &mut warnings)?);
    }
    if items.is_empty() {
        return Err(ManifestError::shape("items", "manifest has no canvases"));
    }
    items.sort_by_cached_key(|c| sequence_key(&c.label));

    let range = single(framed.structures.into_vec(), "structures", &mut warnings)
        .ok_or_else(|| ManifestError::shape("structures", "manifest has no range"))?;
    let structures = ReconciledRange {
        id: range.id,
        items: order_references(range.items.into_vec(), &mut warnings),
    };

    check_references(&items, &structures, &mut warnings);

    Ok(Reconciled {
        manifest: ReconciledManifest {
            id: framed.id,
            label,
            description,
            thumbnail,
            see_also,
            homepage,
            items,
            structures,
        },
        warnings,
    })
}

fn reconcile_canvas(
    canvas: FramedCanvas,
    warnings: &mut Vec<IntegrityWarning>,
) -> Result<ReconciledCanvas, ManifestError> {
    let path = format!("items[{}]", canvas.id);

    let label = canvas_label(&canvas.id, canvas.label, &format!("{}.label", path), warnings)
        .ok_or_else(|| ManifestError::shape(format!("{}.label", path), "canvas has no label"))?;
    let thumbnail = single_lexical(canvas.thumbnail, &format!("{}.thumbnail", path), warnings);

    let annotations: Vec<FramedAnnotation> = canvas
        .items
        .into_vec()
        .into_iter()
        .filter(|a| !a.body.is_empty())
        .collect();
    let annotation = single(annotations, &format!("{}.items", path), warnings).ok_or_else(|| {
        ManifestError::shape(format!("{}.items", path), "canvas has no image annotation")
    })?;
    let image = single(
        distinct_lexical(annotation.body),
        &format!("{}.items.body", path),
        warnings,
    )
    .ok_or_else(|| ManifestError::shape(format!("{}.items.body", path), "annotation has no body"))?;

    Ok(ReconciledCanvas {
        id: canvas.id,
        label,
        thumbnail,
        annotation: annotation.id,
        image,
    })
}

/// Order range entries by page number; unorderable entries go last
fn order_references(ids: Vec<String>, warnings: &mut Vec<IntegrityWarning>) -> Vec<String> {
    let mut orderable = Vec::new();
    let mut unorderable = Vec::new();
    for id in ids {
        match page_number(&id) {
            Some(n) => orderable.push((n, id)),
            None => {
                warnings.push(IntegrityWarning::UnorderableReference { id: id.clone() });
                unorderable.push(id);
            }
        }
    }
    orderable.sort_by_key(|(n, _)| *n);
    orderable
        .into_iter()
        .map(|(_, id)| id)
        .chain(unorderable)
        .collect()
}

fn check_references(
    items: &[ReconciledCanvas],
    structures: &ReconciledRange,
    warnings: &mut Vec<IntegrityWarning>,
) {
    let canvas_ids: HashSet<&str> = items.iter().map(|c| c.id.as_str()).collect();
    let range_ids: HashSet<&str> = structures.items.iter().map(String::as_str).collect();

    for id in &structures.items {
        if !canvas_ids.contains(id.as_str()) {
            warnings.push(IntegrityWarning::DanglingReference { id: id.clone() });
        }
    }

    let by_label: Vec<String> = items
        .iter()
        .filter(|c| range_ids.contains(c.id.as_str()))
        .map(|c| c.id.clone())
        .collect();
    let by_reference: Vec<String> = structures
        .items
        .iter()
        .filter(|id| canvas_ids.contains(id.as_str()))
        .cloned()
        .collect();
    if by_label != by_reference {
        warnings.push(IntegrityWarning::OrderingDivergence {
            by_label,
            by_reference,
        });
    }
}
