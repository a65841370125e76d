//! Graph-to-tree framing
//!
//! A `Frame` describes, as data, which predicate feeds which document field,
//! whether the field is required, and whether its values are literals,
//! references, or embedded nodes. Framing walks the graph from the root node
//! and produces a nested JSON tree following that description.
//!
//! Like JSON-LD compaction, a field holding exactly one value is emitted as a
//! bare value and a field holding several values as an array. Consumers must
//! not assume either shape for collection fields; see `reconcile`.

use serde_json::{json, Map, Number, Value};
use tracing::{debug, warn};

use crate::error::ManifestError;
use crate::graph::{Graph, Literal, Node, Term};
use crate::vocab::{
    is_native_datatype, DC_DESCRIPTION, OA_ANNOTATION, OA_BODY, PREFIXES, RDFS_LABEL,
    RDFS_SEE_ALSO, SC_CANVAS, SC_HOMEPAGE, SC_ITEMS, SC_MANIFEST, SC_RANGE, SC_STRUCTURES,
    SC_THUMBNAIL, XSD,
};

/// Where a field takes its values from
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// The node's own id
    Id,
    /// The node's `rdf:type`s, compacted with the frame's type terms
    Type,
    /// Objects of a predicate
    Predicate(String),
}

/// How each value of a field is rendered
#[derive(Debug, Clone, PartialEq)]
pub enum ValueShape {
    /// Literal value; IRIs become `{"id": ...}`
    Literal,
    /// Id string of the referenced node
    Reference,
    /// Embedded node framed with a nested shape
    Node(NodeShape),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub source: Source,
    pub required: bool,
    pub value: ValueShape,
}

impl FieldSpec {
    pub fn id() -> Self {
        Self {
            name: "id".to_string(),
            source: Source::Id,
            required: true,
            value: ValueShape::Reference,
        }
    }

    pub fn kind() -> Self {
        Self {
            name: "type".to_string(),
            source: Source::Type,
            required: false,
            value: ValueShape::Reference,
        }
    }

    pub fn literal(name: &str, predicate: &str) -> Self {
        Self::predicate(name, predicate, ValueShape::Literal)
    }

    pub fn reference(name: &str, predicate: &str) -> Self {
        Self::predicate(name, predicate, ValueShape::Reference)
    }

    pub fn node(name: &str, predicate: &str, shape: NodeShape) -> Self {
        Self::predicate(name, predicate, ValueShape::Node(shape))
    }

    fn predicate(name: &str, predicate: &str, value: ValueShape) -> Self {
        Self {
            name: name.to_string(),
            source: Source::Predicate(predicate.to_string()),
            required: false,
            value,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Ordered field list of one node
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeShape {
    pub fields: Vec<FieldSpec>,
}

impl NodeShape {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }
}

/// Root selector plus the shape of the whole tree
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Type IRI the root node must carry
    pub root_type: String,
    /// Short names for type IRIs, e.g. ("Canvas", sc:Canvas)
    pub type_terms: Vec<(String, String)>,
    pub shape: NodeShape,
}

impl Frame {
    /// Frame of the manifest tree produced by the CONSTRUCT query
    pub fn manifest() -> Self {
        let annotation = NodeShape::new(vec![
            FieldSpec::id(),
            FieldSpec::kind(),
            FieldSpec::node("body", OA_BODY, NodeShape::new(vec![FieldSpec::id()])).required(),
        ]);

        let canvas = NodeShape::new(vec![
            FieldSpec::id(),
            FieldSpec::kind().required(),
            FieldSpec::literal("label", RDFS_LABEL).required(),
            FieldSpec::literal("thumbnail", SC_THUMBNAIL),
            FieldSpec::node("items", SC_ITEMS, annotation).required(),
        ]);

        let range = NodeShape::new(vec![
            FieldSpec::id(),
            FieldSpec::kind().required(),
            FieldSpec::reference("items", SC_ITEMS),
        ]);

        let manifest = NodeShape::new(vec![
            FieldSpec::id(),
            FieldSpec::kind().required(),
            FieldSpec::literal("label", RDFS_LABEL).required(),
            FieldSpec::literal("description", DC_DESCRIPTION),
            FieldSpec::literal("thumbnail", SC_THUMBNAIL),
            FieldSpec::reference("seeAlso", RDFS_SEE_ALSO),
            FieldSpec::reference("homepage", SC_HOMEPAGE),
            FieldSpec::node("items", SC_ITEMS, canvas).required(),
            FieldSpec::node("structures", SC_STRUCTURES, range).required(),
        ]);

        Self {
            root_type: SC_MANIFEST.to_string(),
            type_terms: vec![
                ("Manifest".to_string(), SC_MANIFEST.to_string()),
                ("Range".to_string(), SC_RANGE.to_string()),
                ("Canvas".to_string(), SC_CANVAS.to_string()),
                ("Annotation".to_string(), OA_ANNOTATION.to_string()),
            ],
            shape: manifest,
        }
    }

    /// Short name of a type IRI, or the IRI itself
    pub fn compact_type(&self, type_iri: &str) -> String {
        self.type_terms
            .iter()
            .find(|(_, iri)| iri == type_iri)
            .map(|(term, _)| term.clone())
            .unwrap_or_else(|| type_iri.to_string())
    }

    /// The frame as a JSON-LD context: framed trees are valid JSON-LD under it
    pub fn context(&self) -> Value {
        let mut ctx = Map::new();
        ctx.insert("id".to_string(), json!("@id"));
        ctx.insert("type".to_string(), json!("@type"));
        ctx.insert("value".to_string(), json!("@value"));
        ctx.insert("language".to_string(), json!("@language"));
        for (term, iri) in &self.type_terms {
            ctx.insert(term.clone(), json!({"@id": iri, "@type": "@id"}));
        }
        collect_terms(&self.shape, &mut ctx);
        for (prefix, namespace) in PREFIXES {
            ctx.insert(prefix.to_string(), json!(namespace));
        }
        Value::Object(ctx)
    }
}

fn collect_terms(shape: &NodeShape, ctx: &mut Map<String, Value>) {
    for field in &shape.fields {
        if let Source::Predicate(predicate) = &field.source {
            ctx.entry(field.name.clone())
                .or_insert_with(|| match field.value {
                    ValueShape::Literal => json!({"@id": predicate}),
                    _ => json!({"@id": predicate, "@type": "@id"}),
                });
        }
        if let ValueShape::Node(nested) = &field.value {
            collect_terms(nested, ctx);
        }
    }
}

/// Frame a graph into a nested tree carrying the frame's `@context`
pub fn frame(graph: &Graph, frame: &Frame) -> Result<Value, ManifestError> {
    let mut roots = graph.nodes_of_type(&frame.root_type);
    let root = roots.next().ok_or_else(|| {
        ManifestError::shape(
            "$",
            format!("no node of type <{}> in query result", frame.root_type),
        )
    })?;
    let extra = roots.count();
    if extra > 0 {
        warn!(root = %root.id, extra, "Several root nodes matched the frame, using the first");
    }

    let mut framer = Framer {
        graph,
        frame,
        stack: Vec::new(),
    };
    let mut tree = framer.node(root, &frame.shape, "")?;
    tree.insert("@context".to_string(), frame.context());

    debug!(root = %root.id, "Framed query result");
    Ok(Value::Object(tree))
}

/// Remove the framing context so only document fields remain
pub fn strip_context(tree: Value) -> Value {
    match tree {
        Value::Object(mut obj) => {
            obj.remove("@context");
            Value::Object(obj)
        }
        other => other,
    }
}

struct Framer<'a> {
    graph: &'a Graph,
    frame: &'a Frame,
    /// Ids of the nodes currently being embedded
    stack: Vec<String>,
}

impl<'a> Framer<'a> {
    fn node(
        &mut self,
        node: &Node,
        shape: &NodeShape,
        path: &str,
    ) -> Result<Map<String, Value>, ManifestError> {
        self.stack.push(node.id.clone());
        let result = self.fields(node, shape, path);
        self.stack.pop();
        result
    }

    fn fields(
        &mut self,
        node: &Node,
        shape: &NodeShape,
        path: &str,
    ) -> Result<Map<String, Value>, ManifestError> {
        let mut out = Map::new();

        for field in &shape.fields {
            let field_path = join_path(path, &field.name);
            let mut values = match &field.source {
                Source::Id => vec![Value::String(node.id.clone())],
                Source::Type => node
                    .types
                    .iter()
                    .map(|t| Value::String(self.frame.compact_type(t)))
                    .collect(),
                Source::Predicate(predicate) => {
                    let terms = node.values(predicate);
                    let mut values = Vec::with_capacity(terms.len());
                    for (i, term) in terms.iter().enumerate() {
                        let item_path = if terms.len() > 1 {
                            format!("{}[{}]", field_path, i)
                        } else {
                            field_path.clone()
                        };
                        values.push(self.value(term, &field.value, &item_path)?);
                    }
                    values
                }
            };

            match values.len() {
                0 if field.required => {
                    return Err(ManifestError::shape(
                        field_path,
                        format!("required field missing on <{}>", node.id),
                    ))
                }
                0 => {}
                1 => {
                    out.insert(field.name.clone(), values.remove(0));
                }
                _ => {
                    out.insert(field.name.clone(), Value::Array(values));
                }
            }
        }

        Ok(out)
    }

    fn value(&mut self, term: &Term, shape: &ValueShape, path: &str) -> Result<Value, ManifestError> {
        match shape {
            ValueShape::Literal => Ok(match term {
                Term::Literal(lit) => literal_json(lit),
                Term::Iri(id) | Term::Blank(id) => json!({ "id": id }),
            }),
            ValueShape::Reference => Ok(Value::String(match term {
                Term::Literal(lit) => lit.lexical.clone(),
                Term::Iri(id) | Term::Blank(id) => id.clone(),
            })),
            ValueShape::Node(nested) => match term {
                Term::Literal(lit) => Err(ManifestError::shape(
                    path,
                    format!("expected a node, found literal \"{}\"", lit.lexical),
                )),
                Term::Iri(id) | Term::Blank(id) => {
                    // Already being embedded higher up: emit a node reference
                    if self.stack.iter().any(|s| s == id) {
                        return Ok(json!({ "id": id }));
                    }
                    let graph = self.graph;
                    let placeholder;
                    let node = match graph.node(id) {
                        Some(node) => node,
                        None => {
                            placeholder = Node::empty(id.clone());
                            &placeholder
                        }
                    };
                    Ok(Value::Object(self.node(node, nested, path)?))
                }
            },
        }
    }
}

fn join_path(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

/// Render a literal the way JSON-LD compaction would
fn literal_json(lit: &Literal) -> Value {
    if let Some(language) = &lit.language {
        return json!({ "value": lit.lexical, "language": language });
    }
    let datatype = match lit.datatype.as_deref() {
        None => return Value::String(lit.lexical.clone()),
        Some(dt) if dt == format!("{}string", XSD) => return Value::String(lit.lexical.clone()),
        Some(dt) => dt,
    };
    if is_native_datatype(datatype) {
        let native = match datatype.strip_prefix(XSD) {
            Some("boolean") => lit.lexical.parse::<bool>().ok().map(Value::Bool),
            Some("double") => lit
                .lexical
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number),
            _ => lit.lexical.parse::<i64>().ok().map(|n| Value::Number(n.into())),
        };
        if let Some(native) = native {
            return native;
        }
    }
    json!({ "value": lit.lexical, "type": datatype })
}
