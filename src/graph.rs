//! Triple graph decoded from a query result
//!
//! The endpoint answers a CONSTRUCT query with a JSON serialization of the
//! resulting graph. Both JSON-LD (a flattened `@graph` compacted with an
//! inline term context) and RDF/JSON are decoded here into one
//! subject-indexed set of triples that the framer can walk.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ManifestError;
use crate::vocab::{expand_prefixed, RDF_TYPE, XSD};

/// Object position of a triple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Iri(String),
    Blank(String),
    Literal(Literal),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<String>,
    pub language: Option<String>,
}

impl Term {
    fn node(id: String) -> Self {
        if id.starts_with("_:") {
            Term::Blank(id)
        } else {
            Term::Iri(id)
        }
    }

    pub fn literal(lexical: impl Into<String>) -> Self {
        Term::Literal(Literal {
            lexical: lexical.into(),
            datatype: None,
            language: None,
        })
    }

    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal(Literal {
            lexical: lexical.into(),
            datatype: Some(datatype.into()),
            language: None,
        })
    }
}

/// A subject with its types and outgoing properties
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub types: Vec<String>,
    pub properties: BTreeMap<String, Vec<Term>>,
}

impl Node {
    /// Node with no types or properties
    pub fn empty(id: String) -> Self {
        Self {
            id,
            types: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn values(&self, predicate: &str) -> &[Term] {
        self.properties
            .get(predicate)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_type(&self, type_iri: &str) -> bool {
        self.types.iter().any(|t| t == type_iri)
    }
}

/// Set of triples grouped by subject, in first-seen subject order
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    blank_counter: usize,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a JSON-LD or RDF/JSON document
    pub fn from_json(doc: &Value) -> Result<Self, ManifestError> {
        let mut graph = Graph::new();

        match doc {
            Value::Array(nodes) => graph.read_node_list(nodes, &Context::default())?,
            Value::Object(obj) if is_rdf_json(obj) => graph.read_rdf_json(obj)?,
            Value::Object(obj) => {
                let ctx = Context::from_json(obj.get("@context"));
                if let Some(nodes) = obj.get("@graph") {
                    match nodes {
                        Value::Array(list) => graph.read_node_list(list, &ctx)?,
                        Value::Object(node) => {
                            graph.read_node(node, &ctx)?;
                        }
                        _ => return Err(ManifestError::Decode("@graph must be an array".into())),
                    }
                } else if obj.keys().any(|k| k != "@context") {
                    if !obj.keys().any(|k| k != "@context" && ctx.is_mapped(k)) {
                        return Err(ManifestError::Decode(
                            "result is neither JSON-LD nor RDF/JSON".to_string(),
                        ));
                    }
                    graph.read_node(obj, &ctx)?;
                }
            }
            _ => {
                return Err(ManifestError::Decode(
                    "expected a JSON object or array".to_string(),
                ))
            }
        }

        debug!(
            nodes = graph.nodes.len(),
            triples = graph.triple_count(),
            "Decoded query result"
        );
        Ok(graph)
    }

    /// Add one triple, collapsing duplicates
    pub fn insert(&mut self, subject: &str, predicate: &str, object: Term) {
        let node = self.node_mut(subject);
        if predicate == RDF_TYPE {
            if let Term::Iri(type_iri) = &object {
                if !node.types.contains(type_iri) {
                    node.types.push(type_iri.clone());
                }
                return;
            }
        }
        let values = node.properties.entry(predicate.to_string()).or_default();
        if !values.contains(&object) {
            values.push(object);
        }
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn nodes_of_type<'a>(&'a self, type_iri: &'a str) -> impl Iterator<Item = &'a Node> {
        self.nodes.iter().filter(move |n| n.has_type(type_iri))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn triple_count(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| n.types.len() + n.properties.values().map(Vec::len).sum::<usize>())
            .sum()
    }

    fn node_mut(&mut self, id: &str) -> &mut Node {
        let idx = match self.index.get(id) {
            Some(&i) => i,
            None => {
                self.nodes.push(Node::empty(id.to_string()));
                self.index.insert(id.to_string(), self.nodes.len() - 1);
                self.nodes.len() - 1
            }
        };
        &mut self.nodes[idx]
    }

    fn fresh_blank(&mut self) -> String {
        self.blank_counter += 1;
        format!("_:b{}", self.blank_counter)
    }

    fn read_node_list(&mut self, nodes: &[Value], ctx: &Context) -> Result<(), ManifestError> {
        for node in nodes {
            match node {
                Value::Object(obj) => {
                    self.read_node(obj, ctx)?;
                }
                other => {
                    return Err(ManifestError::Decode(format!(
                        "expected node object, found {}",
                        other
                    )))
                }
            }
        }
        Ok(())
    }

    /// Read a JSON-LD node object, returning its subject id
    fn read_node(&mut self, obj: &Map<String, Value>, ctx: &Context) -> Result<String, ManifestError> {
        let mut subject = None;
        for (key, value) in obj {
            if ctx.keyword(key) == Some("@id") {
                let id = value
                    .as_str()
                    .ok_or_else(|| ManifestError::Decode(format!("@id must be a string: {}", value)))?;
                subject = Some(ctx.expand_iri(id, false));
            }
        }
        let subject = match subject {
            Some(s) => s,
            None => self.fresh_blank(),
        };
        // Register the node even when it carries no properties
        self.node_mut(&subject);

        for (key, value) in obj {
            match ctx.keyword(key) {
                Some("@type") => {
                    for t in as_list(value) {
                        if let Some(t) = t.as_str() {
                            let type_iri = ctx.expand_iri(t, true);
                            self.insert(&subject, RDF_TYPE, Term::Iri(type_iri));
                        }
                    }
                }
                Some(_) => {}
                None => {
                    let predicate = ctx.expand_iri(key, true);
                    if !predicate.contains(':') {
                        debug!(term = %key, "Skipping property without IRI mapping");
                        continue;
                    }
                    let coercion = ctx.coercion(key);
                    let mut objects = Vec::new();
                    self.read_value(value, ctx, &coercion, &mut objects)?;
                    for object in objects {
                        self.insert(&subject, &predicate, object);
                    }
                }
            }
        }

        Ok(subject)
    }

    fn read_value(
        &mut self,
        value: &Value,
        ctx: &Context,
        coercion: &Coercion,
        out: &mut Vec<Term>,
    ) -> Result<(), ManifestError> {
        match value {
            Value::Null => {}
            Value::String(s) => out.push(match coercion {
                Coercion::Id => Term::node(ctx.expand_iri(s, false)),
                Coercion::Datatype(dt) => Term::typed(s.clone(), dt.clone()),
                Coercion::None => Term::literal(s.clone()),
            }),
            Value::Number(n) => {
                let datatype = match coercion {
                    Coercion::Datatype(dt) => dt.clone(),
                    _ if n.is_f64() => format!("{}double", XSD),
                    _ => format!("{}integer", XSD),
                };
                out.push(Term::typed(n.to_string(), datatype));
            }
            Value::Bool(b) => out.push(Term::typed(b.to_string(), format!("{}boolean", XSD))),
            Value::Array(items) => {
                for item in items {
                    self.read_value(item, ctx, coercion, out)?;
                }
            }
            Value::Object(obj) => {
                let mut value_key = None;
                let mut id_key = None;
                for key in obj.keys() {
                    match ctx.keyword(key) {
                        Some("@value") => value_key = Some(key),
                        Some("@id") => id_key = Some(key),
                        _ => {}
                    }
                }

                if let Some(key) = value_key {
                    out.push(read_value_object(obj, &obj[key.as_str()], ctx));
                } else if let Some(key) = id_key.filter(|_| obj.len() == 1) {
                    let id = obj[key.as_str()]
                        .as_str()
                        .ok_or_else(|| ManifestError::Decode("@id must be a string".into()))?;
                    out.push(Term::node(ctx.expand_iri(id, false)));
                } else {
                    let id = self.read_node(obj, ctx)?;
                    out.push(Term::node(id));
                }
            }
        }
        Ok(())
    }

    fn read_rdf_json(&mut self, doc: &Map<String, Value>) -> Result<(), ManifestError> {
        for (subject, predicates) in doc {
            self.node_mut(subject);
            let Some(predicates) = predicates.as_object() else {
                continue;
            };
            for (predicate, objects) in predicates {
                for object in as_list(objects) {
                    let kind = object.get("type").and_then(Value::as_str).unwrap_or("literal");
                    let value = object
                        .get("value")
                        .and_then(Value::as_str)
                        .ok_or_else(|| {
                            ManifestError::Decode(format!(
                                "RDF/JSON object of <{}> has no string value",
                                predicate
                            ))
                        })?
                        .to_string();
                    let term = match kind {
                        "uri" => Term::Iri(value),
                        "bnode" => Term::Blank(value),
                        _ => Term::Literal(Literal {
                            lexical: value,
                            datatype: object
                                .get("datatype")
                                .and_then(Value::as_str)
                                .map(String::from),
                            language: object.get("lang").and_then(Value::as_str).map(String::from),
                        }),
                    };
                    self.insert(subject, predicate, term);
                }
            }
        }
        Ok(())
    }
}

fn read_value_object(obj: &Map<String, Value>, value: &Value, ctx: &Context) -> Term {
    let lexical = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let mut datatype = None;
    let mut language = None;
    for (key, v) in obj {
        match ctx.keyword(key) {
            Some("@type") => datatype = v.as_str().map(|t| ctx.expand_iri(t, true)),
            Some("@language") => language = v.as_str().map(String::from),
            _ => {}
        }
    }
    if datatype.is_none() && language.is_none() {
        datatype = match value {
            Value::Number(n) if n.is_f64() => Some(format!("{}double", XSD)),
            Value::Number(_) => Some(format!("{}integer", XSD)),
            Value::Bool(_) => Some(format!("{}boolean", XSD)),
            _ => None,
        };
    }
    Term::Literal(Literal {
        lexical,
        datatype,
        language,
    })
}

fn as_list(value: &Value) -> impl Iterator<Item = &Value> {
    match value {
        Value::Array(items) => items.iter().collect::<Vec<_>>().into_iter(),
        other => vec![other].into_iter(),
    }
}

/// RDF/JSON: `{ subject: { predicate: [ {type, value}, ... ] } }`
fn is_rdf_json(obj: &Map<String, Value>) -> bool {
    !obj.is_empty()
        && obj.iter().all(|(subject, predicates)| {
            !subject.starts_with('@')
                && predicates.as_object().is_some_and(|preds| {
                    preds.values().all(|objects| {
                        objects.as_array().is_some_and(|list| {
                            list.iter()
                                .all(|o| o.get("type").is_some() && o.get("value").is_some())
                        })
                    })
                })
        })
}

/// Value coercion declared by a term definition
#[derive(Debug, Clone, PartialEq)]
enum Coercion {
    None,
    Id,
    Datatype(String),
}

#[derive(Debug, Clone)]
struct TermDefinition {
    iri: String,
    coercion: Coercion,
}

/// Inline JSON-LD context: term definitions, prefixes and keyword aliases
#[derive(Debug, Clone, Default)]
struct Context {
    terms: HashMap<String, TermDefinition>,
}

impl Context {
    fn from_json(local: Option<&Value>) -> Context {
        let mut ctx = Context::default();
        match local {
            Some(Value::Object(defs)) => ctx.define(defs),
            Some(other) => debug!(context = %other, "Ignoring non-inline JSON-LD context"),
            None => {}
        }
        ctx
    }

    fn define(&mut self, defs: &Map<String, Value>) {
        // Raw definitions first, so compact IRIs in later terms can use any prefix
        let mut raw = Vec::new();
        for (term, def) in defs {
            if term.starts_with('@') {
                continue;
            }
            let (id, coercion) = match def {
                Value::String(id) => (Some(id.clone()), None),
                Value::Object(obj) => (
                    obj.get("@id").and_then(Value::as_str).map(String::from),
                    obj.get("@type").and_then(Value::as_str).map(String::from),
                ),
                _ => continue,
            };
            raw.push((term.clone(), id, coercion));
        }
        for (term, id, _) in &raw {
            if let Some(id) = id {
                self.terms.insert(
                    term.clone(),
                    TermDefinition {
                        iri: id.clone(),
                        coercion: Coercion::None,
                    },
                );
            }
        }
        for (term, id, coercion) in raw {
            let iri = match id {
                Some(id) if id.starts_with('@') => id,
                Some(id) => self.expand_iri(&id, true),
                None => self.expand_iri(&term, true),
            };
            let coercion = match coercion.as_deref() {
                Some("@id") | Some("@vocab") => Coercion::Id,
                Some(dt) => Coercion::Datatype(self.expand_iri(dt, true)),
                None => Coercion::None,
            };
            self.terms.insert(term, TermDefinition { iri, coercion });
        }
    }

    /// Keyword a key stands for, directly or through an alias
    fn keyword<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        if key.starts_with('@') {
            return Some(key);
        }
        self.terms
            .get(key)
            .map(|def| def.iri.as_str())
            .filter(|iri| iri.starts_with('@'))
    }

    fn coercion(&self, term: &str) -> Coercion {
        self.terms
            .get(term)
            .map(|def| def.coercion.clone())
            .unwrap_or(Coercion::None)
    }

    /// Whether a key is a keyword or expands to a property IRI
    fn is_mapped(&self, key: &str) -> bool {
        self.keyword(key).is_some() || self.expand_iri(key, true).contains(':')
    }

    /// Expand a term or compact IRI; `vocab` selects property/type position
    fn expand_iri(&self, value: &str, vocab: bool) -> String {
        if value.starts_with('@') {
            return value.to_string();
        }
        if vocab {
            if let Some(def) = self.terms.get(value) {
                return def.iri.clone();
            }
        }
        if let Some((prefix, suffix)) = value.split_once(':') {
            if prefix == "_" || suffix.starts_with("//") {
                return value.to_string();
            }
            if let Some(def) = self.terms.get(prefix) {
                return format!("{}{}", def.iri, suffix);
            }
            // Results without a context still use the query's prefixes
            return expand_prefixed(value).unwrap_or_else(|| value.to_string());
        }
        value.to_string()
    }
}
