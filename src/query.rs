//! CONSTRUCT query generation
//!
//! Builds the graph query that re-expresses catalog data about one object as
//! manifest, range, canvas and annotation nodes ready for framing.

use serde::{Deserialize, Serialize};

use crate::identifier::ObjectIdentifier;
use crate::vocab::{PREFIXES, SINGLE_PAGE_LABEL};

/// Options controlling the synthetic IRIs and the query variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Base the manifest IRI is built from (identifier appended)
    pub manifest_base: String,
    /// Base of the range IRI: `<range_base><id>/manifest/range/1`
    pub range_base: String,
    /// Base of page IRIs: `<page_base><id>_p1`
    pub page_base: String,
    /// Host in the subject IRI that is replaced to form the homepage
    pub homepage_host: String,
    /// Replacement host for the homepage
    pub homepage_replacement: String,
    /// Also emit a synthetic first canvas for objects with a single page
    pub single_page: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            manifest_base: "https://marcus-manifest-api.vercel.app/api/iiif/manifest/".to_string(),
            range_base: "http://data.ub.uib.no/instance/manuscript/".to_string(),
            page_base: "http://data.ub.uib.no/instance/page/".to_string(),
            homepage_host: "data.ub.uib.no".to_string(),
            homepage_replacement: "marcus.uib.no".to_string(),
            single_page: true,
        }
    }
}

/// Escape a value for use inside a double-quoted query string literal
fn string_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Build the CONSTRUCT query for an object
pub fn build_construct_query(id: &ObjectIdentifier, options: &QueryOptions) -> String {
    let mut query = String::new();

    for (prefix, namespace) in PREFIXES {
        query.push_str(&format!("PREFIX {}: <{}>\n", prefix, namespace));
    }

    query.push_str(
        "
CONSTRUCT {
  ?manifestURL rdf:type sc:Manifest .
  ?manifestURL dct:identifier ?id .
  ?manifestURL rdfs:label ?title .
  ?manifestURL rdfs:seeAlso ?s .
  ?manifestURL sc:homepage ?homepage .
  ?manifestURL dc:description ?desc .
  ?manifestURL sc:thumbnail ?thumb .
  ?manifestURL sc:items ?part .
  ?manifestURL sc:structures ?rangeURL .
  ?rangeURL rdf:type sc:Range .
  ?rangeURL sc:items ?part .
  ?part rdf:type sc:Canvas .
  ?part rdfs:label ?seq .
  ?part sc:thumbnail ?canvasThumb .
  ?part sc:items ?resource .
  ?resource rdf:type oa:Annotation .
  ?resource oa:body ?imgUrl .
",
    );

    if options.single_page {
        query.push_str(&format!(
            "  ?manifestURL sc:items ?singleCanvas .
  ?rangeURL sc:items ?singleCanvas .
  ?singleCanvas rdf:type sc:Canvas .
  ?singleCanvas rdfs:label {label} .
  ?singleCanvas sc:thumbnail ?singleCanvasThumb .
  ?singleCanvas sc:items ?singlePart .
  ?singlePart rdf:type oa:Annotation .
  ?singlePart oa:body ?singleImageUrl .
",
            label = SINGLE_PAGE_LABEL,
        ));
    }

    query.push_str(&format!(
        "}}
WHERE {{
  GRAPH ?g {{
    VALUES ?id {{ {id} }}
    ?s ubbont:hasRepresentation ?repr ;
       dct:title ?title ;
       dct:identifier ?id ;
       ubbont:hasThumbnail ?thumb .
    OPTIONAL {{ ?s dct:description ?desc }}
",
        id = string_literal(id.as_str()),
    ));

    if options.single_page {
        query.push_str(&format!(
            "    OPTIONAL {{
      ?repr dct:hasPart ?singlePart .
      ?singlePart ubbont:hasXSView ?singleCanvasThumb .
      OPTIONAL {{ ?singlePart ubbont:hasMDView ?singleMD }}
      OPTIONAL {{ ?singlePart ubbont:hasSMView ?singleSM }}
    }}
    BIND(coalesce(?singleMD, ?singleSM) AS ?singleImage)
    BIND(iri(?singleImage) AS ?singleImageUrl)
    BIND(iri(concat({page_base}, ?id, \"_p1\")) AS ?singleCanvas)
",
            page_base = string_literal(&options.page_base),
        ));
    }

    query.push_str(&format!(
        "    OPTIONAL {{
      ?repr dct:hasPart ?part .
      ?part ubbont:hasResource ?resource ;
            ubbont:sequenceNr ?seq .
      ?resource ubbont:hasMDView ?image ;
                ubbont:hasXSView ?canvasThumb .
    }}
    BIND(iri(?image) AS ?imgUrl)
    BIND(iri(concat({manifest_base}, ?id)) AS ?manifestURL)
    BIND(iri(concat({range_base}, ?id, \"/manifest/range/1\")) AS ?rangeURL)
    BIND(iri(replace(str(?s), {host}, {replacement}, \"i\")) AS ?homepage)
  }}
}}
ORDER BY ?s ?repr ?part ?resource ?image
",
        manifest_base = string_literal(&options.manifest_base),
        range_base = string_literal(&options.range_base),
        host = string_literal(&regex_escape(&options.homepage_host)),
        replacement = string_literal(&options.homepage_replacement),
    ));

    query
}

/// Escape regex metacharacters for the query's replace() pattern
fn regex_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if ".^$|?*+()[]{}\\".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
