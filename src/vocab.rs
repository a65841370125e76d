//! Vocabulary definitions for manifest generation
//!
//! Namespaces used in the CONSTRUCT query and the framing schema, plus the
//! fixed IIIF Presentation constants.

/// IIIF Presentation 3 namespace
pub const SC: &str = "http://iiif.io/api/presentation/3#";
/// Web Annotation namespace
pub const OA: &str = "http://www.w3.org/ns/oa#";
/// Dublin Core terms
pub const DCT: &str = "http://purl.org/dc/terms/";
/// Dublin Core elements
pub const DC: &str = "http://purl.org/dc/elements/1.1/";
pub const RDF: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
pub const RDFS: &str = "http://www.w3.org/2000/01/rdf-schema#";
pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
/// University of Bergen Library ontology
pub const UBBONT: &str = "http://data.ub.uib.no/ontology/";

/// Prefixes declared in the query and in the frame context, in that order
pub const PREFIXES: &[(&str, &str)] = &[
    ("sc", SC),
    ("oa", OA),
    ("dct", DCT),
    ("rdf", RDF),
    ("ubbont", UBBONT),
    ("rdfs", RDFS),
    ("dc", DC),
];

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_SEE_ALSO: &str = "http://www.w3.org/2000/01/rdf-schema#seeAlso";
pub const DC_DESCRIPTION: &str = "http://purl.org/dc/elements/1.1/description";
pub const DCT_IDENTIFIER: &str = "http://purl.org/dc/terms/identifier";

pub const SC_MANIFEST: &str = "http://iiif.io/api/presentation/3#Manifest";
pub const SC_RANGE: &str = "http://iiif.io/api/presentation/3#Range";
pub const SC_CANVAS: &str = "http://iiif.io/api/presentation/3#Canvas";
pub const SC_ITEMS: &str = "http://iiif.io/api/presentation/3#items";
pub const SC_STRUCTURES: &str = "http://iiif.io/api/presentation/3#structures";
pub const SC_THUMBNAIL: &str = "http://iiif.io/api/presentation/3#thumbnail";
pub const SC_HOMEPAGE: &str = "http://iiif.io/api/presentation/3#homepage";

pub const OA_ANNOTATION: &str = "http://www.w3.org/ns/oa#Annotation";
pub const OA_BODY: &str = "http://www.w3.org/ns/oa#body";

/// JSON-LD context of IIIF Presentation 3 documents
pub const IIIF_CONTEXT: &str = "http://iiif.io/api/presentation/3/context.json";

/// Marker preceding the page number in page IRIs ("..._p3")
pub const PAGE_MARKER: &str = "_p";

/// Label the single-page query variant gives the synthetic first canvas
pub const SINGLE_PAGE_LABEL: &str = "1";

/// Expand a compact IRI ("sc:items") using the known prefixes
pub fn expand_prefixed(compact: &str) -> Option<String> {
    let (prefix, local) = compact.split_once(':')?;
    PREFIXES
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, ns)| format!("{}{}", ns, local))
}

/// Whether an xsd datatype maps to a JSON number or boolean
pub fn is_native_datatype(datatype: &str) -> bool {
    matches!(
        datatype.strip_prefix(XSD),
        Some("integer" | "int" | "long" | "short" | "nonNegativeInteger" | "positiveInteger" | "boolean" | "double")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_prefixed() {
        assert_eq!(expand_prefixed("sc:items").as_deref(), Some(SC_ITEMS));
        assert_eq!(expand_prefixed("rdfs:label").as_deref(), Some(RDFS_LABEL));
        assert_eq!(expand_prefixed("foaf:name"), None);
        assert_eq!(expand_prefixed("label"), None);
    }

    #[test]
    fn test_native_datatypes() {
        assert!(is_native_datatype("http://www.w3.org/2001/XMLSchema#integer"));
        assert!(is_native_datatype("http://www.w3.org/2001/XMLSchema#boolean"));
        assert!(!is_native_datatype("http://www.w3.org/2001/XMLSchema#string"));
        assert!(!is_native_datatype("http://www.w3.org/2001/XMLSchema#anyURI"));
    }
}
