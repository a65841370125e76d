//! End-to-end manifest generation against an in-memory query executor

use std::collections::HashMap;
use std::fs;

use serde_json::{json, Value};

use iiif_manifest::{
    handle, to_json_string, IntegrityWarning, ManifestError, ManifestService, QueryExecutor,
    Settings,
};

const MANIFEST_BASE: &str = "https://marcus-manifest-api.vercel.app/api/iiif/manifest/";
const PAGE_BASE: &str = "http://data.ub.uib.no/instance/page/";

/// Triplestore stand-in answering CONSTRUCT queries by object identifier
#[derive(Default)]
struct InMemoryStore {
    objects: HashMap<String, Value>,
}

impl InMemoryStore {
    fn with(mut self, id: &str, result: Value) -> Self {
        self.objects.insert(id.to_string(), result);
        self
    }
}

fn queried_id(query: &str) -> Option<&str> {
    let marker = "VALUES ?id { \"";
    let start = query.find(marker)? + marker.len();
    let len = query[start..].find('"')?;
    Some(&query[start..start + len])
}

impl QueryExecutor for InMemoryStore {
    fn construct(&self, query: &str) -> Result<Value, ManifestError> {
        let result = queried_id(query)
            .and_then(|id| self.objects.get(id))
            .cloned()
            .unwrap_or_else(|| json!({"@graph": []}));
        Ok(result)
    }
}

fn fixture(name: &str) -> Value {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

fn page_iri(id: &str, n: u32) -> String {
    format!("{}{}_p{}", PAGE_BASE, id, n)
}

/// CONSTRUCT result for an object whose pages carry the given labels
///
/// `pages` lists (page number, sequence label) in the order the store
/// returns them; the range lists the same pages in that order.
fn object_result(id: &str, pages: &[(u32, Value)]) -> Value {
    let manifest = format!("{}{}", MANIFEST_BASE, id);
    let range = format!(
        "http://data.ub.uib.no/instance/manuscript/{}/manifest/range/1",
        id
    );
    let page_refs: Vec<Value> = pages
        .iter()
        .map(|(n, _)| json!({"@id": page_iri(id, *n)}))
        .collect();

    let mut graph = vec![
        json!({
            "@id": manifest,
            "@type": "sc:Manifest",
            "dct:identifier": id,
            "rdfs:label": format!("Object {}", id),
            "rdfs:seeAlso": {"@id": format!("http://data.ub.uib.no/instance/manuscript/{}", id)},
            "sc:homepage": {"@id": format!("http://marcus.uib.no/instance/manuscript/{}", id)},
            "sc:thumbnail": format!("http://data.ub.uib.no/files/{}/thumb.jpg", id),
            "sc:items": page_refs,
            "sc:structures": {"@id": range}
        }),
        json!({
            "@id": range,
            "@type": "sc:Range",
            "sc:items": page_refs
        }),
    ];
    for (n, label) in pages {
        let resource = format!("http://data.ub.uib.no/instance/resource/{}_p{}", id, n);
        graph.push(json!({
            "@id": page_iri(id, *n),
            "@type": "sc:Canvas",
            "rdfs:label": label,
            "sc:thumbnail": format!("http://data.ub.uib.no/files/{}/xs/p{}.jpg", id, n),
            "sc:items": {"@id": resource}
        }));
        graph.push(json!({
            "@id": resource,
            "@type": "oa:Annotation",
            "oa:body": {"@id": format!("http://data.ub.uib.no/files/{}/md/p{}.jpg", id, n)}
        }));
    }

    json!({
        "@context": {
            "sc": "http://iiif.io/api/presentation/3#",
            "oa": "http://www.w3.org/ns/oa#",
            "dct": "http://purl.org/dc/terms/",
            "rdfs": "http://www.w3.org/2000/01/rdf-schema#"
        },
        "@graph": graph
    })
}

fn service(store: InMemoryStore) -> ManifestService<InMemoryStore> {
    ManifestService::new(store, &Settings::default())
}

fn manifest_json(service: &ManifestService<InMemoryStore>, id: &str) -> Value {
    let outcome = service.get_manifest(id).unwrap();
    serde_json::to_value(&outcome.manifest).unwrap()
}

fn canvas_ids(manifest: &Value) -> Vec<String> {
    manifest["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

fn structure_ids(manifest: &Value) -> Vec<String> {
    manifest["structures"][0]["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_three_page_manuscript() {
    let service = service(InMemoryStore::default().with("ubb-ms-0003", fixture("ubb-ms-0003.json")));
    let outcome = service.get_manifest("ubb-ms-0003").unwrap();
    assert!(outcome.warnings.is_empty());

    let manifest = serde_json::to_value(&outcome.manifest).unwrap();
    assert_eq!(
        manifest["id"],
        "https://marcus-manifest-api.vercel.app/api/iiif/manifest/ubb-ms-0003"
    );
    assert_eq!(
        manifest["label"],
        json!({"no": ["Brev fra Amalie Skram til Erik Skram"]})
    );
    assert_eq!(
        manifest["summary"],
        json!({"none": ["Brevet er skrevet i Bergen."]})
    );
    assert_eq!(manifest["items"].as_array().unwrap().len(), 3);
    assert_eq!(manifest["structures"][0]["items"].as_array().unwrap().len(), 3);

    let expected: Vec<String> = (1..=3).map(|n| page_iri("ubb-ms-0003", n)).collect();
    assert_eq!(canvas_ids(&manifest), expected);
    assert_eq!(structure_ids(&manifest), expected);

    let first = &manifest["items"][0];
    assert_eq!(first["label"], json!({"none": ["1"]}));
    assert_eq!(
        first["thumbnail"][0]["id"],
        "http://data.ub.uib.no/files/ms/ubb-ms-0003/data/xs/ubb-ms-0003_p1_xs.jpg"
    );
    assert_eq!(
        first["items"][0]["id"],
        "http://data.ub.uib.no/instance/resource/ubb-ms-0003_p1"
    );
    assert_eq!(
        first["items"][0]["items"][0]["body"]["id"],
        "http://data.ub.uib.no/files/ms/ubb-ms-0003/data/md/ubb-ms-0003_p1_md.jpg"
    );
    assert_eq!(
        manifest["homepage"][0]["id"],
        "http://marcus.uib.no/instance/manuscript/ubb-ms-0003"
    );
}

#[test]
fn test_first_page_label_from_single_page_variant() {
    // The default query also labels the first page with a plain integer
    let service = service(InMemoryStore::default().with("ubb-ms-0004", fixture("ubb-ms-0004.json")));
    let outcome = service.get_manifest("ubb-ms-0004").unwrap();
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);

    let manifest = serde_json::to_value(&outcome.manifest).unwrap();
    let expected: Vec<String> = (1..=2).map(|n| page_iri("ubb-ms-0004", n)).collect();
    assert_eq!(canvas_ids(&manifest), expected);
    assert_eq!(structure_ids(&manifest), expected);
    assert_eq!(manifest["items"][0]["label"], json!({"none": ["1"]}));
}

#[test]
fn test_unknown_object_has_no_manifest() {
    let service = service(InMemoryStore::default());
    let err = service.get_manifest("ubb-ms-9999").unwrap_err();
    assert!(matches!(err, ManifestError::ShapeMismatch { .. }));

    let response = handle(&service, "GET", Some("ubb-ms-9999"));
    assert_eq!(response.status, 404);
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert!(body.get("items").is_none());
    assert_eq!(body["error"]["kind"], "shape_mismatch");
}

#[test]
fn test_single_page_object_from_rdf_json() {
    let service = service(
        InMemoryStore::default().with("ubb-brev-0042", fixture("ubb-brev-single.rdf.json")),
    );
    let manifest = manifest_json(&service, "ubb-brev-0042");

    assert_eq!(manifest["label"], json!({"no": ["Visittkort"]}));
    assert!(manifest.get("summary").is_none());
    assert_eq!(canvas_ids(&manifest), vec![page_iri("ubb-brev-0042", 1)]);
    assert_eq!(structure_ids(&manifest), vec![page_iri("ubb-brev-0042", 1)]);
    assert_eq!(
        manifest["items"][0]["items"][0]["items"][0]["id"],
        format!("{}/annotation/1", page_iri("ubb-brev-0042", 1))
    );
}

#[test]
fn test_canvases_follow_sequence_labels() {
    let result = object_result(
        "ubb-ms-0100",
        &[(1, json!(1)), (3, json!(3)), (2, json!(2))],
    );
    let service = service(InMemoryStore::default().with("ubb-ms-0100", result));
    let manifest = manifest_json(&service, "ubb-ms-0100");

    let labels: Vec<&Value> = manifest["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| &c["label"]["none"][0])
        .collect();
    assert_eq!(labels, vec!["1", "2", "3"]);
}

#[test]
fn test_structures_use_numeric_page_order() {
    let result = object_result(
        "ubb-ms-0101",
        &[(1, json!(1)), (10, json!(10)), (2, json!(2))],
    );
    let service = service(InMemoryStore::default().with("ubb-ms-0101", result));
    let outcome = service.get_manifest("ubb-ms-0101").unwrap();
    assert!(outcome.warnings.is_empty());

    let manifest = serde_json::to_value(&outcome.manifest).unwrap();
    let expected = vec![
        page_iri("ubb-ms-0101", 1),
        page_iri("ubb-ms-0101", 2),
        page_iri("ubb-ms-0101", 10),
    ];
    assert_eq!(structure_ids(&manifest), expected);
    assert_eq!(canvas_ids(&manifest), expected);
}

#[test]
fn test_output_is_idempotent() {
    let service = service(InMemoryStore::default().with("ubb-ms-0003", fixture("ubb-ms-0003.json")));
    let first = to_json_string(&service.get_manifest("ubb-ms-0003").unwrap().manifest, false).unwrap();
    let second = to_json_string(&service.get_manifest("ubb-ms-0003").unwrap().manifest, false).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_structure_items_reference_canvases() {
    let result = object_result(
        "ubb-ms-0102",
        &[(4, json!(4)), (2, json!(2)), (3, json!(3)), (1, json!(1))],
    );
    let service = service(InMemoryStore::default().with("ubb-ms-0102", result));
    let manifest = manifest_json(&service, "ubb-ms-0102");

    let canvases = canvas_ids(&manifest);
    for id in structure_ids(&manifest) {
        assert!(canvases.contains(&id), "{} is not a canvas", id);
    }
}

#[test]
fn test_divergent_labels_still_build() {
    // Page 2 carries sequence number 9
    let result = object_result(
        "ubb-ms-0103",
        &[(1, json!(1)), (2, json!(9)), (3, json!(3))],
    );
    let service = service(InMemoryStore::default().with("ubb-ms-0103", result));
    let outcome = service.get_manifest("ubb-ms-0103").unwrap();

    assert_eq!(outcome.manifest.items.len(), 3);
    assert!(outcome
        .warnings
        .iter()
        .any(|w| matches!(w, IntegrityWarning::OrderingDivergence { .. })));
}

#[test]
fn test_handler_serves_manifest_json() {
    let service = service(InMemoryStore::default().with("ubb-ms-0003", fixture("ubb-ms-0003.json")));
    let response = handle(&service, "GET", Some("ubb-ms-0003"));

    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/json"));
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["@context"], "http://iiif.io/api/presentation/3/context.json");
    assert_eq!(body["type"], "Manifest");
}
