//! Manifest pipeline orchestration
//!
//! `ManifestService::get_manifest` runs the whole chain for one identifier:
//! query building, execution, framing, reconciliation and manifest building.
//! Only execution touches the network; `transform` runs the remaining stages
//! on a result that is already in hand.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, info_span, warn};
use ulid::Ulid;

use crate::config::Settings;
use crate::error::ManifestError;
use crate::executor::{QueryExecutor, SparqlClient};
use crate::frame::{frame, Frame};
use crate::graph::Graph;
use crate::identifier::ObjectIdentifier;
use crate::manifest::{build_manifest, Manifest, ManifestConfig};
use crate::query::{build_construct_query, QueryOptions};
use crate::reconcile::{reconcile, FramedManifest, IntegrityWarning};

/// A built manifest together with the data problems found on the way
#[derive(Debug, Clone)]
pub struct ManifestOutcome {
    pub manifest: Manifest,
    pub warnings: Vec<IntegrityWarning>,
}

/// Stateless manifest service over a query executor
pub struct ManifestService<E> {
    executor: E,
    frame: Frame,
    query: QueryOptions,
    manifest: ManifestConfig,
}

impl ManifestService<SparqlClient> {
    /// Service talking to the endpoint configured in `settings`
    pub fn from_settings(settings: &Settings) -> Result<Self, ManifestError> {
        let client = SparqlClient::new(&settings.endpoint)?;
        Ok(Self::new(client, settings))
    }
}

impl<E: QueryExecutor> ManifestService<E> {
    pub fn new(executor: E, settings: &Settings) -> Self {
        Self {
            executor,
            frame: Frame::manifest(),
            query: settings.query.clone(),
            manifest: settings.manifest.clone(),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Build the manifest for an object identifier
    pub fn get_manifest(&self, raw_id: &str) -> Result<ManifestOutcome, ManifestError> {
        let request_id = Ulid::new();
        let span = info_span!("manifest", request_id = %request_id, id = raw_id);
        let _guard = span.enter();

        let result = self.run(raw_id);
        match &result {
            Ok(outcome) => info!(
                canvases = outcome.manifest.items.len(),
                warnings = outcome.warnings.len(),
                "Manifest built"
            ),
            Err(e) => warn!(kind = e.kind(), error = %e, "Manifest request failed"),
        }
        result
    }

    fn run(&self, raw_id: &str) -> Result<ManifestOutcome, ManifestError> {
        let id = ObjectIdentifier::parse(raw_id)?;
        let query = build_construct_query(&id, &self.query);
        debug!(query_len = query.len(), "Built CONSTRUCT query");

        let raw = self.executor.construct(&query)?;
        transform(&raw, &self.frame, &self.manifest)
    }
}

/// Frame a raw query result into a tree
pub fn frame_result(raw: &Value, frame_def: &Frame) -> Result<Value, ManifestError> {
    let graph = Graph::from_json(raw)?;
    debug!(
        nodes = graph.len(),
        triples = graph.triple_count(),
        "Decoded query result"
    );
    frame(&graph, frame_def)
}

/// Run every stage after query execution
pub fn transform(
    raw: &Value,
    frame_def: &Frame,
    config: &ManifestConfig,
) -> Result<ManifestOutcome, ManifestError> {
    let tree = frame_result(raw, frame_def)?;
    let framed = FramedManifest::from_document(tree)?;
    let reconciled = reconcile(framed)?;

    for warning in &reconciled.warnings {
        warn!(warning = ?warning, "{}", warning);
    }

    Ok(ManifestOutcome {
        manifest: build_manifest(&reconciled.manifest, config),
        warnings: reconciled.warnings,
    })
}

/// Serialize a document to a JSON string
pub fn to_json_string<T: Serialize>(value: &T, pretty: bool) -> Result<String, ManifestError> {
    if pretty {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(serde_json::to_string(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Executor answering every query with a fixed result
    struct Canned {
        result: Value,
        queries: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(result: Value) -> Self {
            Self {
                result,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    impl QueryExecutor for Canned {
        fn construct(&self, query: &str) -> Result<Value, ManifestError> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.result.clone())
        }
    }

    fn single_page_result() -> Value {
        json!({
            "@context": {
                "sc": "http://iiif.io/api/presentation/3#",
                "oa": "http://www.w3.org/ns/oa#",
                "rdfs": "http://www.w3.org/2000/01/rdf-schema#"
            },
            "@graph": [
                {
                    "@id": "https://example.org/manifest/ms-1",
                    "@type": "sc:Manifest",
                    "rdfs:label": "Letter",
                    "sc:items": {"@id": "http://example.org/page/ms-1_p1"},
                    "sc:structures": {"@id": "http://example.org/range/1"}
                },
                {
                    "@id": "http://example.org/range/1",
                    "@type": "sc:Range",
                    "sc:items": {"@id": "http://example.org/page/ms-1_p1"}
                },
                {
                    "@id": "http://example.org/page/ms-1_p1",
                    "@type": "sc:Canvas",
                    "rdfs:label": 1,
                    "sc:items": {"@id": "http://example.org/resource/1"}
                },
                {
                    "@id": "http://example.org/resource/1",
                    "@type": "oa:Annotation",
                    "oa:body": {"@id": "http://example.org/img/1.jpg"}
                }
            ]
        })
    }

    #[test]
    fn test_get_manifest_sends_one_query() {
        let service = ManifestService::new(Canned::new(single_page_result()), &Settings::default());
        let outcome = service.get_manifest("ms-1").unwrap();

        assert_eq!(outcome.manifest.items.len(), 1);
        assert!(outcome.warnings.is_empty());

        let queries = service.executor().queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("VALUES ?id { \"ms-1\" }"));
    }

    #[test]
    fn test_invalid_identifier_is_rejected_before_query() {
        let service = ManifestService::new(Canned::new(single_page_result()), &Settings::default());
        let err = service.get_manifest("ms-1\" } ?s ?p ?o {").unwrap_err();

        assert!(matches!(err, ManifestError::InvalidIdentifier { .. }));
        assert!(service.executor().queries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_empty_result_is_shape_mismatch() {
        let err = transform(&json!([]), &Frame::manifest(), &ManifestConfig::default())
            .unwrap_err();
        assert!(matches!(err, ManifestError::ShapeMismatch { .. }));
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_select_result_is_decode_error() {
        let raw = json!({"head": {"vars": ["s"]}, "results": {"bindings": []}});
        let err = transform(&raw, &Frame::manifest(), &ManifestConfig::default()).unwrap_err();
        assert!(matches!(err, ManifestError::Decode(_)));
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn test_to_json_string() {
        let value = json!({"a": 1});
        assert_eq!(to_json_string(&value, false).unwrap(), "{\"a\":1}");
        assert!(to_json_string(&value, true).unwrap().contains('\n'));
    }
}
