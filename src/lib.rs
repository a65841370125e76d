//! IIIF Manifest Library
//!
//! This library builds IIIF Presentation API 3.0 manifests for digitized
//! objects described in an RDF triplestore.
//!
//! # Overview
//!
//! A manifest request for an object identifier runs through these stages:
//!
//! 1. Build a CONSTRUCT query that re-expresses the catalog data as
//!    manifest, range, canvas and annotation nodes
//! 2. Execute it against the graph-query endpoint (the only I/O)
//! 3. Frame the resulting triples into a tree rooted at the manifest
//! 4. Reconcile the tree: collections become lists, canvases and range
//!    entries get their page order
//! 5. Build the IIIF document with the institution constants from
//!    `ManifestConfig`
//!
//! # Usage
//!
//! ## Build a manifest from the configured endpoint
//!
//! ```ignore
//! use iiif_manifest::{to_json_string, ManifestService, Settings};
//!
//! let service = ManifestService::from_settings(&Settings::default())?;
//! let outcome = service.get_manifest("ubb-ms-0003")?;
//!
//! for warning in &outcome.warnings {
//!     eprintln!("{}", warning);
//! }
//! println!("{}", to_json_string(&outcome.manifest, true)?);
//! ```
//!
//! ## Build a manifest from a stored query result
//!
//! ```ignore
//! use iiif_manifest::{transform, Frame, ManifestConfig};
//!
//! let raw: serde_json::Value = // CONSTRUCT result as JSON-LD or RDF/JSON
//! let outcome = transform(&raw, &Frame::manifest(), &ManifestConfig::default())?;
//! ```

pub mod config;
pub mod error;
pub mod executor;
pub mod frame;
pub mod graph;
pub mod handler;
pub mod identifier;
pub mod manifest;
pub mod pipeline;
pub mod query;
pub mod reconcile;
pub mod vocab;

// Re-export main types for convenience
pub use crate::config::Settings;
pub use crate::error::ManifestError;
pub use crate::executor::{EndpointConfig, QueryExecutor, RetryPolicy, SparqlClient};
pub use crate::frame::{frame, strip_context, Frame};
pub use crate::graph::Graph;
pub use crate::handler::{handle, HandlerResponse};
pub use crate::identifier::ObjectIdentifier;
pub use crate::manifest::{build_manifest, Manifest, ManifestConfig};
pub use crate::pipeline::{frame_result, to_json_string, transform, ManifestOutcome, ManifestService};
pub use crate::query::{build_construct_query, QueryOptions};
pub use crate::reconcile::{reconcile, FramedManifest, IntegrityWarning, Reconciled};
