//! Service settings
//!
//! Every section has defaults, so an empty file (or no file) configures the
//! University of Bergen Library endpoint and manifest layout.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ManifestError;
use crate::executor::EndpointConfig;
use crate::manifest::ManifestConfig;
use crate::query::QueryOptions;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub endpoint: EndpointConfig,
    pub query: QueryOptions,
    pub manifest: ManifestConfig,
}

impl Settings {
    pub fn from_yaml_str(content: &str) -> Result<Self, ManifestError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
            .map_err(|e| ManifestError::Config(format!("failed to parse settings: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, ManifestError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ManifestError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }
}
