//! Source loading
//!
//! Reads the JSON renditions of the terminology table, the class model and
//! the OpenAPI document, and fingerprints the exact bytes consumed.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::catalog::TerminologyTable;
use crate::checksum::Checksum;
use crate::error::{ReconcileError, Result};
use crate::model::ClassModelSource;

pub const TERMINOLOGY: &str = "terminology";
pub const CLASS_MODEL: &str = "class model";
pub const API_SCHEMA: &str = "API schema";

/// The three parsed inputs of a run
#[derive(Debug, Clone)]
pub struct Sources {
    pub terminology: TerminologyTable,
    pub class_model: ClassModelSource,
    pub api_schema: Value,
    pub fingerprint: Checksum,
}

impl Sources {
    /// Load all three inputs from disk
    pub fn load(terminology: &Path, class_model: &Path, api_schema: &Path) -> Result<Self> {
        tracing::info!(
            terminology = %terminology.display(),
            class_model = %class_model.display(),
            api_schema = %api_schema.display(),
            "loading sources"
        );
        let terminology = fs::read(terminology)?;
        let class_model = fs::read(class_model)?;
        let api_schema = fs::read(api_schema)?;
        Self::from_slices(&terminology, &class_model, &api_schema)
    }

    /// Parse all three inputs from raw bytes
    pub fn from_slices(terminology: &[u8], class_model: &[u8], api_schema: &[u8]) -> Result<Self> {
        let fingerprint = Checksum::from_sources([
            (TERMINOLOGY, terminology),
            (CLASS_MODEL, class_model),
            (API_SCHEMA, api_schema),
        ]);
        tracing::debug!(fingerprint = %fingerprint.short(), "fingerprinted sources");

        Ok(Self {
            terminology: parse(TERMINOLOGY, terminology)?,
            class_model: parse(CLASS_MODEL, class_model)?,
            api_schema: parse(API_SCHEMA, api_schema)?,
            fingerprint,
        })
    }
}

fn parse<T: DeserializeOwned>(source_name: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| ReconcileError::InvalidFormat {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}
