//! Schema Reconciler
//!
//! Reconciles three descriptions of one data model (a UML class diagram, a
//! controlled-terminology table and an OpenAPI schema) into flattened
//! per-entity attribute lists, reporting every inconsistency between them.
//!
//! ## Features
//!
//! - **Inheritance flattening**: generalization chains contribute their rows first
//! - **Association flattening**: to-one links are followed into dotted field names
//! - **Foreign-key naming**: `studyVersion` becomes `studyVersionId` when the API says so
//! - **Structured diagnostics**: inconsistencies never abort a run
//!
//! ## Architecture
//!
//! ```text
//! loader ──► catalog   (terminology rows -> EntityCatalog)
//!        ──► model     (class diagram    -> ClassModel, petgraph)
//!        ──► api       (OpenAPI          -> ApiSchemaIndex, foreign keys)
//!                │
//!                ▼
//!         pipeline ──► audit ──► resolve ──► Deliverable
//! ```

pub mod api;
pub mod audit;
pub mod catalog;
pub mod checksum;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod loader;
pub mod model;
pub mod pipeline;
pub mod resolve;

pub use api::{ApiSchemaIndex, ForeignKeyResolution, Inflector};
pub use catalog::{EntityCatalog, EntityDefinition, PropertyDefinition, PropertyRole, TerminologyTable};
pub use checksum::Checksum;
pub use config::{OutputFormat, ReconcilerConfig};
pub use diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics, Severity};
pub use error::{ReconcileError, Result};
pub use loader::Sources;
pub use model::{ClassModel, ClassNode, Multiplicity};
pub use pipeline::{DatasetInfo, Deliverable, EntityTemplate, Reconciler};
pub use resolve::{FieldList, ResolvedFieldRow, Resolver, RowKind};
