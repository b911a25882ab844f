//! Reconciliation pipeline
//!
//! ```text
//! Sources ──► EntityCatalog ─┐
//!         ──► ClassModel ────┼──► audit ──► splice ──► resolve ──► audit ──► Deliverable
//!         ──► ApiSchemaIndex ┘
//! ```
//!
//! Structural failures abort in [`Reconciler::new`]; everything after that
//! only adds diagnostics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::api::ApiSchemaIndex;
use crate::audit::{self, Exclusion};
use crate::catalog::EntityCatalog;
use crate::config::{ReconcilerConfig, TemplateConfig};
use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::Result;
use crate::loader::Sources;
use crate::model::ClassModel;
use crate::resolve::{FieldList, ResolvedFieldRow, Resolver, RowKind, ID_TYPE};

const PARENT_COLUMNS: [(&str, &str); 3] = [
    ("parent_entity", "Parent Entity Name"),
    ("parent_id", "Parent Entity Id"),
    ("parent_rel", "Name of Relationship from Parent Entity"),
];

/// Dataset manifest entry for one template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub file_name: String,
    pub name: String,
    pub label: Option<String>,
}

/// Column list of one entity's template dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTemplate {
    pub dataset: DatasetInfo,
    pub rows: Vec<ResolvedFieldRow>,
}

impl EntityTemplate {
    pub fn row(&self, qualified_name: &str) -> Option<&ResolvedFieldRow> {
        self.rows.iter().find(|r| r.qualified_name == qualified_name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.qualified_name.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverableMetadata {
    /// Class model version
    pub model_version: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub source_fingerprint: String,
    /// Entities left out, with the reason
    pub excluded: Vec<String>,
    /// Association cycles in the class model, by class name
    pub association_cycles: Vec<Vec<String>>,
}

/// Output of a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    pub metadata: DeliverableMetadata,
    pub datasets: Vec<EntityTemplate>,
    pub diagnostics: Diagnostics,
}

impl Deliverable {
    pub fn dataset(&self, entity: &str) -> Option<&EntityTemplate> {
        self.datasets.iter().find(|d| d.dataset.name == entity)
    }
}

/// Indexed sources ready for resolution
#[derive(Debug)]
pub struct Reconciler {
    config: ReconcilerConfig,
    catalog: EntityCatalog,
    model: ClassModel,
    api: ApiSchemaIndex,
    fingerprint: String,
    diagnostics: Diagnostics,
}

impl Reconciler {
    /// Index all three sources. Missing required structure in any of them
    /// is fatal.
    pub fn new(config: ReconcilerConfig, sources: Sources) -> Result<Self> {
        let mut diagnostics = Diagnostics::new();

        let rows = sources.terminology.to_rows()?;
        let catalog = EntityCatalog::build(rows, &mut diagnostics);
        let model = ClassModel::build(sources.class_model, &mut diagnostics)?;
        let api = ApiSchemaIndex::from_openapi(&sources.api_schema, config.inflection.inflector(), &mut diagnostics)?;

        info!(
            entities = catalog.len(),
            classes = model.len(),
            api_entities = api.entity_names().count(),
            "indexed sources"
        );

        Ok(Self {
            config,
            catalog,
            model,
            api,
            fingerprint: sources.fingerprint.to_string(),
            diagnostics,
        })
    }

    /// Resolve every entity in terminology order
    pub fn run(mut self) -> Deliverable {
        audit::audit_catalog_against_model(&self.catalog, &self.model, &mut self.diagnostics);
        self.splice_inherited();

        let Self {
            config,
            catalog,
            model,
            api,
            fingerprint,
            mut diagnostics,
        } = self;

        let mut datasets = Vec::new();
        let mut excluded = Vec::new();

        for entity in catalog.entities() {
            let Some(class) = model.find_class_by_name(&entity.name) else {
                continue;
            };

            if let Some(reason) = audit::exclusion(class, &api) {
                exclude(&mut diagnostics, &mut excluded, &entity.name, reason);
                continue;
            }

            audit::audit_entity(entity, class, &model, &mut diagnostics);
            let fields = Resolver::new(&catalog, &model, &api, &mut diagnostics).resolve_entity(&entity.name, class);
            audit::audit_api_coverage(entity, &api, &fields, &config.audit.ignored_api_fields, &mut diagnostics);

            info!(entity = %entity.name, rows = fields.len(), "resolved entity");
            datasets.push(EntityTemplate {
                dataset: dataset_info(&config.template, &entity.name, entity.preferred_name.clone()),
                rows: template_rows(&config.template, &entity.name, fields),
            });
        }

        // Abstract classes the terminology never mentions
        for class in model.classes().filter(|c| c.is_abstract && !catalog.contains(&c.name)) {
            exclude(&mut diagnostics, &mut excluded, &class.name, Exclusion::Abstract);
        }

        let association_cycles = model
            .association_cycles()
            .into_iter()
            .map(|cycle| cycle.into_iter().map(String::from).collect())
            .collect();

        info!(
            datasets = datasets.len(),
            excluded = excluded.len(),
            warnings = diagnostics.warning_count(),
            errors = diagnostics.error_count(),
            "reconciliation complete"
        );

        Deliverable {
            metadata: DeliverableMetadata {
                model_version: model.version.clone(),
                generated_at: Utc::now(),
                source_fingerprint: fingerprint,
                excluded,
                association_cycles,
            },
            datasets,
            diagnostics,
        }
    }

    /// Copy ancestor terminology properties into each entity, root-most first
    fn splice_inherited(&mut self) {
        let chains: Vec<(String, Vec<String>)> = self
            .catalog
            .names()
            .filter_map(|entity| {
                let class = self.model.find_class_by_name(entity)?;
                let ancestors: Vec<String> = self.model.ancestors(class).iter().map(|c| c.name.clone()).collect();
                (!ancestors.is_empty()).then(|| (entity.to_string(), ancestors))
            })
            .collect();

        for (entity, ancestors) in chains {
            let count = self.catalog.splice_inherited(&entity, &ancestors);
            if count > 0 {
                debug!(entity = %entity, inherited = count, "spliced inherited properties");
            }
        }
    }
}

fn exclude(diagnostics: &mut Diagnostics, excluded: &mut Vec<String>, entity: &str, reason: Exclusion) {
    warn!(entity, %reason, "entity excluded");
    diagnostics.report(
        entity,
        DiagnosticCode::AbstractExcluded,
        format!("Class '{}' is {}; no template produced", entity, reason),
    );
    excluded.push(format!("{} ({})", entity, reason));
}

/// Manifest entry: the entity name cut to the configured length plus the extension
pub fn dataset_info(template: &TemplateConfig, entity: &str, label: Option<String>) -> DatasetInfo {
    let stem: String = entity.chars().take(template.dataset_name_max_len).collect();
    DatasetInfo {
        file_name: format!("{}{}", stem, template.dataset_extension),
        name: entity.to_string(),
        label,
    }
}

fn template_rows(template: &TemplateConfig, entity: &str, fields: FieldList) -> Vec<ResolvedFieldRow> {
    let mut rows = Vec::with_capacity(fields.len() + PARENT_COLUMNS.len());
    if template.parent_columns && entity != template.root_entity {
        rows.extend(PARENT_COLUMNS.iter().map(|(name, label)| ResolvedFieldRow {
            qualified_name: name.to_string(),
            display_label: Some(label.to_string()),
            declared_type: ID_TYPE.to_string(),
            cardinality: "[1]".to_string(),
            kind: RowKind::Parent,
        }));
    }
    rows.extend(fields.into_rows());
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_file_name_is_truncated() {
        let template = TemplateConfig::default();
        let info = dataset_info(&template, "StudyInterventionAdministrationProcedure", Some("Procedure".into()));
        assert_eq!(info.file_name, "StudyInterventionAdministra.xpt");
        assert_eq!(info.name, "StudyInterventionAdministrationProcedure");

        let info = dataset_info(&template, "Study", None);
        assert_eq!(info.file_name, "Study.xpt");
    }

    #[test]
    fn test_parent_columns_skip_root() {
        let template = TemplateConfig::default();
        assert!(template_rows(&template, "Study", FieldList::new()).is_empty());

        let rows = template_rows(&template, "StudyArm", FieldList::new());
        let names: Vec<_> = rows.iter().map(|r| r.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["parent_entity", "parent_id", "parent_rel"]);
        assert!(rows.iter().all(|r| r.declared_type == "String" && r.cardinality == "[1]"));

        let template = TemplateConfig {
            parent_columns: false,
            ..TemplateConfig::default()
        };
        assert!(template_rows(&template, "StudyArm", FieldList::new()).is_empty());
    }
}
