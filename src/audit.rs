//! Consistency Auditor
//!
//! Cross-checks the terminology, the class model and the API schema. Every
//! check degrades to a diagnostic.

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::collections::HashSet;
use std::fmt;

use crate::api::ApiSchemaIndex;
use crate::catalog::{EntityCatalog, EntityDefinition, PropertyRole};
use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::model::{ClassModel, ClassNode};
use crate::resolve::{FieldList, RowKind};

/// Why a class is left out of the deliverable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    /// Flagged abstract in the class model
    Abstract,
    /// No schema for it in the API
    NotInApi,
}

impl fmt::Display for Exclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abstract => write!(f, "abstract in the class model"),
            Self::NotInApi => write!(f, "absent from the API schema"),
        }
    }
}

/// Abstract classes, and classes the API never publishes, produce no template
pub fn exclusion(class: &ClassNode, api: &ApiSchemaIndex) -> Option<Exclusion> {
    if class.is_abstract {
        Some(Exclusion::Abstract)
    } else if !api.has_entity(&class.name) {
        Some(Exclusion::NotInApi)
    } else {
        None
    }
}

/// Entities without classes and (concrete) classes without entities
pub fn audit_catalog_against_model(catalog: &EntityCatalog, model: &ClassModel, diags: &mut Diagnostics) {
    let class_names: Vec<&str> = model.classes().map(|c| c.name.as_str()).collect();
    for entity in catalog.names() {
        if model.find_class_by_name(entity).is_none() {
            let item = DiagnosticItem::new(
                entity,
                DiagnosticCode::EntityWithoutClass,
                format!("Entity '{}' defined in the terminology has no matching class in the class model", entity),
            );
            diags.push(with_closest(item, entity, &class_names));
        }
    }

    let entity_names: Vec<&str> = catalog.names().collect();
    for class in model.classes().filter(|c| !c.is_abstract) {
        if !catalog.contains(&class.name) {
            let item = DiagnosticItem::new(
                &class.name,
                DiagnosticCode::ClassWithoutEntity,
                format!("Class '{}' has no matching entity in the terminology", class.name),
            );
            diags.push(with_closest(item, &class.name, &entity_names));
        }
    }
}

/// Terminology properties of `entity` with no diagram counterpart on the
/// class or any of its generalization ancestors
pub fn audit_entity(entity: &EntityDefinition, class: &ClassNode, model: &ClassModel, diags: &mut Diagnostics) {
    let mut chain = vec![class];
    chain.extend(model.ancestors(class));

    for property in entity.own_properties() {
        match property.role {
            PropertyRole::Attribute => {
                if !chain.iter().any(|c| c.attribute(&property.name).is_some()) {
                    diags.report_field(
                        &entity.name,
                        &property.name,
                        DiagnosticCode::AttributeWithoutClassAttribute,
                        format!(
                            "Attribute '{}.{}' defined in the terminology has no matching class attribute",
                            entity.name, property.name
                        ),
                    );
                }
            }
            PropertyRole::Relationship => {
                if !chain.iter().any(|c| c.link(&property.name).is_some()) {
                    diags.report_field(
                        &entity.name,
                        &property.name,
                        DiagnosticCode::RelationshipWithoutLink,
                        format!(
                            "Relationship '{}.{}' defined in the terminology has no matching association",
                            entity.name, property.name
                        ),
                    );
                }
            }
        }
    }
}

/// API fields of `entity` that match neither a terminology property nor a
/// foreign-key name chosen during resolution
pub fn audit_api_coverage(
    entity: &EntityDefinition,
    api: &ApiSchemaIndex,
    fields: &FieldList,
    ignored: &[String],
    diags: &mut Diagnostics,
) {
    let Some(api_fields) = api.fields(&entity.name) else {
        return;
    };
    let foreign_keys: HashSet<&str> = fields
        .rows()
        .iter()
        .filter(|r| matches!(r.kind, RowKind::ForeignKey { .. }))
        .map(|r| r.qualified_name.as_str())
        .collect();

    for field in api_fields.iter() {
        let covered = entity.has_property(&field.name)
            || foreign_keys.contains(field.name.as_str())
            || ignored.iter().any(|i| *i == field.name);
        if !covered {
            diags.report_field(
                &entity.name,
                &field.name,
                DiagnosticCode::ApiFieldWithoutProperty,
                format!("API field '{}.{}' has no terminology counterpart", entity.name, field.name),
            );
        }
    }
}

/// Best fuzzy match for `query` among `candidates`, excluding itself
pub fn closest_name<'c>(query: &str, candidates: &[&'c str]) -> Option<&'c str> {
    let matcher = SkimMatcherV2::default();
    candidates
        .iter()
        .filter(|c| **c != query)
        .filter_map(|c| {
            matcher
                .fuzzy_match(c, query)
                .or_else(|| matcher.fuzzy_match(query, c))
                .map(|score| (score, *c))
        })
        .max_by_key(|(score, _)| *score)
        .map(|(_, c)| c)
}

fn with_closest(item: DiagnosticItem, query: &str, candidates: &[&str]) -> DiagnosticItem {
    match closest_name(query, candidates) {
        Some(name) => item.with_context(format!("Closest match: '{}'", name)),
        None => item,
    }
}
