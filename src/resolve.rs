//! Attribute Resolver
//!
//! Flattens one entity into the ordered list of fields its template exposes.
//! The walk is depth-first over the generalization chain and the tree of
//! to-one associations:
//!
//! ```text
//! resolve(Study)
//! ├── resolve(parent of Study)          inherited rows first
//! ├── owned attributes                  name, label, type, [l..u]
//! └── links
//!     ├── API names it differently  ->  foreign-key row (no descent)
//!     ├── target already on path    ->  cut, diagnostic
//!     └── otherwise                 ->  existence row, descend if to-one
//! ```
//!
//! Each level returns its own [`FieldList`]; the caller folds it into its
//! list, which is where duplicate qualified names are merged.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::api::{ApiSchemaIndex, ForeignKeyResolution};
use crate::catalog::{EntityCatalog, PropertyDefinition};
use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::model::{AssociationLink, ClassModel, ClassNode, OwnedAttribute};

/// Type given to presence flags
pub const FLAG_TYPE: &str = "Boolean";
/// Type given to foreign-key identifier rows
pub const ID_TYPE: &str = "String";

const EXISTS_SUFFIX: &str = " [Exists]";
const ANY_EXIST_SUFFIX: &str = " [Any Exist]";
const LABEL_SEPARATOR: &str = " / ";
const MARKER_SEPARATOR: &str = ">";
const DISJUNCTION: &str = " | ";

// =============================================================================
// Rows
// =============================================================================

/// What produced a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowKind {
    /// Owned (or inherited) scalar attribute
    Attribute,
    /// Presence flag for an association link
    Existence,
    /// Identifier field substituted for an association link
    ForeignKey { link: String },
    /// Field only the API schema declares
    ApiOnly,
    /// Parent linkage column of a template dataset
    Parent,
}

/// One field of a resolved entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFieldRow {
    /// Dot-path for nested traversal
    pub qualified_name: String,
    pub display_label: Option<String>,
    pub declared_type: String,
    pub cardinality: String,
    #[serde(flatten)]
    pub kind: RowKind,
}

/// Ordered rows keyed by qualified name
#[derive(Debug, Clone, Default)]
pub struct FieldList {
    rows: Vec<ResolvedFieldRow>,
    index: HashMap<String, usize>,
}

impl FieldList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row. A qualified name already present is never emitted twice:
    /// two foreign-key rows from different links merge their cardinality
    /// markers, anything else replaces the earlier row in place.
    pub fn push(&mut self, row: ResolvedFieldRow) {
        let Some(idx) = self.index.get(&row.qualified_name).copied() else {
            self.index.insert(row.qualified_name.clone(), self.rows.len());
            self.rows.push(row);
            return;
        };

        let existing = &mut self.rows[idx];
        let disjoin = matches!(
            (&existing.kind, &row.kind),
            (RowKind::ForeignKey { link: old }, RowKind::ForeignKey { link: new }) if old != new
        );
        if disjoin {
            existing.cardinality.push_str(DISJUNCTION);
            existing.cardinality.push_str(&row.cardinality);
        } else {
            *existing = row;
        }
    }

    pub fn extend(&mut self, other: FieldList) {
        for row in other.rows {
            self.push(row);
        }
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.index.contains_key(qualified_name)
    }

    pub fn get(&self, qualified_name: &str) -> Option<&ResolvedFieldRow> {
        self.index.get(qualified_name).map(|&idx| &self.rows[idx])
    }

    pub fn rows(&self) -> &[ResolvedFieldRow] {
        &self.rows
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.qualified_name.as_str())
    }

    pub fn into_rows(self) -> Vec<ResolvedFieldRow> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Traversal Path
// =============================================================================

#[derive(Debug, Clone)]
struct Hop {
    link: String,
    label: String,
    target: String,
    marker: String,
}

/// Chain of to-one links followed from the root class
#[derive(Debug, Clone)]
struct TraversalPath {
    root_class: String,
    hops: Vec<Hop>,
}

impl TraversalPath {
    fn root(class: &str) -> Self {
        Self {
            root_class: class.to_string(),
            hops: Vec::new(),
        }
    }

    fn is_root(&self) -> bool {
        self.hops.is_empty()
    }

    fn descend(&self, hop: Hop) -> Self {
        let mut next = self.clone();
        next.hops.push(hop);
        next
    }

    fn contains_class(&self, class: &str) -> bool {
        self.root_class == class || self.hops.iter().any(|h| h.target == class)
    }

    fn qualify(&self, name: &str) -> String {
        let mut parts: Vec<&str> = self.hops.iter().map(|h| h.link.as_str()).collect();
        parts.push(name);
        parts.join(".")
    }

    fn label(&self, label: Option<String>) -> Option<String> {
        let label = label?;
        if self.is_root() {
            return Some(label);
        }
        let mut parts: Vec<&str> = self.hops.iter().map(|h| h.label.as_str()).collect();
        parts.push(&label);
        Some(parts.join(LABEL_SEPARATOR))
    }

    fn marker(&self, own: String) -> String {
        if self.is_root() {
            return own;
        }
        let mut parts: Vec<&str> = self.hops.iter().map(|h| h.marker.as_str()).collect();
        parts.push(&own);
        parts.join(MARKER_SEPARATOR)
    }

    fn describe(&self) -> String {
        let mut parts = vec![self.root_class.as_str()];
        parts.extend(self.hops.iter().map(|h| h.target.as_str()));
        parts.join(" -> ")
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Terminology property found for a field, and where
struct PropertyMatch<'a> {
    property: &'a PropertyDefinition,
    /// Entity whose catalog entry held the property
    owner: &'a str,
}

/// Walks classes against the three indices, recording findings in `diags`
pub struct Resolver<'a> {
    catalog: &'a EntityCatalog,
    model: &'a ClassModel,
    api: &'a ApiSchemaIndex,
    diags: &'a mut Diagnostics,
}

impl<'a> Resolver<'a> {
    pub fn new(
        catalog: &'a EntityCatalog,
        model: &'a ClassModel,
        api: &'a ApiSchemaIndex,
        diags: &'a mut Diagnostics,
    ) -> Self {
        Self { catalog, model, api, diags }
    }

    /// Resolve `entity` (backed by `class`) into its ordered field list
    pub fn resolve_entity(&mut self, entity: &str, class: &'a ClassNode) -> FieldList {
        tracing::debug!(entity, class = %class.name, "resolving entity");
        let mut fields = self.resolve(entity, class, &TraversalPath::root(&class.name), None);
        if self.catalog.contains(entity) {
            self.append_api_only(entity, class, &mut fields);
        }
        fields
    }

    fn resolve(
        &mut self,
        entity: &str,
        class: &'a ClassNode,
        path: &TraversalPath,
        ancestor: Option<&str>,
    ) -> FieldList {
        let model = self.model;
        let mut fields = FieldList::new();

        if let Some(parent) = model.generalization_parent(class) {
            fields.extend(self.resolve(entity, parent, path, Some(parent.name.as_str())));
        }

        for attribute in model.owned_attributes(class) {
            if let Some(name) = &attribute.name {
                let row = self.attribute_row(entity, ancestor, name, attribute, path);
                fields.push(row);
            }
        }

        for link in model.outgoing_links(class) {
            self.link_rows(entity, ancestor, link, path, &mut fields);
        }

        fields
    }

    fn attribute_row(
        &mut self,
        entity: &str,
        ancestor: Option<&str>,
        name: &str,
        attribute: &OwnedAttribute,
        path: &TraversalPath,
    ) -> ResolvedFieldRow {
        let label = match self.lookup_property(entity, ancestor, name) {
            Some(found) => {
                if path.is_root() {
                    self.note_inherited(entity, name, &found);
                }
                found.property.preferred_name.clone()
            }
            None => {
                if path.is_root() {
                    self.diags.report_field(
                        entity,
                        name,
                        DiagnosticCode::MissingTerminologyLabel,
                        format!("No terminology entry found for attribute '{}.{}'", entity, name),
                    );
                }
                None
            }
        };

        let (declared_type, label) = if attribute.bounds.is_single() {
            (attribute.type_name.clone(), label)
        } else {
            (FLAG_TYPE.to_string(), label.map(|l| l + ANY_EXIST_SUFFIX))
        };

        ResolvedFieldRow {
            qualified_name: path.qualify(name),
            display_label: path.label(label),
            declared_type,
            cardinality: path.marker(attribute.bounds.to_string()),
            kind: RowKind::Attribute,
        }
    }

    fn link_rows(
        &mut self,
        entity: &str,
        ancestor: Option<&str>,
        link: &AssociationLink,
        path: &TraversalPath,
        fields: &mut FieldList,
    ) {
        let model = self.model;
        let Some(target) = model.find_class_by_id(&link.target_id) else {
            return;
        };

        let Some(found) = self.lookup_property(entity, ancestor, &link.name) else {
            if path.is_root() {
                self.diags.report_field(
                    entity,
                    &link.name,
                    DiagnosticCode::LinkWithoutProperty,
                    format!(
                        "No terminology property found for relationship '{}.{}' (to '{}')",
                        entity, link.name, target.name
                    ),
                );
            }
            return;
        };

        let api_field = self.api_field_name(entity, &found, path.is_root());
        let override_name = api_field.filter(|f| *f != link.name);
        let to_many = link.multiplicity.is_to_many();
        let label = found.property.preferred_name.clone();

        match override_name {
            None if path.contains_class(&target.name) => {
                self.diags.push(
                    DiagnosticItem::new(
                        entity,
                        DiagnosticCode::CircularRelationship,
                        format!(
                            "Circular relationship '{}.{}' back to '{}' not followed",
                            entity, link.name, target.name
                        ),
                    )
                    .with_field(&link.name)
                    .with_context(format!("Path: {} -> {}", path.describe(), target.name)),
                );
            }
            None => {
                let suffix = if to_many { ANY_EXIST_SUFFIX } else { EXISTS_SUFFIX };
                let hop_marker = format!("{}{}", target.name, link.multiplicity);
                fields.push(ResolvedFieldRow {
                    qualified_name: path.qualify(&link.name),
                    display_label: path.label(label.clone().map(|l| l + suffix)),
                    declared_type: FLAG_TYPE.to_string(),
                    cardinality: path.marker(hop_marker.clone()),
                    kind: RowKind::Existence,
                });

                if !to_many {
                    let nested = path.descend(Hop {
                        link: link.name.clone(),
                        label: label.unwrap_or_else(|| link.name.clone()),
                        target: target.name.clone(),
                        marker: hop_marker,
                    });
                    fields.extend(self.resolve(&target.name, target, &nested, None));
                }
            }
            Some(fk) => {
                let (declared_type, label) = if to_many {
                    (FLAG_TYPE, label.map(|l| l + ANY_EXIST_SUFFIX))
                } else {
                    (ID_TYPE, label)
                };
                fields.push(ResolvedFieldRow {
                    qualified_name: path.qualify(&fk),
                    display_label: path.label(label),
                    declared_type: declared_type.to_string(),
                    cardinality: path.marker(format!("{}{}.id[1]", target.name, link.multiplicity)),
                    kind: RowKind::ForeignKey { link: link.name.clone() },
                });
            }
        }
    }

    /// Fields the API schema demands that neither the diagram nor the
    /// terminology mention
    fn append_api_only(&mut self, entity: &str, class: &ClassNode, fields: &mut FieldList) {
        let Some(api_fields) = self.api.fields(entity) else {
            return;
        };
        let terminology = self.catalog.get(entity);
        let mut chain = vec![class];
        chain.extend(self.model.ancestors(class));

        for field in api_fields.iter() {
            let known = fields.contains(&field.name)
                || terminology.map(|t| t.has_property(&field.name)).unwrap_or(false)
                || chain
                    .iter()
                    .any(|c| c.attribute(&field.name).is_some() || c.link(&field.name).is_some());
            if known {
                continue;
            }
            fields.push(ResolvedFieldRow {
                qualified_name: field.name.clone(),
                display_label: None,
                declared_type: field.type_descriptor.to_string(),
                cardinality: if field.required { "[1]" } else { "[0]" }.to_string(),
                kind: RowKind::ApiOnly,
            });
        }
    }

    /// Terminology property under the entity itself, else under the nearest ancestor
    fn lookup_property(&self, entity: &str, ancestor: Option<&str>, name: &str) -> Option<PropertyMatch<'a>> {
        let catalog = self.catalog;
        std::iter::once(entity)
            .chain(ancestor)
            .find_map(|owner| {
                let definition = catalog.get(owner)?;
                definition.property(name).map(|property| PropertyMatch {
                    property,
                    owner: definition.name.as_str(),
                })
            })
    }

    fn note_inherited(&mut self, entity: &str, name: &str, found: &PropertyMatch<'_>) {
        let source = if found.owner != entity {
            Some(found.owner)
        } else {
            found.property.inherited_from.as_deref()
        };
        if let Some(source) = source {
            self.diags.report_field(
                entity,
                name,
                DiagnosticCode::InheritedDescription,
                format!(
                    "Using general attribute description from '{}.{}' for '{}.{}'",
                    source, name, entity, name
                ),
            );
        }
    }

    /// API field for a relationship. Properties owned by `entity` cache the
    /// answer for the rest of the run; ancestor fallbacks are recomputed.
    fn api_field_name(&mut self, entity: &str, found: &PropertyMatch<'a>, report: bool) -> Option<String> {
        let api = self.api;
        let property = found.property;
        let diags = &mut *self.diags;

        if found.owner == entity {
            return property
                .api_field_name(|| {
                    let resolution = api.resolve_foreign_key_name(entity, &property.name, property.role);
                    report_resolution(diags, entity, &property.name, &resolution);
                    resolution.field().map(String::from)
                })
                .map(String::from);
        }

        let resolution = api.resolve_foreign_key_name(entity, &property.name, property.role);
        if report {
            report_resolution(diags, entity, &property.name, &resolution);
        }
        resolution.field().map(String::from)
    }
}

fn report_resolution(diags: &mut Diagnostics, entity: &str, relationship: &str, resolution: &ForeignKeyResolution) {
    match resolution {
        ForeignKeyResolution::Direct { shadowed: Some(shadowed), field } => diags.report_field(
            entity,
            relationship,
            DiagnosticCode::ForeignKeyAmbiguous,
            format!(
                "API schema for '{}' has both '{}' and '{}'; using '{}'",
                entity, field, shadowed, field
            ),
        ),
        ForeignKeyResolution::Derived { field, canonical: false } => diags.report_field(
            entity,
            relationship,
            DiagnosticCode::ForeignKeyFallback,
            format!(
                "Relationship '{}.{}' matched non-canonical API field '{}'",
                entity, relationship, field
            ),
        ),
        ForeignKeyResolution::ScalarAttribute => diags.report_field(
            entity,
            relationship,
            DiagnosticCode::ScalarForeignKeyRefused,
            format!(
                "'{}.{}' is a terminology attribute but a class model association; no API field derived",
                entity, relationship
            ),
        ),
        ForeignKeyResolution::Unresolved { tried } => diags.push(
            DiagnosticItem::new(
                entity,
                DiagnosticCode::ForeignKeyUnresolved,
                format!("No API field found for relationship '{}.{}'", entity, relationship),
            )
            .with_field(relationship)
            .with_context(format!("Tried: {}", tried.join(", "))),
        ),
        ForeignKeyResolution::Direct { shadowed: None, .. } | ForeignKeyResolution::Derived { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiField, Inflector, TypeDescriptor};
    use crate::catalog::TerminologyRow;
    use crate::model::ClassModelSource;

    fn catalog(rows: &[(&str, &str, &str, &str)]) -> EntityCatalog {
        let rows = rows.iter().map(|(entity, role, logical, preferred)| TerminologyRow {
            entity_name: entity.to_string(),
            role: role.to_string(),
            logical_name: Some(logical.to_string()),
            preferred_name: Some(preferred.to_string()),
            ..Default::default()
        });
        EntityCatalog::build(rows, &mut Diagnostics::new())
    }

    fn model(json: &str) -> ClassModel {
        let source: ClassModelSource = serde_json::from_str(json).unwrap();
        ClassModel::build(source, &mut Diagnostics::new()).unwrap()
    }

    fn api(entities: &[(&str, &[(&str, bool)])]) -> ApiSchemaIndex {
        let entities = entities.iter().map(|(entity, fields)| {
            let fields = fields
                .iter()
                .map(|(name, required)| ApiField {
                    name: name.to_string(),
                    required: *required,
                    type_descriptor: TypeDescriptor::Scalar("string".into()),
                })
                .collect();
            (entity.to_string(), fields)
        });
        ApiSchemaIndex::from_entities(entities, Inflector::new())
    }

    fn summary(fields: &FieldList) -> Vec<(&str, Option<&str>, &str, &str)> {
        fields
            .rows()
            .iter()
            .map(|r| {
                (
                    r.qualified_name.as_str(),
                    r.display_label.as_deref(),
                    r.declared_type.as_str(),
                    r.cardinality.as_str(),
                )
            })
            .collect()
    }

    #[test]
    fn test_foreign_key_replaces_existence_row() {
        let catalog = catalog(&[
            ("Study", "Entity", "Study", "Study"),
            ("Study", "Attribute", "name", "Study Name"),
            ("Study", "Relationship", "studyVersion", "Study Version"),
        ]);
        let model = model(
            r#"{"classes": [
                {"id": "C1", "name": "Study",
                 "attributes": [{"id": "A1", "name": "name", "type": "String", "lower": 1, "upper": 1}],
                 "links": [{"name": "studyVersion", "target": "C2", "lower": 1, "upper": 1}]},
                {"id": "C2", "name": "StudyVersion"}
            ]}"#,
        );
        let api = api(&[("Study", &[("name", true), ("studyVersionId", true)])]);

        let mut diags = Diagnostics::new();
        let class = model.find_class_by_name("Study").unwrap();
        let fields = Resolver::new(&catalog, &model, &api, &mut diags).resolve_entity("Study", class);

        assert_eq!(
            summary(&fields),
            vec![
                ("name", Some("Study Name"), "String", "[1]"),
                ("studyVersionId", Some("Study Version"), "String", "StudyVersion[1].id[1]"),
            ]
        );
        assert_eq!(
            fields.get("studyVersionId").unwrap().kind,
            RowKind::ForeignKey { link: "studyVersion".into() }
        );
        assert!(diags.is_empty(), "{}", diags);
    }

    #[test]
    fn test_to_many_foreign_key_is_a_flag() {
        let catalog = catalog(&[("Study", "Entity", "Study", "Study"), ("Study", "Relationship", "arms", "Arm")]);
        let model = model(
            r#"{"classes": [
                {"id": "C1", "name": "Study", "links": [{"name": "arms", "target": "C2", "lower": 0, "upper": "*"}]},
                {"id": "C2", "name": "Arm"}
            ]}"#,
        );
        let api = api(&[("Study", &[("armIds", false)])]);

        let mut diags = Diagnostics::new();
        let class = model.find_class_by_name("Study").unwrap();
        let fields = Resolver::new(&catalog, &model, &api, &mut diags).resolve_entity("Study", class);

        assert_eq!(summary(&fields), vec![("armIds", Some("Arm [Any Exist]"), "Boolean", "Arm[0..*].id[1]")]);
        assert_eq!(fields.get("armIds").unwrap().kind, RowKind::ForeignKey { link: "arms".into() });
        assert!(diags.is_empty(), "{}", diags);
    }

    #[test]
    fn test_nested_foreign_key_carries_path() {
        let catalog = catalog(&[
            ("Study", "Entity", "Study", "Study"),
            ("Study", "Relationship", "protocol", "Protocol"),
            ("Protocol", "Entity", "Protocol", "Protocol"),
            ("Protocol", "Relationship", "owner", "Owner"),
        ]);
        let model = model(
            r#"{"classes": [
                {"id": "C1", "name": "Study", "links": [{"name": "protocol", "target": "C2", "lower": 0, "upper": 1}]},
                {"id": "C2", "name": "Protocol", "links": [{"name": "owner", "target": "C3", "lower": 1, "upper": 1}]},
                {"id": "C3", "name": "Org"}
            ]}"#,
        );
        let api = api(&[("Study", &[("protocol", false)]), ("Protocol", &[("ownerId", true)])]);

        let mut diags = Diagnostics::new();
        let class = model.find_class_by_name("Study").unwrap();
        let fields = Resolver::new(&catalog, &model, &api, &mut diags).resolve_entity("Study", class);

        assert_eq!(
            summary(&fields),
            vec![
                ("protocol", Some("Protocol [Exists]"), "Boolean", "Protocol[0..1]"),
                ("protocol.ownerId", Some("Protocol / Owner"), "String", "Protocol[0..1]>Org[1].id[1]"),
            ]
        );
        assert!(diags.is_empty(), "{}", diags);
    }

    #[test]
    fn test_links_sharing_a_foreign_key_are_disjoined() {
        let catalog = catalog(&[
            ("Study", "Entity", "Study", "Study"),
            ("Study", "Relationship", "site", "Site"),
            ("Study", "Relationship", "sites", "Sites"),
        ]);
        let model = model(
            r#"{"classes": [
                {"id": "C1", "name": "Study", "links": [
                    {"name": "site", "target": "C2", "lower": 0, "upper": 1},
                    {"name": "sites", "target": "C2", "lower": 0, "upper": "*"}
                ]},
                {"id": "C2", "name": "StudySite"}
            ]}"#,
        );
        let api = api(&[("Study", &[("siteIds", false)])]);

        let mut diags = Diagnostics::new();
        let class = model.find_class_by_name("Study").unwrap();
        let fields = Resolver::new(&catalog, &model, &api, &mut diags).resolve_entity("Study", class);

        assert_eq!(
            summary(&fields),
            vec![("siteIds", Some("Site"), "String", "StudySite[0..1].id[1] | StudySite[0..*].id[1]")]
        );
        assert_eq!(fields.get("siteIds").unwrap().kind, RowKind::ForeignKey { link: "site".into() });
    }

    #[test]
    fn test_cycle_is_cut_with_diagnostic() {
        let catalog = catalog(&[
            ("A", "Entity", "A", "A"),
            ("A", "Relationship", "b", "The B"),
            ("B", "Entity", "B", "B"),
            ("B", "Relationship", "a", "The A"),
        ]);
        let model = model(
            r#"{"classes": [
                {"id": "A", "name": "A", "links": [{"name": "b", "target": "B", "lower": 0, "upper": 1}]},
                {"id": "B", "name": "B", "links": [{"name": "a", "target": "A", "lower": 1, "upper": 1}]}
            ]}"#,
        );
        let api = api(&[("A", &[("b", false)]), ("B", &[("a", true)])]);

        let mut diags = Diagnostics::new();
        let class = model.find_class_by_name("A").unwrap();
        let fields = Resolver::new(&catalog, &model, &api, &mut diags).resolve_entity("A", class);

        assert_eq!(summary(&fields), vec![("b", Some("The B [Exists]"), "Boolean", "B[0..1]")]);
        let cycles: Vec<_> = diags.with_code(DiagnosticCode::CircularRelationship).collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].context, vec!["Path: A -> B -> A".to_string()]);
    }

    #[test]
    fn test_inherited_rows_come_first() {
        let catalog = catalog(&[
            ("Base", "Entity", "Base", "Base"),
            ("Base", "Attribute", "label", "Label"),
            ("Child", "Entity", "Child", "Child"),
            ("Child", "Attribute", "code", "Code"),
        ]);
        let model = model(
            r#"{"classes": [
                {"id": "C1", "name": "Base", "abstract": true,
                 "attributes": [{"id": "A1", "name": "label", "type": "String", "lower": 0, "upper": 1}]},
                {"id": "C2", "name": "Child", "generalization": "C1",
                 "attributes": [{"id": "A2", "name": "code", "type": "Code", "lower": 1, "upper": 1}]}
            ]}"#,
        );
        let api = api(&[("Child", &[("label", false), ("code", true)])]);

        let mut diags = Diagnostics::new();
        let class = model.find_class_by_name("Child").unwrap();
        let fields = Resolver::new(&catalog, &model, &api, &mut diags).resolve_entity("Child", class);

        assert_eq!(
            summary(&fields),
            vec![("label", Some("Label"), "String", "[0..1]"), ("code", Some("Code"), "Code", "[1]")]
        );
        let inherited: Vec<_> = diags.with_code(DiagnosticCode::InheritedDescription).collect();
        assert_eq!(inherited.len(), 1);
        assert_eq!(
            inherited[0].message,
            "Using general attribute description from 'Base.label' for 'Child.label'"
        );
    }

    #[test]
    fn test_nested_to_one_link_is_flattened() {
        let catalog = catalog(&[
            ("Study", "Entity", "Study", "Study"),
            ("Study", "Relationship", "protocol", "Protocol"),
            ("Protocol", "Entity", "Protocol", "Protocol"),
            ("Protocol", "Attribute", "title", "Protocol Title"),
            ("Protocol", "Attribute", "keywords", "Keyword"),
        ]);
        let model = model(
            r#"{"classes": [
                {"id": "C1", "name": "Study",
                 "links": [{"name": "protocol", "target": "C2", "lower": 0, "upper": 1}]},
                {"id": "C2", "name": "Protocol",
                 "attributes": [
                    {"id": "A1", "name": "title", "type": "String", "lower": 1, "upper": 1},
                    {"id": "A2", "name": "keywords", "type": "String", "lower": 0, "upper": "*"}
                 ]}
            ]}"#,
        );
        let api = api(&[("Study", &[("protocol", false)]), ("Protocol", &[("title", true)])]);

        let mut diags = Diagnostics::new();
        let class = model.find_class_by_name("Study").unwrap();
        let fields = Resolver::new(&catalog, &model, &api, &mut diags).resolve_entity("Study", class);

        assert_eq!(
            summary(&fields),
            vec![
                ("protocol", Some("Protocol [Exists]"), "Boolean", "Protocol[0..1]"),
                ("protocol.title", Some("Protocol / Protocol Title"), "String", "Protocol[0..1]>[1]"),
                (
                    "protocol.keywords",
                    Some("Protocol / Keyword [Any Exist]"),
                    "Boolean",
                    "Protocol[0..1]>[0..*]"
                ),
            ]
        );
    }

    #[test]
    fn test_to_many_link_is_not_descended() {
        let catalog = catalog(&[
            ("Study", "Entity", "Study", "Study"),
            ("Study", "Relationship", "arms", "Arm"),
            ("StudyArm", "Entity", "StudyArm", "Arm"),
            ("StudyArm", "Attribute", "name", "Arm Name"),
        ]);
        let model = model(
            r#"{"classes": [
                {"id": "C1", "name": "Study", "links": [{"name": "arms", "target": "C2", "lower": 1, "upper": "*"}]},
                {"id": "C2", "name": "StudyArm",
                 "attributes": [{"id": "A1", "name": "name", "type": "String", "lower": 1, "upper": 1}]}
            ]}"#,
        );
        let api = api(&[("Study", &[("arms", true)])]);

        let mut diags = Diagnostics::new();
        let class = model.find_class_by_name("Study").unwrap();
        let fields = Resolver::new(&catalog, &model, &api, &mut diags).resolve_entity("Study", class);

        assert_eq!(summary(&fields), vec![("arms", Some("Arm [Any Exist]"), "Boolean", "StudyArm[1..*]")]);
    }

    #[test]
    fn test_api_only_fields_are_appended() {
        let catalog = catalog(&[("Study", "Entity", "Study", "Study"), ("Study", "Attribute", "name", "Name")]);
        let model = model(
            r#"{"classes": [{"id": "C1", "name": "Study",
                "attributes": [{"id": "A1", "name": "name", "type": "String", "lower": 1, "upper": 1}]}]}"#,
        );
        let api = api(&[("Study", &[("name", true), ("instanceType", true), ("notes", false)])]);

        let mut diags = Diagnostics::new();
        let class = model.find_class_by_name("Study").unwrap();
        let fields = Resolver::new(&catalog, &model, &api, &mut diags).resolve_entity("Study", class);

        assert_eq!(
            summary(&fields),
            vec![
                ("name", Some("Name"), "String", "[1]"),
                ("instanceType", None, "string", "[1]"),
                ("notes", None, "string", "[0]"),
            ]
        );
        assert_eq!(fields.get("notes").unwrap().kind, RowKind::ApiOnly);
    }

    #[test]
    fn test_missing_label_reported_at_root() {
        let catalog = catalog(&[("Study", "Entity", "Study", "Study")]);
        let model = model(
            r#"{"classes": [{"id": "C1", "name": "Study",
                "attributes": [{"id": "A1", "name": "name", "type": "String", "lower": 1, "upper": 1}]}]}"#,
        );
        let api = api(&[("Study", &[("name", true)])]);

        let mut diags = Diagnostics::new();
        let class = model.find_class_by_name("Study").unwrap();
        let fields = Resolver::new(&catalog, &model, &api, &mut diags).resolve_entity("Study", class);

        assert_eq!(summary(&fields), vec![("name", None, "String", "[1]")]);
        assert_eq!(diags.with_code(DiagnosticCode::MissingTerminologyLabel).count(), 1);
    }

    #[test]
    fn test_foreign_keys_from_different_links_are_disjoined() {
        let row = |link: &str, cardinality: &str| ResolvedFieldRow {
            qualified_name: "siteId".into(),
            display_label: Some("Site".into()),
            declared_type: ID_TYPE.into(),
            cardinality: cardinality.into(),
            kind: RowKind::ForeignKey { link: link.into() },
        };
        let mut fields = FieldList::new();
        fields.push(row("site", "StudySite[1].id[1]"));
        fields.push(row("mainSite", "StudySite[0..1].id[1]"));

        assert_eq!(fields.len(), 1);
        assert_eq!(fields.rows()[0].cardinality, "StudySite[1].id[1] | StudySite[0..1].id[1]");
    }

    #[test]
    fn test_duplicate_name_replaces_in_place() {
        let row = |name: &str, ty: &str| ResolvedFieldRow {
            qualified_name: name.into(),
            display_label: None,
            declared_type: ty.into(),
            cardinality: "[1]".into(),
            kind: RowKind::Attribute,
        };
        let mut fields = FieldList::new();
        fields.push(row("id", "String"));
        fields.push(row("name", "String"));
        fields.push(row("id", "Code"));

        assert_eq!(fields.names().collect::<Vec<_>>(), vec!["id", "name"]);
        assert_eq!(fields.get("id").unwrap().declared_type, "Code");
    }
}
