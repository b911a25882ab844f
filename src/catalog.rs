//! Entity Catalog
//!
//! Builds the controlled-terminology view of the model: one
//! [`EntityDefinition`] per entity header row, holding the ordered
//! [`PropertyDefinition`]s of the rows that follow it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{ReconcileError, Result};

// =============================================================================
// Terminology Rows
// =============================================================================

pub const COL_ENTITY_NAME: &str = "Entity Name";
pub const COL_ROLE: &str = "Role";
pub const COL_LOGICAL_NAME: &str = "Logical Data Model Name";
pub const COL_CODE: &str = "NCI C-code";
pub const COL_PREFERRED_NAME: &str = "CT Item Preferred Name";
pub const COL_DEFINITION: &str = "Definition";
pub const COL_VALUE_LIST: &str = "Has Value List";

/// Raw terminology worksheet: a header row followed by data rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminologyTable {
    #[serde(default)]
    pub sheet: Option<String>,
    pub header: Vec<String>,
    #[serde(default)]
    pub rows: Vec<Vec<Option<String>>>,
}

/// One terminology row with its columns already located
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminologyRow {
    pub entity_name: String,
    pub role: String,
    pub logical_name: Option<String>,
    pub code: Option<String>,
    pub preferred_name: Option<String>,
    pub definition: Option<String>,
    pub value_list: Option<String>,
}

impl TerminologyTable {
    /// Locate the expected columns and project every non-blank row.
    ///
    /// A missing required column is a structural failure: without it no
    /// row can be classified.
    pub fn to_rows(&self) -> Result<Vec<TerminologyRow>> {
        let source = self.sheet.as_deref().unwrap_or("terminology");
        let column = |name: &str| -> Option<usize> {
            self.header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let required = |name: &str| -> Result<usize> {
            column(name).ok_or_else(|| {
                ReconcileError::missing(source, format!("header column '{}'", name))
            })
        };

        let entity_col = required(COL_ENTITY_NAME)?;
        let role_col = required(COL_ROLE)?;
        let logical_col = required(COL_LOGICAL_NAME)?;
        let preferred_col = required(COL_PREFERRED_NAME)?;
        let definition_col = required(COL_DEFINITION)?;
        let value_list_col = required(COL_VALUE_LIST)?;
        let code_col = column(COL_CODE);

        let cell = |row: &[Option<String>], idx: usize| -> Option<String> {
            row.get(idx)
                .and_then(|v| v.as_deref())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let mut rows = Vec::with_capacity(self.rows.len());
        for raw in &self.rows {
            let (Some(entity_name), Some(role)) = (cell(raw, entity_col), cell(raw, role_col)) else {
                continue;
            };
            rows.push(TerminologyRow {
                entity_name,
                role,
                logical_name: cell(raw, logical_col),
                code: code_col.and_then(|c| cell(raw, c)),
                preferred_name: cell(raw, preferred_col),
                definition: cell(raw, definition_col),
                value_list: cell(raw, value_list_col),
            });
        }
        Ok(rows)
    }
}

/// Extract the codelist name from a "has value list" cell of the form `Y (<listname>)`
pub fn codelist_ref(value_list: Option<&str>) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^Y \((.+?)\)$").expect("valid codelist pattern"));
    pattern
        .captures(value_list?.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

// =============================================================================
// Definitions
// =============================================================================

/// Whether a property is a scalar attribute or an association-backed relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyRole {
    Attribute,
    Relationship,
}

impl fmt::Display for PropertyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute => write!(f, "Attribute"),
            Self::Relationship => write!(f, "Relationship"),
        }
    }
}

/// A terminology-declared field of an entity
#[derive(Debug, Clone)]
pub struct PropertyDefinition {
    pub name: String,
    pub role: PropertyRole,
    pub preferred_name: Option<String>,
    pub definition: Option<String>,
    pub code: Option<String>,
    pub codelist_ref: Option<String>,
    /// Ancestor entity this copy was spliced from
    pub inherited_from: Option<String>,
    api_field_name: OnceCell<Option<String>>,
}

impl PropertyDefinition {
    pub fn new(name: impl Into<String>, role: PropertyRole) -> Self {
        Self {
            name: name.into(),
            role,
            preferred_name: None,
            definition: None,
            code: None,
            codelist_ref: None,
            inherited_from: None,
            api_field_name: OnceCell::new(),
        }
    }

    /// The API field this property maps to; resolved at most once per run.
    pub fn api_field_name(&self, resolve: impl FnOnce() -> Option<String>) -> Option<&str> {
        self.api_field_name.get_or_init(resolve).as_deref()
    }

    /// Copy for splicing into a descendant; the API mapping is not carried over
    fn inherited_copy(&self, ancestor: &str) -> Self {
        Self {
            inherited_from: Some(ancestor.to_string()),
            api_field_name: OnceCell::new(),
            ..self.clone()
        }
    }
}

/// A terminology entity with its ordered properties
#[derive(Debug, Clone)]
pub struct EntityDefinition {
    pub name: String,
    pub preferred_name: Option<String>,
    pub definition: Option<String>,
    pub code: Option<String>,
    properties: Vec<PropertyDefinition>,
    property_index: HashMap<String, usize>,
}

impl EntityDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            preferred_name: None,
            definition: None,
            code: None,
            properties: Vec::new(),
            property_index: HashMap::new(),
        }
    }

    /// Add a property; a repeated name replaces the earlier record in place
    pub fn add_property(&mut self, property: PropertyDefinition) {
        match self.property_index.get(&property.name) {
            Some(&idx) => self.properties[idx] = property,
            None => {
                self.property_index.insert(property.name.clone(), self.properties.len());
                self.properties.push(property);
            }
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDefinition> {
        self.property_index.get(name).map(|&idx| &self.properties[idx])
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property_index.contains_key(name)
    }

    pub fn properties(&self) -> &[PropertyDefinition] {
        &self.properties
    }

    /// Properties declared on this entity itself (not spliced from an ancestor)
    pub fn own_properties(&self) -> impl Iterator<Item = &PropertyDefinition> {
        self.properties.iter().filter(|p| p.inherited_from.is_none())
    }

    fn rebuild_index(&mut self) {
        self.property_index = self
            .properties
            .iter()
            .enumerate()
            .map(|(idx, p)| (p.name.clone(), idx))
            .collect();
    }
}

// =============================================================================
// Catalog
// =============================================================================

/// Entity name -> definition, in terminology declaration order
#[derive(Debug, Clone, Default)]
pub struct EntityCatalog {
    entities: Vec<EntityDefinition>,
    by_name: HashMap<String, usize>,
}

impl EntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify each row as an entity header or a property and accumulate
    /// properties under the most recent header.
    pub fn build(rows: impl IntoIterator<Item = TerminologyRow>, diags: &mut Diagnostics) -> Self {
        let mut catalog = Self::new();
        let mut current: Option<usize> = None;

        for row in rows {
            if row.role.eq_ignore_ascii_case("Entity") {
                if row.logical_name.as_deref() != Some(row.entity_name.as_str()) {
                    diags.report(
                        &row.entity_name,
                        DiagnosticCode::EntityNameMismatch,
                        format!(
                            "Entity Name '{}' does not match Logical Data Model Name for Entity '{}'",
                            row.entity_name,
                            row.logical_name.as_deref().unwrap_or("")
                        ),
                    );
                }
                let entity = EntityDefinition {
                    preferred_name: row.preferred_name,
                    definition: row.definition,
                    code: row.code,
                    ..EntityDefinition::new(row.entity_name)
                };
                current = Some(catalog.insert(entity));
                continue;
            }

            let Some(logical_name) = row.logical_name.clone() else {
                diags.report(
                    &row.entity_name,
                    DiagnosticCode::OrphanProperty,
                    format!("{} row for entity '{}' has no Logical Data Model Name", row.role, row.entity_name),
                );
                continue;
            };

            let role = match classify_role(&row.role) {
                Some(role) => role,
                None => {
                    diags.report_field(
                        &row.entity_name,
                        &logical_name,
                        DiagnosticCode::UnknownRole,
                        format!("Unknown role '{}', treating '{}' as an attribute", row.role, logical_name),
                    );
                    PropertyRole::Attribute
                }
            };

            let Some(idx) = current else {
                diags.report_field(
                    &row.entity_name,
                    &logical_name,
                    DiagnosticCode::OrphanProperty,
                    format!("Property '{}' appears before any Entity row", logical_name),
                );
                continue;
            };

            let owner = &mut catalog.entities[idx];
            if owner.name != row.entity_name {
                diags.report_field(
                    &owner.name,
                    &logical_name,
                    DiagnosticCode::PropertyEntityMismatch,
                    format!(
                        "Property '{}' is listed under entity '{}' but its row names entity '{}'",
                        logical_name, owner.name, row.entity_name
                    ),
                );
            }

            owner.add_property(PropertyDefinition {
                preferred_name: row.preferred_name,
                definition: row.definition,
                code: row.code,
                codelist_ref: codelist_ref(row.value_list.as_deref()),
                ..PropertyDefinition::new(logical_name, role)
            });
        }

        tracing::debug!(entities = catalog.len(), "built entity catalog");
        catalog
    }

    /// Insert (or replace) an entity, returning its position
    pub fn insert(&mut self, entity: EntityDefinition) -> usize {
        match self.by_name.get(&entity.name) {
            Some(&idx) => {
                self.entities[idx] = entity;
                idx
            }
            None => {
                let idx = self.entities.len();
                self.by_name.insert(entity.name.clone(), idx);
                self.entities.push(entity);
                idx
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&EntityDefinition> {
        self.by_name.get(name).map(|&idx| &self.entities[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Entity names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.name.as_str())
    }

    pub fn entities(&self) -> &[EntityDefinition] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Copy the properties of `ancestors` (nearest first) that `entity` does
    /// not declare itself into `entity`, ahead of its own properties. The
    /// root-most ancestor's properties come first. Returns the number of
    /// properties spliced in.
    pub fn splice_inherited(&mut self, entity: &str, ancestors: &[String]) -> usize {
        let Some(&target) = self.by_name.get(entity) else {
            return 0;
        };

        let mut inherited: Vec<PropertyDefinition> = Vec::new();
        for ancestor in ancestors.iter().rev() {
            let Some(parent) = self.get(ancestor) else {
                continue;
            };
            for property in parent.own_properties() {
                let shadowed = self.entities[target].has_property(&property.name)
                    || inherited.iter().any(|p| p.name == property.name);
                if !shadowed {
                    inherited.push(property.inherited_copy(ancestor));
                }
            }
        }

        let count = inherited.len();
        if count > 0 {
            let child = &mut self.entities[target];
            let own = std::mem::take(&mut child.properties);
            child.properties = inherited.into_iter().chain(own).collect();
            child.rebuild_index();
        }
        count
    }
}

/// Map a role column value onto a property role
fn classify_role(role: &str) -> Option<PropertyRole> {
    let role = role.trim();
    if role.eq_ignore_ascii_case("Attribute") {
        Some(PropertyRole::Attribute)
    } else if role.to_ascii_lowercase().contains("relationship") {
        Some(PropertyRole::Relationship)
    } else {
        None
    }
}
