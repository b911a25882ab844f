//! API Schema Index
//!
//! Reads the `components.schemas` section of an OpenAPI document into a
//! per-entity field table. Schemas published as `<Entity>-Input` /
//! `<Entity>-Output` pairs are checked for divergence and folded into one
//! entity entry.

pub mod foreign_key;
pub mod inflect;

pub use foreign_key::ForeignKeyResolution;
pub use inflect::{word_fragments, Inflector};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use similar::{ChangeTag, TextDiff};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::diagnostics::{DiagnosticCode, DiagnosticItem, Diagnostics};
use crate::error::{ReconcileError, Result};

const INPUT_SUFFIX: &str = "-Input";
const OUTPUT_SUFFIX: &str = "-Output";
const REF_PREFIX: &str = "#/components/schemas/";
const MAX_DIFF_LINES: usize = 20;

// =============================================================================
// Field Types
// =============================================================================

/// Declared JSON-ish type of an API field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeDescriptor {
    /// `string`, `integer`, `boolean`, ...
    Scalar(String),
    /// Reference to another component schema (variant suffix stripped)
    Ref(String),
    Array(Box<TypeDescriptor>),
    Union(Vec<TypeDescriptor>),
    Any,
}

impl TypeDescriptor {
    pub fn from_schema(schema: &Value) -> Self {
        if let Some(target) = schema.get("$ref").and_then(Value::as_str) {
            let name = target.strip_prefix(REF_PREFIX).unwrap_or(target);
            return Self::Ref(base_name(name).0.to_string());
        }

        for key in ["anyOf", "oneOf", "allOf"] {
            if let Some(variants) = schema.get(key).and_then(Value::as_array) {
                return Self::union(variants.iter().map(Self::from_schema).collect());
            }
        }

        match schema.get("type") {
            Some(Value::String(t)) if t == "array" => {
                let items = schema.get("items").map(Self::from_schema).unwrap_or(Self::Any);
                Self::Array(Box::new(items))
            }
            Some(Value::String(t)) => Self::Scalar(t.clone()),
            Some(Value::Array(types)) => Self::union(
                types
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|t| Self::Scalar(t.to_string()))
                    .collect(),
            ),
            _ => Self::Any,
        }
    }

    /// Drop `null` members and collapse single-member unions
    fn union(members: Vec<Self>) -> Self {
        let mut members: Vec<Self> = members
            .into_iter()
            .filter(|m| !matches!(m, Self::Scalar(t) if t == "null"))
            .collect();
        match members.len() {
            0 => Self::Any,
            1 => members.remove(0),
            _ => Self::Union(members),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(t) => write!(f, "{}", t),
            Self::Ref(name) => write!(f, "{}", name),
            Self::Array(items) => write!(f, "array<{}>", items),
            Self::Union(members) => {
                let rendered: Vec<String> = members.iter().map(|m| m.to_string()).collect();
                write!(f, "{}", rendered.join(" | "))
            }
            Self::Any => write!(f, "any"),
        }
    }
}

/// One field of an API entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiField {
    pub name: String,
    pub required: bool,
    pub type_descriptor: TypeDescriptor,
}

/// The fields an API schema declares for one entity, in declaration order
#[derive(Debug, Clone, Default)]
pub struct ApiFieldSet {
    fields: Vec<ApiField>,
    index: HashMap<String, usize>,
}

impl ApiFieldSet {
    fn from_schema(schema: &Value) -> Self {
        let required: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let mut set = Self::default();
        if let Some(props) = schema.get("properties").and_then(Value::as_object) {
            for (name, prop) in props {
                set.insert(ApiField {
                    name: name.clone(),
                    required: required.contains(name.as_str()),
                    type_descriptor: TypeDescriptor::from_schema(prop),
                });
            }
        }
        set
    }

    pub fn insert(&mut self, field: ApiField) {
        match self.index.get(&field.name) {
            Some(&idx) => self.fields[idx] = field,
            None => {
                self.index.insert(field.name.clone(), self.fields.len());
                self.fields.push(field);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ApiField> {
        self.index.get(name).map(|&idx| &self.fields[idx])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApiField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// =============================================================================
// Index
// =============================================================================

/// Entity name -> field set, plus the inflector used for foreign-key names
#[derive(Debug, Clone, Default)]
pub struct ApiSchemaIndex {
    entities: HashMap<String, ApiFieldSet>,
    inflector: Inflector,
}

impl ApiSchemaIndex {
    /// Build from an OpenAPI document.
    ///
    /// A document without `components.schemas` is a structural failure.
    pub fn from_openapi(document: &Value, inflector: Inflector, diags: &mut Diagnostics) -> Result<Self> {
        let schemas = document
            .get("components")
            .and_then(|c| c.get("schemas"))
            .and_then(Value::as_object)
            .ok_or_else(|| ReconcileError::missing("API schema", "components.schemas section"))?;

        // Group variants by entity name
        let mut variants: BTreeMap<&str, Variants<'_>> = BTreeMap::new();
        for (name, schema) in schemas {
            let (base, kind) = base_name(name);
            let entry = variants.entry(base).or_default();
            match kind {
                VariantKind::Plain => entry.plain = Some(schema),
                VariantKind::Input => entry.input = Some(schema),
                VariantKind::Output => entry.output = Some(schema),
            }
        }

        let mut entities = HashMap::with_capacity(variants.len());
        for (entity, v) in variants {
            if let (Some(input), Some(output)) = (v.input, v.output) {
                if let Some(item) = check_pair(entity, input, output)? {
                    diags.push(item);
                }
            }
            if let Some(schema) = v.plain.or(v.output).or(v.input) {
                entities.insert(entity.to_string(), ApiFieldSet::from_schema(schema));
            }
        }

        tracing::debug!(entities = entities.len(), "indexed API schema");
        Ok(Self { entities, inflector })
    }

    /// Build directly from field sets
    pub fn from_entities(entities: impl IntoIterator<Item = (String, Vec<ApiField>)>, inflector: Inflector) -> Self {
        let entities = entities
            .into_iter()
            .map(|(name, fields)| {
                let mut set = ApiFieldSet::default();
                for field in fields {
                    set.insert(field);
                }
                (name, set)
            })
            .collect();
        Self { entities, inflector }
    }

    pub fn has_entity(&self, entity: &str) -> bool {
        self.entities.contains_key(entity)
    }

    pub fn has_field(&self, entity: &str, field: &str) -> bool {
        self.entities.get(entity).map(|s| s.contains(field)).unwrap_or(false)
    }

    pub fn field(&self, entity: &str, field: &str) -> Option<&ApiField> {
        self.entities.get(entity).and_then(|s| s.get(field))
    }

    pub fn fields(&self, entity: &str) -> Option<&ApiFieldSet> {
        self.entities.get(entity)
    }

    pub fn inflector(&self) -> &Inflector {
        &self.inflector
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

#[derive(Default)]
struct Variants<'a> {
    plain: Option<&'a Value>,
    input: Option<&'a Value>,
    output: Option<&'a Value>,
}

enum VariantKind {
    Plain,
    Input,
    Output,
}

fn base_name(name: &str) -> (&str, VariantKind) {
    if let Some(base) = name.strip_suffix(INPUT_SUFFIX) {
        (base, VariantKind::Input)
    } else if let Some(base) = name.strip_suffix(OUTPUT_SUFFIX) {
        (base, VariantKind::Output)
    } else {
        (name, VariantKind::Plain)
    }
}

/// Compare an Input/Output pair after rewriting Input references to Output.
///
/// Equality is structural: key order and `required` order do not matter.
/// The text diff only supplies the context lines.
fn check_pair(entity: &str, input: &Value, output: &Value) -> Result<Option<DiagnosticItem>> {
    let input_text = serde_json::to_string_pretty(input)?.replace(INPUT_SUFFIX, OUTPUT_SUFFIX);
    let mut substituted: Value = serde_json::from_str(&input_text)?;
    let mut expected = output.clone();
    sort_required(&mut substituted);
    sort_required(&mut expected);
    if substituted == expected {
        return Ok(None);
    }
    let output_text = serde_json::to_string_pretty(output)?;

    let mut item = DiagnosticItem::new(
        entity,
        DiagnosticCode::InputOutputDivergence,
        format!("API schemas '{entity}{INPUT_SUFFIX}' and '{entity}{OUTPUT_SUFFIX}' differ"),
    );
    let diff = TextDiff::from_lines(&input_text, &output_text);
    for change in diff
        .iter_all_changes()
        .filter(|c| c.tag() != ChangeTag::Equal)
        .take(MAX_DIFF_LINES)
    {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            _ => '+',
        };
        item = item.with_context(format!("{} {}", sign, change.value().trim_end()));
    }
    Ok(Some(item))
}

/// Sort every `required` name list so it compares as a set
fn sort_required(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                match child {
                    Value::Array(names) if key == "required" => {
                        names.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
                    }
                    _ => sort_required(child),
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(sort_required),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "openapi": "3.1.0",
            "components": {
                "schemas": {
                    "Study-Input": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "name": {"type": "string"},
                            "versions": {"type": "array", "items": {"$ref": "#/components/schemas/StudyVersion-Input"}}
                        },
                        "required": ["id", "name"]
                    },
                    "Study-Output": {
                        "type": "object",
                        "properties": {
                            "id": {"type": "string"},
                            "name": {"type": "string"},
                            "versions": {"type": "array", "items": {"$ref": "#/components/schemas/StudyVersion-Output"}}
                        },
                        "required": ["id", "name"]
                    },
                    "Code": {
                        "type": "object",
                        "properties": {
                            "code": {"type": "string"},
                            "decode": {"anyOf": [{"type": "string"}, {"type": "null"}]}
                        },
                        "required": ["code"]
                    }
                }
            }
        })
    }

    #[test]
    fn test_fields_and_types() {
        let mut diags = Diagnostics::new();
        let index = ApiSchemaIndex::from_openapi(&document(), Inflector::new(), &mut diags).unwrap();

        assert!(diags.is_empty());
        assert!(index.has_entity("Study"));
        assert!(index.has_field("Study", "versions"));
        assert!(!index.has_field("Study", "Study"));

        let versions = index.field("Study", "versions").unwrap();
        assert!(!versions.required);
        assert_eq!(versions.type_descriptor.to_string(), "array<StudyVersion>");

        let decode = index.field("Code", "decode").unwrap();
        assert_eq!(decode.type_descriptor, TypeDescriptor::Scalar("string".into()));
        assert!(index.field("Code", "code").unwrap().required);
    }

    #[test]
    fn test_input_output_divergence_is_a_warning() {
        let mut doc = document();
        doc["components"]["schemas"]["Study-Output"]["properties"]["label"] = json!({"type": "string"});

        let mut diags = Diagnostics::new();
        let index = ApiSchemaIndex::from_openapi(&doc, Inflector::new(), &mut diags).unwrap();

        let items: Vec<_> = diags.with_code(DiagnosticCode::InputOutputDivergence).collect();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].entity, "Study");
        assert!(items[0].context.iter().any(|l| l.starts_with('+') && l.contains("label")));
        // Output variant wins
        assert!(index.has_field("Study", "label"));
    }

    #[test]
    fn test_reordered_pair_is_not_divergent() {
        let mut doc = document();
        doc["components"]["schemas"]["Study-Output"] = json!({
            "type": "object",
            "required": ["name", "id"],
            "properties": {
                "versions": {"items": {"$ref": "#/components/schemas/StudyVersion-Output"}, "type": "array"},
                "name": {"type": "string"},
                "id": {"type": "string"}
            }
        });

        let mut diags = Diagnostics::new();
        let index = ApiSchemaIndex::from_openapi(&doc, Inflector::new(), &mut diags).unwrap();

        assert_eq!(diags.with_code(DiagnosticCode::InputOutputDivergence).count(), 0);
        // Fields follow the Output declaration order
        let names: Vec<_> = index.fields("Study").unwrap().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["versions", "name", "id"]);
    }

    #[test]
    fn test_missing_components_is_fatal() {
        let err = ApiSchemaIndex::from_openapi(&json!({"openapi": "3.1.0"}), Inflector::new(), &mut Diagnostics::new())
            .unwrap_err();
        assert!(matches!(err, ReconcileError::MissingStructure { .. }));
    }
}
