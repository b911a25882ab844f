//! Foreign-key name resolution
//!
//! The class diagram names a relationship after its target (`studyVersion`)
//! while the API schema often carries the identifier instead
//! (`studyVersionId`). This maps one onto the other. Resolution only reads
//! the index, so the same question always gets the same answer.

use serde::{Deserialize, Serialize};

use super::inflect::word_fragments;
use super::ApiSchemaIndex;
use crate::catalog::PropertyRole;

/// Outcome of mapping a relationship name onto an API field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForeignKeyResolution {
    /// The relationship name is itself an API field. `shadowed` names a
    /// derived identifier field that also exists and was passed over.
    Direct { field: String, shadowed: Option<String> },
    /// An identifier field derived from the relationship name.
    /// `canonical` is false for the literal `<name>Ids` fallback.
    Derived { field: String, canonical: bool },
    /// Scalar attributes never receive a derived name
    ScalarAttribute,
    /// No candidate exists in the API schema
    Unresolved { tried: Vec<String> },
}

impl ForeignKeyResolution {
    /// The API field the relationship maps to, if any
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Direct { field, .. } | Self::Derived { field, .. } => Some(field),
            Self::ScalarAttribute | Self::Unresolved { .. } => None,
        }
    }
}

impl ApiSchemaIndex {
    /// Candidate identifier names for a relationship, in trial order, each
    /// flagged canonical or not.
    pub fn foreign_key_candidates(&self, relationship: &str) -> Vec<(String, bool)> {
        let fragments = word_fragments(relationship);
        let Some((last, leading)) = fragments.split_last() else {
            return Vec::new();
        };

        match self.inflector().singular_of(last) {
            Some(singular) => vec![
                (format!("{}{}Ids", leading.concat(), singular), true),
                (format!("{}Ids", relationship), false),
            ],
            None => vec![
                (format!("{}Id", relationship), true),
                (format!("{}Ids", relationship), true),
            ],
        }
    }

    /// Map `relationship` of `entity` onto an API field name
    pub fn resolve_foreign_key_name(
        &self,
        entity: &str,
        relationship: &str,
        role: PropertyRole,
    ) -> ForeignKeyResolution {
        if self.has_field(entity, relationship) {
            let shadowed = match role {
                PropertyRole::Relationship => self
                    .foreign_key_candidates(relationship)
                    .into_iter()
                    .map(|(name, _)| name)
                    .find(|name| self.has_field(entity, name)),
                PropertyRole::Attribute => None,
            };
            return ForeignKeyResolution::Direct {
                field: relationship.to_string(),
                shadowed,
            };
        }

        if role == PropertyRole::Attribute {
            return ForeignKeyResolution::ScalarAttribute;
        }

        let candidates = self.foreign_key_candidates(relationship);
        if let Some((field, canonical)) = candidates.iter().find(|(name, _)| self.has_field(entity, name)) {
            return ForeignKeyResolution::Derived {
                field: field.clone(),
                canonical: *canonical,
            };
        }

        ForeignKeyResolution::Unresolved {
            tried: candidates.into_iter().map(|(name, _)| name).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiField, Inflector, TypeDescriptor};

    fn index(fields: &[&str]) -> ApiSchemaIndex {
        let fields = fields
            .iter()
            .map(|name| ApiField {
                name: name.to_string(),
                required: false,
                type_descriptor: TypeDescriptor::Scalar("string".into()),
            })
            .collect();
        ApiSchemaIndex::from_entities([("Study".to_string(), fields)], Inflector::new())
    }

    #[test]
    fn test_singular_relationship_gets_id_suffix() {
        let index = index(&["studyVersionId"]);
        assert_eq!(
            index.resolve_foreign_key_name("Study", "studyVersion", PropertyRole::Relationship),
            ForeignKeyResolution::Derived { field: "studyVersionId".into(), canonical: true }
        );
    }

    #[test]
    fn test_singular_relationship_falls_back_to_ids() {
        let index = index(&["dataIds"]);
        assert_eq!(
            index.resolve_foreign_key_name("Study", "data", PropertyRole::Relationship).field(),
            Some("dataIds")
        );
    }

    #[test]
    fn test_plural_relationship_is_singularized() {
        let index = index(&["studyVersionIds", "studyVersionsIds"]);
        assert_eq!(
            index.resolve_foreign_key_name("Study", "studyVersions", PropertyRole::Relationship),
            ForeignKeyResolution::Derived { field: "studyVersionIds".into(), canonical: true }
        );
    }

    #[test]
    fn test_plural_relationship_literal_fallback_is_not_canonical() {
        let index = index(&["studyVersionsIds"]);
        assert_eq!(
            index.resolve_foreign_key_name("Study", "studyVersions", PropertyRole::Relationship),
            ForeignKeyResolution::Derived { field: "studyVersionsIds".into(), canonical: false }
        );
    }

    #[test]
    fn test_scalar_attribute_is_never_rewritten() {
        let index = index(&["nameId"]);
        assert_eq!(
            index.resolve_foreign_key_name("Study", "name", PropertyRole::Attribute),
            ForeignKeyResolution::ScalarAttribute
        );
    }

    #[test]
    fn test_direct_name_wins_but_records_shadowed_candidate() {
        let index = index(&["studyVersion", "studyVersionId"]);
        assert_eq!(
            index.resolve_foreign_key_name("Study", "studyVersion", PropertyRole::Relationship),
            ForeignKeyResolution::Direct {
                field: "studyVersion".into(),
                shadowed: Some("studyVersionId".into())
            }
        );
    }

    #[test]
    fn test_unresolved_lists_candidates() {
        let index = index(&[]);
        assert_eq!(
            index.resolve_foreign_key_name("Study", "arms", PropertyRole::Relationship),
            ForeignKeyResolution::Unresolved { tried: vec!["armIds".into(), "armsIds".into()] }
        );
    }

    #[test]
    fn test_resolution_is_repeatable() {
        let index = index(&["studyVersionId"]);
        let first = index.resolve_foreign_key_name("Study", "studyVersion", PropertyRole::Relationship);
        let _ = index.resolve_foreign_key_name("Other", "arms", PropertyRole::Relationship);
        let second = index.resolve_foreign_key_name("Study", "studyVersion", PropertyRole::Relationship);
        assert_eq!(first, second);
    }
}
