//! Class Model Index
//!
//! Wraps the class-diagram source. Classes are indexed by id and by name, and
//! generalization and association edges are kept in a petgraph `DiGraph` so
//! ancestry and association cycles can be queried without rescanning.

pub mod multiplicity;

pub use multiplicity::{Bound, Multiplicity};

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::diagnostics::{DiagnosticCode, Diagnostics};
use crate::error::{ReconcileError, Result};

/// Diagram-assigned class identifier
pub type ClassId = String;

// =============================================================================
// Source Format
// =============================================================================

/// Class diagram as delivered by the reading collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassModelSource {
    /// Model (project) version
    #[serde(default)]
    pub version: Option<String>,
    pub classes: Vec<ClassSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassSource {
    pub id: ClassId,
    pub name: String,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    /// Id of the generalization parent
    #[serde(default)]
    pub generalization: Option<ClassId>,
    #[serde(default)]
    pub attributes: Vec<AttributeSource>,
    #[serde(default)]
    pub links: Vec<LinkSource>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeSource {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    pub lower: Bound,
    pub upper: Bound,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkSource {
    /// Association end name; anonymous ends are not navigable
    #[serde(default)]
    pub name: Option<String>,
    pub target: ClassId,
    pub lower: Bound,
    pub upper: Bound,
}

// =============================================================================
// Index Types
// =============================================================================

/// An owned, typed scalar property of a class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedAttribute {
    pub id: String,
    pub name: Option<String>,
    pub type_name: String,
    pub bounds: Multiplicity,
}

/// A named, directed association edge to another class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationLink {
    pub name: String,
    pub target_id: ClassId,
    pub multiplicity: Multiplicity,
}

/// A class of the diagram
#[derive(Debug, Clone)]
pub struct ClassNode {
    pub id: ClassId,
    pub name: String,
    pub is_abstract: bool,
    pub generalization_parent_id: Option<ClassId>,
    pub owned_attributes: Vec<OwnedAttribute>,
    pub outgoing_links: Vec<AssociationLink>,
    node_idx: NodeIndex,
}

impl ClassNode {
    pub fn attribute(&self, name: &str) -> Option<&OwnedAttribute> {
        self.owned_attributes.iter().find(|a| a.name.as_deref() == Some(name))
    }

    pub fn link(&self, name: &str) -> Option<&AssociationLink> {
        self.outgoing_links.iter().find(|l| l.name == name)
    }
}

/// Edge kinds in the class graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEdge {
    /// child -> parent
    Generalization,
    /// source -> target, carrying the link name
    Association(String),
}

/// Precomputed class lookups plus the class graph
#[derive(Debug, Clone)]
pub struct ClassModel {
    pub version: Option<String>,
    classes: Vec<ClassNode>,
    by_id: HashMap<ClassId, usize>,
    by_name: HashMap<String, usize>,
    graph: DiGraph<ClassId, ModelEdge>,
}

impl ClassModel {
    /// Index a class diagram.
    ///
    /// Dangling class-id references and generalization cycles are fatal;
    /// duplicate class names are reported and the first declaration wins.
    pub fn build(source: ClassModelSource, diags: &mut Diagnostics) -> Result<Self> {
        let count = source.classes.len();
        let mut graph = DiGraph::with_capacity(count, count * 3);
        let mut classes = Vec::with_capacity(count);
        let mut by_id = HashMap::with_capacity(count);
        let mut by_name = HashMap::with_capacity(count);

        for class in &source.classes {
            if by_id.contains_key(&class.id) {
                return Err(ReconcileError::DuplicateClassId(class.id.clone()));
            }
            let node_idx = graph.add_node(class.id.clone());
            by_id.insert(class.id.clone(), classes.len());

            if by_name.contains_key(&class.name) {
                diags.report(
                    &class.name,
                    DiagnosticCode::DuplicateClassName,
                    format!("Class name '{}' is declared more than once (id '{}' ignored for name lookup)", class.name, class.id),
                );
            } else {
                by_name.insert(class.name.clone(), classes.len());
            }

            classes.push(ClassNode {
                id: class.id.clone(),
                name: class.name.clone(),
                is_abstract: class.is_abstract,
                generalization_parent_id: class.generalization.clone(),
                owned_attributes: class
                    .attributes
                    .iter()
                    .map(|a| OwnedAttribute {
                        id: a.id.clone(),
                        name: a.name.clone().filter(|n| !n.is_empty()),
                        type_name: a.type_name.clone(),
                        bounds: Multiplicity::new(a.lower, a.upper),
                    })
                    .collect(),
                outgoing_links: class
                    .links
                    .iter()
                    .filter_map(|l| {
                        let name = l.name.clone().filter(|n| !n.is_empty())?;
                        Some(AssociationLink {
                            name,
                            target_id: l.target.clone(),
                            multiplicity: Multiplicity::new(l.lower, l.upper),
                        })
                    })
                    .collect(),
                node_idx,
            });
        }

        // Create edges
        let mut pending: Vec<(usize, ClassId, ModelEdge)> = Vec::with_capacity(count * 2);
        for (idx, class) in classes.iter().enumerate() {
            if let Some(parent) = &class.generalization_parent_id {
                pending.push((idx, parent.clone(), ModelEdge::Generalization));
            }
            for link in &class.outgoing_links {
                pending.push((idx, link.target_id.clone(), ModelEdge::Association(link.name.clone())));
            }
        }
        for (from, to_id, kind) in pending {
            let Some(&to) = by_id.get(&to_id) else {
                return Err(ReconcileError::UnknownClassId {
                    id: to_id,
                    referenced_by: classes[from].name.clone(),
                });
            };
            graph.add_edge(classes[from].node_idx, classes[to].node_idx, kind);
        }

        let model = Self {
            version: source.version,
            classes,
            by_id,
            by_name,
            graph,
        };
        model.check_generalization_acyclic()?;

        tracing::debug!(classes = model.classes.len(), edges = model.graph.edge_count(), "indexed class model");
        Ok(model)
    }

    fn check_generalization_acyclic(&self) -> Result<()> {
        for class in &self.classes {
            let mut seen = HashSet::new();
            let mut current = Some(class);
            while let Some(node) = current {
                if !seen.insert(node.id.as_str()) {
                    return Err(ReconcileError::GeneralizationCycle(class.name.clone()));
                }
                current = self.generalization_parent(node);
            }
        }
        Ok(())
    }

    pub fn find_class_by_name(&self, name: &str) -> Option<&ClassNode> {
        self.by_name.get(name).map(|&idx| &self.classes[idx])
    }

    pub fn find_class_by_id(&self, id: &str) -> Option<&ClassNode> {
        self.by_id.get(id).map(|&idx| &self.classes[idx])
    }

    pub fn owned_attributes<'a>(&self, class: &'a ClassNode) -> &'a [OwnedAttribute] {
        &class.owned_attributes
    }

    pub fn generalization_parent(&self, class: &ClassNode) -> Option<&ClassNode> {
        class
            .generalization_parent_id
            .as_deref()
            .and_then(|id| self.find_class_by_id(id))
    }

    pub fn outgoing_links<'a>(&self, class: &'a ClassNode) -> &'a [AssociationLink] {
        &class.outgoing_links
    }

    /// Generalization ancestors, nearest first
    pub fn ancestors(&self, class: &ClassNode) -> Vec<&ClassNode> {
        let mut chain = Vec::new();
        let mut current = self.generalization_parent(class);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.generalization_parent(parent);
        }
        chain
    }

    /// Groups of classes that reach each other through association links
    pub fn association_cycles(&self) -> Vec<Vec<&str>> {
        let associations = self.graph.filter_map(
            |_, id| Some(id.clone()),
            |_, edge| match edge {
                ModelEdge::Association(_) => Some(()),
                ModelEdge::Generalization => None,
            },
        );
        kosaraju_scc(&associations)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1 || associations.contains_edge(scc[0], scc[0])
            })
            .map(|scc| {
                scc.into_iter()
                    .filter_map(|idx| associations.node_weight(idx))
                    .filter_map(|id| self.find_class_by_id(id))
                    .map(|c| c.name.as_str())
                    .collect()
            })
            .collect()
    }

    /// All classes in diagram order
    pub fn classes(&self) -> impl Iterator<Item = &ClassNode> {
        self.classes.iter()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(json: &str) -> Result<ClassModel> {
        let source: ClassModelSource = serde_json::from_str(json).unwrap();
        ClassModel::build(source, &mut Diagnostics::new())
    }

    const BASIC: &str = r#"{
        "version": "3.0.0",
        "classes": [
            {"id": "C1", "name": "Activity", "abstract": true,
             "attributes": [{"id": "A1", "name": "name", "type": "String", "lower": 1, "upper": 1}]},
            {"id": "C2", "name": "Encounter", "generalization": "C1",
             "attributes": [{"id": "A2", "name": "type", "type": "Code", "lower": "0", "upper": "1"}],
             "links": [
                {"name": "next", "target": "C2", "lower": 0, "upper": 1},
                {"target": "C1", "lower": 0, "upper": "*"}
             ]}
        ]
    }"#;

    #[test]
    fn test_lookup_by_name_and_id() {
        let model = model(BASIC).unwrap();
        let encounter = model.find_class_by_name("Encounter").unwrap();
        assert_eq!(encounter.id, "C2");
        assert_eq!(model.find_class_by_id("C1").unwrap().name, "Activity");
        assert_eq!(model.generalization_parent(encounter).unwrap().name, "Activity");
        assert_eq!(model.version.as_deref(), Some("3.0.0"));
    }

    #[test]
    fn test_anonymous_links_are_ignored() {
        let model = model(BASIC).unwrap();
        let encounter = model.find_class_by_name("Encounter").unwrap();
        let links = model.outgoing_links(encounter);
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name, "next");
        assert_eq!(links[0].multiplicity.to_string(), "[0..1]");
    }

    #[test]
    fn test_self_association_is_a_cycle() {
        let model = model(BASIC).unwrap();
        assert_eq!(model.association_cycles(), vec![vec!["Encounter"]]);
    }

    #[test]
    fn test_unknown_class_id_is_fatal() {
        let err = model(r#"{"classes": [{"id": "C1", "name": "Study", "generalization": "C9"}]}"#).unwrap_err();
        assert!(matches!(err, ReconcileError::UnknownClassId { ref id, .. } if id == "C9"));
    }

    #[test]
    fn test_generalization_cycle_is_fatal() {
        let err = model(
            r#"{"classes": [
                {"id": "C1", "name": "A", "generalization": "C2"},
                {"id": "C2", "name": "B", "generalization": "C1"}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ReconcileError::GeneralizationCycle(_)));
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let source: ClassModelSource = serde_json::from_str(
            r#"{"classes": [{"id": "C1", "name": "Study"}, {"id": "C2", "name": "Study"}]}"#,
        )
        .unwrap();
        let mut diags = Diagnostics::new();
        let model = ClassModel::build(source, &mut diags).unwrap();
        assert_eq!(model.find_class_by_name("Study").unwrap().id, "C1");
        assert_eq!(diags.with_code(DiagnosticCode::DuplicateClassName).count(), 1);
    }
}
