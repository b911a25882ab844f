//! Diagnostics
//!
//! Collects advisory findings raised while building the indices and while
//! resolving entities. Nothing in here aborts a run: a finding is recorded
//! and the caller proceeds with a best-effort substitute.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Diagnostic Codes
// =============================================================================

/// Diagnostic code for categorizing findings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    // === Terminology ===
    /// Entity name differs from its logical data model name
    EntityNameMismatch,
    /// Property row seen before any entity header row
    OrphanProperty,
    /// Property row's entity column disagrees with the current header
    PropertyEntityMismatch,
    /// Role column holds a value that is neither Entity, Attribute nor Relationship
    UnknownRole,

    // === Cross-source coverage ===
    /// Terminology entity has no class in the class model
    EntityWithoutClass,
    /// Class model class has no terminology entity
    ClassWithoutEntity,
    /// Terminology attribute has no owned attribute in the class model
    AttributeWithoutClassAttribute,
    /// Terminology relationship has no association link in the class model
    RelationshipWithoutLink,
    /// Class attribute has no terminology entry (no display label)
    MissingTerminologyLabel,
    /// Association link has no terminology property
    LinkWithoutProperty,
    /// API field has no terminology counterpart
    ApiFieldWithoutProperty,
    /// Class name appears more than once in the class model
    DuplicateClassName,

    // === Resolution ===
    /// Label taken from a generalization ancestor's terminology entry
    InheritedDescription,
    /// Association traversal stopped because the target is already on the path
    CircularRelationship,
    /// No API field matched a relationship name or any derived foreign-key name
    ForeignKeyUnresolved,
    /// Foreign-key name matched only through the literal `<name>Ids` fallback
    ForeignKeyFallback,
    /// Both the direct name and a derived foreign-key name exist in the API schema
    ForeignKeyAmbiguous,
    /// Foreign-key rewrite requested for a scalar attribute
    ScalarForeignKeyRefused,

    // === API schema ===
    /// Input/Output schema pair differs after name substitution
    InputOutputDivergence,

    // === Deliverable ===
    /// Abstract (or API-absent) class left out of the deliverable
    AbstractExcluded,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityNameMismatch => "W001",
            Self::OrphanProperty => "E001",
            Self::PropertyEntityMismatch => "W002",
            Self::UnknownRole => "W003",
            Self::EntityWithoutClass => "W004",
            Self::ClassWithoutEntity => "W005",
            Self::AttributeWithoutClassAttribute => "W006",
            Self::RelationshipWithoutLink => "W007",
            Self::MissingTerminologyLabel => "W008",
            Self::LinkWithoutProperty => "W009",
            Self::ApiFieldWithoutProperty => "W010",
            Self::DuplicateClassName => "E002",
            Self::InheritedDescription => "I001",
            Self::CircularRelationship => "W011",
            Self::ForeignKeyUnresolved => "W012",
            Self::ForeignKeyFallback => "W013",
            Self::ForeignKeyAmbiguous => "W014",
            Self::ScalarForeignKeyRefused => "W015",
            Self::InputOutputDivergence => "W016",
            Self::AbstractExcluded => "I002",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::OrphanProperty | Self::DuplicateClassName => Severity::Error,

            Self::InheritedDescription | Self::AbstractExcluded => Severity::Info,

            Self::EntityNameMismatch
            | Self::PropertyEntityMismatch
            | Self::UnknownRole
            | Self::EntityWithoutClass
            | Self::ClassWithoutEntity
            | Self::AttributeWithoutClassAttribute
            | Self::RelationshipWithoutLink
            | Self::MissingTerminologyLabel
            | Self::LinkWithoutProperty
            | Self::ApiFieldWithoutProperty
            | Self::CircularRelationship
            | Self::ForeignKeyUnresolved
            | Self::ForeignKeyFallback
            | Self::ForeignKeyAmbiguous
            | Self::ScalarForeignKeyRefused
            | Self::InputOutputDivergence => Severity::Warning,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single diagnostic item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticItem {
    /// Entity (or class) the finding is about
    pub entity: String,
    /// Field, attribute or link name, when the finding is field-level
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub code: DiagnosticCode,
    /// Human-readable message
    pub message: String,
    /// Additional context (closest names, diff lines, paths)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

impl DiagnosticItem {
    pub fn new(entity: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            field: None,
            code,
            message: message.into(),
            context: Vec::new(),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {} (", self.code, self.code.severity(), self.message)?;
        match &self.field {
            Some(field) => write!(f, "{}.{})", self.entity, field)?,
            None => write!(f, "{})", self.entity)?,
        }

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

/// Collection of diagnostics from a reconciliation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic item
    pub fn push(&mut self, item: DiagnosticItem) {
        tracing::debug!(code = %item.code, entity = %item.entity, "{}", item.message);
        self.items.push(item);
    }

    /// Add an entity-level finding
    pub fn report(&mut self, entity: impl Into<String>, code: DiagnosticCode, message: impl Into<String>) {
        self.push(DiagnosticItem::new(entity, code, message));
    }

    /// Add a field-level finding
    pub fn report_field(
        &mut self,
        entity: impl Into<String>,
        field: impl Into<String>,
        code: DiagnosticCode,
        message: impl Into<String>,
    ) {
        self.push(DiagnosticItem::new(entity, code, message).with_field(field));
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Error)
    }

    /// Check if there are any warnings
    pub fn has_warnings(&self) -> bool {
        self.items.iter().any(|i| i.severity() == Severity::Warning)
    }

    /// Get all errors
    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Error)
    }

    /// Get all warnings
    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity() == Severity::Warning)
    }

    /// Items carrying a given code
    pub fn with_code(&self, code: DiagnosticCode) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(move |i| i.code == code)
    }

    /// Items about a given entity
    pub fn for_entity<'a>(&'a self, entity: &'a str) -> impl Iterator<Item = &'a DiagnosticItem> + 'a {
        self.items.iter().filter(move |i| i.entity == entity)
    }

    /// Get all items
    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Format all diagnostics for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for item in &self.items {
            output.push_str(&format!("{}\n", item));
        }

        if !self.is_empty() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s), {} note(s)\n",
                self.error_count(),
                self.warning_count(),
                self.len() - self.error_count() - self.warning_count()
            ));
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for Diagnostics {
    type Item = DiagnosticItem;
    type IntoIter = std::vec::IntoIter<DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a DiagnosticItem;
    type IntoIter = std::slice::Iter<'a, DiagnosticItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
