//! Check diagnostics for document graphs.
//!
//! Reports semantic issues without modifying the document. Structural
//! failures are rejected up front by the store; everything here is the
//! softer class of problem a user fixes at their own pace — most notably
//! dangling references, which are legal in a live document.

use crate::id::ObjectId;
use crate::model::{ObjectGraph, Value};
use crate::schema::{ClassRegistry, PropertyKind};
use crate::serial::resolve_reference;

// ─── Diagnostic types ────────────────────────────────────────────────────

/// Severity of a check finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckSeverity {
    /// Blocks a correct build of the project.
    Error,
    /// Should be fixed — likely a mistake.
    Warning,
}

/// A single check diagnostic for a document object.
#[derive(Debug, Clone)]
pub struct CheckDiagnostic {
    /// The object this diagnostic refers to.
    pub object: ObjectId,
    /// Human-readable message.
    pub message: String,
    /// Severity level.
    pub severity: CheckSeverity,
    /// Short rule identifier (e.g. "dangling-reference").
    pub rule: &'static str,
}

// ─── Public API ──────────────────────────────────────────────────────────

/// Run all check rules over the graph and return diagnostics.
#[must_use]
pub fn check_document(graph: &ObjectGraph, registry: &ClassRegistry) -> Vec<CheckDiagnostic> {
    let mut diags = Vec::new();
    check_dangling_references(graph, registry, &mut diags);
    check_missing_required(graph, registry, &mut diags);
    diags
}

// ─── Rules ───────────────────────────────────────────────────────────────

/// Error on any Reference property whose token does not resolve against
/// its declared collection path.
fn check_dangling_references(
    graph: &ObjectGraph,
    registry: &ClassRegistry,
    diags: &mut Vec<CheckDiagnostic>,
) {
    for object in graph.iter() {
        for prop in registry.declared_properties(&object.class) {
            let PropertyKind::Reference { collection } = &prop.kind else {
                continue;
            };
            let Some(Value::Reference(token)) = object.props.get(&prop.name) else {
                continue;
            };
            if resolve_reference(graph, collection, token).is_none() {
                diags.push(CheckDiagnostic {
                    object: object.id,
                    message: format!(
                        "`{}` references \"{token}\", which does not exist in {}.",
                        prop.name,
                        collection.join("/")
                    ),
                    severity: CheckSeverity::Error,
                    rule: "dangling-reference",
                });
            }
        }
    }
}

/// Warn when a declared, non-optional property is absent.
fn check_missing_required(
    graph: &ObjectGraph,
    registry: &ClassRegistry,
    diags: &mut Vec<CheckDiagnostic>,
) {
    for object in graph.iter() {
        for prop in registry.declared_properties(&object.class) {
            if prop.optional || prop.computed {
                continue;
            }
            if !object.props.contains_key(&prop.name) {
                diags.push(CheckDiagnostic {
                    object: object.id,
                    message: format!("`{}` is not set on `{}`.", prop.name, object.class),
                    severity: CheckSeverity::Warning,
                    rule: "missing-required",
                });
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────
