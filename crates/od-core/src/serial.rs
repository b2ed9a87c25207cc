//! Serialization engine: live object graph ↔ plain JSON records.
//!
//! Loading resolves each record's concrete class, runs the class chain's
//! `before_load` migration hooks on the raw record (base first), then
//! extracts declared properties depth-first. Reference properties keep
//! their token string — resolution is lazy, so forward references and
//! partially loaded graphs are fine.
//!
//! Emission is the inverse: declared, non-computed properties only, in
//! declaration order, references back to token form. Object IDs are never
//! persisted; every load mints fresh ones.

use crate::error::DocError;
use crate::id::ObjectId;
use crate::model::{Detached, DocObject, ObjectGraph, ParentLink, Value};
use crate::schema::{ClassRegistry, JsonMap, PropertyDescriptor, PropertyKind};
use serde_json::Value as Json;

// ─── Loading ─────────────────────────────────────────────────────────────

/// Instantiate a record (and its nested records) as a detached subtree.
///
/// `base_class` is the declared class of the slot the record is destined
/// for; polymorphic resolution picks the concrete subclass from there.
///
/// # Errors
/// - `UnknownClass` when a discriminant cannot be resolved.
/// - `SchemaViolation` when a declared property holds the wrong JSON shape.
pub fn load_object(
    registry: &ClassRegistry,
    record: &Json,
    base_class: &str,
) -> Result<Detached, DocError> {
    let map = record
        .as_object()
        .ok_or_else(|| DocError::schema(base_class, "record is not a JSON object"))?;

    let mut nodes = Vec::new();
    let root = load_into(registry, map.clone(), base_class, &mut nodes)?;
    Ok(Detached { root, nodes })
}

fn load_into(
    registry: &ClassRegistry,
    mut record: JsonMap,
    base_class: &str,
    nodes: &mut Vec<DocObject>,
) -> Result<ObjectId, DocError> {
    // Concrete class first (the raw discriminant drives resolution),
    // then migration hooks along the chain, base first.
    let class_name = registry.resolve_class(base_class, &record)?.name.clone();
    for desc in chain_base_first(registry, &class_name) {
        if let Some(hook) = desc.before_load {
            hook(&mut record);
        }
    }

    let mut object = DocObject::new(&class_name);
    let id = object.id;

    for prop in registry.declared_properties(&class_name) {
        if prop.computed {
            continue;
        }
        let raw = match record.get(&prop.name) {
            Some(Json::Null) | None => default_for(registry, &class_name, &prop.name),
            Some(v) => Some(v.clone()),
        };
        // Absent is legal here; the check pass reports missing-required.
        let Some(raw) = raw else { continue };
        if raw.is_null() {
            continue;
        }

        let value = match &prop.kind {
            PropertyKind::Object { class } => {
                let child_map = raw.as_object().ok_or_else(|| {
                    DocError::schema(&class_name, format!("`{}` must be an object", prop.name))
                })?;
                let child = load_into(registry, child_map.clone(), class, nodes)?;
                set_parent(nodes, child, ParentLink::new(id, &prop.name));
                Value::Object(child)
            }
            PropertyKind::Array { class } => {
                let items = raw.as_array().ok_or_else(|| {
                    DocError::schema(&class_name, format!("`{}` must be an array", prop.name))
                })?;
                let mut children = Vec::with_capacity(items.len());
                for item in items {
                    let child_map = item.as_object().ok_or_else(|| {
                        DocError::schema(
                            &class_name,
                            format!("`{}` elements must be objects", prop.name),
                        )
                    })?;
                    let child = load_into(registry, child_map.clone(), class, nodes)?;
                    set_parent(nodes, child, ParentLink::new(id, &prop.name));
                    children.push(child);
                }
                Value::Array(children)
            }
            _ => value_from_js(&class_name, prop, &raw)?,
        };
        object.props.insert(prop.name.clone(), value);
    }

    nodes.push(object);
    Ok(id)
}

/// Convert a non-container JSON value per the declared property kind.
///
/// # Errors
/// `SchemaViolation` when the JSON shape does not match the kind, or the
/// kind is a container (containers go through `load_object`).
pub fn value_from_js(class: &str, prop: &PropertyDescriptor, raw: &Json) -> Result<Value, DocError> {
    let wrong = || DocError::schema(class, format!("`{}` has the wrong kind", prop.name));
    Ok(match &prop.kind {
        PropertyKind::Number => Value::Number(raw.as_f64().ok_or_else(wrong)?),
        PropertyKind::String => Value::String(raw.as_str().ok_or_else(wrong)?.to_string()),
        PropertyKind::Boolean => Value::Bool(raw.as_bool().ok_or_else(wrong)?),
        PropertyKind::Enum => Value::Enum(raw.as_str().ok_or_else(wrong)?.to_string()),
        PropertyKind::Reference { .. } => {
            Value::Reference(raw.as_str().ok_or_else(wrong)?.to_string())
        }
        PropertyKind::Any => Value::Any(raw.clone()),
        PropertyKind::Object { .. } | PropertyKind::Array { .. } => return Err(wrong()),
    })
}

/// Walk the chain child-first for a `default_value` template carrying `prop`.
fn default_for(registry: &ClassRegistry, class: &str, prop: &str) -> Option<Json> {
    let mut current = Some(class);
    while let Some(name) = current {
        let desc = registry.get(name)?;
        if let Some(template) = &desc.default_value
            && let Some(value) = template.get(prop)
        {
            return Some(value.clone());
        }
        current = desc.parent.as_deref();
    }
    None
}

fn chain_base_first<'a>(
    registry: &'a ClassRegistry,
    class: &str,
) -> Vec<&'a crate::schema::ClassDescriptor> {
    let mut chain = Vec::new();
    let mut current = Some(class.to_string());
    while let Some(name) = current {
        let Some(desc) = registry.get(&name) else { break };
        chain.push(desc);
        current = desc.parent.clone();
    }
    chain.reverse();
    chain
}

fn set_parent(nodes: &mut [DocObject], child: ObjectId, link: ParentLink) {
    if let Some(node) = nodes.iter_mut().find(|n| n.id == child) {
        node.parent = Some(link);
    }
}

// ─── Emission ────────────────────────────────────────────────────────────

/// Anything that can hand out objects by ID — the live graph or a
/// detached subtree.
pub trait ObjectSource {
    fn lookup(&self, id: ObjectId) -> Option<&DocObject>;
}

impl ObjectSource for ObjectGraph {
    fn lookup(&self, id: ObjectId) -> Option<&DocObject> {
        self.get(id)
    }
}

impl ObjectSource for Detached {
    fn lookup(&self, id: ObjectId) -> Option<&DocObject> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Emit an object (and its owned subtree) as a plain JSON record.
///
/// # Errors
/// `ObjectNotFound` when `id` is not present in `source`.
pub fn object_to_js(
    source: &impl ObjectSource,
    registry: &ClassRegistry,
    id: ObjectId,
) -> Result<Json, DocError> {
    let object = source.lookup(id).ok_or(DocError::ObjectNotFound(id))?;

    let mut out = JsonMap::new();
    for prop in registry.declared_properties(&object.class) {
        if prop.computed {
            continue;
        }
        let Some(value) = object.props.get(&prop.name) else {
            continue;
        };
        out.insert(prop.name.clone(), value_to_js(source, registry, value)?);
    }
    Ok(Json::Object(out))
}

fn value_to_js(
    source: &impl ObjectSource,
    registry: &ClassRegistry,
    value: &Value,
) -> Result<Json, DocError> {
    Ok(match value {
        Value::Number(n) => number_to_js(*n),
        Value::String(s) | Value::Enum(s) | Value::Reference(s) => Json::String(s.clone()),
        Value::Bool(b) => Json::Bool(*b),
        Value::Any(raw) => raw.clone(),
        Value::Object(child) => object_to_js(source, registry, *child)?,
        Value::Array(children) => {
            let mut items = Vec::with_capacity(children.len());
            for child in children {
                items.push(object_to_js(source, registry, *child)?);
            }
            Json::Array(items)
        }
    })
}

/// Integral numbers persist as JSON integers so loaded-and-saved files
/// stay textually stable.
fn number_to_js(n: f64) -> Json {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64 {
        Json::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number)
    }
}

// ─── Reference resolution ────────────────────────────────────────────────

/// Resolve a reference token against a named collection path, walking
/// Object-kind properties from the root and matching the final array's
/// elements by their `name` property.
///
/// Dangling tokens resolve to `None` — never an error. The `check` pass
/// reports them as diagnostics.
pub fn resolve_reference(
    graph: &ObjectGraph,
    collection: &[String],
    token: &str,
) -> Option<ObjectId> {
    let (last, path) = collection.split_last()?;

    let mut current = graph.root()?;
    for segment in path {
        current = graph.get(current)?.child(segment)?;
    }

    let owner = graph.get(current)?;
    owner
        .children(last)
        .iter()
        .copied()
        .find(|&id| graph.get(id).and_then(|n| n.string("name")) == Some(token))
}
