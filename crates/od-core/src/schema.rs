//! Static schema tables: classes, properties, and polymorphic resolution.
//!
//! Each class registers an explicit `ClassDescriptor` — an ordered property
//! list, an optional parent class (single inheritance), a default-value
//! template, a `before_load` migration hook, and a list of resolution
//! strategies that map a serialized record to its concrete subclass.
//!
//! There is no runtime field enumeration: what the descriptor declares is
//! all the serializer and the store will ever touch.

use crate::error::DocError;
use serde_json::Value as Json;
use smallvec::SmallVec;
use std::collections::HashMap;

/// A JSON object record — the serialized form of one document object.
pub type JsonMap = serde_json::Map<String, Json>;

/// Migration hook invoked on the raw record *before* property extraction.
/// Normalizes legacy shapes (field renames, discriminant splits) in place.
pub type BeforeLoadHook = fn(&mut JsonMap);

/// Custom class resolver: inspects a record and names the concrete class.
pub type ClassResolverFn = fn(&JsonMap) -> Option<String>;

// ─── Property descriptors ────────────────────────────────────────────────

/// The kind of value a property holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Number,
    String,
    Boolean,
    /// A named variant, stored as its string form.
    Enum,
    /// A single owned child object of the given class.
    Object { class: String },
    /// A by-name reference into a named collection (e.g. `["gui", "pages"]`).
    /// Stored as an opaque token and resolved lazily on access.
    Reference { collection: Vec<String> },
    /// An ordered array of owned child objects of the given class.
    Array { class: String },
    /// Schema-opaque value, kept as raw JSON.
    Any,
}

/// One declared property of a class.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
    /// Not shown in editing surfaces. Still persisted.
    pub hidden: bool,
    /// Derived at runtime by collaborators — never stored, never persisted,
    /// rejected by `update_object`.
    pub computed: bool,
    /// May be absent without a `missing-required` diagnostic.
    pub optional: bool,
}

impl PropertyDescriptor {
    fn new(name: &str, kind: PropertyKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            hidden: false,
            computed: false,
            optional: false,
        }
    }

    pub fn number(name: &str) -> Self {
        Self::new(name, PropertyKind::Number)
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, PropertyKind::String)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, PropertyKind::Boolean)
    }

    pub fn enumeration(name: &str) -> Self {
        Self::new(name, PropertyKind::Enum)
    }

    pub fn object(name: &str, class: &str) -> Self {
        Self::new(
            name,
            PropertyKind::Object {
                class: class.to_string(),
            },
        )
    }

    pub fn reference(name: &str, collection: &[&str]) -> Self {
        Self::new(
            name,
            PropertyKind::Reference {
                collection: collection.iter().map(|s| s.to_string()).collect(),
            },
        )
    }

    pub fn array(name: &str, class: &str) -> Self {
        Self::new(
            name,
            PropertyKind::Array {
                class: class.to_string(),
            },
        )
    }

    pub fn any(name: &str) -> Self {
        Self::new(name, PropertyKind::Any)
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

// ─── Class resolution strategies ─────────────────────────────────────────

/// One way to map a serialized record to a concrete registered class.
/// A base class carries an ordered list of these; the first that yields a
/// registered class name wins.
#[derive(Clone)]
pub enum ResolveStrategy {
    /// Read `field` from the record and look up `<value><suffix>`
    /// (e.g. `type: "Text"` + suffix `"Widget"` → `TextWidget`).
    Suffix { field: String, suffix: String },
    /// Arbitrary resolver function.
    Custom(ClassResolverFn),
}

impl ResolveStrategy {
    pub fn suffix(field: &str, suffix: &str) -> Self {
        ResolveStrategy::Suffix {
            field: field.to_string(),
            suffix: suffix.to_string(),
        }
    }

    fn candidate(&self, record: &JsonMap) -> Option<String> {
        match self {
            ResolveStrategy::Suffix { field, suffix } => {
                let value = record.get(field)?.as_str()?;
                Some(format!("{value}{suffix}"))
            }
            ResolveStrategy::Custom(f) => f(record),
        }
    }
}

impl std::fmt::Debug for ResolveStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolveStrategy::Suffix { field, suffix } => f
                .debug_struct("Suffix")
                .field("field", field)
                .field("suffix", suffix)
                .finish(),
            ResolveStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

// ─── Class descriptors ───────────────────────────────────────────────────

/// Schema definition for one object class.
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    pub name: String,
    /// Parent class name — single-inheritance chain, no mixins.
    pub parent: Option<String>,
    /// Declared properties, in persistence order.
    pub properties: Vec<PropertyDescriptor>,
    /// Record template used when creating a fresh object of this class and
    /// as the fallback for keys missing from a loaded record.
    pub default_value: Option<JsonMap>,
    /// Migration hook applied to raw records during load.
    pub before_load: Option<BeforeLoadHook>,
    /// Polymorphic resolution strategies, tried in order. Empty means the
    /// class is concrete and resolves to itself.
    pub resolve: SmallVec<[ResolveStrategy; 2]>,
}

impl ClassDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            parent: None,
            properties: Vec::new(),
            default_value: None,
            before_load: None,
            resolve: SmallVec::new(),
        }
    }

    pub fn parent(mut self, name: &str) -> Self {
        self.parent = Some(name.to_string());
        self
    }

    pub fn property(mut self, prop: PropertyDescriptor) -> Self {
        self.properties.push(prop);
        self
    }

    pub fn default_value(mut self, template: JsonMap) -> Self {
        self.default_value = Some(template);
        self
    }

    pub fn before_load(mut self, hook: BeforeLoadHook) -> Self {
        self.before_load = Some(hook);
        self
    }

    pub fn resolve_with(mut self, strategy: ResolveStrategy) -> Self {
        self.resolve.push(strategy);
        self
    }
}

// ─── Registry ────────────────────────────────────────────────────────────

/// All registered classes for one document store instance.
///
/// Deliberately a plain constructible value, not a process-global table:
/// two stores with different schemas can coexist.
#[derive(Debug, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, ClassDescriptor>,
}

impl ClassRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class descriptor, keyed by class name.
    /// Re-registering a name replaces the previous descriptor.
    pub fn register(&mut self, descriptor: ClassDescriptor) {
        log::debug!("registering class `{}`", descriptor.name);
        self.classes.insert(descriptor.name.clone(), descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    /// Resolve a serialized record to its concrete class, starting from a
    /// base class. Strategies registered on the base are tried in order;
    /// a base with no strategies resolves to itself.
    ///
    /// # Errors
    /// `UnknownClass` when the base is unregistered or no strategy yields
    /// a registered class.
    pub fn resolve_class(
        &self,
        base: &str,
        record: &JsonMap,
    ) -> Result<&ClassDescriptor, DocError> {
        let base_desc = self
            .get(base)
            .ok_or_else(|| DocError::UnknownClass(base.to_string()))?;

        if base_desc.resolve.is_empty() {
            return Ok(base_desc);
        }

        for strategy in &base_desc.resolve {
            if let Some(candidate) = strategy.candidate(record)
                && let Some(desc) = self.get(&candidate)
            {
                return Ok(desc);
            }
        }

        // Report the discriminant value when present, for a usable message.
        let shown = record
            .get("type")
            .and_then(Json::as_str)
            .unwrap_or(base)
            .to_string();
        Err(DocError::UnknownClass(shown))
    }

    /// True when `name` is `base` or a descendant of it.
    pub fn is_subclass_of(&self, name: &str, base: &str) -> bool {
        let mut current = Some(name);
        while let Some(class) = current {
            if class == base {
                return true;
            }
            current = self.get(class).and_then(|d| d.parent.as_deref());
        }
        false
    }

    /// Look up a declared property, walking the parent chain child-first
    /// so subclass overrides win.
    pub fn find_property(&self, class: &str, prop: &str) -> Option<&PropertyDescriptor> {
        let mut current = Some(class);
        while let Some(name) = current {
            let desc = self.get(name)?;
            if let Some(p) = desc.properties.iter().find(|p| p.name == prop) {
                return Some(p);
            }
            current = desc.parent.as_deref();
        }
        None
    }

    /// All declared properties of a class, base chain first, with subclass
    /// overrides replacing the inherited descriptor in place. This order
    /// drives property extraction and emission.
    pub fn declared_properties(&self, class: &str) -> Vec<&PropertyDescriptor> {
        let mut chain = Vec::new();
        let mut current = Some(class);
        while let Some(name) = current {
            let Some(desc) = self.get(name) else { break };
            chain.push(desc);
            current = desc.parent.as_deref();
        }

        let mut out: Vec<&PropertyDescriptor> = Vec::new();
        for desc in chain.iter().rev() {
            for prop in &desc.properties {
                if let Some(slot) = out.iter_mut().find(|p| p.name == prop.name) {
                    *slot = prop;
                } else {
                    out.push(prop);
                }
            }
        }
        out
    }
}
