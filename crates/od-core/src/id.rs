//! Object identity.
//!
//! Every document object carries an `ObjectId`, minted when the object is
//! created and stable until the object is dropped from both the graph and
//! the undo history — undoing a delete restores the exact same IDs. IDs
//! never appear in the persisted record form; loading a document always
//! assigns fresh ones, so an ID is only meaningful inside the process
//! that minted it.
//!
//! The string form is human-readable (`Widget_17`) and interned, which
//! keeps copies, comparisons, and hashing cheap while leaving log lines
//! and diagnostics legible.

use lasso::{Spur, ThreadedRodeo};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

static STRINGS: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Counter behind `fresh`. Process-wide, so IDs stay distinct even when
/// several stores coexist — stricter than the per-store uniqueness the
/// graph itself requires.
static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of one document object.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(Spur);

impl ObjectId {
    /// Mint a new ID, prefixed with the class name for legibility
    /// (`Page_0`, `Widget_17`).
    pub fn fresh(class: &str) -> Self {
        let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        Self::intern(&format!("{class}_{n}"))
    }

    /// Intern a fixed name as an ID. Fixtures use this to address objects
    /// deterministically; document objects always go through `fresh`.
    pub fn intern(name: &str) -> Self {
        ObjectId(STRINGS.get_or_intern(name))
    }

    pub fn as_str(&self) -> &'static str {
        STRINGS.resolve(&self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.as_str())
    }
}
