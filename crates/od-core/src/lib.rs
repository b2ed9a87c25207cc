pub mod check;
pub mod error;
pub mod id;
pub mod model;
pub mod schema;
pub mod serial;

pub use check::{CheckDiagnostic, CheckSeverity, check_document};
pub use error::DocError;
pub use id::ObjectId;
pub use model::{Detached, DocObject, ObjectGraph, ParentLink, Value};
pub use schema::{
    ClassDescriptor, ClassRegistry, JsonMap, PropertyDescriptor, PropertyKind, ResolveStrategy,
};
pub use serial::{ObjectSource, load_object, object_to_js, resolve_reference, value_from_js};
