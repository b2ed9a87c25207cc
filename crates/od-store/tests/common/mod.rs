//! Shared GUI-project fixture for store integration tests.

use od_core::schema::{ClassDescriptor, ClassRegistry, PropertyDescriptor, ResolveStrategy};
use od_core::ObjectId;
use od_store::{ArrayRef, DocumentStore};
use serde_json::json;

/// GUI project schema: pages of widgets, shared styles, named data items.
/// `RogueWidget` resolves through the suffix convention but does not
/// descend from `Widget` — registered on purpose to probe element-class
/// validation.
pub fn gui_registry() -> ClassRegistry {
    let mut reg = ClassRegistry::new();
    reg.register(
        ClassDescriptor::new("Project")
            .property(PropertyDescriptor::array("pages", "Page"))
            .property(PropertyDescriptor::array("styles", "Style"))
            .property(PropertyDescriptor::array("data", "DataItem")),
    );
    reg.register(
        ClassDescriptor::new("Page")
            .property(PropertyDescriptor::string("name"))
            .property(PropertyDescriptor::array("widgets", "Widget")),
    );
    reg.register(
        ClassDescriptor::new("Style")
            .property(PropertyDescriptor::string("name").optional())
            .property(PropertyDescriptor::string("font").optional()),
    );
    reg.register(
        ClassDescriptor::new("DataItem").property(PropertyDescriptor::string("name")),
    );
    reg.register(
        ClassDescriptor::new("Widget")
            .property(PropertyDescriptor::enumeration("type").hidden())
            .property(PropertyDescriptor::number("left"))
            .property(PropertyDescriptor::number("top"))
            .property(PropertyDescriptor::object("style", "Style").optional())
            .property(PropertyDescriptor::reference("data", &["data"]).optional())
            .property(PropertyDescriptor::string("absolutePosition").computed())
            .resolve_with(ResolveStrategy::suffix("type", "Widget"))
            .default_value(
                json!({ "left": 0, "top": 0 }).as_object().unwrap().clone(),
            ),
    );
    reg.register(
        ClassDescriptor::new("TextWidget")
            .parent("Widget")
            .property(PropertyDescriptor::string("text")),
    );
    reg.register(
        ClassDescriptor::new("ContainerWidget")
            .parent("Widget")
            .property(PropertyDescriptor::array("widgets", "Widget")),
    );
    reg.register(ClassDescriptor::new("RogueWidget"));
    reg
}

pub fn demo_project() -> serde_json::Value {
    json!({
        "pages": [
            {
                "name": "Main",
                "widgets": [
                    { "type": "Text", "left": 10, "top": 10, "text": "a" },
                    { "type": "Text", "left": 20, "top": 10, "text": "b" },
                    { "type": "Text", "left": 30, "top": 10, "text": "c" }
                ]
            }
        ],
        "styles": [],
        "data": [{ "name": "temp1" }]
    })
}

pub fn make_store() -> DocumentStore {
    DocumentStore::from_record(gui_registry(), &demo_project(), "Project").unwrap()
}

/// The `widgets` array of the first page.
pub fn main_widgets(store: &DocumentStore) -> ArrayRef {
    let page = page_of(store);
    ArrayRef::new(page, "widgets")
}

pub fn page_of(store: &DocumentStore) -> ObjectId {
    store
        .find_object_by_id(store.root())
        .unwrap()
        .children("pages")[0]
}

pub fn widget_ids(store: &DocumentStore) -> Vec<ObjectId> {
    store
        .find_object_by_id(page_of(store))
        .unwrap()
        .children("widgets")
        .to_vec()
}
