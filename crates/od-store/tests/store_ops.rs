//! Integration tests: the document store mutation API.
//!
//! Every mutation validates against the schema before touching the graph;
//! a rejected operation leaves the document exactly as it was.

mod common;

use common::{main_widgets, make_store, page_of, widget_ids};
use od_core::DocError;
use od_store::ChangeEvent;
use pretty_assertions::{assert_eq, assert_ne};
use serde_json::json;
use std::cell::RefCell;
use std::rc::Rc;

// ─── add_object ──────────────────────────────────────────────────────────

#[test]
fn add_appends_a_validated_widget() {
    let mut store = make_store();
    let id = store
        .add_object(main_widgets(&store), &json!({ "type": "Text", "text": "d" }))
        .unwrap();

    let ids = widget_ids(&store);
    assert_eq!(ids.len(), 4);
    assert_eq!(*ids.last().unwrap(), id);

    let widget = store.find_object_by_id(id).unwrap();
    assert_eq!(widget.class, "TextWidget");
    // Defaults from the base template
    assert_eq!(widget.number("left"), Some(0.0));
}

#[test]
fn add_rejects_unrelated_class_and_leaves_array_unchanged() {
    let mut store = make_store();
    let before = widget_ids(&store);

    // Resolves to RogueWidget, which is not a Widget.
    let err = store
        .add_object(main_widgets(&store), &json!({ "type": "Rogue" }))
        .unwrap_err();

    assert!(matches!(err, DocError::SchemaViolation { .. }));
    assert_eq!(widget_ids(&store), before);
    assert!(!store.can_undo());
}

#[test]
fn add_to_non_array_property_is_rejected() {
    let mut store = make_store();
    let page = page_of(&store);
    let err = store
        .add_object(
            od_store::ArrayRef::new(page, "name"),
            &json!({ "type": "Text", "text": "x" }),
        )
        .unwrap_err();
    assert!(matches!(err, DocError::SchemaViolation { .. }));
}

// ─── update_object ───────────────────────────────────────────────────────

#[test]
fn update_changes_only_the_listed_properties() {
    let mut store = make_store();
    let id = widget_ids(&store)[0];

    let partial = json!({ "left": 42, "text": "renamed" });
    store.update_object(id, partial.as_object().unwrap()).unwrap();

    let widget = store.find_object_by_id(id).unwrap();
    assert_eq!(widget.number("left"), Some(42.0));
    assert_eq!(widget.string("text"), Some("renamed"));
    assert_eq!(widget.number("top"), Some(10.0), "top must be untouched");
}

#[test]
fn update_rejects_undeclared_and_computed_properties() {
    let mut store = make_store();
    let id = widget_ids(&store)[0];

    let bogus = json!({ "bogus": 1 });
    assert!(store.update_object(id, bogus.as_object().unwrap()).is_err());

    let computed = json!({ "absolutePosition": "1, 2" });
    assert!(store.update_object(id, computed.as_object().unwrap()).is_err());

    assert!(!store.can_undo(), "rejected updates must not touch history");
}

#[test]
fn update_rejects_array_properties() {
    let mut store = make_store();
    let page = page_of(&store);
    let partial = json!({ "widgets": [] });
    let err = store
        .update_object(page, partial.as_object().unwrap())
        .unwrap_err();
    assert!(matches!(err, DocError::SchemaViolation { .. }));
}

#[test]
fn update_replaces_an_object_kind_child() {
    let mut store = make_store();
    let id = widget_ids(&store)[0];

    let partial = json!({ "style": { "font": "Oswald" } });
    store.update_object(id, partial.as_object().unwrap()).unwrap();

    let style = store
        .find_object_by_id(id)
        .unwrap()
        .child("style")
        .unwrap();
    assert_eq!(
        store.find_object_by_id(style).unwrap().string("font"),
        Some("Oswald")
    );

    // Setting to null clears it and drops the old subtree from the graph.
    let clear = json!({ "style": null });
    store.update_object(id, clear.as_object().unwrap()).unwrap();
    assert!(store.find_object_by_id(id).unwrap().child("style").is_none());
    assert!(store.find_object_by_id(style).is_none());
}

// ─── delete / replace / move ─────────────────────────────────────────────

#[test]
fn delete_removes_the_whole_subtree() {
    let mut store = make_store();
    let id = store
        .add_object(
            main_widgets(&store),
            &json!({ "type": "Container", "widgets": [
                { "type": "Text", "left": 1, "top": 1, "text": "inner" }
            ]}),
        )
        .unwrap();
    let inner = store.find_object_by_id(id).unwrap().children("widgets")[0];

    store.delete_object(id).unwrap();
    assert!(store.find_object_by_id(id).is_none());
    assert!(store.find_object_by_id(inner).is_none(), "children go with the parent");
}

#[test]
fn replace_keeps_the_array_position() {
    let mut store = make_store();
    let ids = widget_ids(&store);
    let replaced = store
        .replace_object(ids[1], &json!({ "type": "Container", "widgets": [] }))
        .unwrap();

    let after = widget_ids(&store);
    assert_eq!(after.len(), 3);
    assert_eq!(after[1], replaced, "replacement takes the old position");
    assert_eq!(
        store.find_object_by_id(replaced).unwrap().class,
        "ContainerWidget"
    );
    assert!(store.find_object_by_id(ids[1]).is_none());
}

#[test]
fn replace_objects_collapses_siblings_into_one() {
    let mut store = make_store();
    let ids = widget_ids(&store);

    let merged = store
        .replace_objects(
            &[ids[0], ids[2]],
            &json!({ "type": "Container", "widgets": [] }),
        )
        .unwrap();

    let after = widget_ids(&store);
    assert_eq!(after, vec![merged, ids[1]]);
}

#[test]
fn replace_objects_requires_one_shared_array() {
    let mut store = make_store();
    let ids = widget_ids(&store);
    let page = page_of(&store);

    let err = store
        .replace_objects(&[ids[0], page], &json!({ "type": "Text", "text": "x" }))
        .unwrap_err();
    assert!(matches!(err, DocError::InvalidParent));
    assert_eq!(widget_ids(&store), ids, "nothing may change on failure");
}

#[test]
fn clone_then_insert_mints_fresh_ids() {
    let mut store = make_store();
    let original = widget_ids(&store)[0];

    let copy = store.clone_object(original).unwrap();
    assert_ne!(copy.root, original);

    let inserted = store.insert_object(main_widgets(&store), copy).unwrap();
    assert_eq!(
        store.find_object_by_id(inserted).unwrap().string("text"),
        store.find_object_by_id(original).unwrap().string("text")
    );
    assert_eq!(widget_ids(&store).len(), 4);
}

#[test]
fn move_reorders_within_the_array() {
    let mut store = make_store();
    let ids = widget_ids(&store);

    store.move_object(ids[0], 2).unwrap();
    assert_eq!(widget_ids(&store), vec![ids[1], ids[2], ids[0]]);

    // Out-of-range clamps to the last slot.
    store.move_object(ids[1], 99).unwrap();
    assert_eq!(widget_ids(&store), vec![ids[2], ids[0], ids[1]]);
}

// ─── References and check ────────────────────────────────────────────────

#[test]
fn reference_property_resolves_through_the_store() {
    let mut store = make_store();
    let id = widget_ids(&store)[0];

    let partial = json!({ "data": "temp1" });
    store.update_object(id, partial.as_object().unwrap()).unwrap();

    let target = store.resolve_reference(id, "data").unwrap();
    assert_eq!(
        store.find_object_by_id(target).unwrap().string("name"),
        Some("temp1")
    );
    assert_eq!(store.find_object_by_id(target).unwrap().class, "DataItem");
}

#[test]
fn dangling_reference_resolves_to_none_but_checks_dirty() {
    let mut store = make_store();
    let id = widget_ids(&store)[0];

    let partial = json!({ "data": "missing" });
    store.update_object(id, partial.as_object().unwrap()).unwrap();

    assert_eq!(store.resolve_reference(id, "data"), None);
    assert!(
        store.check().iter().any(|d| d.rule == "dangling-reference"),
        "check must report the dangling token"
    );
}

// ─── Change notifications ────────────────────────────────────────────────

#[test]
fn observers_see_one_batch_per_operation() {
    let mut store = make_store();
    let seen: Rc<RefCell<Vec<Vec<ChangeEvent>>>> = Rc::default();

    let sink = Rc::clone(&seen);
    store.subscribe(move |events| sink.borrow_mut().push(events.to_vec()));

    let id = store
        .add_object(main_widgets(&store), &json!({ "type": "Text", "text": "d" }))
        .unwrap();
    let partial = json!({ "left": 5 });
    store.update_object(id, partial.as_object().unwrap()).unwrap();
    store.delete_object(id).unwrap();

    let batches = seen.borrow();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[0], vec![ChangeEvent::Added { object: id }]);
    assert_eq!(
        batches[1],
        vec![ChangeEvent::Updated { object: id, property: "left".into() }]
    );
    assert_eq!(batches[2], vec![ChangeEvent::Removed { object: id }]);
}

#[test]
fn unsubscribed_observers_go_quiet() {
    let mut store = make_store();
    let count = Rc::new(RefCell::new(0));

    let sink = Rc::clone(&count);
    let token = store.subscribe(move |_| *sink.borrow_mut() += 1);

    let ids = widget_ids(&store);
    store.move_object(ids[0], 1).unwrap();
    store.unsubscribe(token);
    store.move_object(ids[0], 0).unwrap();

    assert_eq!(*count.borrow(), 1);
}

#[test]
fn swapping_an_object_child_notifies_removed_then_added() {
    let mut store = make_store();
    let id = widget_ids(&store)[0];
    let first = json!({ "style": { "font": "Oswald" } });
    store.update_object(id, first.as_object().unwrap()).unwrap();
    let old_style = store.find_object_by_id(id).unwrap().child("style").unwrap();

    let seen: Rc<RefCell<Vec<Vec<ChangeEvent>>>> = Rc::default();
    let sink = Rc::clone(&seen);
    store.subscribe(move |events| sink.borrow_mut().push(events.to_vec()));

    let second = json!({ "style": { "font": "Roboto" } });
    store.update_object(id, second.as_object().unwrap()).unwrap();
    let new_style = store.find_object_by_id(id).unwrap().child("style").unwrap();

    assert_ne!(old_style, new_style);
    let batches = seen.borrow();
    assert_eq!(
        batches[0],
        vec![
            ChangeEvent::Removed { object: old_style },
            ChangeEvent::Added { object: new_style },
        ]
    );
}

#[test]
fn noop_mutations_emit_no_events() {
    let mut store = make_store();
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    store.subscribe(move |_| *sink.borrow_mut() += 1);

    let id = widget_ids(&store)[0];
    let same = json!({ "left": 10 });
    store.update_object(id, same.as_object().unwrap()).unwrap();
    store.move_object(id, 0).unwrap();

    assert_eq!(*count.borrow(), 0);
}

// ─── Export ──────────────────────────────────────────────────────────────

#[test]
fn object_to_js_omits_computed_properties_and_ids() {
    let mut store = make_store();
    let id = widget_ids(&store)[0];
    let partial = json!({ "style": { "font": "Oswald" } });
    store.update_object(id, partial.as_object().unwrap()).unwrap();

    let emitted = store.object_to_js(id).unwrap();
    assert_eq!(
        emitted,
        json!({
            "type": "Text", "left": 10, "top": 10,
            "style": { "font": "Oswald" }, "text": "a"
        })
    );
}
