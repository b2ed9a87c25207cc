//! Document store: owner of one project's live object graph.
//!
//! Every public mutation validates against the schema first, then applies
//! one command (or a short fixed sequence) through the undo stack. A
//! mutation issued outside an explicit transaction opens and immediately
//! commits a single-command transaction of its own. Observers receive the
//! batched change events of each committed transaction, undo, or redo.
//!
//! A store exclusively owns its graph; objects never move between stores
//! except as plain records (`object_to_js` / `load_object`).

use crate::commands::{ArrayRef, Command, CommandStack, PropSlot, Transaction};
use crate::notify::{ChangeEvent, ObserverId, ObserverList};
use od_core::check::CheckDiagnostic;
use od_core::model::{Detached, DocObject, ObjectGraph, Value};
use od_core::schema::{ClassRegistry, JsonMap, PropertyKind};
use od_core::{DocError, ObjectId, serial};
use serde_json::Value as Json;

const DEFAULT_UNDO_DEPTH: usize = 100;

pub struct DocumentStore {
    registry: ClassRegistry,
    graph: ObjectGraph,
    root: ObjectId,
    history: CommandStack,
    observers: ObserverList,
    /// Events of the transaction being built, flushed on commit.
    pending: Vec<ChangeEvent>,
}

impl DocumentStore {
    /// Load a persisted project record as a new store.
    pub fn from_record(
        registry: ClassRegistry,
        record: &Json,
        root_class: &str,
    ) -> Result<Self, DocError> {
        let subtree = serial::load_object(&registry, record, root_class)?;
        let mut graph = ObjectGraph::new();
        let root = graph.set_root(subtree);
        log::debug!("loaded document with {} objects", graph.len());
        Ok(Self {
            registry,
            graph,
            root,
            history: CommandStack::new(DEFAULT_UNDO_DEPTH),
            observers: ObserverList::default(),
            pending: Vec::new(),
        })
    }

    /// Create an empty document from the root class's default template.
    pub fn new(registry: ClassRegistry, root_class: &str) -> Result<Self, DocError> {
        let template = registry
            .get(root_class)
            .ok_or_else(|| DocError::UnknownClass(root_class.to_string()))?
            .default_value
            .clone()
            .unwrap_or_default();
        Self::from_record(registry, &Json::Object(template), root_class)
    }

    pub fn with_undo_depth(mut self, depth: usize) -> Self {
        self.history = CommandStack::new(depth);
        self
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn root(&self) -> ObjectId {
        self.root
    }

    pub fn find_object_by_id(&self, id: ObjectId) -> Option<&DocObject> {
        self.graph.get(id)
    }

    /// Emit an object as a plain record (export, clipboard).
    pub fn object_to_js(&self, id: ObjectId) -> Result<Json, DocError> {
        serial::object_to_js(&self.graph, &self.registry, id)
    }

    /// Instantiate a record as a detached subtree, ready for `insert_object`.
    pub fn load_object(&self, record: &Json, base_class: &str) -> Result<Detached, DocError> {
        serial::load_object(&self.registry, record, base_class)
    }

    /// Resolve a Reference property of `id` to the object it names.
    /// Dangling tokens yield `None`.
    pub fn resolve_reference(&self, id: ObjectId, prop: &str) -> Option<ObjectId> {
        let object = self.graph.get(id)?;
        let descriptor = self.registry.find_property(&object.class, prop)?;
        let PropertyKind::Reference { collection } = &descriptor.kind else {
            return None;
        };
        let token = match object.props.get(prop) {
            Some(Value::Reference(token)) => token,
            _ => return None,
        };
        serial::resolve_reference(&self.graph, collection, token)
    }

    /// Run the diagnostics pass over the current graph.
    pub fn check(&self) -> Vec<CheckDiagnostic> {
        od_core::check_document(&self.graph, &self.registry)
    }

    // ─── Transactions ────────────────────────────────────────────────────

    pub fn begin_transaction(&mut self, label: &str) {
        self.history.begin(label, true);
    }

    /// Push the open transaction onto the undo stack and notify observers.
    /// An empty frame is discarded without creating an undo entry.
    pub fn commit_transaction(&mut self) {
        if self.history.commit() {
            self.flush_events();
        } else {
            self.pending.clear();
        }
    }

    /// Revert and discard everything recorded since the transaction opened.
    pub fn cancel_transaction(&mut self) {
        self.history.cancel(&mut self.graph);
        self.pending.clear();
    }

    /// While on, commands coalesce into one open transaction (drag
    /// gestures). Callers must pair `true`/`false` symmetrically;
    /// mismatched calls merge unrelated edits into one undo step.
    pub fn set_combine_commands(&mut self, on: bool) {
        self.history.set_combine(on);
    }

    // ─── Mutations ───────────────────────────────────────────────────────

    /// Validate and append a record to a container array. Returns the new
    /// object's ID (freshly minted).
    pub fn add_object(&mut self, array: ArrayRef, record: &Json) -> Result<ObjectId, DocError> {
        let element_class = self.element_class(&array)?;
        let subtree = serial::load_object(&self.registry, record, &element_class)?;
        self.insert_object(array, subtree)
    }

    /// Append an already-built subtree (the clone flow) to a container
    /// array, validating its class against the array's element class.
    pub fn insert_object(
        &mut self,
        array: ArrayRef,
        subtree: Detached,
    ) -> Result<ObjectId, DocError> {
        let element_class = self.element_class(&array)?;
        if !self.registry.is_subclass_of(subtree.class(), &element_class) {
            return Err(DocError::SchemaViolation {
                class: subtree.class().to_string(),
                reason: format!("not a `{element_class}`, cannot go into `{}`", array.prop),
            });
        }

        let owner = self
            .graph
            .get(array.owner)
            .ok_or(DocError::ObjectNotFound(array.owner))?;
        let index = owner.children(&array.prop).len();
        let object = subtree.root;
        let label = format!("Add {}", subtree.class());
        log::debug!("add {object} to {}.{}", array.owner, array.prop);

        self.run(
            &label,
            vec![Command::Insert {
                array,
                index,
                object,
                slot: Some(subtree),
            }],
            vec![ChangeEvent::Added { object }],
        )?;
        Ok(object)
    }

    /// Apply a partial record to an object — one command per property that
    /// actually changes. Properties equal to their current value (by deep
    /// equality of the serialized form) emit nothing.
    pub fn update_object(&mut self, id: ObjectId, partial: &JsonMap) -> Result<(), DocError> {
        let object = self.graph.get(id).ok_or(DocError::ObjectNotFound(id))?;
        let class = object.class.clone();

        let mut commands = Vec::new();
        let mut events = Vec::new();
        for (name, raw) in partial {
            let descriptor = self.registry.find_property(&class, name).ok_or_else(|| {
                DocError::schema(&class, format!("`{name}` is not a declared property"))
            })?;
            if descriptor.computed {
                return Err(DocError::schema(
                    &class,
                    format!("`{name}` is computed and cannot be set"),
                ));
            }

            let change = match &descriptor.kind {
                PropertyKind::Array { .. } => {
                    return Err(DocError::schema(
                        &class,
                        format!("`{name}` is an array property — use add/delete/move"),
                    ));
                }
                PropertyKind::Object { class: child_class } => {
                    let current_child = object.child(name);
                    let current = current_child
                        .map(|c| serial::object_to_js(&self.graph, &self.registry, c))
                        .transpose()?;
                    if raw.is_null() {
                        current_child.map(|child| {
                            (
                                PropSlot::Child {
                                    object: child,
                                    stash: None,
                                },
                                PropSlot::Absent,
                            )
                        })
                    } else {
                        let subtree = serial::load_object(&self.registry, raw, child_class)?;
                        let incoming =
                            serial::object_to_js(&subtree, &self.registry, subtree.root)?;
                        if current.as_ref() == Some(&incoming) {
                            None
                        } else {
                            let old = match current_child {
                                Some(child) => PropSlot::Child {
                                    object: child,
                                    stash: None,
                                },
                                None => PropSlot::Absent,
                            };
                            Some((
                                old,
                                PropSlot::Child {
                                    object: subtree.root,
                                    stash: Some(subtree),
                                },
                            ))
                        }
                    }
                }
                _ => {
                    let current = object.props.get(name);
                    if raw.is_null() {
                        current
                            .map(|v| (PropSlot::Plain(v.clone()), PropSlot::Absent))
                    } else {
                        let value = serial::value_from_js(&class, descriptor, raw)?;
                        if current == Some(&value) {
                            None
                        } else {
                            let old = match current {
                                Some(v) => PropSlot::Plain(v.clone()),
                                None => PropSlot::Absent,
                            };
                            Some((old, PropSlot::Plain(value)))
                        }
                    }
                }
            };

            if let Some((old, new)) = change {
                // Owned-child swaps notify as the child's removal/arrival;
                // plain values as a property update on the owner.
                match (&old, &new) {
                    (PropSlot::Child { object: prev, .. }, PropSlot::Child { object: next, .. }) =>
                    {
                        events.push(ChangeEvent::Removed { object: *prev });
                        events.push(ChangeEvent::Added { object: *next });
                    }
                    (PropSlot::Child { object: prev, .. }, _) => {
                        events.push(ChangeEvent::Removed { object: *prev });
                    }
                    (_, PropSlot::Child { object: next, .. }) => {
                        events.push(ChangeEvent::Added { object: *next });
                    }
                    _ => events.push(ChangeEvent::Updated {
                        object: id,
                        property: name.clone(),
                    }),
                }
                commands.push(Command::SetProperty {
                    object: id,
                    prop: name.clone(),
                    old,
                    new,
                });
            }
        }

        if commands.is_empty() {
            return Ok(());
        }
        let label = format!("Update {class}");
        self.run(&label, commands, events)
    }

    /// Remove an object from its owning array or object property. The
    /// removed subtree lives on inside the undo history.
    pub fn delete_object(&mut self, id: ObjectId) -> Result<(), DocError> {
        let object = self.graph.get(id).ok_or(DocError::ObjectNotFound(id))?;
        let class = object.class.clone();
        let Some(link) = object.parent.clone() else {
            return Err(DocError::schema(&class, "the root object cannot be deleted"));
        };

        let command = match self.graph.index_in_parent(id) {
            Some(index) => Command::Remove {
                array: ArrayRef::new(link.owner, &link.prop),
                index,
                object: id,
                slot: None,
            },
            None => Command::SetProperty {
                object: link.owner,
                prop: link.prop.clone(),
                old: PropSlot::Child {
                    object: id,
                    stash: None,
                },
                new: PropSlot::Absent,
            },
        };
        log::debug!("delete {id} from {}.{}", link.owner, link.prop);
        self.run(
            &format!("Delete {class}"),
            vec![command],
            vec![ChangeEvent::Removed { object: id }],
        )
    }

    /// Atomic delete+insert at the same position — the way a node changes
    /// class. Returns the replacement's ID.
    pub fn replace_object(&mut self, id: ObjectId, record: &Json) -> Result<ObjectId, DocError> {
        let object = self.graph.get(id).ok_or(DocError::ObjectNotFound(id))?;
        let Some(link) = object.parent.clone() else {
            return Err(DocError::InvalidParent);
        };

        match self.graph.index_in_parent(id) {
            Some(index) => {
                let array = ArrayRef::new(link.owner, &link.prop);
                let element_class = self.element_class(&array)?;
                let subtree = serial::load_object(&self.registry, record, &element_class)?;
                let replacement = subtree.root;
                let label = format!("Replace {}", subtree.class());

                self.run(
                    &label,
                    vec![
                        Command::Remove {
                            array: array.clone(),
                            index,
                            object: id,
                            slot: None,
                        },
                        Command::Insert {
                            array,
                            index,
                            object: replacement,
                            slot: Some(subtree),
                        },
                    ],
                    vec![
                        ChangeEvent::Removed { object: id },
                        ChangeEvent::Added { object: replacement },
                    ],
                )?;
                Ok(replacement)
            }
            None => {
                // Held by an Object-kind property.
                let owner_class = self
                    .graph
                    .get(link.owner)
                    .ok_or(DocError::ObjectNotFound(link.owner))?
                    .class
                    .clone();
                let Some(PropertyKind::Object { class }) = self
                    .registry
                    .find_property(&owner_class, &link.prop)
                    .map(|p| p.kind.clone())
                else {
                    return Err(DocError::InvalidParent);
                };
                let subtree = serial::load_object(&self.registry, record, &class)?;
                let replacement = subtree.root;
                let label = format!("Replace {}", subtree.class());

                self.run(
                    &label,
                    vec![Command::SetProperty {
                        object: link.owner,
                        prop: link.prop.clone(),
                        old: PropSlot::Child {
                            object: id,
                            stash: None,
                        },
                        new: PropSlot::Child {
                            object: replacement,
                            stash: Some(subtree),
                        },
                    }],
                    vec![
                        ChangeEvent::Removed { object: id },
                        ChangeEvent::Added { object: replacement },
                    ],
                )?;
                Ok(replacement)
            }
        }
    }

    /// Replace a set of sibling objects with one new object at the
    /// position of the first.
    ///
    /// # Errors
    /// `InvalidParent` when the set is empty or the objects do not share
    /// one owning array.
    pub fn replace_objects(
        &mut self,
        ids: &[ObjectId],
        record: &Json,
    ) -> Result<ObjectId, DocError> {
        let (&first, rest) = ids.split_first().ok_or(DocError::InvalidParent)?;
        let link = self
            .graph
            .parent_of(first)
            .cloned()
            .ok_or(DocError::InvalidParent)?;
        for &id in rest {
            if self.graph.parent_of(id) != Some(&link) {
                return Err(DocError::InvalidParent);
            }
        }

        let array = ArrayRef::new(link.owner, &link.prop);
        let element_class = self.element_class(&array)?;
        let subtree = serial::load_object(&self.registry, record, &element_class)?;
        let replacement = subtree.root;

        let mut victims = Vec::with_capacity(ids.len());
        for &id in ids {
            let index = self
                .graph
                .index_in_parent(id)
                .ok_or(DocError::InvalidParent)?;
            victims.push((index, id));
        }
        let first_index = victims[0].0;
        // The first victim's slot after the others before it are gone.
        let target = first_index - victims.iter().filter(|(i, _)| *i < first_index).count();
        victims.sort_by(|a, b| b.0.cmp(&a.0));

        let mut commands = Vec::with_capacity(victims.len() + 1);
        let mut events = Vec::with_capacity(victims.len() + 1);
        for (index, id) in victims {
            commands.push(Command::Remove {
                array: array.clone(),
                index,
                object: id,
                slot: None,
            });
            events.push(ChangeEvent::Removed { object: id });
        }
        commands.push(Command::Insert {
            array,
            index: target,
            object: replacement,
            slot: Some(subtree),
        });
        events.push(ChangeEvent::Added { object: replacement });

        self.run(&format!("Replace {} objects", ids.len()), commands, events)?;
        Ok(replacement)
    }

    /// Deep-copy an object and its owned subtree with fresh IDs. The copy
    /// is detached — insert it with `insert_object`.
    pub fn clone_object(&self, id: ObjectId) -> Result<Detached, DocError> {
        self.graph.deep_clone(id).ok_or(DocError::ObjectNotFound(id))
    }

    /// Reorder an object within its owning array.
    pub fn move_object(&mut self, id: ObjectId, new_index: usize) -> Result<(), DocError> {
        let link = self
            .graph
            .parent_of(id)
            .cloned()
            .ok_or(DocError::ObjectNotFound(id))?;
        let from = self
            .graph
            .index_in_parent(id)
            .ok_or(DocError::InvalidParent)?;
        let len = self
            .graph
            .get(link.owner)
            .map(|o| o.children(&link.prop).len())
            .unwrap_or(0);
        let to = new_index.min(len.saturating_sub(1));
        if from == to {
            return Ok(());
        }

        self.run(
            "Move object",
            vec![Command::MoveElement {
                array: ArrayRef::new(link.owner, &link.prop),
                object: id,
                from,
                to,
            }],
            vec![ChangeEvent::Moved { object: id }],
        )
    }

    // ─── Undo / redo ─────────────────────────────────────────────────────

    /// Undo the most recent transaction; returns its label.
    pub fn undo(&mut self) -> Option<String> {
        let (label, events) = {
            let txn = self.history.undo(&mut self.graph)?;
            (txn.label.clone(), events_for(txn, true))
        };
        log::debug!("undo \"{label}\"");
        self.observers.notify(&events);
        Some(label)
    }

    /// Redo the most recently undone transaction; returns its label.
    pub fn redo(&mut self) -> Option<String> {
        let (label, events) = {
            let txn = self.history.redo(&mut self.graph)?;
            (txn.label.clone(), events_for(txn, false))
        };
        log::debug!("redo \"{label}\"");
        self.observers.notify(&events);
        Some(label)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.history.redo_label()
    }

    // ─── Notifications ───────────────────────────────────────────────────

    pub fn subscribe(&mut self, callback: impl FnMut(&[ChangeEvent]) + 'static) -> ObserverId {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: ObserverId) {
        self.observers.unsubscribe(id);
    }

    // ─── Internals ───────────────────────────────────────────────────────

    /// Element class of a container array property.
    fn element_class(&self, array: &ArrayRef) -> Result<String, DocError> {
        let owner = self
            .graph
            .get(array.owner)
            .ok_or(DocError::ObjectNotFound(array.owner))?;
        match self
            .registry
            .find_property(&owner.class, &array.prop)
            .map(|p| &p.kind)
        {
            Some(PropertyKind::Array { class }) => Ok(class.clone()),
            _ => Err(DocError::schema(
                &owner.class,
                format!("`{}` is not an array property", array.prop),
            )),
        }
    }

    /// Apply and record a command sequence inside the current (or an
    /// implicit) transaction. On a mid-sequence failure every command
    /// already applied in the open transaction is reverted before the
    /// error propagates — the graph is left exactly as before.
    fn run(
        &mut self,
        label: &str,
        commands: Vec<Command>,
        events: Vec<ChangeEvent>,
    ) -> Result<(), DocError> {
        self.history.begin(label, false);
        for mut command in commands {
            if let Err(e) = command.apply(&mut self.graph) {
                self.history.rollback_open(&mut self.graph);
                self.pending.clear();
                if !self.history.holds_open() {
                    self.history.commit(); // discards the now-empty frame
                }
                return Err(e);
            }
            self.history.record(command);
        }
        self.pending.extend(events);
        if !self.history.holds_open() {
            if self.history.commit() {
                self.flush_events();
            } else {
                self.pending.clear();
            }
        }
        Ok(())
    }

    fn flush_events(&mut self) {
        let events = std::mem::take(&mut self.pending);
        self.observers.notify(&events);
    }
}

/// Events observers should see for a transaction. Undo inverts: inserts
/// read as removals and vice versa, in reverse command order. A property
/// assignment that swaps owned children notifies as the children's
/// removal/arrival, the same shape its forward operation reported.
fn events_for(txn: &Transaction, inverted: bool) -> Vec<ChangeEvent> {
    let mut out = Vec::with_capacity(txn.commands.len());
    let commands: Vec<&Command> = if inverted {
        txn.commands.iter().rev().collect()
    } else {
        txn.commands.iter().collect()
    };

    for command in commands {
        match command {
            Command::Insert { object, .. } => out.push(if inverted {
                ChangeEvent::Removed { object: *object }
            } else {
                ChangeEvent::Added { object: *object }
            }),
            Command::Remove { object, .. } => out.push(if inverted {
                ChangeEvent::Added { object: *object }
            } else {
                ChangeEvent::Removed { object: *object }
            }),
            Command::SetProperty {
                object,
                prop,
                old,
                new,
            } => {
                let (leaving, arriving) = if inverted { (new, old) } else { (old, new) };
                let mut child_swap = false;
                if let PropSlot::Child { object: child, .. } = leaving {
                    out.push(ChangeEvent::Removed { object: *child });
                    child_swap = true;
                }
                if let PropSlot::Child { object: child, .. } = arriving {
                    out.push(ChangeEvent::Added { object: *child });
                    child_swap = true;
                }
                if !child_swap {
                    out.push(ChangeEvent::Updated {
                        object: *object,
                        property: prop.clone(),
                    });
                }
            }
            Command::MoveElement { object, .. } => {
                out.push(ChangeEvent::Moved { object: *object });
            }
        }
    }
    out
}
