//! Undo/Redo command stack.
//!
//! Every mutation is wrapped in a reversible `Command`; commands are
//! grouped into labeled `Transaction`s that undo and redo atomically.
//! Removed subtrees travel *inside* the commands that removed them, so a
//! transaction dropped from both stacks frees its objects with it.
//!
//! Drag gestures use **combine mode**: while it is on, new commands keep
//! appending to the open transaction instead of closing it, so a chain of
//! related edits collapses into a single undo step.

use od_core::model::{Detached, ObjectGraph, ParentLink, Value};
use od_core::{DocError, ObjectId};
use smallvec::SmallVec;

/// Names one container slot: the `prop` array (or object property) of `owner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayRef {
    pub owner: ObjectId,
    pub prop: String,
}

impl ArrayRef {
    pub fn new(owner: ObjectId, prop: &str) -> Self {
        Self {
            owner,
            prop: prop.to_string(),
        }
    }

    fn link(&self) -> ParentLink {
        ParentLink::new(self.owner, &self.prop)
    }
}

/// One side of a property assignment. `Child` owns the subtree whenever
/// that side is not the live one.
#[derive(Debug, Clone)]
pub enum PropSlot {
    /// Property not set.
    Absent,
    /// Non-owning value, captured by clone.
    Plain(Value),
    /// Owned child subtree for an Object-kind property. `object` is the
    /// child's root, kept here so notifications can name the child even
    /// while the subtree itself lives on the other side of the swap.
    Child {
        object: ObjectId,
        stash: Option<Detached>,
    },
}

/// Smallest invertible mutation unit.
///
/// `apply` and `revert` are exact inverses; each is idempotent only when
/// reapplied to the state its pair left behind. `object` fields are the
/// affected subtree roots, kept for change notifications.
#[derive(Debug, Clone)]
pub enum Command {
    /// Insert a subtree into an array at `index`.
    Insert {
        array: ArrayRef,
        index: usize,
        object: ObjectId,
        slot: Option<Detached>,
    },
    /// Remove the array element at `index`.
    Remove {
        array: ArrayRef,
        index: usize,
        object: ObjectId,
        slot: Option<Detached>,
    },
    /// Set, replace, or clear one property value.
    SetProperty {
        object: ObjectId,
        prop: String,
        old: PropSlot,
        new: PropSlot,
    },
    /// Reorder an array element.
    MoveElement {
        array: ArrayRef,
        object: ObjectId,
        from: usize,
        to: usize,
    },
}

impl Command {
    pub fn apply(&mut self, graph: &mut ObjectGraph) -> Result<(), DocError> {
        match self {
            Command::Insert {
                array, index, slot, ..
            } => insert_subtree(graph, array, *index, slot),
            Command::Remove { object, slot, .. } => remove_subtree(graph, *object, slot),
            Command::SetProperty {
                object,
                prop,
                old,
                new,
            } => {
                capture(graph, *object, prop, old)?;
                install(graph, *object, prop, new)
            }
            Command::MoveElement {
                array, from, to, ..
            } => reorder(graph, array, *from, *to),
        }
    }

    pub fn revert(&mut self, graph: &mut ObjectGraph) -> Result<(), DocError> {
        match self {
            Command::Insert { object, slot, .. } => remove_subtree(graph, *object, slot),
            Command::Remove {
                array, index, slot, ..
            } => insert_subtree(graph, array, *index, slot),
            Command::SetProperty {
                object,
                prop,
                old,
                new,
            } => {
                capture(graph, *object, prop, new)?;
                install(graph, *object, prop, old)
            }
            Command::MoveElement {
                array, from, to, ..
            } => reorder(graph, array, *to, *from),
        }
    }

    /// The object a change notification should point at.
    pub fn target(&self) -> ObjectId {
        match self {
            Command::Insert { object, .. }
            | Command::Remove { object, .. }
            | Command::SetProperty { object, .. }
            | Command::MoveElement { object, .. } => *object,
        }
    }
}

fn insert_subtree(
    graph: &mut ObjectGraph,
    array: &ArrayRef,
    index: usize,
    slot: &mut Option<Detached>,
) -> Result<(), DocError> {
    if !graph.contains(array.owner) {
        return Err(DocError::ObjectNotFound(array.owner));
    }
    let subtree = slot
        .take()
        .unwrap_or_else(|| panic!("empty insert slot — undo history corrupted"));
    graph.adopt(subtree, array.link(), Some(index));
    Ok(())
}

fn remove_subtree(
    graph: &mut ObjectGraph,
    object: ObjectId,
    slot: &mut Option<Detached>,
) -> Result<(), DocError> {
    let subtree = graph
        .extract(object)
        .ok_or(DocError::ObjectNotFound(object))?;
    *slot = Some(subtree);
    Ok(())
}

/// Move the current value of `prop` into `slot` (extracting an owned
/// subtree when the slot is `Child`), clearing the live entry.
fn capture(
    graph: &mut ObjectGraph,
    object: ObjectId,
    prop: &str,
    slot: &mut PropSlot,
) -> Result<(), DocError> {
    match slot {
        PropSlot::Child { object: child, stash } => {
            *stash = Some(
                graph
                    .extract(*child)
                    .ok_or(DocError::ObjectNotFound(*child))?,
            );
        }
        PropSlot::Plain(_) | PropSlot::Absent => {
            graph
                .get_mut(object)
                .ok_or(DocError::ObjectNotFound(object))?
                .props
                .remove(prop);
        }
    }
    Ok(())
}

/// Write `slot`'s value into `prop` (adopting the owned subtree when the
/// slot is `Child`).
fn install(
    graph: &mut ObjectGraph,
    object: ObjectId,
    prop: &str,
    slot: &mut PropSlot,
) -> Result<(), DocError> {
    match slot {
        PropSlot::Absent => {}
        PropSlot::Plain(value) => {
            graph
                .get_mut(object)
                .ok_or(DocError::ObjectNotFound(object))?
                .props
                .insert(prop.to_string(), value.clone());
        }
        PropSlot::Child { stash, .. } => {
            let subtree = stash
                .take()
                .unwrap_or_else(|| panic!("empty property slot — undo history corrupted"));
            graph.adopt(subtree, ParentLink::new(object, prop), None);
        }
    }
    Ok(())
}

fn reorder(
    graph: &mut ObjectGraph,
    array: &ArrayRef,
    from: usize,
    to: usize,
) -> Result<(), DocError> {
    let owner = graph
        .get_mut(array.owner)
        .ok_or(DocError::ObjectNotFound(array.owner))?;
    match owner.props.get_mut(&array.prop) {
        Some(Value::Array(ids)) if from < ids.len() && to < ids.len() => {
            let id = ids.remove(from);
            ids.insert(to, id);
            Ok(())
        }
        _ => Err(DocError::ObjectNotFound(array.owner)),
    }
}

// ─── Transactions ────────────────────────────────────────────────────────

/// An ordered group of commands with a human-readable label, undone and
/// redone atomically.
#[derive(Debug)]
pub struct Transaction {
    pub label: String,
    pub commands: SmallVec<[Command; 2]>,
}

impl Transaction {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            commands: SmallVec::new(),
        }
    }

    fn revert_all(&mut self, graph: &mut ObjectGraph) -> Result<(), DocError> {
        for command in self.commands.iter_mut().rev() {
            command.revert(graph)?;
        }
        Ok(())
    }

    fn apply_all(&mut self, graph: &mut ObjectGraph) -> Result<(), DocError> {
        for command in self.commands.iter_mut() {
            command.apply(graph)?;
        }
        Ok(())
    }
}

// ─── The stack ───────────────────────────────────────────────────────────

/// Manages undo/redo stacks with an open-frame slot and combine mode.
pub struct CommandStack {
    undo_stack: Vec<Transaction>,
    redo_stack: Vec<Transaction>,
    /// The transaction currently being built, if any.
    open: Option<OpenFrame>,
    /// While set, commands keep appending to the open frame.
    combine: bool,
    /// Maximum undo depth; the oldest entry is trimmed beyond it.
    max_depth: usize,
}

struct OpenFrame {
    txn: Transaction,
    /// Opened by an explicit `begin`; implicit frames auto-commit.
    explicit: bool,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            open: None,
            combine: false,
            max_depth,
        }
    }

    /// Open a frame. With combine mode on or a frame already open, the new
    /// label is ignored and commands keep appending — transactions do not
    /// nest.
    pub fn begin(&mut self, label: &str, explicit: bool) {
        match &mut self.open {
            Some(frame) => {
                if explicit && !self.combine {
                    log::warn!(
                        "begin_transaction(\"{label}\") while \"{}\" is open — appending",
                        frame.txn.label
                    );
                }
                if explicit {
                    frame.explicit = true;
                }
            }
            None => {
                self.open = Some(OpenFrame {
                    txn: Transaction::new(label),
                    explicit,
                });
            }
        }
    }

    /// Append a command to the open frame. Callers open one first.
    pub fn record(&mut self, command: Command) {
        match &mut self.open {
            Some(frame) => frame.txn.commands.push(command),
            None => panic!("record() without an open transaction"),
        }
    }

    /// True when an implicit frame should stay open after the current
    /// operation (combine mode, or the frame was opened explicitly).
    pub fn holds_open(&self) -> bool {
        self.combine || self.open.as_ref().is_some_and(|f| f.explicit)
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    /// Close the open frame onto the undo stack. Empty frames are
    /// discarded; a real commit clears the redo stack. Returns whether an
    /// undo entry was created.
    pub fn commit(&mut self) -> bool {
        let Some(frame) = self.open.take() else {
            log::warn!("commit_transaction() without an open transaction");
            return false;
        };
        if frame.txn.commands.is_empty() {
            return false;
        }
        log::debug!(
            "commit \"{}\" ({} commands)",
            frame.txn.label,
            frame.txn.commands.len()
        );
        self.undo_stack.push(frame.txn);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        self.redo_stack.clear();
        true
    }

    /// Discard the open frame, reverting its commands in reverse order.
    pub fn cancel(&mut self, graph: &mut ObjectGraph) {
        if let Some(mut frame) = self.open.take() {
            frame
                .txn
                .revert_all(graph)
                .unwrap_or_else(|e| panic!("cancel failed — undo history corrupted: {e}"));
        }
    }

    /// Revert the open frame's commands after a mid-transaction failure,
    /// keeping the frame open so the caller's transaction scope survives.
    pub fn rollback_open(&mut self, graph: &mut ObjectGraph) {
        if let Some(frame) = &mut self.open {
            frame
                .txn
                .revert_all(graph)
                .unwrap_or_else(|e| panic!("rollback failed — undo history corrupted: {e}"));
            frame.txn.commands.clear();
        }
    }

    pub fn set_combine(&mut self, on: bool) {
        self.combine = on;
    }

    pub fn combine(&self) -> bool {
        self.combine
    }

    /// Undo the most recent transaction. Returns its label.
    ///
    /// A `revert` failure here means the history no longer matches the
    /// graph — a programming error, and fatal for this store instance.
    pub fn undo(&mut self, graph: &mut ObjectGraph) -> Option<&Transaction> {
        if self.open.is_some() {
            log::warn!("undo() with an open transaction — ignored");
            return None;
        }
        let mut txn = self.undo_stack.pop()?;
        txn.revert_all(graph)
            .unwrap_or_else(|e| panic!("undo failed — undo history corrupted: {e}"));
        self.redo_stack.push(txn);
        self.redo_stack.last()
    }

    /// Redo the most recently undone transaction. Returns its label.
    pub fn redo(&mut self, graph: &mut ObjectGraph) -> Option<&Transaction> {
        if self.open.is_some() {
            log::warn!("redo() with an open transaction — ignored");
            return None;
        }
        let mut txn = self.redo_stack.pop()?;
        txn.apply_all(graph)
            .unwrap_or_else(|e| panic!("redo failed — undo history corrupted: {e}"));
        self.undo_stack.push(txn);
        self.undo_stack.last()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.undo_stack.last().map(|t| t.label.as_str())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.redo_stack.last().map(|t| t.label.as_str())
    }
}
