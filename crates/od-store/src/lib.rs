pub mod commands;
pub mod notify;
pub mod store;

pub use commands::{ArrayRef, Command, CommandStack, PropSlot, Transaction};
pub use notify::{ChangeEvent, ObserverId};
pub use store::DocumentStore;
