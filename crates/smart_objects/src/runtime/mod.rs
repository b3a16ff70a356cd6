//! # Runtime Instances
//!
//! Live state of smart objects and their slots.
//!
//! - [`RuntimeObject`] - Transform, enabled flags, tags, owner and slots of one instance
//! - [`RuntimeSlot`] - Claim state machine, tags and typed state data of one slot
//! - [`SlotView`] / [`SlotViewMut`] - Scoped accessors for slot state data
//!
//! Objects are owned by the subsystem registry; callers only see them
//! through handles or inside scoped callbacks.

mod object;
mod slot;
mod view;

pub use object::RuntimeObject;
pub use slot::{RuntimeSlot, SlotInvalidationCallback, SlotStateData};
pub use view::{SlotView, SlotViewMut};

pub(crate) use slot::ReleasedClaim;
