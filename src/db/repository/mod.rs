//! Stores for the persisted collections.
//!
//! Each collection is one JSON array under one key, always rewritten whole.
//! The three keys are independent: nothing here spans more than one write.

mod offline_queue;
mod symptom;
mod tip;
mod usage;

pub use offline_queue::*;
pub use symptom::*;
pub use tip::*;
pub use usage::*;
