pub mod enums;
pub mod profile;
pub mod symptom;
pub mod tip;

pub use enums::{SyncStatus, UserRole};
pub use profile::{Session, UserProfile};
pub use symptom::{NewSymptomReport, SymptomReport};
pub use tip::{Tip, TipDraft};
