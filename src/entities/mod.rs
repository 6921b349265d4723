//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod attendance;
pub mod class;
pub mod sync_outbox;
pub mod system_state;
pub mod term;

// Re-export specific types to avoid conflicts
pub use attendance::{
    Column as AttendanceColumn, Entity as Attendance, Model as AttendanceModel, Session,
};
pub use class::{Column as ClassColumn, Entity as Class, Model as ClassModel};
pub use sync_outbox::{Column as SyncOutboxColumn, Entity as SyncOutbox, Model as SyncOutboxModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use term::{Column as TermColumn, Entity as Term, Model as TermModel};
