mod records;
mod store;

pub use records::{
    AuditKind, AuditRecord, ControlRecord, NewControl, NewUser, Role, StoredIdentity, UserRecord,
    UNKNOWN_PERSON,
};
pub use store::AccessStore;
