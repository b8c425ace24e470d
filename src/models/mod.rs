pub mod account;
pub mod audit_event;
pub mod password_reset;

pub use account::Account;
pub use audit_event::AuditEvent;
pub use password_reset::{PasswordReset, ResetCodeState};
