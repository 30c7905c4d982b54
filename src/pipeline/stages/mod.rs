//! Built-in stages

mod guard;
mod hook;
mod logging;
mod request_id;

pub use guard::{Guard, GuardError, GuardResult, GuardStage};
pub use hook::{Flow, Hook};
pub use logging::RequestLogging;
pub use request_id::RequestIdHeader;
