mod change_event;
mod error;
mod identity;
mod inventory;
mod reconciliation_service;
mod vm;

pub use change_event::*;
pub use error::*;
pub use identity::*;
pub use inventory::*;
pub use reconciliation_service::*;
pub use vm::*;
