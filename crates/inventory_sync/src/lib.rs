pub mod domain;
pub mod http;
pub mod inventory_sync;
pub mod nats;

pub use inventory_sync::*;
