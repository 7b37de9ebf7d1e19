mod change_event_consumer;
mod change_event_service;

pub use change_event_consumer::*;
pub use change_event_service::*;
