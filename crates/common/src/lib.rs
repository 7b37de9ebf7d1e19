pub mod http;
pub mod nats;
pub mod telemetry;
