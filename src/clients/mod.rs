pub mod collector_client;

pub use collector_client::{CollectorClient, MarkTransport};
