// garagelink-api: Async Rust client for the Genie / Aladdin Connect cloud API

pub mod auth;
pub mod client;
pub mod error;
pub mod transport;

pub use auth::Credentials;
pub use client::{DEFAULT_BASE_URL, DoorAction, DoorAddress, GenieClient};
pub use error::Error;
pub use transport::{TlsMode, TransportConfig};
