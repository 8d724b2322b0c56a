pub mod env;

pub use env::{Endpoints, ProviderConfig, DEFAULT_SCOPES};
