//! # live-connect
//!
//! Cliente OAuth2 para o Live Connect: autorização por code, renovação
//! por refresh token e chamadas autenticadas às APIs de perfil e contatos.
//!
//! ```no_run
//! use std::sync::Arc;
//! use live_connect::{AuthOutcome, FileStore, LiveConnect, ProviderConfig, TracingLogger};
//!
//! # async fn run() -> live_connect::AuthResult<()> {
//! let config = ProviderConfig::from_env()?;
//! let live = LiveConnect::new(config, Arc::new(TracingLogger))
//!     .with_store(Arc::new(FileStore::new()));
//!
//! match live.authenticate(None).await {
//!     AuthOutcome::Authenticated => {
//!         let me = live.get_profile(None).await?;
//!         println!("{}", me["name"]);
//!     }
//!     AuthOutcome::RedirectRequired { url } => println!("Abra: {}", url),
//!     AuthOutcome::Failed(e) => return Err(e),
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod store;

pub use auth::{AuthOutcome, AuthState, Clock, FixedClock, Grant, LiveConnect, SystemClock, TokenRecord, TokenResponse};
pub use client::{HttpRequest, HttpTransport, ReqwestTransport, ResourceClient};
pub use config::{Endpoints, ProviderConfig};
pub use error::{AuthError, AuthResult, StoreError, StoreResult, TransportError};
pub use logging::{Logger, MemoryLogger, TracingLogger};
pub use store::{build_store, FileStore, MemorySession, SessionContext, SessionStore, StoreKind, TokenStore};
