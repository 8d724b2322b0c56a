//! # Live Connect OAuth2
//!
//! Fluxo authorization code + refresh token contra o Live Connect.
//!
//! ## Responsabilidades:
//! - Montar a URL de autorização
//! - Trocar o authorization code por tokens
//! - Renovar tokens expirados com o refresh token
//! - Persistir o registro de tokens no store configurado
//!
//! ## Estrutura:
//! - `oauth.rs`: Coordenador (`LiveConnect`) e máquina de estados
//! - `token.rs`: Registro de tokens, respostas do provedor e relógio

pub mod oauth;
pub mod token;

pub use oauth::{AuthOutcome, AuthState, Grant, LiveConnect};
pub use token::{Clock, FixedClock, ProviderFault, ProviderResponse, SystemClock, TokenRecord, TokenResponse};
