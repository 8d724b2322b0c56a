use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::TokenStore;
use crate::auth::token::TokenRecord;
use crate::error::{StoreError, StoreResult};

/// Chave padrão, com namespace para não colidir com outras variáveis da sessão
pub const DEFAULT_SESSION_KEY: &str = "live_connect.tokens";

/// Área chave-valor da sessão do usuário.
///
/// Implementada pela camada web do chamador (cookie, Redis, etc). A vida do
/// registro é a vida da sessão.
pub trait SessionContext: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: String) -> StoreResult<()>;

    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// Sessão em memória do processo
#[derive(Debug, Default)]
pub struct MemorySession {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionContext for MemorySession {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let values = self
            .values
            .read()
            .map_err(|_| StoreError::session("lock da sessão envenenado"))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> StoreResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| StoreError::session("lock da sessão envenenado"))?;
        values.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut values = self
            .values
            .write()
            .map_err(|_| StoreError::session("lock da sessão envenenado"))?;
        values.remove(key);
        Ok(())
    }
}

/// Token store apoiado na sessão do usuário
#[derive(Clone)]
pub struct SessionStore {
    session: Arc<dyn SessionContext>,
    key: String,
}

impl SessionStore {
    pub fn new(session: Arc<dyn SessionContext>) -> Self {
        Self {
            session,
            key: DEFAULT_SESSION_KEY.to_string(),
        }
    }

    /// Sessão em memória nova, usada quando nenhum store é informado
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySession::new()))
    }

    /// Sobrescreve o nome da variável de sessão
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").field("key", &self.key).finish()
    }
}

impl TokenStore for SessionStore {
    fn get_tokens(&self) -> StoreResult<Option<TokenRecord>> {
        let Some(raw) = self.session.get(&self.key)? else {
            return Ok(None);
        };

        // Valor corrompido na sessão equivale a "sem tokens"
        Ok(serde_json::from_str(&raw).ok())
    }

    fn put_record(&self, record: &TokenRecord) -> StoreResult<()> {
        let raw = serde_json::to_string(record)?;
        self.session.set(&self.key, raw)
    }

    fn delete_tokens(&self) -> StoreResult<()> {
        self.session.remove(&self.key)
    }
}
