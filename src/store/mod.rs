//! # Token store
//!
//! Persistência de um único `TokenRecord` por instância. Três variantes:
//! - `SessionStore`: área chave-valor da sessão do usuário (padrão)
//! - `FileStore`: JSON em um caminho configurável
//! - qualquer implementação própria de `TokenStore`
//!
//! Não há lock entre requisições concorrentes: duas requisições que vejam o
//! token expirado podem renovar ao mesmo tempo e a última gravação vence.

pub mod file;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::token::{TokenRecord, TokenResponse};
use crate::error::StoreResult;

pub use file::FileStore;
pub use session::{MemorySession, SessionContext, SessionStore};

/// Contrato de persistência usado pelo coordenador OAuth
pub trait TokenStore: Send + Sync {
    /// Registro atual, ou `None` antes da primeira autenticação.
    ///
    /// Ausência não é erro; `Err` só quando o meio não pode ser lido.
    fn get_tokens(&self) -> StoreResult<Option<TokenRecord>>;

    /// Grava o registro completo, substituindo o anterior
    fn put_record(&self, record: &TokenRecord) -> StoreResult<()>;

    /// Remove o registro. Remover de um store vazio é sucesso.
    fn delete_tokens(&self) -> StoreResult<()>;

    /// Calcula o registro a partir da resposta do provedor e persiste
    fn save_tokens(&self, response: &TokenResponse, now: i64) -> StoreResult<TokenRecord> {
        let record = TokenRecord::issued_at(response, now);
        self.put_record(&record)?;
        Ok(record)
    }
}

impl<T: TokenStore + ?Sized> TokenStore for Arc<T> {
    fn get_tokens(&self) -> StoreResult<Option<TokenRecord>> {
        (**self).get_tokens()
    }

    fn put_record(&self, record: &TokenRecord) -> StoreResult<()> {
        (**self).put_record(record)
    }

    fn delete_tokens(&self) -> StoreResult<()> {
        (**self).delete_tokens()
    }
}

/// Variantes embutidas, selecionadas explicitamente
#[derive(Clone)]
pub enum StoreKind {
    /// Sessão fornecida pelo chamador, com a chave padrão
    Session(Arc<dyn SessionContext>),
    /// Arquivo JSON no caminho indicado
    File(PathBuf),
    /// Arquivo JSON no caminho padrão (diretório temporário)
    DefaultFile,
}

impl std::fmt::Debug for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Session(_) => f.write_str("Session"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::DefaultFile => f.write_str("DefaultFile"),
        }
    }
}

/// Constrói o store correspondente à variante
pub fn build_store(kind: StoreKind) -> Arc<dyn TokenStore> {
    match kind {
        StoreKind::Session(session) => Arc::new(SessionStore::new(session)),
        StoreKind::File(path) => Arc::new(FileStore::new().with_path(path)),
        StoreKind::DefaultFile => Arc::new(FileStore::new()),
    }
}
