use std::fs::{self, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::TokenStore;
use crate::auth::token::TokenRecord;
use crate::error::StoreResult;

/// Nome do arquivo padrão dentro do diretório temporário
pub const DEFAULT_TOKEN_FILE: &str = "live_connect_tokens.json";

/// Token store em arquivo JSON.
///
/// O caminho padrão fica no diretório temporário compartilhado; em hosts com
/// vários usuários use `with_path` para um local privado.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStore {
    pub fn new() -> Self {
        Self {
            path: std::env::temp_dir().join(DEFAULT_TOKEN_FILE),
        }
    }

    /// Sobrescreve o local do arquivo
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

/// Escreve com permissão só do dono, mesmo se o arquivo já existir com outro modo
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }

    file.write_all(bytes)?;
    file.sync_all()
}

impl TokenStore for FileStore {
    fn get_tokens(&self) -> StoreResult<Option<TokenRecord>> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Arquivo vazio, sentinela "--", bytes não UTF-8 ou JSON inválido: sem tokens
        Ok(serde_json::from_slice(&raw).ok())
    }

    fn put_record(&self, record: &TokenRecord) -> StoreResult<()> {
        let raw = serde_json::to_string(record)?;
        let tmp = self.tmp_path();

        // Grava ao lado e renomeia: o registro anterior só é substituído por um completo
        if let Err(e) = write_private(&tmp, raw.as_bytes()) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }

        Ok(())
    }

    fn delete_tokens(&self) -> StoreResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
