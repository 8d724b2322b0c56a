use thiserror::Error;

/// Falhas do meio de persistência de tokens
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Erro de IO no armazenamento de tokens: {0}")]
    Io(#[from] std::io::Error),

    #[error("Erro de serialização do registro de tokens: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Erro na sessão: {0}")]
    Session(String),
}

impl StoreError {
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }
}

/// Falhas de transporte HTTP
///
/// Separa "recebemos uma resposta de erro" de "não recebemos resposta nenhuma".
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Resposta HTTP {status} do Live Connect")]
    ErrorResponse {
        status: u16,
        /// Corpo JSON da resposta, quando parseável
        body: Option<serde_json::Value>,
    },

    #[error("Sem resposta do Live Connect: {0}")]
    NoResponse(String),

    #[error("Resposta inválida do Live Connect: {0}")]
    InvalidBody(String),
}

/// Tipos de erro específicos para autenticação OAuth2 com o Live Connect
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Autorização do usuário necessária: {url}")]
    AuthorizationRequired { url: String },

    #[error("Erro do provedor: {code} : {description}")]
    Provider { code: String, description: String },

    #[error("Resposta desconhecida do endpoint de token")]
    UnknownResponse,

    #[error("Erro de transporte: {0}")]
    Transport(#[from] TransportError),

    #[error("Erro de armazenamento: {0}")]
    Store(#[from] StoreError),

    #[error("Erro de parsing de URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Erro de variável de ambiente: {0}")]
    EnvError(String),

    #[error("Configuração inválida: {0}")]
    ConfigError(String),

    #[error("Erro de token: {0}")]
    TokenError(String),
}

impl AuthError {
    pub fn env_error(msg: impl Into<String>) -> Self {
        Self::EnvError(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn token_error(msg: impl Into<String>) -> Self {
        Self::TokenError(msg.into())
    }

    pub fn provider(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self::Provider {
            code: code.into(),
            description: description.into(),
        }
    }

    /// Indica que o chamador deve enviar o usuário para a URL de autorização
    pub fn is_authorization_required(&self) -> bool {
        matches!(self, Self::AuthorizationRequired { .. })
    }
}

/// Tipo de resultado padrão para operações de autenticação
pub type AuthResult<T> = Result<T, AuthError>;

/// Tipo de resultado para operações do token store
pub type StoreResult<T> = Result<T, StoreError>;
