use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::auth::token::{Clock, ProviderResponse, SystemClock, TokenRecord, TokenResponse};
use crate::client::api::ResourceClient;
use crate::client::http::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::config::{Endpoints, ProviderConfig};
use crate::error::{AuthError, AuthResult, TransportError};
use crate::logging::{truncate_safe, Logger};
use crate::store::{SessionStore, TokenStore};

/// Estado observado em uma chamada de `authenticate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    NoTokens,
    TokensValid,
    TokensExpired,
    HaveCode,
    NoCode,
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthState::NoTokens => "NO_TOKENS",
            AuthState::TokensValid => "TOKENS_VALID",
            AuthState::TokensExpired => "TOKENS_EXPIRED",
            AuthState::HaveCode => "HAVE_CODE",
            AuthState::NoCode => "NO_CODE",
        };
        f.write_str(name)
    }
}

/// Resultado de uma chamada de `authenticate`.
///
/// `RedirectRequired` e `Failed` são separados; ambos significam "não
/// autenticado nesta requisição, não chame a API".
#[derive(Debug)]
pub enum AuthOutcome {
    /// Há um access token utilizável no store
    Authenticated,
    /// O chamador deve redirecionar o usuário para `url` e encerrar a requisição
    RedirectRequired { url: String },
    /// A troca de tokens ou o store falhou (já logado)
    Failed(AuthError),
}

impl AuthOutcome {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthOutcome::Authenticated)
    }

    pub fn redirect_url(&self) -> Option<&str> {
        match self {
            AuthOutcome::RedirectRequired { url } => Some(url),
            _ => None,
        }
    }
}

/// Concessão enviada ao endpoint de token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant<'a> {
    AuthorizationCode(&'a str),
    RefreshToken(&'a str),
}

impl Grant<'_> {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode(_) => "authorization_code",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }

    fn fields(&self) -> [(&'static str, String); 2] {
        match self {
            Grant::AuthorizationCode(code) => [
                ("code", code.to_string()),
                ("grant_type", self.grant_type().to_string()),
            ],
            Grant::RefreshToken(token) => [
                ("refresh_token", token.to_string()),
                ("grant_type", self.grant_type().to_string()),
            ],
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode(_) => "Novo",
            Grant::RefreshToken(_) => "Refresh",
        }
    }
}

/// Coordenador do fluxo OAuth2 (authorization code + refresh token) do Live Connect.
///
/// Cada chamada de `authenticate` reavalia o estado a partir do store; nada
/// fica em cache no processo entre chamadas.
pub struct LiveConnect {
    config: ProviderConfig,
    endpoints: Endpoints,
    store: Arc<dyn TokenStore>,
    transport: Arc<dyn HttpTransport>,
    logger: Arc<dyn Logger>,
    clock: Arc<dyn Clock>,
    refresh_lock: Option<Mutex<()>>,
}

impl LiveConnect {
    /// Cria o coordenador com store de sessão em memória e transporte `reqwest`
    pub fn new(config: ProviderConfig, logger: Arc<dyn Logger>) -> Self {
        let transport = Arc::new(ReqwestTransport::new(Arc::clone(&logger)));

        Self {
            config,
            endpoints: Endpoints::default(),
            store: Arc::new(SessionStore::in_memory()),
            transport,
            logger,
            clock: Arc::new(SystemClock),
            refresh_lock: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.store = store;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Serializa as renovações dentro deste processo.
    ///
    /// Quem espera o lock relê o store e não renova de novo se outra tarefa
    /// já gravou um token válido. Não protege contra outros processos.
    pub fn serialize_refreshes(mut self) -> Self {
        self.refresh_lock = Some(Mutex::new(()));
        self
    }

    pub fn set_scopes<I, S>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.set_scopes(scopes);
    }

    /// Escopos separados por vírgula, como no cadastro do aplicativo
    pub fn set_scopes_str(&mut self, scopes: &str) {
        self.config.set_scopes_str(scopes);
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    pub(crate) fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// URL de autorização, sem efeitos colaterais
    pub fn authorization_url(&self) -> String {
        self.config.authorization_url(&self.endpoints.authorize_url)
    }

    /// Decide entre reutilizar, renovar, redirecionar ou trocar o code.
    ///
    /// `code` vazio é tratado como ausente.
    pub async fn authenticate(&self, code: Option<&str>) -> AuthOutcome {
        let code = code.filter(|c| !c.is_empty());

        let stored = match self.store.get_tokens() {
            Ok(stored) => stored,
            Err(e) => {
                self.logger
                    .error(&format!("❌ [LiveConnect] Falha ao ler o token store: {}", e));
                return AuthOutcome::Failed(e.into());
            }
        };

        match stored {
            Some(record) => {
                let now = self.clock.now();
                self.logger.debug(&format!(
                    "🔍 [LiveConnect] Tokens recuperados do store, expiração: {}",
                    record.expires_at
                ));

                if record.is_valid_at(now) {
                    self.log_state(AuthState::TokensValid);
                    return AuthOutcome::Authenticated;
                }

                self.log_state(AuthState::TokensExpired);
                self.refresh(&record).await
            }
            None => {
                self.log_state(AuthState::NoTokens);

                match code {
                    None => {
                        self.log_state(AuthState::NoCode);
                        let url = self.authorization_url();
                        self.logger.debug(&format!(
                            "↗️ [LiveConnect] Solicitando authorization code na URL: {}",
                            url
                        ));
                        AuthOutcome::RedirectRequired { url }
                    }
                    Some(code) => {
                        self.log_state(AuthState::HaveCode);
                        self.exchange_and_store(Grant::AuthorizationCode(code)).await
                    }
                }
            }
        }
    }

    /// Renova agora, mesmo que o access token ainda seja válido
    pub async fn force_refresh(&self) -> AuthOutcome {
        match self.store.get_tokens() {
            Ok(Some(record)) => {
                self.exchange_and_store(Grant::RefreshToken(&record.refresh_token))
                    .await
            }
            Ok(None) => AuthOutcome::RedirectRequired {
                url: self.authorization_url(),
            },
            Err(e) => {
                self.logger
                    .error(&format!("❌ [LiveConnect] Falha ao ler o token store: {}", e));
                AuthOutcome::Failed(e.into())
            }
        }
    }

    async fn refresh(&self, record: &TokenRecord) -> AuthOutcome {
        let _guard: Option<MutexGuard<'_, ()>> = match &self.refresh_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        if self.refresh_lock.is_none() {
            return self
                .exchange_and_store(Grant::RefreshToken(&record.refresh_token))
                .await;
        }

        // Outra tarefa pode ter renovado enquanto esperávamos o lock
        match self.store.get_tokens() {
            Ok(Some(current)) if current.is_valid_at(self.clock.now()) => {
                self.logger
                    .debug("🔁 [LiveConnect] Token já renovado por outra tarefa");
                AuthOutcome::Authenticated
            }
            Ok(Some(current)) => {
                self.exchange_and_store(Grant::RefreshToken(&current.refresh_token))
                    .await
            }
            Ok(None) => {
                self.exchange_and_store(Grant::RefreshToken(&record.refresh_token))
                    .await
            }
            Err(e) => {
                self.logger.error(&format!(
                    "❌ [LiveConnect] Falha ao reler o token store antes da renovação: {}",
                    e
                ));
                AuthOutcome::Failed(e.into())
            }
        }
    }

    async fn exchange_and_store(&self, grant: Grant<'_>) -> AuthOutcome {
        let response = match self.exchange_tokens(grant).await {
            Ok(response) => response,
            Err(e) => return AuthOutcome::Failed(e),
        };

        match self.store.save_tokens(&response, self.clock.now()) {
            Ok(record) => {
                self.logger.debug(&format!(
                    "💾 [LiveConnect] Tokens salvos, expiração: {}",
                    record.expires_at
                ));
                AuthOutcome::Authenticated
            }
            Err(e) => {
                self.logger
                    .error(&format!("❌ [LiveConnect] Problema ao armazenar tokens: {}", e));
                AuthOutcome::Failed(e.into())
            }
        }
    }

    /// POST no endpoint de token.
    ///
    /// Falhas de transporte e erros do provedor são logados aqui e devolvidos
    /// como `Err`; nunca há nova tentativa.
    pub async fn exchange_tokens(&self, grant: Grant<'_>) -> AuthResult<TokenResponse> {
        let mut fields = vec![
            ("client_id", self.config.client_id.clone()),
            ("client_secret", self.config.client_secret.clone()),
            ("redirect_uri", self.config.redirect_url.clone()),
        ];
        fields.extend(grant.fields());

        self.logger.debug(&format!(
            "🔄 [LiveConnect] Tentando obter token ({}) do Live Connect: client_id={}, grant_type={}, chave={}...",
            grant.label(),
            self.config.client_id,
            grant.grant_type(),
            match grant {
                Grant::AuthorizationCode(key) | Grant::RefreshToken(key) => truncate_safe(key, 6),
            }
        ));

        let request = HttpRequest::post_form(self.endpoints.token_url.as_str(), fields);

        let payload = match self.transport.send(request).await {
            Ok(payload) => payload,
            // Resposta de erro com corpo JSON: decodificada como qualquer outra
            Err(TransportError::ErrorResponse {
                body: Some(body), ..
            }) => body,
            Err(e) => {
                self.logger
                    .error(&format!("❌ [LiveConnect] Erro ao conectar ao Live Connect: {}", e));
                return Err(e.into());
            }
        };

        match ProviderResponse::from_json(&payload) {
            ProviderResponse::Tokens(tokens) => {
                self.logger.debug(&format!(
                    "✅ [LiveConnect] Access token obtido: {}...",
                    truncate_safe(&tokens.access_token, 10)
                ));
                Ok(tokens)
            }
            ProviderResponse::Error(fault) => {
                self.logger.error(&format!(
                    "❌ [LiveConnect] Erro ao obter access token do Live Connect: {} : {}",
                    fault.code, fault.description
                ));
                Err(AuthError::Provider {
                    code: fault.code,
                    description: fault.description,
                })
            }
            ProviderResponse::Malformed => {
                self.logger.error(
                    "❓ [LiveConnect] Erro desconhecido ao obter access token do Live Connect, payload inválido?",
                );
                Err(AuthError::UnknownResponse)
            }
        }
    }

    /// Access token utilizável, autenticando (e renovando) antes se preciso
    pub async fn access_token(&self) -> AuthResult<String> {
        match self.authenticate(None).await {
            AuthOutcome::Authenticated => match self.store.get_tokens()? {
                Some(record) => Ok(record.access_token),
                None => Err(AuthError::token_error(
                    "registro ausente no store após autenticação",
                )),
            },
            AuthOutcome::RedirectRequired { url } => Err(AuthError::AuthorizationRequired { url }),
            AuthOutcome::Failed(e) => Err(e),
        }
    }

    /// Registro atual, sem efeitos colaterais
    pub fn stored_tokens(&self) -> AuthResult<Option<TokenRecord>> {
        Ok(self.store.get_tokens()?)
    }

    /// Apaga os tokens (revogação local)
    pub fn sign_out(&self) -> AuthResult<()> {
        self.store.delete_tokens().map_err(|e| {
            self.logger
                .error(&format!("❌ [LiveConnect] Falha ao apagar tokens: {}", e));
            AuthError::from(e)
        })?;

        self.logger.info("🗑️ [LiveConnect] Tokens removidos do store");
        Ok(())
    }

    /// Cliente das APIs REST autenticadas
    pub fn resources(&self) -> ResourceClient<'_> {
        ResourceClient::new(self)
    }

    fn log_state(&self, state: AuthState) {
        self.logger
            .debug(&format!("📍 [LiveConnect] Estado: {}", state));
    }
}

impl fmt::Debug for LiveConnect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveConnect")
            .field("client_id", &self.config.client_id)
            .field("redirect_url", &self.config.redirect_url)
            .field("scopes", &self.config.scopes())
            .field("endpoints", &self.endpoints)
            .field("serialize_refreshes", &self.refresh_lock.is_some())
            .finish()
    }
}
