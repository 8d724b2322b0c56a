use std::env;
use std::path::Path;

use url::Url;

use crate::error::{AuthError, AuthResult};

/// Escopos padrão: `wl.offline_access` é o que faz o Live Connect emitir refresh token
pub const DEFAULT_SCOPES: &[&str] = &["wl.offline_access", "wl.signin", "wl.basic"];

pub const AUTHORIZE_URL: &str = "https://login.live.com/oauth20_authorize.srf";
pub const TOKEN_URL: &str = "https://login.live.com/oauth20_token.srf";
pub const API_BASE_URL: &str = "https://apis.live.net/v5.0";

/// Endpoints fixos do Live Connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub authorize_url: String,
    pub token_url: String,
    pub api_base_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            authorize_url: AUTHORIZE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            api_base_url: API_BASE_URL.to_string(),
        }
    }
}

impl Endpoints {
    /// Todos os endpoints sob uma mesma base (servidor de testes)
    pub fn rooted_at(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            authorize_url: format!("{}/oauth20_authorize.srf", base),
            token_url: format!("{}/oauth20_token.srf", base),
            api_base_url: format!("{}/v5.0", base),
        }
    }

    pub fn with_api_base(mut self, api_base_url: impl Into<String>) -> Self {
        self.api_base_url = api_base_url.into();
        self
    }

    /// URL de um recurso da API REST
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Configuração do aplicativo registrado no Live Connect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    scopes: Vec<String>,
}

impl ProviderConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: impl Into<String>,
    ) -> Self {
        let mut config = Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url: redirect_url.into(),
            scopes: Vec::new(),
        };
        config.set_scopes(DEFAULT_SCOPES.iter().copied());
        config
    }

    /// Carrega de variáveis de ambiente (e do `.env`, se existir)
    pub fn from_env() -> AuthResult<Self> {
        // Durante testes, as variáveis são configuradas diretamente
        if cfg!(not(test)) && Path::new(".env").exists() {
            dotenvy::dotenv()
                .map_err(|e| AuthError::config_error(format!("Erro ao carregar .env: {}", e)))?;
        }

        let client_id = Self::get_env_var("LIVE_CLIENT_ID")?;
        let client_secret = Self::get_env_var("LIVE_CLIENT_SECRET")?;
        let redirect_url = Self::get_env_var("LIVE_REDIRECT_URI")?;

        let mut config = Self::new(client_id, client_secret, redirect_url);
        if let Some(scopes) = env::var("LIVE_SCOPES").ok().filter(|s| !s.trim().is_empty()) {
            config.set_scopes_str(&scopes);
        }

        config.validate()?;
        Ok(config)
    }

    fn get_env_var(key: &str) -> AuthResult<String> {
        env::var(key).map_err(|_| AuthError::env_error(format!("{} não encontrado", key)))
    }

    /// Substitui os escopos, mantendo a ordem e descartando repetidos
    pub fn set_scopes<I, S>(&mut self, scopes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes.clear();
        for scope in scopes {
            let scope = scope.into();
            let scope = scope.trim();
            if !scope.is_empty() && !self.scopes.iter().any(|s| s == scope) {
                self.scopes.push(scope.to_string());
            }
        }
    }

    /// Aceita a forma separada por vírgulas: `"wl.offline_access, wl.signin"`
    pub fn set_scopes_str(&mut self, scopes: &str) {
        self.set_scopes(scopes.split(','));
    }

    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_scopes(scopes);
        self
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Escopos no formato do wire (separados por vírgula)
    pub fn scope_string(&self) -> String {
        self.scopes.join(",")
    }

    /// URL para onde o usuário é redirecionado para obter o authorization code
    pub fn authorization_url(&self, authorize_url: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&scope={}&redirect_uri={}",
            authorize_url,
            self.client_id,
            urlencoding::encode(&self.scope_string()),
            urlencoding::encode(&self.redirect_url)
        )
    }

    /// Valida se todas as configurações obrigatórias estão presentes
    pub fn validate(&self) -> AuthResult<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthError::config_error("LIVE_CLIENT_ID é obrigatório"));
        }

        if self.client_secret.trim().is_empty() {
            return Err(AuthError::config_error("LIVE_CLIENT_SECRET é obrigatório"));
        }

        let redirect = Url::parse(&self.redirect_url)?;
        if redirect.scheme() != "http" && redirect.scheme() != "https" {
            return Err(AuthError::config_error(format!(
                "LIVE_REDIRECT_URI deve ser http(s): {}",
                self.redirect_url
            )));
        }

        if self.scopes.is_empty() {
            return Err(AuthError::config_error("ao menos um escopo é necessário"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ProviderConfig {
        ProviderConfig::new("0000000048113444", "s3cr3t", "http://live-connect.dev/callback.php")
    }

    #[test]
    fn test_default_scopes() {
        assert_eq!(config().scope_string(), "wl.offline_access,wl.signin,wl.basic");
    }

    #[test]
    fn test_set_scopes_str_trims_and_dedupes() {
        let mut config = config();
        config.set_scopes_str("wl.offline_access, wl.signin, wl.basic,, wl.signin ,office.onenote_create");

        assert_eq!(
            config.scopes(),
            &["wl.offline_access", "wl.signin", "wl.basic", "office.onenote_create"]
        );
    }

    #[test]
    fn test_authorization_url_encodes_scope_and_redirect() {
        let url = config().authorization_url(AUTHORIZE_URL);

        assert_eq!(
            url,
            "https://login.live.com/oauth20_authorize.srf?response_type=code&client_id=0000000048113444\
             &scope=wl.offline_access%2Cwl.signin%2Cwl.basic\
             &redirect_uri=http%3A%2F%2Flive-connect.dev%2Fcallback.php"
        );
    }

    #[test]
    fn test_validate_configuration() {
        assert!(config().validate().is_ok());

        let mut missing_id = config();
        missing_id.client_id = String::new();
        assert!(missing_id.validate().is_err());

        let mut missing_secret = config();
        missing_secret.client_secret = "  ".to_string();
        assert!(missing_secret.validate().is_err());

        let mut relative = config();
        relative.redirect_url = "callback.php".to_string();
        assert!(matches!(relative.validate(), Err(AuthError::UrlParseError(_))));

        let mut ftp = config();
        ftp.redirect_url = "ftp://live-connect.dev/callback".to_string();
        assert!(matches!(ftp.validate(), Err(AuthError::ConfigError(_))));

        let no_scopes = config().with_scopes(Vec::<String>::new());
        assert!(no_scopes.validate().is_err());
    }

    #[test]
    fn test_endpoints() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.api_url("me"), "https://apis.live.net/v5.0/me");
        assert_eq!(endpoints.api_url("/me/contacts"), "https://apis.live.net/v5.0/me/contacts");

        let local = Endpoints::rooted_at("http://127.0.0.1:9999/");
        assert_eq!(local.token_url, "http://127.0.0.1:9999/oauth20_token.srf");
        assert_eq!(local.api_url("me"), "http://127.0.0.1:9999/v5.0/me");

        let custom = Endpoints::default().with_api_base("https://apis.example.test/v5.0/");
        assert_eq!(custom.api_url("me"), "https://apis.example.test/v5.0/me");
    }

    #[test]
    fn test_from_env() {
        temp_env::with_vars(
            vec![
                ("LIVE_CLIENT_ID", Some("test_client_id")),
                ("LIVE_CLIENT_SECRET", Some("test_client_secret")),
                ("LIVE_REDIRECT_URI", Some("https://app.example.com/callback")),
                ("LIVE_SCOPES", Some("wl.signin, wl.basic")),
            ],
            || {
                let config = ProviderConfig::from_env().unwrap();
                assert_eq!(config.client_id, "test_client_id");
                assert_eq!(config.client_secret, "test_client_secret");
                assert_eq!(config.redirect_url, "https://app.example.com/callback");
                assert_eq!(config.scope_string(), "wl.signin,wl.basic");
            },
        );
    }

    #[test]
    fn test_from_env_default_scopes() {
        temp_env::with_vars(
            vec![
                ("LIVE_CLIENT_ID", Some("id")),
                ("LIVE_CLIENT_SECRET", Some("secret")),
                ("LIVE_REDIRECT_URI", Some("http://localhost:8080/callback")),
                ("LIVE_SCOPES", None),
            ],
            || {
                let config = ProviderConfig::from_env().unwrap();
                assert_eq!(config.scope_string(), "wl.offline_access,wl.signin,wl.basic");
            },
        );
    }

    #[test]
    fn test_from_env_missing_vars() {
        temp_env::with_vars_unset(vec!["LIVE_CLIENT_ID", "LIVE_CLIENT_SECRET", "LIVE_REDIRECT_URI"], || {
            let result = ProviderConfig::from_env();
            assert!(matches!(result, Err(AuthError::EnvError(_))));
        });
    }
}
