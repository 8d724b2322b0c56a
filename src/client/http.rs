//! Transporte HTTP
//!
//! Wrapper fino sobre o `reqwest`: injeta o bearer token e o User-Agent,
//! decodifica JSON e classifica as falhas em "resposta de erro" e
//! "sem resposta".

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::auth::token::ProviderFault;
use crate::error::TransportError;
use crate::logging::Logger;

/// User-Agent fixo enviado em todas as requisições
pub const USER_AGENT: &str = concat!("live-connect-rs/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

/// Requisição a ser enviada pelo transporte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub bearer_token: Option<String>,
    pub headers: Vec<(String, String)>,
    /// Corpo `application/x-www-form-urlencoded`
    pub form: Option<Vec<(String, String)>>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            bearer_token: None,
            headers: Vec::new(),
            form: None,
        }
    }

    pub fn post_form<K, V>(url: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: Method::Post,
            url: url.into(),
            bearer_token: None,
            headers: Vec::new(),
            form: Some(fields.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
        }
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Valor de um campo do formulário, se houver
    pub fn form_field(&self, name: &str) -> Option<&str> {
        self.form
            .as_ref()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Capacidade de enviar requisições e devolver JSON
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<Value, TransportError>;
}

/// Transporte padrão, baseado em `reqwest`
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    logger: Arc<dyn Logger>,
}

impl ReqwestTransport {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client, logger }
    }

    /// Usa um `reqwest::Client` já configurado pelo chamador
    pub fn with_client(client: Client, logger: Arc<dyn Logger>) -> Self {
        Self { client, logger }
    }

    fn log_error_body(&self, body: Option<&Value>) {
        match body.and_then(ProviderFault::from_json) {
            Some(fault) => self
                .logger
                .debug(&format!("📄 [LiveRequest] {} : {}", fault.code, fault.description)),
            None => self
                .logger
                .debug("❓ [LiveRequest] Erro desconhecido ao comunicar com o Live Connect"),
        }
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<Value, TransportError> {
        self.logger
            .debug(&format!("➡️ [LiveRequest] {} {}", request.method, request.url));

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };

        // Por requisição, para valer também com um client do chamador
        builder = builder.header(reqwest::header::USER_AGENT, USER_AGENT);

        if let Some(token) = &request.bearer_token {
            builder = builder.bearer_auth(token);
        }

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        if let Some(form) = &request.form {
            builder = builder.form(form);
        }

        let response = builder.send().await.map_err(|e| {
            self.logger.error(&format!(
                "❌ [LiveRequest] Erro desconhecido ao comunicar com o Live Connect: {}",
                e
            ));
            TransportError::NoResponse(e.to_string())
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            self.logger
                .error(&format!("❌ [LiveRequest] Falha ao ler resposta: {}", e));
            TransportError::NoResponse(e.to_string())
        })?;

        if !status.is_success() {
            self.logger.error(&format!(
                "❌ [LiveRequest] {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));

            let json = serde_json::from_str::<Value>(&body).ok();
            self.log_error_body(json.as_ref());

            return Err(TransportError::ErrorResponse {
                status: status.as_u16(),
                body: json,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            self.logger
                .error(&format!("❌ [LiveRequest] Resposta não é JSON: {}", e));
            TransportError::InvalidBody(e.to_string())
        })
    }
}
