use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};

/// Registro de tokens persistido pelo token store.
///
/// `expires_at` é sempre um timestamp Unix absoluto (segundos), calculado no
/// momento da gravação a partir do `expires_in` devolvido pelo provedor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(rename = "token_expires")]
    pub expires_at: i64,
}

impl TokenRecord {
    /// Monta o registro a partir da resposta do endpoint de token
    pub fn issued_at(response: &TokenResponse, now: i64) -> Self {
        let expires_in = i64::try_from(response.expires_in).unwrap_or(i64::MAX);

        Self {
            access_token: response.access_token.clone(),
            refresh_token: response.refresh_token.clone(),
            expires_at: now.saturating_add(expires_in),
        }
    }

    /// O token continua utilizável enquanto `now <= expires_at`
    pub fn is_valid_at(&self, now: i64) -> bool {
        now <= self.expires_at
    }

    /// Segundos restantes até a expiração (negativo se já expirou)
    pub fn seconds_until_expiry(&self, now: i64) -> i64 {
        self.expires_at.saturating_sub(now)
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at, 0).single()
    }

    /// Valor do header `Authorization` para as chamadas à API
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Resposta de sucesso do endpoint `oauth20_token.srf`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(deserialize_with = "deserialize_seconds")]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Aceita `expires_in` como número ou como string numérica
fn deserialize_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(u64),
        Text(String),
    }

    match Seconds::deserialize(deserializer)? {
        Seconds::Number(n) => Ok(n),
        Seconds::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// Erro estruturado devolvido pelo Live Connect.
///
/// O endpoint de token usa `{error, error_description}`; a API REST usa
/// `{error: {code, message}}`. Os dois formatos são reconhecidos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFault {
    pub code: String,
    pub description: String,
}

impl ProviderFault {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value.get("error")? {
            Value::String(code) => Some(Self {
                code: code.clone(),
                description: value
                    .get("error_description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            Value::Object(inner) => Some(Self {
                code: inner
                    .get("code")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string(),
                description: inner
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }),
            _ => None,
        }
    }
}

/// Resposta do endpoint de token, decodificada uma única vez
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderResponse {
    Tokens(TokenResponse),
    Error(ProviderFault),
    Malformed,
}

impl ProviderResponse {
    pub fn from_json(value: &Value) -> Self {
        if value.get("access_token").is_some() {
            return match serde_json::from_value::<TokenResponse>(value.clone()) {
                Ok(tokens) => Self::Tokens(tokens),
                Err(_) => Self::Malformed,
            };
        }

        match ProviderFault::from_json(value) {
            Some(fault) => Self::Error(fault),
            None => Self::Malformed,
        }
    }

    pub fn from_body(body: &str) -> Self {
        serde_json::from_str::<Value>(body)
            .map(|value| Self::from_json(&value))
            .unwrap_or(Self::Malformed)
    }
}

/// Fonte de tempo (segundos Unix) usada nas decisões de expiração
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Relógio controlável para testes
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: i64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn response(expires_in: u64) -> TokenResponse {
        TokenResponse {
            access_token: "EwAoAq1DBAAUGCCXc8wU".to_string(),
            refresh_token: "MCSk9n!xUW0*".to_string(),
            expires_in,
            token_type: Some("bearer".to_string()),
            scope: None,
            user_id: None,
        }
    }

    #[test]
    fn test_record_expiry_is_absolute() {
        let record = TokenRecord::issued_at(&response(3600), 1_400_000_000);

        assert_eq!(record.expires_at, 1_400_003_600);
        assert_eq!(record.access_token, "EwAoAq1DBAAUGCCXc8wU");
        assert_eq!(record.refresh_token, "MCSk9n!xUW0*");
        assert_eq!(record.seconds_until_expiry(1_400_000_600), 3000);
    }

    #[test]
    fn test_record_valid_until_expiry_inclusive() {
        let record = TokenRecord::issued_at(&response(60), 1000);

        assert!(record.is_valid_at(1000));
        assert!(record.is_valid_at(1060));
        assert!(!record.is_valid_at(1061));
    }

    #[test]
    fn test_record_serializes_with_token_expires_key() {
        let record = TokenRecord::issued_at(&response(10), 5);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value,
            json!({
                "access_token": "EwAoAq1DBAAUGCCXc8wU",
                "refresh_token": "MCSk9n!xUW0*",
                "token_expires": 15
            })
        );
    }

    #[test]
    fn test_authorization_header() {
        let record = TokenRecord::issued_at(&response(10), 0);
        assert_eq!(record.authorization_header(), "Bearer EwAoAq1DBAAUGCCXc8wU");
    }

    #[test]
    fn test_expires_in_accepts_string() {
        let parsed: TokenResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": "3600"
        }))
        .unwrap();

        assert_eq!(parsed.expires_in, 3600);
    }

    #[test]
    fn test_provider_response_success() {
        let value = json!({
            "token_type": "bearer",
            "expires_in": 3600,
            "scope": "wl.offline_access wl.signin wl.basic",
            "access_token": "EwAoAq1DBAAUGCCXc8wU",
            "refresh_token": "MCSk9n!xUW0*",
            "user_id": "b7bd8a0b0d8f5ab3"
        });

        match ProviderResponse::from_json(&value) {
            ProviderResponse::Tokens(tokens) => {
                assert_eq!(tokens.expires_in, 3600);
                assert_eq!(tokens.user_id.as_deref(), Some("b7bd8a0b0d8f5ab3"));
            }
            other => panic!("esperava tokens, veio {:?}", other),
        }
    }

    #[test]
    fn test_provider_response_oauth_error() {
        let response = ProviderResponse::from_body(
            r#"{"error":"invalid_grant","error_description":"The provided value for the 'code' parameter is not valid."}"#,
        );

        assert_eq!(
            response,
            ProviderResponse::Error(ProviderFault {
                code: "invalid_grant".to_string(),
                description: "The provided value for the 'code' parameter is not valid.".to_string(),
            })
        );
    }

    #[test]
    fn test_provider_fault_rest_shape() {
        let fault = ProviderFault::from_json(&json!({
            "error": { "code": "request_token_expired", "message": "The provided access token has expired." }
        }))
        .unwrap();

        assert_eq!(fault.code, "request_token_expired");
        assert_eq!(fault.description, "The provided access token has expired.");
    }

    #[test]
    fn test_provider_response_malformed() {
        assert_eq!(ProviderResponse::from_body("<html>oops</html>"), ProviderResponse::Malformed);
        assert_eq!(ProviderResponse::from_body(r#"{"foo":1}"#), ProviderResponse::Malformed);
        // access_token presente mas sem refresh_token não forma um registro completo
        assert_eq!(
            ProviderResponse::from_body(r#"{"access_token":"a","expires_in":10}"#),
            ProviderResponse::Malformed
        );
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock::new(100);
        clock.advance(5);
        assert_eq!(clock.now(), 105);
        clock.set(7);
        assert_eq!(clock.now(), 7);
    }

    proptest! {
        #[test]
        fn prop_validity_boundary(now in 0i64..4_000_000_000, expires_in in 0u64..1_000_000, offset in -2_000_000i64..2_000_000) {
            let record = TokenRecord::issued_at(&response(expires_in), now);
            let probe = now + offset;
            prop_assert_eq!(record.is_valid_at(probe), probe <= now + expires_in as i64);
        }
    }
}
