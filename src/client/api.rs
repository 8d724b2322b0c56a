use serde_json::Value;
use url::form_urlencoded;

use crate::auth::oauth::LiveConnect;
use crate::auth::token::ProviderFault;
use crate::client::http::HttpRequest;
use crate::error::{AuthError, AuthResult, TransportError};

/// Identificador do usuário autenticado
pub const ME: &str = "me";

/// Cliente das APIs REST do Live Connect.
///
/// Toda chamada obtém antes um access token válido via `LiveConnect`,
/// renovando se preciso. Sem token, nenhuma requisição é feita.
#[derive(Debug, Clone, Copy)]
pub struct ResourceClient<'a> {
    live: &'a LiveConnect,
}

impl<'a> ResourceClient<'a> {
    pub fn new(live: &'a LiveConnect) -> Self {
        Self { live }
    }

    /// GET autenticado em `{api_base}/{path}`; os parâmetros vão na query string sem alteração
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> AuthResult<Value> {
        let token = self.live.access_token().await?;
        let url = with_query(self.live.endpoints().api_url(path), params);

        self.live
            .logger()
            .debug(&format!("🌐 [LiveConnect] Fazendo requisição: GET {}", url));

        let request = HttpRequest::get(url).with_bearer(token);

        match self.live.transport().send(request).await {
            Ok(value) => match ProviderFault::from_json(&value) {
                Some(fault) => Err(self.provider_error(fault)),
                None => Ok(value),
            },
            Err(TransportError::ErrorResponse {
                status,
                body: Some(body),
            }) => match ProviderFault::from_json(&body) {
                Some(fault) => Err(self.provider_error(fault)),
                None => Err(TransportError::ErrorResponse {
                    status,
                    body: Some(body),
                }
                .into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Perfil do usuário (`me` quando `id` é `None`)
    pub async fn get_profile(&self, id: Option<&str>) -> AuthResult<Value> {
        self.get(&user_segment(id), &[]).await
    }

    /// Contatos do usuário; `params` aceita paginação (`limit`, `offset`)
    pub async fn get_contacts(&self, id: Option<&str>, params: &[(&str, &str)]) -> AuthResult<Value> {
        let path = format!("{}/contacts", user_segment(id));
        self.get(&path, params).await
    }

    fn provider_error(&self, fault: ProviderFault) -> AuthError {
        self.live.logger().error(&format!(
            "❌ [LiveConnect] Erro da API: {} : {}",
            fault.code, fault.description
        ));
        AuthError::provider(fault.code, fault.description)
    }
}

impl LiveConnect {
    /// Atalho para `resources().get_profile(id)`
    pub async fn get_profile(&self, id: Option<&str>) -> AuthResult<Value> {
        self.resources().get_profile(id).await
    }

    /// Atalho para `resources().get_contacts(id, params)`
    pub async fn get_contacts(&self, id: Option<&str>, params: &[(&str, &str)]) -> AuthResult<Value> {
        self.resources().get_contacts(id, params).await
    }
}

/// O id vira um único segmento de caminho (`/`, `?` e `#` são escapados)
fn user_segment(id: Option<&str>) -> String {
    urlencoding::encode(id.unwrap_or(ME)).into_owned()
}

fn with_query(url: String, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return url;
    }

    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter().copied())
        .finish();
    format!("{}?{}", url, query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::oauth::tests::{harness, seed, token_payload, StubTransport, NOW};
    use crate::client::http::Method;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_with_query() {
        assert_eq!(with_query("https://x/me".to_string(), &[]), "https://x/me");
        assert_eq!(
            with_query("https://x/me/contacts".to_string(), &[("limit", "2"), ("offset", "10")]),
            "https://x/me/contacts?limit=2&offset=10"
        );
        assert_eq!(
            with_query("https://x/me".to_string(), &[("filter", "a b&c")]),
            "https://x/me?filter=a+b%26c"
        );
    }

    #[test]
    fn test_user_segment_escapes_path_characters() {
        assert_eq!(user_segment(None), "me");
        assert_eq!(user_segment(Some("b7bd8a0b")), "b7bd8a0b");
        assert_eq!(user_segment(Some("me/contacts")), "me%2Fcontacts");
        assert_eq!(user_segment(Some("a?b#c")), "a%3Fb%23c");
    }

    #[tokio::test]
    async fn test_id_cannot_reach_another_resource() {
        let h = harness(
            StubTransport::new()
                .reply(Ok(json!({"id": "x"})))
                .reply(Ok(json!({"data": []}))),
        );
        seed(&h.store, "EwAoAq", NOW + 600);

        h.live.get_profile(Some("me/contacts")).await.unwrap();
        h.live.get_contacts(Some("me?x=1#y"), &[("limit", "1")]).await.unwrap();

        let requests = h.transport.requests();
        assert_eq!(requests[0].url, "https://apis.live.net/v5.0/me%2Fcontacts");
        assert_eq!(
            requests[1].url,
            "https://apis.live.net/v5.0/me%3Fx%3D1%23y/contacts?limit=1"
        );
    }

    #[tokio::test]
    async fn test_get_profile_uses_bearer_token() {
        let h = harness(StubTransport::new().reply(Ok(json!({"id": "b7bd8a0b", "name": "Darren"}))));
        seed(&h.store, "EwAoAq", NOW + 600);

        let profile = h.live.get_profile(None).await.unwrap();

        assert_eq!(profile["name"], "Darren");
        let requests = h.transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, Method::Get);
        assert_eq!(requests[0].url, "https://apis.live.net/v5.0/me");
        assert_eq!(requests[0].bearer_token.as_deref(), Some("EwAoAq"));
    }

    #[tokio::test]
    async fn test_get_contacts_with_paging() {
        let h = harness(StubTransport::new().reply(Ok(json!({"data": []}))));
        seed(&h.store, "EwAoAq", NOW + 600);

        let contacts = h
            .live
            .resources()
            .get_contacts(Some("b7bd8a0b"), &[("limit", "2"), ("offset", "4")])
            .await
            .unwrap();

        assert_eq!(contacts, json!({"data": []}));
        assert_eq!(
            h.transport.requests()[0].url,
            "https://apis.live.net/v5.0/b7bd8a0b/contacts?limit=2&offset=4"
        );
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_before_call() {
        let h = harness(
            StubTransport::new()
                .reply(Ok(token_payload("renovado", 3600)))
                .reply(Ok(json!({"id": "me"}))),
        );
        seed(&h.store, "velho", NOW - 1);

        h.live.get_profile(None).await.unwrap();

        let requests = h.transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].form_field("grant_type"), Some("refresh_token"));
        assert_eq!(requests[1].bearer_token.as_deref(), Some("renovado"));
    }

    #[tokio::test]
    async fn test_no_token_means_no_request() {
        let h = harness(StubTransport::new());

        let error = h.live.get_contacts(None, &[]).await.unwrap_err();

        assert!(error.is_authorization_required());
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test]
    async fn test_failed_refresh_means_no_request() {
        let h = harness(StubTransport::new().reply(Ok(json!({
            "error": "invalid_grant",
            "error_description": "The refresh token has expired."
        }))));
        seed(&h.store, "velho", NOW - 1);

        let error = h.live.get_profile(None).await.unwrap_err();

        assert!(matches!(error, AuthError::Provider { .. }));
        assert_eq!(h.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_api_error_object_becomes_provider_error() {
        let h = harness(StubTransport::new().reply(Err(TransportError::ErrorResponse {
            status: 401,
            body: Some(json!({
                "error": {"code": "request_token_expired", "message": "The provided access token has expired."}
            })),
        })));
        seed(&h.store, "EwAoAq", NOW + 600);

        let error = h.live.get_profile(None).await.unwrap_err();

        match error {
            AuthError::Provider { code, description } => {
                assert_eq!(code, "request_token_expired");
                assert_eq!(description, "The provided access token has expired.");
            }
            other => panic!("esperava erro do provedor, veio {:?}", other),
        }
        assert!(h.logger.contains("request_token_expired : The provided access token has expired."));
    }

    #[tokio::test]
    async fn test_error_without_fault_stays_transport_error() {
        let h = harness(StubTransport::new().reply(Err(TransportError::ErrorResponse {
            status: 503,
            body: Some(json!({"busy": true})),
        })));
        seed(&h.store, "EwAoAq", NOW + 600);

        let error = h.live.get_profile(Some("b7bd8a0b")).await.unwrap_err();

        assert!(matches!(
            error,
            AuthError::Transport(TransportError::ErrorResponse { status: 503, .. })
        ));
    }
}
