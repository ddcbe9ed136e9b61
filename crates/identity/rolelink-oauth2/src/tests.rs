//! End-to-end tests for the linking flow against a mocked provider API.

#[cfg(test)]
mod integration_tests {
    use crate::{
        CallbackParams, InMemoryStateStore, LINKED_ROLE_SCOPES, LinkConfig, LinkError, LinkFlow,
    };
    use rolelink_core::AttributeStore;
    use rolelink_store::InMemoryAttributeStore;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ROLE_CONNECTION_PATH: &str = "/users/@me/applications/1234/role-connection";

    struct Harness {
        server: MockServer,
        flow: LinkFlow,
        store: InMemoryAttributeStore,
    }

    async fn harness() -> Harness {
        harness_with(|config| config).await
    }

    async fn harness_with(tweak: impl FnOnce(LinkConfig) -> LinkConfig) -> Harness {
        let server = MockServer::start().await;

        let config = LinkConfig::new(
            "1234",
            "mock_secret",
            "http://localhost:3000/discord-oauth-callback",
        )
        .with_api_base_url(server.uri())
        .with_platform_name("Assistant Registry");
        let config = Arc::new(tweak(config));

        let store = InMemoryAttributeStore::new();
        let flow = LinkFlow::discord(
            config,
            Arc::new(InMemoryStateStore::new()),
            Arc::new(store.clone()),
        )
        .unwrap();

        Harness {
            server,
            flow,
            store,
        }
    }

    impl Harness {
        async fn callback(&self, code: &str) -> CallbackParams {
            let request = self.flow.authorization_url(&LINKED_ROLE_SCOPES).await.unwrap();
            CallbackParams {
                code: Some(code.to_string()),
                state: Some(request.state),
                ..Default::default()
            }
        }

        async fn mock_token_ok(&self) {
            Mock::given(method("POST"))
                .and(path("/oauth2/token"))
                .and(body_string_contains("grant_type=authorization_code"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "access_token": "mock_access_token",
                    "token_type": "Bearer",
                    "expires_in": 604800,
                    "refresh_token": "mock_refresh_token",
                    "scope": "identify role_connections.write"
                })))
                .mount(&self.server)
                .await;
        }

        async fn mock_identity_ok(&self) {
            Mock::given(method("GET"))
                .and(path("/users/@me"))
                .and(header("Authorization", "Bearer mock_access_token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "id": "80351110224678912",
                    "username": "nelly",
                    "discriminator": "0",
                    "avatar": null
                })))
                .mount(&self.server)
                .await;
        }

        async fn expect_no_call(&self, http_method: &str, endpoint: &str) {
            Mock::given(method(http_method))
                .and(path(endpoint))
                .respond_with(ResponseTemplate::new(500))
                .expect(0)
                .mount(&self.server)
                .await;
        }
    }

    #[tokio::test]
    async fn test_full_link_flow() {
        let h = harness().await;
        h.flow
            .set_attribute("80351110224678912", true)
            .await
            .unwrap();
        let before = h.store.get("80351110224678912").await.unwrap();

        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .and(body_string_contains("code=good-code"))
            .and(body_string_contains("client_id=1234"))
            .and(body_string_contains("client_secret=mock_secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mock_access_token",
                "token_type": "Bearer",
                "expires_in": 604800,
                "scope": "identify role_connections.write"
            })))
            .expect(1)
            .mount(&h.server)
            .await;
        h.mock_identity_ok().await;
        Mock::given(method("PUT"))
            .and(path(ROLE_CONNECTION_PATH))
            .and(header("Authorization", "Bearer mock_access_token"))
            .and(body_json(serde_json::json!({
                "platform_name": "Assistant Registry",
                "platform_username": "nelly",
                "metadata": { "is_assistant": 1 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&h.server)
            .await;

        let params = h.callback("good-code").await;
        let outcome = h.flow.complete(params).await.unwrap();

        assert_eq!(outcome.identity.id, "80351110224678912");
        assert_eq!(outcome.identity.display_tag(), "nelly");
        assert_eq!(outcome.metadata.is_assistant, 1);
        assert_eq!(h.store.get("80351110224678912").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_unknown_user_publishes_defaults() {
        let h = harness().await;
        h.mock_token_ok().await;
        h.mock_identity_ok().await;
        Mock::given(method("PUT"))
            .and(path(ROLE_CONNECTION_PATH))
            .and(body_json(serde_json::json!({
                "platform_name": "Assistant Registry",
                "platform_username": "nelly",
                "metadata": { "is_assistant": 0 }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&h.server)
            .await;

        let params = h.callback("good-code").await;
        let outcome = h.flow.complete(params).await.unwrap();

        assert_eq!(outcome.metadata.is_assistant, 0);
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_access_denied_never_reaches_token_endpoint() {
        let h = harness().await;
        h.expect_no_call("POST", "/oauth2/token").await;

        let result = h
            .flow
            .complete(CallbackParams {
                error: Some("access_denied".to_string()),
                ..Default::default()
            })
            .await;

        assert!(matches!(result, Err(LinkError::ProviderOAuth(ref e)) if e == "access_denied"));
    }

    #[tokio::test]
    async fn test_missing_code_never_reaches_token_endpoint() {
        let h = harness().await;
        h.expect_no_call("POST", "/oauth2/token").await;

        let mut params = h.callback("unused").await;
        params.code = None;
        let result = h.flow.complete(params).await;

        assert!(matches!(result, Err(LinkError::MissingCode)));
    }

    #[tokio::test]
    async fn test_forged_and_replayed_state() {
        let h = harness().await;
        h.mock_token_ok().await;
        h.mock_identity_ok().await;
        Mock::given(method("PUT"))
            .and(path(ROLE_CONNECTION_PATH))
            .respond_with(ResponseTemplate::new(200))
            .mount(&h.server)
            .await;

        let forged = h
            .flow
            .complete(CallbackParams {
                code: Some("good-code".to_string()),
                state: Some("not-issued-by-us".to_string()),
                ..Default::default()
            })
            .await;
        assert!(matches!(forged, Err(LinkError::InvalidState)));

        let params = h.callback("good-code").await;
        h.flow.complete(params.clone()).await.unwrap();
        let replay = h.flow.complete(params).await;
        assert!(matches!(replay, Err(LinkError::InvalidState)));
    }

    #[tokio::test]
    async fn test_rejected_code_is_invalid_grant() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "Invalid \"code\" in request."
            })))
            .expect(1)
            .mount(&h.server)
            .await;
        h.expect_no_call("GET", "/users/@me").await;
        h.expect_no_call("PUT", ROLE_CONNECTION_PATH).await;

        let params = h.callback("used-code").await;
        let result = h.flow.complete(params).await;

        match result {
            Err(LinkError::InvalidGrant(detail)) => assert!(detail.contains("invalid_grant")),
            other => panic!("Expected InvalidGrant, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_endpoint_outage_is_unavailable() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream overloaded"))
            .mount(&h.server)
            .await;
        h.expect_no_call("GET", "/users/@me").await;

        let params = h.callback("good-code").await;
        let result = h.flow.complete(params).await;

        assert!(matches!(result, Err(LinkError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_token_body_without_access_token_is_malformed() {
        let h = harness().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .mount(&h.server)
            .await;

        let params = h.callback("good-code").await;
        let result = h.flow.complete(params).await;

        assert!(matches!(result, Err(LinkError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_rejected_access_token_is_unauthorized() {
        let h = harness().await;
        h.mock_token_ok().await;
        Mock::given(method("GET"))
            .and(path("/users/@me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "message": "401: Unauthorized",
                "code": 0
            })))
            .mount(&h.server)
            .await;
        h.expect_no_call("PUT", ROLE_CONNECTION_PATH).await;

        let params = h.callback("good-code").await;
        let result = h.flow.complete(params).await;

        assert!(matches!(result, Err(LinkError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_publish_rejected_is_unauthorized() {
        let h = harness().await;
        h.mock_token_ok().await;
        h.mock_identity_ok().await;
        Mock::given(method("PUT"))
            .and(path(ROLE_CONNECTION_PATH))
            .respond_with(ResponseTemplate::new(403))
            .mount(&h.server)
            .await;

        let params = h.callback("good-code").await;
        let result = h.flow.complete(params).await;

        assert!(matches!(result, Err(LinkError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_slow_provider_times_out() {
        let h = harness_with(|config| config.with_http_timeout(1)).await;
        Mock::given(method("POST"))
            .and(path("/oauth2/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({
                        "access_token": "late",
                        "token_type": "Bearer",
                        "expires_in": 3600
                    }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&h.server)
            .await;

        let params = h.callback("good-code").await;
        let result = h.flow.complete(params).await;

        match result {
            Err(LinkError::ProviderUnavailable(detail)) => assert!(detail.contains("timed out")),
            other => panic!("Expected ProviderUnavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_relinking_sends_identical_payloads() {
        let h = harness().await;
        h.mock_token_ok().await;
        h.mock_identity_ok().await;
        Mock::given(method("PUT"))
            .and(path(ROLE_CONNECTION_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&h.server)
            .await;

        let first = h.flow.complete(h.callback("code-1").await).await.unwrap();
        let second = h.flow.complete(h.callback("code-2").await).await.unwrap();
        assert_eq!(first.metadata, second.metadata);

        let requests = h.server.received_requests().await.unwrap();
        let bodies: Vec<_> = requests
            .iter()
            .filter(|r| r.method.as_str() == "PUT")
            .map(|r| r.body.clone())
            .collect();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0], bodies[1]);
    }

    #[tokio::test]
    async fn test_attribute_round_trip_without_network() {
        let h = harness().await;

        assert!(h.flow.get_attribute("42").await.unwrap().is_none());
        assert!(h.flow.set_attribute("42", true).await.unwrap());
        assert!(h.flow.set_attribute("42", false).await.unwrap());

        let record = h.flow.get_attribute("42").await.unwrap().unwrap();
        assert!(!record.is_assistant);
        assert!(h.server.received_requests().await.unwrap().is_empty());
    }
}
