use api_state::ApiState;
use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use middleware_api_auth::api_auth;
use routes::{health::health, query::query, readiness::ready};

pub mod api_state;
pub mod error;
mod middleware_api_auth;
mod routes;

/// Router for the query API
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Public, unauthenticated endpoints (for k8s/systemd probes)
    let public = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Protected API endpoints (require auth)
    let protected = Router::new()
        .route("/query", post(query))
        .route_layer(from_fn_with_state(app_state.clone(), api_auth));

    public.merge(protected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use retrieval_pipeline::{
        testing::{StubAgent, StubBehavior, StubFactory},
        AgentHandle, AgentState,
    };
    use serde_json::{json, Value};
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    const TOKEN: &str = "secret123";

    struct Harness {
        app: Router,
        agent: Arc<StubAgent>,
        factory: Arc<StubFactory>,
        handle: Arc<AgentHandle>,
    }

    fn harness_with(factory: StubFactory, agent: Arc<StubAgent>) -> Harness {
        let factory = Arc::new(factory);
        let handle = Arc::new(AgentHandle::new(factory.clone()));
        let state = ApiState {
            auth_token: Arc::from(TOKEN),
            query_timeout: Duration::from_secs(5),
            agent: Arc::clone(&handle),
        };

        Harness {
            app: api_routes(&state).with_state(state),
            agent,
            factory,
            handle,
        }
    }

    fn harness(behavior: StubBehavior) -> Harness {
        let agent = Arc::new(StubAgent::new(behavior));
        harness_with(StubFactory::new(agent.clone()), agent)
    }

    fn query_request(auth: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/query")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn answers_with_the_agent_text() {
        let h = harness(StubBehavior::Answer("Ada was a mathematician.".into()));

        let (status, body) = send(
            &h.app,
            query_request(Some("Bearer secret123"), r#"{"query":"Who is Ada?"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"result": "Ada was a mathematician."}));
        assert_eq!(h.agent.calls(), 1);
    }

    #[tokio::test]
    async fn accepts_a_bare_token() {
        let h = harness(StubBehavior::Answer("ok".into()));

        let (status, _) = send(
            &h.app,
            query_request(Some("secret123"), r#"{"query":"Who is Ada?"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let h = harness(StubBehavior::Answer("unused".into()));

        let (status, body) = send(&h.app, query_request(None, r#"{"query":"Who is Ada?"}"#)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Missing authentication token");
        assert_eq!(h.agent.calls(), 0);
        assert_eq!(h.factory.builds(), 0);
    }

    #[tokio::test]
    async fn wrong_token_is_forbidden() {
        let h = harness(StubBehavior::Answer("unused".into()));

        let (status, body) = send(
            &h.app,
            query_request(Some("Bearer nope"), r#"{"query":"Who is Ada?"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "Invalid authentication token");
        assert_eq!(h.agent.calls(), 0);
    }

    #[tokio::test]
    async fn bad_bodies_are_rejected() {
        let h = harness(StubBehavior::Answer("unused".into()));

        for raw in ["{}", "", r#"{"query":""}"#, r#"{"query":7}"#] {
            let (status, body) = send(&h.app, query_request(Some("Bearer secret123"), raw)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {raw:?}");
            assert_eq!(body["error"], "Missing query parameter");
        }

        let (status, body) = send(&h.app, query_request(Some("Bearer secret123"), "{oops")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON in request body");

        assert_eq!(h.agent.calls(), 0);
    }

    #[tokio::test]
    async fn agent_failures_become_generic_500s() {
        let h = harness(StubBehavior::Fail("upstream said sk-123 is invalid".into()));

        let (status, body) = send(
            &h.app,
            query_request(Some("Bearer secret123"), r#"{"query":"Who is Ada?"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
        assert!(!body.to_string().contains("sk-123"));

        let panicking = harness(StubBehavior::Panic);
        let (status, _) = send(
            &panicking.app,
            query_request(Some("Bearer secret123"), r#"{"query":"Who is Ada?"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn failed_initialization_is_retried_on_the_next_request() {
        let agent = Arc::new(StubAgent::answering("Ada was a mathematician."));
        let h = harness_with(StubFactory::new(agent.clone()).failing_first(1), agent);

        let (status, body) = send(
            &h.app,
            query_request(Some("Bearer secret123"), r#"{"query":"Who is Ada?"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Failed to initialize agent");
        assert_eq!(h.handle.state(), AgentState::Failed);

        let (status, body) = send(
            &h.app,
            query_request(Some("Bearer secret123"), r#"{"query":"Who is Ada?"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"], "Ada was a mathematician.");
        assert_eq!(h.factory.builds(), 2);
    }

    #[tokio::test]
    async fn health_is_fixed_and_leaves_the_agent_alone() {
        let h = harness(StubBehavior::Answer("unused".into()));

        for _ in 0..3 {
            let request = Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap();
            let (status, body) = send(&h.app, request).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, json!({"status": "healthy"}));
        }

        assert_eq!(h.factory.builds(), 0);
        assert_eq!(h.handle.state(), AgentState::Uninitialized);
    }

    #[tokio::test]
    async fn readiness_tracks_the_agent_without_building_it() {
        let h = harness(StubBehavior::Answer("ok".into()));
        let ready = || Request::builder().uri("/ready").body(Body::empty()).unwrap();

        let (status, body) = send(&h.app, ready()).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["checks"]["agent"], "uninitialized");
        assert_eq!(h.factory.builds(), 0);

        h.handle.get_or_init().await.unwrap();

        let (status, body) = send(&h.app, ready()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["agent"], "ready");
    }
}
