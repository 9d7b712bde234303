use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, TimeZone, Utc};
use interp_atlas::api::{CookieSessionResolver, HeaderSessionResolver, SessionResolver};
use interp_atlas::model::{
    NewActivation, NewDataset, NewExplanation, NewFeature, NewSample, NewUser,
};
use interp_atlas::store::traits::{
    ActivationStore, DatasetStore, ExplanationStore, FeatureStore, SampleStore, UserStore,
};
use interp_atlas::{build_app, InMemoryStore};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

// Test client wrapper driving the router in-process
struct TestClient {
    app: Router,
    user_id: Option<i64>,
    cookie: Option<String>,
}

impl TestClient {
    fn new(app: Router) -> Self {
        Self {
            app,
            user_id: None,
            cookie: None,
        }
    }

    fn as_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    fn with_cookie(mut self, cookie: &str) -> Self {
        self.cookie = Some(cookie.to_string());
        self
    }

    async fn send(&self, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(user_id) = self.user_id {
            builder = builder.header("x-user-id", user_id.to_string());
        }
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie.as_str());
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::GET, path, None).await
    }

    async fn post(&self, path: &str, json: Value) -> (StatusCode, Value) {
        self.send(Method::POST, path, Some(json)).await
    }

    async fn patch(&self, path: &str, json: Value) -> (StatusCode, Value) {
        self.send(Method::PATCH, path, Some(json)).await
    }

    async fn delete(&self, path: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, path, None).await
    }
}

fn header_app(store: &Arc<InMemoryStore>) -> Router {
    let sessions: Arc<dyn SessionResolver> = Arc::new(HeaderSessionResolver);
    build_app(Arc::clone(store), sessions, &[])
}

async fn create_researcher(store: &InMemoryStore) -> i64 {
    store
        .create_user(NewUser {
            email: "researcher@example.com".to_string(),
            name: Some("Researcher".to_string()),
            handle: Some("researcher".to_string()),
            image: None,
        })
        .await
        .unwrap()
        .id
}

struct Fixture {
    user_id: i64,
    dataset_id: i64,
    sample_ids: Vec<i64>,
    feature_id: i64,
}

/// Dataset "D" with two samples, feature F with explanations E1 (older) and E2 (newer),
/// and one activation per sample
async fn seed_fixture(store: &InMemoryStore) -> Fixture {
    let user_id = create_researcher(store).await;
    let dataset = store
        .create_dataset(NewDataset {
            name: "D".to_string(),
            description: None,
            dataset_type: None,
            link: None,
            created_by: Some(user_id),
        })
        .await
        .unwrap();

    let mut sample_ids = Vec::new();
    for (text, tokens) in [
        ("the cat sat", vec!["the", "cat", "sat"]),
        ("a dog ran", vec!["a", "dog", "ran"]),
    ] {
        let sample = store
            .create_sample(NewSample {
                dataset_id: dataset.id,
                sample_text: text.to_string(),
                tokens: tokens.into_iter().map(String::from).collect(),
            })
            .await
            .unwrap();
        sample_ids.push(sample.id);
    }

    let feature = store
        .create_feature(NewFeature::new(7, "m1", 3))
        .await
        .unwrap();

    let t1 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let t2 = t1 + Duration::days(1);
    store
        .create_explanation(NewExplanation::new(feature.id, "fires on animals").at(t1))
        .await
        .unwrap();
    store
        .create_explanation(NewExplanation::new(feature.id, "fires on pets").at(t2))
        .await
        .unwrap();

    for (sample_id, values) in sample_ids
        .iter()
        .zip([vec![0.0, 50.0, 100.0], vec![5.0, 120.0, -3.0]])
    {
        store
            .create_activation(NewActivation {
                feature_id: feature.id,
                sample_id: *sample_id,
                values,
            })
            .await
            .unwrap();
    }

    Fixture {
        user_id,
        dataset_id: dataset.id,
        sample_ids,
        feature_id: feature.id,
    }
}

#[tokio::test]
async fn test_health_check_needs_no_session() {
    let store = Arc::new(InMemoryStore::new());
    let client = TestClient::new(header_app(&store));

    let (status, body) = client.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_anonymous_requests_are_rejected_without_store_calls() {
    let store = Arc::new(InMemoryStore::new());
    let fixture = seed_fixture(&store).await;
    let calls_before = store.call_count();
    let client = TestClient::new(header_app(&store));

    let paths = [
        "/me".to_string(),
        "/datasets".to_string(),
        format!("/datasets/{}", fixture.dataset_id),
        format!("/datasets/{}/samples", fixture.dataset_id),
        format!("/samples/{}/activations", fixture.sample_ids[0]),
        "/features".to_string(),
        format!("/features/{}", fixture.feature_id),
        format!("/features/{}/activations", fixture.feature_id),
        "/users".to_string(),
        // malformed ids still hit the gate first
        "/features/not-a-number".to_string(),
    ];
    for path in &paths {
        let (status, body) = client.get(path).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "GET {}", path);
        assert!(body["error"].is_string());
    }

    let (status, _) = client
        .post("/features", json!({"feature_index": 1, "model_id": "m1", "layer": 0}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = client
        .delete(&format!("/datasets/{}", fixture.dataset_id))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert_eq!(store.call_count(), calls_before);
}

#[tokio::test]
async fn test_current_user() {
    let store = Arc::new(InMemoryStore::new());
    let user_id = create_researcher(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(user_id);

    let (status, body) = client.get("/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id);
    assert_eq!(body["email"], "researcher@example.com");
}

#[tokio::test]
async fn test_feature_create_then_find_by_id() {
    let store = Arc::new(InMemoryStore::new());
    let user_id = create_researcher(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(user_id);

    let (status, created) = client
        .post(
            "/features",
            json!({"feature_index": 7, "model_id": "m1", "layer": 3}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["created_by"], user_id);
    let id = created["id"].as_i64().unwrap();

    let (status, found) = client.get(&format!("/features/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["feature_index"], 7);
    assert_eq!(found["model_id"], "m1");
    assert_eq!(found["layer"], 3);
    assert_eq!(found["explanation"], Value::Null);

    // Same (model, layer, index) twice violates the unique key
    let (status, _) = client
        .post(
            "/features",
            json!({"feature_index": 7, "model_id": "m1", "layer": 3}),
        )
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_feature_validation_errors() {
    let store = Arc::new(InMemoryStore::new());
    let user_id = create_researcher(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(user_id);

    let (status, _) = client
        .post(
            "/features",
            json!({"feature_index": -1, "model_id": "m1", "layer": 3}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = client
        .post("/features", json!({"model_id": "m1"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_samples_for_dataset_in_insertion_order() {
    let store = Arc::new(InMemoryStore::new());
    let fixture = seed_fixture(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(fixture.user_id);

    let (status, body) = client
        .get(&format!("/datasets/{}/samples", fixture.dataset_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    let texts: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["sample_text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["the cat sat", "a dog ran"]);

    let (status, body) = client.get("/datasets/99999/samples").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_feature_view_uses_most_recent_explanation() {
    let store = Arc::new(InMemoryStore::new());
    let fixture = seed_fixture(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(fixture.user_id);

    let (status, body) = client
        .get(&format!("/features/{}", fixture.feature_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["explanation"]["description"], "fires on pets");

    let (_, listed) = client.get("/features?model_id=m1").await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["explanation"]["description"], "fires on pets");

    // A newer explanation takes over
    store
        .create_explanation(
            NewExplanation::new(fixture.feature_id, "fires on small mammals")
                .at(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
        )
        .await
        .unwrap();
    let (_, body) = client
        .get(&format!("/features/{}", fixture.feature_id))
        .await;
    assert_eq!(body["explanation"]["description"], "fires on small mammals");

    let (status, history) = client
        .get(&format!("/features/{}/explanations", fixture.feature_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    let descriptions: Vec<&str> = history["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["description"].as_str().unwrap())
        .collect();
    assert_eq!(
        descriptions,
        vec!["fires on small mammals", "fires on pets", "fires on animals"]
    );
}

#[tokio::test]
async fn test_sample_activations_are_aligned() {
    let store = Arc::new(InMemoryStore::new());
    let fixture = seed_fixture(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(fixture.user_id);

    let (status, body) = client
        .get(&format!("/samples/{}/activations", fixture.sample_ids[0]))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    let view = &body["items"][0];
    assert_eq!(view["feature_id"], fixture.feature_id);
    assert_eq!(
        view["tokens"],
        json!([
            {"token": "the", "intensity": 0.0},
            {"token": "cat", "intensity": 0.5},
            {"token": "sat", "intensity": 1.0},
        ])
    );

    // Values outside [0, 100] are clamped
    let (status, body) = client
        .get(&format!("/features/{}/activations", fixture.feature_id))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(
        body["items"][1]["tokens"],
        json!([
            {"token": "a", "intensity": 0.05},
            {"token": "dog", "intensity": 1.0},
            {"token": "ran", "intensity": 0.0},
        ])
    );

    let (status, body) = client.get("/samples/99999/activations").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_misaligned_activation_is_unprocessable() {
    let store = Arc::new(InMemoryStore::new());
    let fixture = seed_fixture(&store).await;
    let sample = store
        .create_sample(NewSample {
            dataset_id: fixture.dataset_id,
            sample_text: "one two".to_string(),
            tokens: vec!["one".to_string(), "two".to_string()],
        })
        .await
        .unwrap();
    store
        .create_activation(NewActivation {
            feature_id: fixture.feature_id,
            sample_id: sample.id,
            values: vec![1.0, 2.0, 3.0],
        })
        .await
        .unwrap();
    let client = TestClient::new(header_app(&store)).as_user(fixture.user_id);

    let (status, body) = client
        .get(&format!("/samples/{}/activations", sample.id))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("2 tokens"));
}

#[tokio::test]
async fn test_malformed_ids_are_bad_requests() {
    let store = Arc::new(InMemoryStore::new());
    let user_id = create_researcher(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(user_id);

    for path in ["/datasets/abc", "/features/-4", "/samples/1.5", "/users/0"] {
        let (status, _) = client.get(path).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "GET {}", path);
    }
}

#[tokio::test]
async fn test_missing_rows_are_not_found() {
    let store = Arc::new(InMemoryStore::new());
    let user_id = create_researcher(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(user_id);

    let (status, _) = client.get("/datasets/4242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = client.get("/features/4242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = client
        .patch("/datasets/4242", json!({"name": "renamed"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = client
        .patch("/features/4242", json!({"layer": 1}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = client.delete("/features/4242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = client.delete("/users/4242").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dataset_lifecycle() {
    let store = Arc::new(InMemoryStore::new());
    let user_id = create_researcher(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(user_id);

    let (status, created) = client
        .post(
            "/datasets",
            json!({"name": "Pile subset", "type": "text", "link": "https://example.com/pile"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["created_by"], user_id);
    assert_eq!(created["type"], "text");
    let id = created["id"].as_i64().unwrap();

    let (status, _) = client
        .patch(
            &format!("/datasets/{}", id),
            json!({"description": "first 1k documents"}),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, fetched) = client.get(&format!("/datasets/{}", id)).await;
    assert_eq!(fetched["name"], "Pile subset");
    assert_eq!(fetched["description"], "first 1k documents");

    let (_, listed) = client.get(&format!("/datasets?created_by={}", user_id)).await;
    assert_eq!(listed["total"], 1);

    let (status, deleted) = client.delete(&format!("/datasets/{}", id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["id"], id);

    let (status, _) = client.get(&format!("/datasets/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deleting_dataset_cascades_to_samples_and_activations() {
    let store = Arc::new(InMemoryStore::new());
    let fixture = seed_fixture(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(fixture.user_id);

    let (status, _) = client
        .delete(&format!("/datasets/{}", fixture.dataset_id))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = client
        .get(&format!("/samples/{}", fixture.sample_ids[0]))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = client
        .get(&format!("/features/{}/activations", fixture.feature_id))
        .await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_feature_with_explanations_cannot_be_deleted() {
    let store = Arc::new(InMemoryStore::new());
    let fixture = seed_fixture(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(fixture.user_id);

    let (status, _) = client
        .delete(&format!("/features/{}", fixture.feature_id))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = client
        .get(&format!("/features/{}", fixture.feature_id))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_user_update_and_listing() {
    let store = Arc::new(InMemoryStore::new());
    let user_id = create_researcher(&store).await;
    let client = TestClient::new(header_app(&store)).as_user(user_id);

    let (status, _) = client
        .patch(&format!("/users/{}", user_id), json!({"handle": "neuron-hunter"}))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = client.get("/users?handle=neuron-hunter").await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["id"], user_id);

    let (status, _) = client
        .patch(&format!("/users/{}", user_id), json!({"email": "not-an-email"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cookie_sessions() {
    let store = Arc::new(InMemoryStore::new());
    let user_id = create_researcher(&store).await;
    store.insert_session("live-token", user_id, Utc::now() + Duration::days(30));
    store.insert_session("stale-token", user_id, Utc::now() - Duration::days(1));

    let sessions: Arc<dyn SessionResolver> = Arc::new(CookieSessionResolver::new(
        Arc::clone(&store),
        "authjs.session-token",
    ));
    let app = build_app(Arc::clone(&store), sessions, &[]);

    let client = TestClient::new(app.clone()).with_cookie("authjs.session-token=live-token");
    let (status, body) = client.get("/me").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], user_id);

    let secure =
        TestClient::new(app.clone()).with_cookie("__Secure-authjs.session-token=live-token");
    let (status, _) = secure.get("/me").await;
    assert_eq!(status, StatusCode::OK);

    let stale = TestClient::new(app.clone()).with_cookie("authjs.session-token=stale-token");
    let (status, _) = stale.get("/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unknown = TestClient::new(app.clone()).with_cookie("authjs.session-token=forged");
    let (status, _) = unknown.get("/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Identity headers mean nothing in cookie mode
    let spoofed = TestClient::new(app).as_user(user_id);
    let (status, _) = spoofed.get("/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
