#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use tower::ServiceExt;

use adgenius::api;
use adgenius::engine::{LiveSettings, Orchestrator};
use adgenius::errors::ProviderError;
use adgenius::provider::Provider;
use adgenius::store::{MemoryStore, Stores};
use adgenius::wire::{GenerateOptions, Instruction, StyleGroup};

/// Backend that replays canned answers and counts how often it was asked.
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self { replies: Mutex::new(replies.into()), calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, _req: &Instruction, _opts: &GenerateOptions) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.replies.lock().pop_front().unwrap_or(Err(ProviderError::NoContent))
    }
}

pub fn valid_batch() -> String {
    let variations: Vec<_> = StyleGroup::CANONICAL
        .iter()
        .map(|s| {
            serde_json::json!({
                "id": "1",
                "style_group": s.as_str(),
                "headline": "Cold for 24 hours",
                "primary_text": "Ditch plastic bottles for good.",
                "description": "Free shipping",
                "cta": "Shop Now",
            })
        })
        .collect();
    serde_json::json!({ "variations": variations }).to_string()
}

pub fn eco_bottle() -> serde_json::Value {
    serde_json::json!({
        "product_name": "EcoBottle Pro",
        "product_description": "Reusable insulated water bottle",
        "key_benefits": ["Keeps drinks cold 24h", "", ""],
        "target_audience": {
            "age_range": "25-34",
            "interests": ["fitness"],
            "pain_points": ["plastic waste"]
        },
        "platform": "meta",
        "tone": "urgent"
    })
}

pub fn live_app(backend: Arc<ScriptedBackend>, store: Arc<MemoryStore>) -> Router {
    let orch = Orchestrator::live(backend, Stores::from_backend(store), LiveSettings::default());
    api::router(Arc::new(orch), Duration::from_secs(30))
}

pub fn demo_app() -> Router {
    api::router(Arc::new(Orchestrator::demo()), Duration::from_secs(30))
}

pub async fn post_json(app: Router, uri: &str, user: Option<&str>, body: String) -> Response<Body> {
    let mut req = Request::post(uri).header("content-type", "application/json");
    if let Some(u) = user {
        req = req.header(api::USER_HEADER, u);
    }
    app.oneshot(req.body(Body::from(body)).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str, user: Option<&str>) -> Response<Body> {
    let mut req = Request::get(uri);
    if let Some(u) = user {
        req = req.header(api::USER_HEADER, u);
    }
    app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
