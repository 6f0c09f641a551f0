//! The generation flow: input check, quota gate, prompt, backend call,
//! contract validation, credit charge and persistence.
//!
//! Whether the flow talks to a real backend is decided once, when the
//! [`Orchestrator`] is built; `generate` never looks at configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::{GenError, StoreError};
use crate::log::save_failed_generation;
use crate::prompt::build_request;
use crate::provider::{make_provider, DynProvider};
use crate::rules::credit_limit;
use crate::store::{sqlite::SqliteStore, Stores};
use crate::validate::{validate, LimitPolicy};
use crate::wire::{
    BrandVoice, CreativeKind, GenerateOptions, GenerateResponse, GenerationInput, NewCreative, SubscriptionTier,
    UsageSummary, ValidatedInput,
};

pub mod demo;

/// Knobs of the live strategy that do not come from its dependencies.
#[derive(Debug, Clone, Default)]
pub struct LiveSettings {
    pub options: GenerateOptions,
    pub limit_policy: LimitPolicy,
    pub artifacts_dir: Option<PathBuf>,
}

impl LiveSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            options: cfg.generate_options(),
            limit_policy: cfg.limit_policy,
            artifacts_dir: cfg.artifacts_dir.clone(),
        }
    }
}

struct Live {
    provider: DynProvider,
    stores: Stores,
    settings: LiveSettings,
}

enum Strategy {
    Live(Box<Live>),
    Demo,
}

pub struct Orchestrator {
    strategy: Strategy,
}

impl Orchestrator {
    /// Synthetic output only; holds no backend and no store.
    pub fn demo() -> Self {
        Self { strategy: Strategy::Demo }
    }

    pub fn live(provider: DynProvider, stores: Stores, settings: LiveSettings) -> Self {
        Self { strategy: Strategy::Live(Box::new(Live { provider, stores, settings })) }
    }

    /// Pick the strategy from configuration: live needs a backend credential
    /// and a database, anything less runs the demo generator.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        if !cfg.is_live() {
            tracing::info!("No generation backend or database configured, running in demo mode");
            return Ok(Self::demo());
        }
        let Some(db) = cfg.database_path.as_deref() else {
            return Ok(Self::demo());
        };
        let provider = make_provider(cfg)?;
        let store = SqliteStore::open(db).with_context(|| format!("opening database {}", db.display()))?;
        tracing::info!(provider = provider.name(), model = %cfg.model, database = %db.display(), "Live generation enabled");
        Ok(Self::live(provider, Stores::from_backend(Arc::new(store)), LiveSettings::from_config(cfg)))
    }

    pub fn is_demo(&self) -> bool {
        matches!(self.strategy, Strategy::Demo)
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.strategy {
            Strategy::Live(live) => live.provider.name(),
            Strategy::Demo => "demo",
        }
    }

    pub async fn generate(&self, user_id: Option<&str>, input: &GenerationInput) -> Result<GenerateResponse, GenError> {
        let input = input.validated().ok_or(GenError::MissingFields)?;

        match &self.strategy {
            Strategy::Demo => {
                tracing::info!(platform = input.platform.as_str(), "Running in demo mode, returning placeholder copy");
                Ok(GenerateResponse {
                    variations: demo::demo_variations(&input),
                    credits_used: 0,
                    credits_limit: credit_limit(SubscriptionTier::Free),
                    creative_id: None,
                    demo_mode: true,
                })
            }
            Strategy::Live(live) => {
                let user_id = user_id.filter(|u| !u.trim().is_empty()).ok_or(GenError::Unauthorized)?;
                live.generate(user_id, input).await
            }
        }
    }

    pub async fn usage(&self, user_id: Option<&str>) -> Result<UsageSummary, GenError> {
        match &self.strategy {
            Strategy::Demo => Ok(UsageSummary::new(0, credit_limit(SubscriptionTier::Free))),
            Strategy::Live(live) => {
                let user_id = user_id.filter(|u| !u.trim().is_empty()).ok_or(GenError::Unauthorized)?;
                let limit = live.limit_for(user_id).await?;
                let used = live.stores.usage.current_usage(user_id).await?;
                Ok(UsageSummary::new(used, limit))
            }
        }
    }
}

impl Live {
    async fn limit_for(&self, user_id: &str) -> Result<u32, StoreError> {
        let tier = self.stores.profiles.subscription_tier(user_id).await?;
        Ok(credit_limit(tier))
    }

    async fn brand_voice(&self, user_id: &str) -> Option<BrandVoice> {
        match self.stores.brand_voices.brand_voice(user_id).await {
            Ok(voice) => voice,
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Brand voice lookup failed, continuing without it");
                None
            }
        }
    }

    async fn generate(&self, user_id: &str, input: ValidatedInput) -> Result<GenerateResponse, GenError> {
        let limit = self.limit_for(user_id).await?;
        let check = self.stores.usage.check(user_id, limit).await?;
        if !check.allowed {
            tracing::info!(user_id, used = check.used, limit, "Credit limit reached");
            return Err(GenError::QuotaExceeded { used: check.used, limit });
        }

        let brand = self.brand_voice(user_id).await;
        let request = build_request(&input, brand.as_ref());

        tracing::info!(
            user_id,
            backend = self.provider.name(),
            platform = input.platform.as_str(),
            tone = input.tone.as_str(),
            "Generating copy"
        );
        let raw = self.provider.generate(&request, &self.settings.options).await.map_err(|e| {
            tracing::error!(user_id, error = %e, "Generation backend failed");
            GenError::from(e)
        })?;

        let validated = match validate(&raw, input.platform, self.settings.limit_policy) {
            Ok(v) => v,
            Err(violation) => {
                if let Some(dir) = &self.settings.artifacts_dir {
                    let tx = Uuid::new_v4();
                    match save_failed_generation(dir, tx, &request, &raw, &violation.to_string()) {
                        Ok(saved) => tracing::info!(dir = %saved.dir.display(), "Saved rejected generation"),
                        Err(e) => tracing::warn!(error = %e, "Could not save rejected generation"),
                    }
                }
                return Err(violation.into());
            }
        };

        let credits_used = match self.stores.usage.commit_increment(user_id, 1, limit).await {
            Ok(total) => total,
            Err(StoreError::LimitReached { used, limit }) => {
                tracing::info!(user_id, used, limit, "Credit limit reached by a concurrent generation");
                return Err(GenError::QuotaExceeded { used, limit });
            }
            Err(e) => return Err(e.into()),
        };

        let record = NewCreative {
            user_id: user_id.to_string(),
            kind: CreativeKind::Copy,
            platform: input.platform,
            name: input.product_name.clone(),
            content: validated.variations.clone(),
            input_params: input.raw,
            is_favorite: false,
        };
        let creative_id = match self.stores.creatives.create_creative(record).await {
            Ok(creative) => Some(creative.id),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Failed to save creative, returning unsaved variations");
                None
            }
        };

        tracing::info!(user_id, credits_used, limit, breaches = validated.breaches.len(), "Copy generated");
        Ok(GenerateResponse {
            variations: validated.variations,
            credits_used,
            credits_limit: limit,
            creative_id,
            demo_mode: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::errors::{ContractViolation, ProviderError};
    use crate::provider::Provider;
    use crate::store::{CreativeStore, MemoryStore, UsageStore};
    use crate::wire::{Creative, Instruction, Platform, StyleGroup, Tone};

    struct Scripted {
        replies: Mutex<VecDeque<Result<String, ProviderError>>>,
        calls: AtomicUsize,
        last: Mutex<Option<Instruction>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Arc<Self> {
            Arc::new(Self { replies: Mutex::new(replies.into()), calls: AtomicUsize::new(0), last: Mutex::new(None) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn generate(&self, req: &Instruction, _opts: &GenerateOptions) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock() = Some(req.clone());
            self.replies.lock().pop_front().unwrap_or(Err(ProviderError::NoContent))
        }
    }

    struct BrokenCreatives;

    #[async_trait]
    impl CreativeStore for BrokenCreatives {
        async fn create_creative(&self, _record: NewCreative) -> Result<Creative, StoreError> {
            Err(StoreError::Other("disk full".into()))
        }
    }

    /// Usage store where another request takes the last credit between the
    /// quota check and the charge.
    struct RacedUsage(Arc<MemoryStore>);

    #[async_trait]
    impl UsageStore for RacedUsage {
        async fn current_usage(&self, user_id: &str) -> Result<u32, StoreError> {
            self.0.current_usage(user_id).await
        }

        async fn commit_increment(&self, user_id: &str, amount: u32, limit: u32) -> Result<u32, StoreError> {
            self.0.set_usage(user_id, limit);
            self.0.commit_increment(user_id, amount, limit).await
        }
    }

    fn good_reply() -> String {
        let variations: Vec<_> = StyleGroup::CANONICAL
            .iter()
            .rev()
            .map(|s| {
                serde_json::json!({
                    "id": "x",
                    "style_group": s.as_str(),
                    "headline": "Stay cold all day",
                    "primary_text": "Keeps drinks cold for 24 hours.",
                    "description": "Shop now",
                    "cta": "Buy Now",
                })
            })
            .collect();
        serde_json::json!({ "variations": variations }).to_string()
    }

    fn input() -> GenerationInput {
        GenerationInput {
            product_name: "EcoBottle Pro".into(),
            product_description: "Reusable insulated water bottle".into(),
            key_benefits: vec!["Keeps drinks cold 24h".into()],
            platform: Some(Platform::Meta),
            tone: Some(Tone::Urgent),
            ..Default::default()
        }
    }

    fn live(provider: Arc<Scripted>, store: Arc<MemoryStore>) -> Orchestrator {
        Orchestrator::live(provider, Stores::from_backend(store), LiveSettings::default())
    }

    #[tokio::test]
    async fn success_charges_one_credit_and_saves_creative() {
        let provider = Scripted::new(vec![Ok(good_reply())]);
        let store = Arc::new(MemoryStore::new());
        let orch = live(provider.clone(), store.clone());

        let resp = orch.generate(Some("u1"), &input()).await.unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(resp.credits_used, 1);
        assert_eq!(resp.credits_limit, 10);
        assert!(!resp.demo_mode);
        let styles: Vec<_> = resp.variations.iter().map(|v| v.style_group).collect();
        assert_eq!(styles, StyleGroup::CANONICAL);

        let saved = store.creatives_for("u1");
        assert_eq!(saved.len(), 1);
        assert_eq!(Some(saved[0].id), resp.creative_id);
        assert_eq!(saved[0].name, "EcoBottle Pro");
        assert!(!saved[0].is_favorite);
        assert_eq!(orch.usage(Some("u1")).await.unwrap().credits_used, 1);
    }

    #[tokio::test]
    async fn user_at_limit_never_reaches_backend() {
        let provider = Scripted::new(vec![Ok(good_reply())]);
        let store = Arc::new(MemoryStore::new());
        store.set_usage("u1", 10);
        let orch = live(provider.clone(), store.clone());

        let err = orch.generate(Some("u1"), &input()).await.unwrap_err();

        assert_matches!(err, GenError::QuotaExceeded { used: 10, limit: 10 });
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn pro_tier_has_higher_limit() {
        let provider = Scripted::new(vec![Ok(good_reply())]);
        let store = Arc::new(MemoryStore::new());
        store.set_tier("u1", SubscriptionTier::Pro);
        store.set_usage("u1", 10);
        let orch = live(provider, store);

        let resp = orch.generate(Some("u1"), &input()).await.unwrap();
        assert_eq!((resp.credits_used, resp.credits_limit), (11, 50));
    }

    #[tokio::test]
    async fn contract_violations_charge_nothing() {
        let three: Vec<_> = StyleGroup::CANONICAL[..3]
            .iter()
            .map(|s| serde_json::json!({"style_group": s.as_str(), "headline": "h", "primary_text": "p", "description": "", "cta": "c"}))
            .collect();
        let duplicated = good_reply().replace("\"curiosity\"", "\"urgency\"");
        let provider = Scripted::new(vec![
            Ok("Sure! Here are your ads".into()),
            Ok(serde_json::json!({ "variations": three }).to_string()),
            Ok(duplicated),
            Err(ProviderError::NoContent),
        ]);
        let store = Arc::new(MemoryStore::new());
        let orch = live(provider.clone(), store.clone());

        for _ in 0..4 {
            let err = orch.generate(Some("u1"), &input()).await.unwrap_err();
            assert_matches!(err, GenError::Contract(_));
        }
        assert_eq!(provider.calls(), 4);
        assert_eq!(orch.usage(Some("u1")).await.unwrap().credits_used, 0);
        assert!(store.creatives_for("u1").is_empty());
    }

    #[tokio::test]
    async fn rejected_output_is_saved_when_artifacts_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Scripted::new(vec![Ok("not json".into())]);
        let settings = LiveSettings { artifacts_dir: Some(dir.path().to_path_buf()), ..LiveSettings::default() };
        let orch = Orchestrator::live(provider, Stores::from_backend(Arc::new(MemoryStore::new())), settings);

        let err = orch.generate(Some("u1"), &input()).await.unwrap_err();
        assert_matches!(err, GenError::Contract(ContractViolation::Malformed(_)));

        let saved: Vec<_> = fs_err::read_dir(dir.path().join("failed")).unwrap().collect();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn backend_errors_map_to_taxonomy() {
        let provider = Scripted::new(vec![
            Err(ProviderError::RateLimited("429".into())),
            Err(ProviderError::Config("no key".into())),
            Err(ProviderError::Backend("500".into())),
        ]);
        let orch = live(provider, Arc::new(MemoryStore::new()));

        assert_matches!(orch.generate(Some("u1"), &input()).await, Err(GenError::RateLimited(_)));
        assert_matches!(orch.generate(Some("u1"), &input()).await, Err(GenError::BackendConfig(_)));
        assert_matches!(orch.generate(Some("u1"), &input()).await, Err(GenError::Backend(_)));
    }

    #[tokio::test]
    async fn missing_fields_and_identity_are_rejected_first() {
        let provider = Scripted::new(vec![]);
        let orch = live(provider.clone(), Arc::new(MemoryStore::new()));

        let incomplete = GenerationInput { tone: None, ..input() };
        assert_matches!(orch.generate(Some("u1"), &incomplete).await, Err(GenError::MissingFields));
        assert_matches!(orch.generate(None, &input()).await, Err(GenError::Unauthorized));
        assert_matches!(orch.generate(Some(" "), &input()).await, Err(GenError::Unauthorized));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn brand_voice_reaches_the_prompt() {
        let provider = Scripted::new(vec![Ok(good_reply())]);
        let store = Arc::new(MemoryStore::new());
        store.set_brand_voice(
            "u1",
            BrandVoice { tone_of_voice: Some("Bold and witty".into()), ..Default::default() },
        );
        let orch = live(provider.clone(), store);

        orch.generate(Some("u1"), &input()).await.unwrap();
        let sent = provider.last.lock().clone().unwrap();
        assert!(sent.user.contains("Voice: Bold and witty"));
    }

    #[tokio::test]
    async fn persistence_failure_still_returns_variations() {
        let provider = Scripted::new(vec![Ok(good_reply())]);
        let memory = Arc::new(MemoryStore::new());
        let stores = Stores { creatives: Arc::new(BrokenCreatives), ..Stores::from_backend(memory.clone()) };
        let orch = Orchestrator::live(provider, stores, LiveSettings::default());

        let resp = orch.generate(Some("u1"), &input()).await.unwrap();
        assert_eq!(resp.variations.len(), 5);
        assert_eq!(resp.creative_id, None);
        assert_eq!(resp.credits_used, 1);
    }

    #[tokio::test]
    async fn losing_the_race_for_the_last_credit_saves_nothing() {
        let provider = Scripted::new(vec![Ok(good_reply())]);
        let memory = Arc::new(MemoryStore::new());
        memory.set_usage("u1", 9);
        let stores = Stores { usage: Arc::new(RacedUsage(memory.clone())), ..Stores::from_backend(memory.clone()) };
        let orch = Orchestrator::live(provider.clone(), stores, LiveSettings::default());

        let err = orch.generate(Some("u1"), &input()).await.unwrap_err();

        assert_matches!(err, GenError::QuotaExceeded { used: 10, limit: 10 });
        assert_eq!(provider.calls(), 1);
        assert!(memory.creatives_for("u1").is_empty());
        assert_eq!(memory.current_usage("u1").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn demo_mode_is_free_and_offline() {
        let orch = Orchestrator::from_config(&Config::default()).unwrap();
        assert!(orch.is_demo());
        assert_eq!(orch.backend_name(), "demo");

        let resp = orch.generate(None, &input()).await.unwrap();
        assert_eq!(resp.credits_used, 0);
        assert_eq!(resp.credits_limit, 10);
        assert!(resp.demo_mode);
        assert_eq!(resp.variations.len(), 5);
        assert_eq!(orch.usage(None).await.unwrap(), UsageSummary::new(0, 10));
    }

    #[tokio::test]
    async fn demo_mode_still_checks_required_fields() {
        let orch = Orchestrator::demo();
        let blank = GenerationInput { product_name: "  ".into(), ..input() };
        assert_matches!(orch.generate(None, &blank).await, Err(GenError::MissingFields));
    }
}
