// rules-engine/src/resolver.rs
// ============================================================================
// Module: Data Resolver
// Description: Parallel lookup coordination with per-requirement caching and
//              skip/fail failure policy.
// Purpose: Implement spec §4.5 exactly: `resolveAll(requirements, context)`
//          runs every requirement concurrently, caches by
//          (service, method, resolved-args-signature), and surfaces the
//          skip/fail taxonomy to the orchestrator.
// Dependencies: crate::interfaces::{Service, ServiceError}, futures::future::join_all
// ============================================================================

//! ## Overview
//! Each [`rules_core::LookupRequirement`] resolves its `args` against the
//! caller's [`rules_core::condition::EvalContext`], optionally consults a
//! shared cache keyed by the service/method/args signature, invokes the
//! service, and (on success, when `cache` is set) stores the result. All
//! requirements for one `resolveAll` call run concurrently via
//! `futures::future::join_all` — the teacher's own design note in the
//! original spec anticipates exactly this "task set with a futures runtime"
//! shape for an otherwise synchronous core.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use futures::future::join_all;
use serde_json::Value;
use thiserror::Error;

use rules_core::LookupRequirement;
use rules_core::OnError;
use rules_core::condition::EvalContext;

use crate::clock::SharedClock;
use crate::interfaces::Service;
use crate::interfaces::ServiceError;
use crate::interpolation::resolve_value;

/// Error produced by the Data Resolver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// A requirement with `onError: fail` did not resolve.
    #[error("requirement \"{name}\" failed to resolve: {source}")]
    RequirementFailed {
        /// The requirement's declared name.
        name: String,
        /// The underlying service error.
        source: ServiceError,
    },
}

/// One requirement's failure, recorded when its policy is `skip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementError {
    /// The requirement's declared name.
    pub name: String,
    /// The underlying service error.
    pub error: ServiceError,
}

/// The outcome of resolving every requirement for one rule.
#[derive(Debug, Clone, Default)]
pub struct ResolveOutcome {
    /// Successfully resolved lookups, keyed by requirement name.
    pub lookups: HashMap<String, Value>,
    /// Requirements that failed under an `onError: skip` policy.
    pub errors: Vec<RequirementError>,
    /// True if any requirement failed under `onError: skip` — the caller must
    /// skip this rule entirely (spec §4.5/§7).
    pub skipped: bool,
}

struct CacheEntry {
    value: Value,
    expires_at: u64,
}

/// Parallel lookup coordinator with per-requirement caching.
pub struct DataResolver {
    clock: SharedClock,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl DataResolver {
    /// Builds an empty resolver.
    #[must_use]
    pub fn new(clock: SharedClock) -> Self {
        Self { clock, cache: Mutex::new(HashMap::new()) }
    }

    /// Discards every cached result.
    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
    }

    fn cache_key(service: &str, method: &str, args: &Value) -> String {
        format!("{service}::{method}::{args}")
    }

    fn cached(&self, key: &str) -> Option<Value> {
        let now = self.clock.now_ms();
        let mut cache = self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match cache.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    fn store(&self, key: String, value: Value, ttl_ms: u64) {
        let expires_at = self.clock.now_ms().saturating_add(ttl_ms);
        self.cache.lock().unwrap_or_else(std::sync::PoisonError::into_inner).insert(key, CacheEntry { value, expires_at });
    }

    async fn resolve_one(
        &self,
        requirement: &LookupRequirement,
        services: &HashMap<String, std::sync::Arc<dyn Service>>,
        ctx: &dyn EvalContext,
    ) -> Result<Value, ServiceError> {
        let args = resolve_value(&requirement.args, ctx);
        let cache_key = requirement.cache.map(|_| Self::cache_key(&requirement.service, &requirement.method, &args));
        if let Some(key) = &cache_key {
            if let Some(hit) = self.cached(key) {
                return Ok(hit);
            }
        }

        let service = services
            .get(&requirement.service)
            .ok_or_else(|| ServiceError::ServiceNotFound(requirement.service.clone()))?;
        let result = service.call(&requirement.method, args).await?;

        if let (Some(key), Some(cache_spec)) = (cache_key, requirement.cache) {
            self.store(key, result.clone(), cache_spec.ttl_ms);
        }
        Ok(result)
    }

    /// Resolves every requirement concurrently against `ctx`.
    ///
    /// # Errors
    /// Returns [`ResolverError::RequirementFailed`] the moment any
    /// `onError: fail` requirement fails; `onError: skip` failures are
    /// instead accumulated into the returned [`ResolveOutcome`].
    pub async fn resolve_all(
        &self,
        requirements: &[LookupRequirement],
        services: &HashMap<String, std::sync::Arc<dyn Service>>,
        ctx: &dyn EvalContext,
    ) -> Result<ResolveOutcome, ResolverError> {
        let futures = requirements.iter().map(|requirement| async move {
            let result = self.resolve_one(requirement, services, ctx).await;
            (requirement, result)
        });
        let results = join_all(futures).await;

        let mut outcome = ResolveOutcome::default();
        for (requirement, result) in results {
            match result {
                Ok(value) => {
                    outcome.lookups.insert(requirement.name.clone(), value);
                }
                Err(error) => match requirement.on_error {
                    OnError::Skip => {
                        outcome.skipped = true;
                        outcome.errors.push(RequirementError { name: requirement.name.clone(), error });
                    }
                    OnError::Fail => {
                        return Err(ResolverError::RequirementFailed { name: requirement.name.clone(), source: error });
                    }
                },
            }
        }
        Ok(outcome)
    }
}

/// Convenience: converts a duration-like TTL into milliseconds. Kept here
/// because only the resolver's cache expiry needs wall-duration arithmetic.
#[must_use]
pub fn ttl_from(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use rules_core::CacheSpec;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;
    use std::sync::atomic::Ordering;

    struct CountingService {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Service for CountingService {
        async fn call(&self, method: &str, _args: Value) -> Result<Value, ServiceError> {
            if method != "lookup" {
                return Err(ServiceError::MethodNotFound { service: "counter".to_string(), method: method.to_string() });
            }
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!(n))
        }
    }

    struct FixedContext;
    impl EvalContext for FixedContext {
        fn resolve(&self, _path: &str) -> Option<Value> {
            None
        }
    }

    fn services() -> HashMap<String, Arc<dyn Service>> {
        let mut services: HashMap<String, Arc<dyn Service>> = HashMap::new();
        services.insert("counter".to_string(), Arc::new(CountingService { calls: AtomicU32::new(0) }));
        services
    }

    #[tokio::test]
    async fn unregistered_service_produces_named_error() {
        let resolver = DataResolver::new(Arc::new(ManualClock::new(0)));
        let requirement = LookupRequirement {
            name: "r1".to_string(),
            service: "missing".to_string(),
            method: "m".to_string(),
            args: json!({}),
            cache: None,
            on_error: OnError::Skip,
        };
        let outcome = resolver.resolve_all(&[requirement], &services(), &FixedContext).await.unwrap();
        assert!(outcome.skipped);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].error, ServiceError::ServiceNotFound("missing".to_string()));
    }

    #[tokio::test]
    async fn fail_policy_aborts_resolve_all() {
        let resolver = DataResolver::new(Arc::new(ManualClock::new(0)));
        let requirement = LookupRequirement {
            name: "r1".to_string(),
            service: "missing".to_string(),
            method: "m".to_string(),
            args: json!({}),
            cache: None,
            on_error: OnError::Fail,
        };
        let result = resolver.resolve_all(&[requirement], &services(), &FixedContext).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn cached_result_is_reused_within_ttl() {
        let clock = Arc::new(ManualClock::new(0));
        let resolver = DataResolver::new(Arc::clone(&clock) as SharedClock);
        let requirement = LookupRequirement {
            name: "r1".to_string(),
            service: "counter".to_string(),
            method: "lookup".to_string(),
            args: json!({}),
            cache: Some(CacheSpec { ttl_ms: 1000 }),
            on_error: OnError::Skip,
        };
        let services = services();
        let first = resolver.resolve_all(&[requirement.clone()], &services, &FixedContext).await.unwrap();
        let second = resolver.resolve_all(&[requirement], &services, &FixedContext).await.unwrap();
        assert_eq!(first.lookups["r1"], second.lookups["r1"]);
    }

    #[tokio::test]
    async fn expired_cache_entry_is_refetched() {
        let clock = Arc::new(ManualClock::new(0));
        let resolver = DataResolver::new(Arc::clone(&clock) as SharedClock);
        let requirement = LookupRequirement {
            name: "r1".to_string(),
            service: "counter".to_string(),
            method: "lookup".to_string(),
            args: json!({}),
            cache: Some(CacheSpec { ttl_ms: 100 }),
            on_error: OnError::Skip,
        };
        let services = services();
        let first = resolver.resolve_all(&[requirement.clone()], &services, &FixedContext).await.unwrap();
        clock.set(200);
        let second = resolver.resolve_all(&[requirement], &services, &FixedContext).await.unwrap();
        assert_ne!(first.lookups["r1"], second.lookups["r1"]);
    }
}
