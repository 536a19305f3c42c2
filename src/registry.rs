//! Registry for managing named rate limiters and configuration templates.
//!
//! A registry creates limiters on demand, caches them by name, and publishes
//! a registry event for every mutation. Configuration templates are snapshots:
//! changing a template (including `"default"`) never touches limiters that
//! were already created from it.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, OnceLock, RwLock};

use tracing::{debug, warn};

use crate::config::RateLimiterConfig;
use crate::error::RateLimitError;
use crate::events::{RateLimiterEvent, RegistryEvent};
use crate::limiter::FixedWindowLimiter;
use crate::sinks::EventSink;

/// Name of the template used when a limiter is created without a config.
pub const DEFAULT_CONFIG: &str = "default";

/// Errors from limiter registries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The named configuration template does not exist.
    #[error("no configuration template named '{name}'")]
    UnknownConfig {
        /// Template name that could not be resolved.
        name: String,
    },
}

/// Concurrent mapping from name to [`FixedWindowLimiter`], plus named
/// configuration templates.
///
/// Creation is atomic per name: concurrent first access for the same unseen
/// name observes one shared limiter, never a duplicate. Dropping a registry
/// wholesale detaches its limiters; callers holding handles keep working
/// against the detached ledgers.
#[derive(Debug)]
pub struct RateLimiterRegistry {
    limiters: RwLock<HashMap<String, Arc<FixedWindowLimiter>>>,
    configs: RwLock<HashMap<String, RateLimiterConfig>>,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl Default for RateLimiterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterRegistry {
    /// Create a registry whose `"default"` template is the built-in default
    /// config.
    pub fn new() -> Self {
        Self::with_configs(HashMap::new())
    }

    /// Create a registry seeded with named templates.
    ///
    /// A `"default"` entry is synthesized from the built-in defaults when the
    /// map does not supply one.
    pub fn with_configs(mut configs: HashMap<String, RateLimiterConfig>) -> Self {
        configs.entry(DEFAULT_CONFIG.to_string()).or_default();
        Self {
            limiters: RwLock::new(HashMap::new()),
            configs: RwLock::new(configs),
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// The process-wide default registry.
    pub fn global() -> &'static RateLimiterRegistry {
        static GLOBAL: OnceLock<RateLimiterRegistry> = OnceLock::new();
        GLOBAL.get_or_init(RateLimiterRegistry::new)
    }

    /// Get the limiter registered under `name`, creating it from the
    /// `"default"` template snapshot if absent.
    pub fn rate_limiter(&self, name: &str) -> Arc<FixedWindowLimiter> {
        let config = self.template(DEFAULT_CONFIG).unwrap_or_default();
        self.get_or_create(name, config)
    }

    /// Get the limiter registered under `name`, creating it from an inline
    /// config if absent. The config is ignored when the limiter already
    /// exists.
    pub fn rate_limiter_with_config(
        &self,
        name: &str,
        config: RateLimiterConfig,
    ) -> Arc<FixedWindowLimiter> {
        self.get_or_create(name, config)
    }

    /// Get the limiter registered under `name`, creating it from the named
    /// template if absent.
    pub fn rate_limiter_from_template(
        &self,
        name: &str,
        template: &str,
    ) -> Result<Arc<FixedWindowLimiter>, RegistryError> {
        let config = self
            .template(template)
            .ok_or_else(|| RegistryError::UnknownConfig { name: template.to_string() })?;
        Ok(self.get_or_create(name, config))
    }

    /// Insert or overwrite a named configuration template. Limiters already
    /// created from the previous value are unaffected.
    pub fn add_configuration(&self, name: impl Into<String>, config: RateLimiterConfig) {
        let name = name.into();
        let previous =
            self.configs.write().expect("config templates poisoned").insert(name.clone(), config);
        if previous.is_some() {
            debug!(target: "floodgate::registry", name = %name, "configuration template overwritten");
        }
    }

    /// Resolve a named configuration template.
    pub fn template(&self, name: &str) -> Option<RateLimiterConfig> {
        self.configs.read().expect("config templates poisoned").get(name).cloned()
    }

    /// Non-creating lookup.
    pub fn find(&self, name: &str) -> Option<Arc<FixedWindowLimiter>> {
        self.limiters.read().expect("limiter registry poisoned").get(name).cloned()
    }

    /// Remove the limiter registered under `name`, returning it.
    ///
    /// Emits a `Removed` event only when something was actually removed.
    pub fn remove(&self, name: &str) -> Option<Arc<FixedWindowLimiter>> {
        let removed = self.limiters.write().expect("limiter registry poisoned").remove(name);
        if let Some(entry) = &removed {
            self.publish(RateLimiterEvent::Registry(RegistryEvent::Removed {
                entry: entry.clone(),
            }));
        }
        removed
    }

    /// Install `limiter` under `name`, returning the previous occupant.
    ///
    /// The limiter is stored under the key regardless of the name it reports
    /// itself; lookups go by key, so a mismatched `limiter.name()` will not
    /// resolve. This is accepted behavior, not an error. Emits `Replaced`
    /// when an occupant existed and `Added` otherwise.
    pub fn replace(
        &self,
        name: &str,
        limiter: Arc<FixedWindowLimiter>,
    ) -> Option<Arc<FixedWindowLimiter>> {
        if limiter.name() != name {
            warn!(
                target: "floodgate::registry",
                key = %name,
                reported = %limiter.name(),
                "replacement limiter reports a different name; lookups use the registry key"
            );
        }
        let previous = self
            .limiters
            .write()
            .expect("limiter registry poisoned")
            .insert(name.to_string(), limiter.clone());
        let event = match &previous {
            Some(old) => RegistryEvent::Replaced { old_entry: old.clone(), new_entry: limiter },
            None => RegistryEvent::Added { entry: limiter },
        };
        self.publish(RateLimiterEvent::Registry(event));
        previous
    }

    /// Snapshot of all registered limiters.
    pub fn all_rate_limiters(&self) -> Vec<Arc<FixedWindowLimiter>> {
        self.limiters.read().expect("limiter registry poisoned").values().cloned().collect()
    }

    /// Attach a sink that receives this registry's mutation events.
    pub fn attach_sink(&self, sink: impl EventSink + 'static) {
        self.sinks.write().expect("sink list poisoned").push(Arc::new(sink));
    }

    fn get_or_create(&self, name: &str, config: RateLimiterConfig) -> Arc<FixedWindowLimiter> {
        if let Some(limiter) = self.find(name) {
            return limiter;
        }
        let mut added = None;
        let limiter = {
            let mut limiters = self.limiters.write().expect("limiter registry poisoned");
            match limiters.entry(name.to_string()) {
                Entry::Occupied(entry) => entry.get().clone(),
                Entry::Vacant(entry) => {
                    debug!(target: "floodgate::registry", name = %name, "rate limiter created");
                    let limiter = Arc::new(FixedWindowLimiter::new(name, config));
                    entry.insert(limiter.clone());
                    added = Some(RegistryEvent::Added { entry: limiter.clone() });
                    limiter
                }
            }
        };
        if let Some(event) = added {
            self.publish(RateLimiterEvent::Registry(event));
        }
        limiter
    }

    /// Offer a registry event to every attached sink, outside the map lock.
    fn publish(&self, event: RateLimiterEvent) {
        let sinks = self.sinks.read().expect("sink list poisoned");
        for sink in sinks.iter() {
            sink.offer(&event);
        }
    }
}

/// Run `operation` under the limiter registered as `name` in the global
/// registry, creating it from the `"default"` template if absent.
pub async fn execute_named<T, E, Fut, Op>(name: &str, operation: Op) -> Result<T, RateLimitError<E>>
where
    Fut: Future<Output = Result<T, E>>,
    Op: FnOnce() -> Fut,
{
    RateLimiterRegistry::global().rate_limiter(name).execute(operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> MakeWriter<'a> for SharedWriter {
        type Writer = SharedGuard;
        fn make_writer(&'a self) -> Self::Writer {
            SharedGuard(self.0.clone())
        }
    }

    struct SharedGuard(Arc<Mutex<Vec<u8>>>);
    impl std::io::Write for SharedGuard {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let mut guard = self.0.lock().unwrap();
            guard.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn replace_warns_on_mismatched_name() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = SharedWriter(buffer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_writer(BoxMakeWriter::new(writer))
            .with_target(true)
            .without_time()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let registry = RateLimiterRegistry::new();
        registry.rate_limiter("api");
        let replacement =
            Arc::new(FixedWindowLimiter::new("elsewhere", RateLimiterConfig::default()));
        registry.replace("api", replacement);

        let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(
            logs.contains("reports a different name"),
            "warning should be emitted when the replacement's name diverges from the key"
        );
    }

    #[test]
    fn creation_uses_default_template_snapshot() {
        let registry = RateLimiterRegistry::new();
        let limiter = registry.rate_limiter("api");
        assert_eq!(limiter.config().limit_for_period(), 50);

        // Changing the template afterwards is not retroactive.
        registry.add_configuration(
            DEFAULT_CONFIG,
            RateLimiterConfig::builder().limit_for_period(1).build().unwrap(),
        );
        assert_eq!(registry.rate_limiter("api").config().limit_for_period(), 50);
        assert_eq!(registry.rate_limiter("fresh").config().limit_for_period(), 1);
    }

    #[test]
    fn seeded_templates_resolve_by_name() {
        let mut configs = HashMap::new();
        configs.insert(
            "slow".to_string(),
            RateLimiterConfig::builder()
                .limit_for_period(2)
                .limit_refresh_period(Duration::from_secs(5))
                .build()
                .unwrap(),
        );
        let registry = RateLimiterRegistry::with_configs(configs);

        let limiter = registry.rate_limiter_from_template("batch", "slow").unwrap();
        assert_eq!(limiter.config().limit_for_period(), 2);
        // "default" was synthesized.
        assert!(registry.template(DEFAULT_CONFIG).is_some());
    }

    #[test]
    fn unknown_template_is_an_error() {
        let registry = RateLimiterRegistry::new();
        let err = registry.rate_limiter_from_template("x", "missing").unwrap_err();
        assert_eq!(err, RegistryError::UnknownConfig { name: "missing".to_string() });
        assert!(registry.find("x").is_none());
    }

    #[test]
    fn find_does_not_create() {
        let registry = RateLimiterRegistry::new();
        assert!(registry.find("ghost").is_none());
        registry.rate_limiter("real");
        assert!(registry.find("real").is_some());
    }

    #[test]
    fn repeated_lookup_returns_same_instance() {
        let registry = RateLimiterRegistry::new();
        let first = registry.rate_limiter("api");
        let second = registry.rate_limiter("api");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn remove_returns_the_limiter() {
        let registry = RateLimiterRegistry::new();
        let created = registry.rate_limiter("api");
        let removed = registry.remove("api").unwrap();
        assert!(Arc::ptr_eq(&created, &removed));
        assert!(registry.remove("api").is_none());
        assert!(registry.find("api").is_none());
    }

    #[test]
    fn replace_stores_under_key_even_with_mismatched_name() {
        let registry = RateLimiterRegistry::new();
        let original = registry.rate_limiter("api");
        let replacement =
            Arc::new(FixedWindowLimiter::new("elsewhere", RateLimiterConfig::default()));

        let previous = registry.replace("api", replacement.clone()).unwrap();
        assert!(Arc::ptr_eq(&previous, &original));

        // Lookups go by key, not by the limiter's own name.
        assert!(Arc::ptr_eq(&registry.find("api").unwrap(), &replacement));
        assert!(registry.find("elsewhere").is_none());
    }

    #[test]
    fn replace_without_occupant_installs() {
        let registry = RateLimiterRegistry::new();
        let limiter = Arc::new(FixedWindowLimiter::new("new", RateLimiterConfig::default()));
        assert!(registry.replace("new", limiter.clone()).is_none());
        assert!(Arc::ptr_eq(&registry.find("new").unwrap(), &limiter));
    }

    #[test]
    fn all_rate_limiters_snapshots_current_entries() {
        let registry = RateLimiterRegistry::new();
        registry.rate_limiter("a");
        registry.rate_limiter("b");
        registry.remove("a");
        let names: Vec<String> =
            registry.all_rate_limiters().iter().map(|l| l.name().to_string()).collect();
        assert_eq!(names, vec!["b".to_string()]);
    }
}
