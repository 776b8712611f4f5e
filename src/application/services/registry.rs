use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::application::retry::classify_provider_error;
use crate::domain::{
    ports::LlmProvider, CapabilitySet, DispatchError, DomainError, ErrorClass, GenerateOptions,
    HealthState, ProviderAttempt, ProviderDescriptor, ProviderError,
};

/// Thresholds and timings governing provider health.
#[derive(Debug, Clone)]
pub struct RegistryPolicy {
    pub max_attempts: usize,
    /// Consecutive failures that turn a healthy provider degraded.
    pub degraded_after: u32,
    /// Further consecutive failures that turn a degraded provider unavailable.
    pub unavailable_after: u32,
    pub cooldown_base: Duration,
    pub cooldown_max: Duration,
    pub call_timeout: Duration,
}

impl Default for RegistryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            degraded_after: 2,
            unavailable_after: 2,
            cooldown_base: Duration::from_secs(1),
            cooldown_max: Duration::from_secs(60),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RegistryPolicy {
    /// `base * 2^(n-1)`, capped, for the n-th consecutive entry into
    /// `Unavailable`.
    pub fn cooldown(&self, n: u32) -> Duration {
        let exponent = n.saturating_sub(1).min(31);
        self.cooldown_base
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.cooldown_max)
            .min(self.cooldown_max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(ErrorClass),
}

#[derive(Debug)]
pub struct Dispatched {
    pub provider: String,
    pub text: String,
    /// Failed attempts that preceded the successful one.
    pub attempts: Vec<ProviderAttempt>,
}

struct ProviderEntry {
    provider: Arc<dyn LlmProvider>,
    descriptor: ProviderDescriptor,
    consecutive_failures: u32,
    unavailable_streak: u32,
    unavailable_until: Option<Instant>,
    last_used: u64,
}

impl ProviderEntry {
    fn is_eligible(&self, now: Instant) -> bool {
        match self.descriptor.health {
            HealthState::Unavailable => self.unavailable_until.map_or(true, |until| until <= now),
            _ => true,
        }
    }
}

#[derive(Default)]
struct RegistryState {
    entries: Vec<ProviderEntry>,
    clock: u64,
}

/// Owns provider health and picks who serves each request.
pub struct ProviderRegistry {
    policy: RegistryPolicy,
    state: Mutex<RegistryState>,
}

impl ProviderRegistry {
    pub fn new(policy: RegistryPolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn policy(&self) -> &RegistryPolicy {
        &self.policy
    }

    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>, DomainError> {
        self.state
            .lock()
            .map_err(|e| DomainError::internal(e.to_string()))
    }

    pub fn register(&self, provider: Arc<dyn LlmProvider>, priority: i32) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        let name = provider.name().to_string();
        if state.entries.iter().any(|e| e.descriptor.name == name) {
            return Err(DomainError::conflict(format!("provider {name} already registered")));
        }

        let descriptor = ProviderDescriptor {
            name,
            capabilities: provider.capabilities(),
            priority,
            health: HealthState::Healthy,
        };
        debug!(provider = %descriptor.name, priority, "Registered provider");
        state.entries.push(ProviderEntry {
            provider,
            descriptor,
            consecutive_failures: 0,
            unavailable_streak: 0,
            unavailable_until: None,
            last_used: 0,
        });
        Ok(())
    }

    /// Snapshots of every registered provider in registration order.
    pub fn descriptors(&self) -> Vec<ProviderDescriptor> {
        self.lock()
            .map(|s| s.entries.iter().map(|e| e.descriptor.clone()).collect())
            .unwrap_or_default()
    }

    pub fn descriptor(&self, name: &str) -> Option<ProviderDescriptor> {
        self.lock().ok().and_then(|s| {
            s.entries
                .iter()
                .find(|e| e.descriptor.name == name)
                .map(|e| e.descriptor.clone())
        })
    }

    pub fn consecutive_failures(&self, name: &str) -> Option<u32> {
        self.lock().ok().and_then(|s| {
            s.entries
                .iter()
                .find(|e| e.descriptor.name == name)
                .map(|e| e.consecutive_failures)
        })
    }

    pub fn select(&self, required: &CapabilitySet) -> Result<ProviderDescriptor, DispatchError> {
        self.select_excluding(required, &HashSet::new())
    }

    fn select_excluding(
        &self,
        required: &CapabilitySet,
        excluded: &HashSet<String>,
    ) -> Result<ProviderDescriptor, DispatchError> {
        let mut state = self.lock().map_err(|e| DispatchError::NoProviderAvailable {
            required: required.clone(),
            hint: e.to_string(),
        })?;
        let now = Instant::now();

        let chosen = state
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.descriptor.supports(required))
            .filter(|(_, e)| !excluded.contains(&e.descriptor.name))
            .filter(|(_, e)| e.is_eligible(now))
            .min_by_key(|(_, e)| (e.descriptor.priority, e.last_used))
            .map(|(i, _)| i);

        let Some(index) = chosen else {
            return Err(DispatchError::NoProviderAvailable {
                required: required.clone(),
                hint: Self::hint(&state, required, now),
            });
        };

        state.clock += 1;
        let clock = state.clock;
        let entry = &mut state.entries[index];
        entry.last_used = clock;
        Ok(entry.descriptor.clone())
    }

    fn hint(state: &RegistryState, required: &CapabilitySet, now: Instant) -> String {
        let capable: Vec<&ProviderEntry> = state
            .entries
            .iter()
            .filter(|e| e.descriptor.supports(required))
            .collect();

        if capable.is_empty() {
            return "no registered provider declares these capabilities; add one to the providers configuration".into();
        }

        let soonest = capable
            .iter()
            .filter_map(|e| e.unavailable_until)
            .filter(|until| *until > now)
            .min();
        match soonest {
            Some(until) => format!(
                "every capable provider is cooling down; retry in {}ms",
                (until - now).as_millis()
            ),
            None => "every capable provider was already tried for this request".into(),
        }
    }

    /// One call to `name` under the per-call timeout. The outcome is recorded.
    #[instrument(skip(self, prompt, options), fields(prompt_chars = prompt.len()))]
    pub async fn dispatch(
        &self,
        name: &str,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ProviderError> {
        let provider = {
            let state = self
                .lock()
                .map_err(|e| ProviderError::InvalidRequest(e.to_string()))?;
            state
                .entries
                .iter()
                .find(|e| e.descriptor.name == name)
                .map(|e| Arc::clone(&e.provider))
        };
        let Some(provider) = provider else {
            return Err(ProviderError::InvalidRequest(format!(
                "provider {name} is not registered"
            )));
        };

        let timeout = self.policy.call_timeout;
        let result = match tokio::time::timeout(timeout, provider.generate(prompt, options)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };

        let outcome = match &result {
            Ok(_) => Outcome::Success,
            Err(e) => Outcome::Failure(classify_provider_error(e)),
        };
        if let Err(e) = self.record_outcome(name, outcome) {
            warn!(provider = name, error = %e, "Failed to record provider outcome");
        }

        result
    }

    pub fn record_outcome(&self, name: &str, outcome: Outcome) -> Result<(), DomainError> {
        let mut state = self.lock()?;
        let entry = state
            .entries
            .iter_mut()
            .find(|e| e.descriptor.name == name)
            .ok_or_else(|| DomainError::not_found(format!("provider {name}")))?;

        let before = entry.descriptor.health;
        match outcome {
            Outcome::Success => {
                entry.descriptor.health = HealthState::Healthy;
                entry.consecutive_failures = 0;
                entry.unavailable_streak = 0;
                entry.unavailable_until = None;
            }
            Outcome::Failure(ErrorClass::Fatal) => {
                entry.consecutive_failures += 1;
                self.enter_unavailable(entry);
            }
            Outcome::Failure(ErrorClass::Retryable) => {
                entry.consecutive_failures += 1;
                let failures = entry.consecutive_failures;
                let policy = &self.policy;
                let health = entry.descriptor.health;
                match health {
                    HealthState::Healthy if failures >= policy.degraded_after => {
                        entry.descriptor.health = HealthState::Degraded;
                    }
                    HealthState::Degraded
                        if failures >= policy.degraded_after + policy.unavailable_after =>
                    {
                        self.enter_unavailable(entry);
                    }
                    HealthState::Unavailable => self.enter_unavailable(entry),
                    _ => {}
                }
            }
        }

        let after = entry.descriptor.health;
        if before != after {
            warn!(
                provider = name,
                from = ?before,
                to = ?after,
                failures = entry.consecutive_failures,
                "Provider health changed"
            );
        }
        Ok(())
    }

    fn enter_unavailable(&self, entry: &mut ProviderEntry) {
        entry.unavailable_streak += 1;
        let cooldown = self.policy.cooldown(entry.unavailable_streak);
        entry.descriptor.health = HealthState::Unavailable;
        entry.unavailable_until = Some(Instant::now() + cooldown);
        debug!(
            provider = %entry.descriptor.name,
            cooldown_ms = cooldown.as_millis(),
            streak = entry.unavailable_streak,
            "Provider cooling down"
        );
    }

    /// Tries eligible providers in priority order until one succeeds or
    /// `max_attempts` providers have failed.
    #[instrument(skip(self, prompt, options))]
    pub async fn dispatch_with_fallback(
        &self,
        required: &CapabilitySet,
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<Dispatched, DispatchError> {
        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        let mut tried: HashSet<String> = HashSet::new();

        while attempts.len() < self.policy.max_attempts {
            let descriptor = match self.select_excluding(required, &tried) {
                Ok(descriptor) => descriptor,
                Err(e) if attempts.is_empty() => return Err(e),
                Err(_) => break,
            };
            tried.insert(descriptor.name.clone());

            match self.dispatch(&descriptor.name, prompt, options).await {
                Ok(text) => {
                    return Ok(Dispatched {
                        provider: descriptor.name,
                        text,
                        attempts,
                    })
                }
                Err(error) => {
                    let class = classify_provider_error(&error);
                    warn!(
                        provider = %descriptor.name,
                        class = ?class,
                        error = %error,
                        "Provider failed, falling back"
                    );
                    attempts.push(ProviderAttempt {
                        provider: descriptor.name,
                        class,
                        error,
                    });
                }
            }
        }

        Err(DispatchError::AllProvidersFailed(attempts))
    }
}
