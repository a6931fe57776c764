use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::core::Backend;

/// Circuit-breaker settings for skipping backends that keep failing.
#[derive(Debug, Clone, Copy)]
pub struct HealthPolicy {
    /// Consecutive retriable failures before a backend is put on cooldown.
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Default)]
struct HealthState {
    consecutive_failures: u32,
    last_failure: Option<Instant>,
}

pub struct RegistryEntry {
    backend: Arc<dyn Backend>,
    priority: i32,
    health: Mutex<HealthState>,
}

impl RegistryEntry {
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    fn health(&self) -> MutexGuard<'_, HealthState> {
        // The lock is only ever held for a field read or write, never
        // across I/O, so poisoning would mean a panic mid-assignment.
        self.health.lock().expect("backend health lock poisoned")
    }

    /// Whether the orchestrator should invoke this backend right now.
    pub fn available(&self, policy: &HealthPolicy) -> bool {
        let health = self.health();
        if health.consecutive_failures < policy.failure_threshold {
            return true;
        }
        match health.last_failure {
            Some(at) => at.elapsed() >= policy.cooldown,
            None => true,
        }
    }

    pub fn record_success(&self) {
        let mut health = self.health();
        health.consecutive_failures = 0;
        health.last_failure = None;
    }

    /// Only retriable failures count against health; a URL a backend simply
    /// does not support says nothing about whether it is up.
    pub fn record_failure(&self, retriable: bool) {
        if !retriable {
            return;
        }
        let mut health = self.health();
        health.consecutive_failures = health.consecutive_failures.saturating_add(1);
        health.last_failure = Some(Instant::now());
    }
}

/// Operator-facing view of one registry entry.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub id: String,
    pub priority: i32,
    pub healthy: bool,
}

/// Ordered, read-mostly collection of the configured backends. Built once at
/// startup; the entry list never changes afterwards, so iteration on the hot
/// path needs no locking. Health records are the only mutable state.
pub struct BackendRegistry {
    entries: Vec<RegistryEntry>,
    policy: HealthPolicy,
}

impl BackendRegistry {
    /// Sorts ascending by priority with ties broken by id, and rejects
    /// duplicate ids.
    pub fn new(
        backends: Vec<(i32, Arc<dyn Backend>)>,
        policy: HealthPolicy,
    ) -> anyhow::Result<Self> {
        let mut seen = HashSet::new();
        for (_, backend) in &backends {
            if !seen.insert(backend.id().to_string()) {
                anyhow::bail!("duplicate backend id: {}", backend.id());
            }
        }

        let mut entries: Vec<RegistryEntry> = backends
            .into_iter()
            .map(|(priority, backend)| RegistryEntry {
                backend,
                priority,
                health: Mutex::new(HealthState::default()),
            })
            .collect();
        entries.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.backend.id().cmp(b.backend.id()))
        });

        Ok(Self { entries, policy })
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<BackendStatus> {
        self.entries
            .iter()
            .map(|entry| BackendStatus {
                id: entry.backend.id().to_string(),
                priority: entry.priority(),
                healthy: entry.available(&self.policy),
            })
            .collect()
    }
}
