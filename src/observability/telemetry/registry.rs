use super::error::TelemetryError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Namespaced counters and gauges.
#[derive(Debug)]
pub struct MetricsRegistry {
    namespace: String,
    counters: BTreeMap<String, u64>,
    gauges: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn counter(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }

    pub fn gauge(&self, name: &str) -> Option<u64> {
        self.gauges.get(name).copied()
    }
}

impl MetricsRegistry {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            counters: BTreeMap::new(),
            gauges: BTreeMap::new(),
        }
    }

    pub fn inc_counter(&mut self, name: impl Into<String>, delta: u64) -> Result<u64, TelemetryError> {
        let key = self.qualify(name.into())?;
        let counter = self.counters.entry(key).or_insert(0);
        *counter = counter.saturating_add(delta);
        Ok(*counter)
    }

    /// Publishes a monotonic total kept elsewhere. The stored value never
    /// moves backwards.
    pub fn set_counter(&mut self, name: impl Into<String>, total: u64) -> Result<u64, TelemetryError> {
        let key = self.qualify(name.into())?;
        let counter = self.counters.entry(key).or_insert(0);
        *counter = (*counter).max(total);
        Ok(*counter)
    }

    pub fn set_gauge(&mut self, name: impl Into<String>, value: u64) -> Result<(), TelemetryError> {
        let key = self.qualify(name.into())?;
        self.gauges.insert(key, value);
        Ok(())
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.clone(),
            gauges: self.gauges.clone(),
        }
    }

    fn qualify(&self, name: String) -> Result<String, TelemetryError> {
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '=') {
            return Err(TelemetryError::InvalidName(name));
        }
        let namespace = if self.namespace.ends_with('.') {
            self.namespace.clone()
        } else {
            format!("{}.", self.namespace)
        };
        if name.starts_with(&namespace) {
            Ok(name)
        } else {
            Ok(format!("{}{}", namespace, name))
        }
    }
}
