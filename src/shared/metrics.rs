//! In-process metrics for operational visibility.
//!
//! The balancer and the notification dispatcher swallow datastore errors so
//! that auxiliary failures never abort a ticket mutation; these counters make
//! those swallowed failures observable.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<Vec<Metric>>>,
    aggregates: Arc<RwLock<HashMap<String, f64>>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(Vec::new())),
            aggregates: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn record(&self, name: &str, value: f64) {
        let metric = Metric {
            name: name.to_string(),
            value,
            timestamp: Utc::now(),
        };

        let mut metrics = self.metrics.write().await;
        metrics.push(metric);

        let mut aggregates = self.aggregates.write().await;
        let entry = aggregates.entry(name.to_string()).or_insert(0.0);
        *entry += value;

        if metrics.len() > 10000 {
            let cutoff = Utc::now() - Duration::hours(1);
            metrics.retain(|m| m.timestamp > cutoff);
        }
    }

    pub async fn increment(&self, name: &str) {
        self.record(name, 1.0).await;
    }

    pub async fn aggregates(&self) -> HashMap<String, f64> {
        self.aggregates.read().await.clone()
    }

    pub async fn get_aggregate(&self, name: &str) -> Option<f64> {
        self.aggregates.read().await.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_increment_aggregates() {
        let collector = MetricsCollector::new();
        collector.increment("notifications.failures").await;
        collector.increment("notifications.failures").await;
        collector.record("assign.scan_failures", 1.0).await;

        assert_eq!(
            collector.get_aggregate("notifications.failures").await,
            Some(2.0)
        );
        assert_eq!(collector.get_aggregate("assign.scan_failures").await, Some(1.0));
        assert_eq!(collector.get_aggregate("unknown").await, None);
    }
}
