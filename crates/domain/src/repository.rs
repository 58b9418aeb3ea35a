//! In-memory, versioned aggregate storage.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use common::Version;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::aggregate::Aggregate;
use crate::error::DomainError;

/// An event together with the version it produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedEvent<E> {
    pub version: Version,
    pub recorded_at: DateTime<Utc>,
    pub event: E,
}

struct Stream<A: Aggregate> {
    state: A,
    history: Vec<RecordedEvent<A::Event>>,
}

/// Stores each aggregate's current state and its event history.
///
/// Appends are checked against the expected version; a stale writer gets
/// [`DomainError::ConcurrencyConflict`] and nothing is written.
pub struct AggregateRepository<A: Aggregate> {
    streams: Arc<RwLock<HashMap<A::Id, Stream<A>>>>,
    next_id: Arc<AtomicU64>,
}

impl<A: Aggregate> Clone for AggregateRepository<A> {
    fn clone(&self) -> Self {
        Self {
            streams: Arc::clone(&self.streams),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<A: Aggregate> Default for AggregateRepository<A> {
    fn default() -> Self {
        Self {
            streams: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl<A: Aggregate> AggregateRepository<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh identifier.
    pub fn next_id(&self) -> A::Id {
        A::Id::from(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Returns the current state, or None if nothing was ever recorded for `id`.
    pub async fn load(&self, id: A::Id) -> Option<A> {
        self.streams.read().await.get(&id).map(|s| s.state.clone())
    }

    /// Returns the recorded events of an aggregate, oldest first.
    pub async fn history(&self, id: A::Id) -> Vec<RecordedEvent<A::Event>> {
        self.streams
            .read()
            .await
            .get(&id)
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// Appends events if the stored version still equals `expected`.
    ///
    /// Returns the aggregate with the events applied.
    pub async fn append(
        &self,
        id: A::Id,
        expected: Version,
        events: Vec<A::Event>,
    ) -> Result<A, DomainError> {
        let mut streams = self.streams.write().await;
        let actual = streams
            .get(&id)
            .map(|s| s.state.version())
            .unwrap_or_else(Version::initial);

        if actual != expected {
            metrics::counter!("aggregate_concurrency_conflicts_total", "aggregate" => A::aggregate_type())
                .increment(1);
            return Err(DomainError::ConcurrencyConflict {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id.to_string(),
                expected,
                actual,
            });
        }

        let stream = streams.entry(id).or_insert_with(|| Stream {
            state: A::default(),
            history: Vec::new(),
        });

        let now = Utc::now();
        let mut version = actual;
        for event in events {
            version = version.next();
            stream.state.apply(event.clone());
            stream.history.push(RecordedEvent {
                version,
                recorded_at: now,
                event,
            });
        }
        stream.state.set_version(version);

        Ok(stream.state.clone())
    }

    /// Returns every stored aggregate matching `predicate`, ordered by id.
    pub async fn find<F>(&self, predicate: F) -> Vec<A>
    where
        F: Fn(&A) -> bool,
    {
        let streams = self.streams.read().await;
        let mut found: Vec<A> = streams
            .values()
            .filter(|s| predicate(&s.state))
            .map(|s| s.state.clone())
            .collect();
        found.sort_by_key(|a| a.id());
        found
    }

    pub async fn count(&self) -> usize {
        self.streams.read().await.len()
    }
}
