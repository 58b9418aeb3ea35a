//! Command handling infrastructure.

use common::Version;

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::repository::AggregateRepository;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Handler for executing commands against aggregates.
///
/// The handler:
/// 1. Loads the aggregate from the repository
/// 2. Executes the command to produce events
/// 3. Appends the events with an optimistic version check
pub struct CommandHandler<A: Aggregate> {
    repository: AggregateRepository<A>,
}

impl<A: Aggregate> Clone for CommandHandler<A> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
        }
    }
}

impl<A: Aggregate> Default for CommandHandler<A> {
    fn default() -> Self {
        Self {
            repository: AggregateRepository::new(),
        }
    }
}

impl<A: Aggregate> CommandHandler<A>
where
    DomainError: From<A::Error>,
{
    pub fn new(repository: AggregateRepository<A>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &AggregateRepository<A> {
        &self.repository
    }

    /// Loads an existing aggregate.
    pub async fn load(&self, id: A::Id) -> Result<A, DomainError> {
        self.repository
            .load(id)
            .await
            .ok_or_else(|| DomainError::AggregateNotFound {
                aggregate_type: A::aggregate_type(),
                aggregate_id: id.to_string(),
            })
    }

    /// Creates a new aggregate under a freshly allocated id.
    ///
    /// The command function receives the allocated id and an empty aggregate.
    pub async fn create<F>(&self, command_fn: F) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(A::Id, &A) -> Result<Vec<A::Event>, A::Error>,
    {
        let id = self.repository.next_id();
        let events = command_fn(id, &A::default())?;
        self.persist(id, Version::initial(), events, A::default())
            .await
    }

    /// Executes a command against an existing aggregate and persists the
    /// resulting events.
    pub async fn execute<F>(
        &self,
        id: A::Id,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
    {
        let aggregate = self.load(id).await?;
        let current_version = aggregate.version();
        let events = command_fn(&aggregate)?;
        self.persist(id, current_version, events, aggregate).await
    }

    async fn persist(
        &self,
        id: A::Id,
        expected: Version,
        events: Vec<A::Event>,
        unchanged: A,
    ) -> Result<CommandResult<A>, DomainError> {
        if events.is_empty() {
            return Ok(CommandResult {
                aggregate: unchanged,
                events,
                new_version: expected,
            });
        }

        let aggregate = self.repository.append(id, expected, events.clone()).await?;
        let new_version = aggregate.version();
        tracing::debug!(
            aggregate_type = A::aggregate_type(),
            aggregate_id = %id,
            %new_version,
            "Events appended"
        );

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }
}
