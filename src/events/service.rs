use std::sync::Arc;
use tracing::debug;

use crate::error::IngestError;
use crate::events::validator::validate_event;
use crate::models::{Event, EventInput, Outcome};
use crate::storage::{EventStore, StorageError};

/// Validates, fingerprints and stores single events.
///
/// Duplicate detection is left entirely to [`EventStore::insert_if_absent`];
/// the service never looks up a key before inserting it.
#[derive(Clone)]
pub struct EventIngestionService {
    event_store: Arc<dyn EventStore>,
}

impl EventIngestionService {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { event_store: store }
    }

    /// Validate `input`, derive its dedupe key and store it
    pub async fn ingest(&self, input: EventInput) -> Result<Outcome, IngestError> {
        let event_time = validate_event(&input)?;
        let event = Event::from_input(input, event_time);
        Ok(self.store(&event).await?)
    }

    /// Store an already validated event
    pub async fn store(&self, event: &Event) -> Result<Outcome, StorageError> {
        let created = self.event_store.insert_if_absent(event).await?;

        if !created {
            debug!(dedupe_key = event.dedupe_key(), "Duplicate event ignored");
        }

        Ok(Outcome::from_created(created))
    }
}
