use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::error::IngestError;
use crate::events::service::EventIngestionService;
use crate::events::validator::validate_event_at;
use crate::models::{BulkOutcome, Event, EventInput};

/// Applies ingestion to a batch of events.
///
/// The whole batch is validated before anything is written. Writes are not
/// transactional across items: the first storage failure aborts the rest of
/// the batch and leaves earlier writes in place.
#[derive(Clone)]
pub struct BulkIngestionOrchestrator {
    service: EventIngestionService,
    /// Maximum number of in-flight stores (1 = sequential)
    concurrency: usize,
}

impl BulkIngestionOrchestrator {
    pub fn new(service: EventIngestionService, concurrency: usize) -> Self {
        Self {
            service,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn store_many(&self, inputs: Vec<EventInput>) -> Result<BulkOutcome, IngestError> {
        // One clock reading for the whole batch
        let now = Utc::now();

        let mut events = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let event_time = validate_event_at(&input, now).inspect_err(|err| {
                warn!(index, error = %err, "Rejecting bulk batch");
            })?;
            events.push(Event::from_input(input, event_time));
        }

        let mut writes = stream::iter(events)
            .map(|event| {
                let service = self.service.clone();
                async move { service.store(&event).await }
            })
            .buffer_unordered(self.concurrency);

        let mut outcome = BulkOutcome::default();
        while let Some(result) = writes.next().await {
            // Dropping `writes` on error cancels any stores still in flight
            outcome.record(result?);
        }

        info!(
            created = outcome.created_count,
            duplicates = outcome.duplicate_count,
            "Bulk ingestion complete"
        );

        Ok(outcome)
    }
}
