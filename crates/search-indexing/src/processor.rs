//! Tick processor: drains due parent events and dispatches their sub-events.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use search_types::{EventKind, StatusEvent, StoredStatusEvent};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::{Halt, IndexingError, TickError};
use crate::pipeline::IndexingPipeline;
use crate::queue::StatusEventQueue;
use crate::result::TickSummary;
use crate::retry::RetryPolicy;

/// Consumes the status event queue one tick at a time.
pub struct EventProcessor {
    pipeline: Arc<IndexingPipeline>,
    queue: StatusEventQueue,
    retry: RetryPolicy,
}

impl EventProcessor {
    pub fn new(pipeline: Arc<IndexingPipeline>, queue: StatusEventQueue) -> Self {
        Self {
            pipeline,
            queue,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn pipeline(&self) -> &Arc<IndexingPipeline> {
        &self.pipeline
    }

    /// Process every due parent event of every registered storage code.
    ///
    /// Stops early only on a fatal error, on cancellation, or when the
    /// queue itself cannot be read or updated.
    pub async fn perform_one_tick(
        &self,
        cancel: &CancellationToken,
    ) -> Result<TickSummary, TickError> {
        let mut summary = TickSummary::new();
        for code in self.pipeline.handlers().storage_codes() {
            let events = self.queue.due_events(code).await.map_err(TickError::Queue)?;
            for parent in events {
                if cancel.is_cancelled() {
                    return Err(Halt::Cancelled.into());
                }
                let success = self.process_parent(&parent, cancel, &mut summary).await?;
                self.queue
                    .mark_visited(&parent, success)
                    .await
                    .map_err(TickError::Queue)?;
                summary.record_parent(success);
            }
        }
        Ok(summary)
    }

    /// Expand and process one parent event; the result is its visited outcome.
    async fn process_parent(
        &self,
        parent: &StoredStatusEvent,
        cancel: &CancellationToken,
        summary: &mut TickSummary,
    ) -> Result<bool, Halt> {
        info!(
            event_id = %parent.id,
            guid = %parent.event.guid,
            event_kind = %parent.event.kind,
            "Processing parent event"
        );

        let expanded = self
            .retry
            .run("expand", cancel, || async {
                self.pipeline
                    .handlers()
                    .get(parent.event.storage_code())?
                    .expand(&parent.event)
                    .await
            })
            .await?;
        let mut sub_events = match expanded {
            Ok(source) => source,
            Err(e) => {
                error!(event_id = %parent.id, error = %e, "Error expanding parent event");
                return Ok(false);
            }
        };

        loop {
            let mut attempts = self.retry.attempts("next_event");
            let next = loop {
                if cancel.is_cancelled() {
                    return Err(Halt::Cancelled);
                }
                match sub_events.next_event().await {
                    Ok(next) => break Ok(next),
                    Err(e) => {
                        if let Some(last) = attempts.on_failure(e, cancel).await? {
                            break Err(last);
                        }
                    }
                }
            };
            let event = match next {
                Ok(Some(event)) => event,
                Ok(None) => return Ok(true),
                Err(e) => {
                    error!(event_id = %parent.id, error = %e, "Error getting event from data storage");
                    return Ok(false);
                }
            };

            if let Some(storage_object_type) = &event.storage_object_type {
                let supported = self
                    .retry
                    .run("type_lookup", cancel, || {
                        self.pipeline.is_storage_type_supported(storage_object_type)
                    })
                    .await?;
                match supported {
                    Ok(true) => {}
                    Ok(false) => {
                        info!(
                            guid = %event.guid,
                            event_kind = %event.kind,
                            storage_object_type = %storage_object_type,
                            "Skipping event of unsupported type"
                        );
                        summary.record_skip();
                        if event == parent.event {
                            return Ok(false);
                        }
                        continue;
                    }
                    Err(e) => {
                        error!(guid = %event.guid, error = %e, "Error looking up type rules");
                        return Ok(false);
                    }
                }
            }

            info!(guid = %event.guid, event_kind = %event.kind, "Processing event");
            let started = Instant::now();
            let outcome = self
                .retry
                .run("process_event", cancel, || self.process_event(&event))
                .await?;
            match outcome {
                Ok(()) => {
                    summary.record_processed();
                    info!(
                        guid = %event.guid,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Processed event"
                    );
                }
                Err(e) => {
                    error!(
                        guid = %event.guid,
                        event_kind = %event.kind,
                        error = %e,
                        "Error processing event"
                    );
                    return Ok(false);
                }
            }
        }
    }

    /// Apply one event to the index.
    pub async fn process_event(&self, event: &StatusEvent) -> Result<(), IndexingError> {
        let storage = self.pipeline.indexing_storage();
        let guid = &event.guid;
        let single = || BTreeSet::from([guid.clone()]);
        match &event.kind {
            EventKind::NewVersion => {
                if self.pipeline.is_indexed(guid).await? {
                    info!(guid = %guid, "Already indexed, updating public access only");
                    if event.is_global_accessible() {
                        storage.publish_objects(&single()).await
                    } else {
                        storage.unpublish_objects(&single()).await
                    }
                } else {
                    let storage_object_type =
                        event.storage_object_type.as_ref().ok_or_else(|| {
                            IndexingError::InvalidEvent(format!(
                                "new version event for {} has no storage object type",
                                guid
                            ))
                        })?;
                    self.pipeline
                        .index_object(
                            guid,
                            storage_object_type,
                            Some(event.timestamp),
                            event.is_global_accessible(),
                            None,
                            &[],
                        )
                        .await
                }
            }
            EventKind::Deleted => {
                storage
                    .unshare_objects(&single(), event.access_group_id())
                    .await
            }
            EventKind::DeleteAllVersions => storage.delete_all_versions(guid).await,
            EventKind::UndeleteAllVersions => storage.undelete_all_versions(guid).await,
            EventKind::Shared => {
                storage
                    .share_objects(&single(), target_access_group(event)?, false)
                    .await
            }
            EventKind::Unshared => {
                storage
                    .unshare_objects(&single(), target_access_group(event)?)
                    .await
            }
            EventKind::RenameAllVersions => {
                let new_name = event.new_name.as_deref().ok_or_else(|| {
                    IndexingError::InvalidEvent(format!("rename event for {} has no new name", guid))
                })?;
                storage.set_name_on_all_object_versions(guid, new_name).await
            }
            EventKind::PublishAllVersions => storage.publish_all_versions(guid).await,
            EventKind::UnpublishAllVersions => storage.unpublish_all_versions(guid).await,
            EventKind::Unsupported(kind) => Err(IndexingError::UnsupportedEventKind(kind.clone())),
        }
    }
}

fn target_access_group(event: &StatusEvent) -> Result<u32, IndexingError> {
    event.target_access_group_id.ok_or_else(|| {
        IndexingError::InvalidEvent(format!(
            "{} event for {} has no target access group",
            event.kind, event.guid
        ))
    })
}
