//! Pipeline orchestration: consumption loops and lifecycle.
//!
//! [`Pipeline`] wires the collaborators together and [`Pipeline::start`]
//! brings the moving parts up in dependency order: directory snapshot
//! first, then the sender loop, the two decoder loops, and finally the
//! poll thread. Shutdown runs the same order in reverse, draining each
//! stage through channel closure rather than cancellation.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::directory::SubscriberDirectory;
use crate::dispatch::{self, OutboundItem};
use crate::enrichment::Enricher;
use crate::event::{ChangeOp, Envelope, NotifyRow, PmRow, RawEvent};
use crate::formatter;
use crate::ingest::{self, BlockingStreamSource, IngestHandle};
use crate::router::EventRouter;
use crate::store::{EnrichmentStore, NotificationTransport, SubscriberStore};

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
}

/// Per-event processing shared by the two decoder loops.
///
/// Owns the dispatch sender; when the last clone drops, the sender loop
/// drains and exits.
pub(crate) struct Processor {
    directory: Arc<SubscriberDirectory>,
    enricher: Enricher,
    dispatch_tx: mpsc::Sender<OutboundItem>,
    staleness_window: Duration,
}

impl Processor {
    /// Decodes, filters, enriches and fans out one notification record.
    ///
    /// Filtered records return `Ok`; only infrastructure failures
    /// surface as errors.
    pub(crate) async fn process_notify(&self, event: RawEvent) -> Result<(), RelayErrorKind> {
        let envelope: Envelope<NotifyRow> =
            Envelope::decode(&event.value).map_err(|e| RelayErrorKind::Decode(e.to_string()))?;

        if envelope.op != ChangeOp::Create {
            debug!(op = envelope.op.as_str(), "non-create notification event skipped");
            return Ok(());
        }
        let Some(row) = envelope.after else {
            debug!("create event without after-state skipped");
            return Ok(());
        };

        let age = now_unix().saturating_sub(row.dateline);
        if age > i64::try_from(self.staleness_window.as_secs()).unwrap_or(i64::MAX) {
            debug!(nt_uid = row.nt_uid, age_secs = age, "stale notification dropped");
            return Ok(());
        }

        let chats = self.directory.lookup(row.nt_uid);
        if chats.is_empty() {
            return Ok(());
        }

        // Check the kind before paying for lookups.
        if crate::notify_types::for_kind(row.nt_type).is_none() {
            debug!(nt_type = row.nt_type, "unknown notification kind dropped");
            return Ok(());
        }

        let field = self
            .enricher
            .field(row.nt_mid)
            .await
            .map_err(|e| RelayErrorKind::Lookup(e.to_string()))?;
        let actor = self
            .enricher
            .actor(row.nt_from_uid)
            .await
            .map_err(|e| RelayErrorKind::Lookup(e.to_string()))?;

        let Some(rendered) = formatter::render_notification(&row, &actor, &field) else {
            return Ok(());
        };

        for chat_id in chats {
            self.dispatch(chat_id, &rendered).await?;
        }
        Ok(())
    }

    /// Decodes, filters and fans out one direct-message record.
    ///
    /// Only a genuine unread transition notifies: a create that lands
    /// unread, or an update flipping `msg_new` from zero. Updates with
    /// no before-image are skipped since the transition cannot be
    /// established.
    pub(crate) async fn process_message(&self, event: RawEvent) -> Result<(), RelayErrorKind> {
        let envelope: Envelope<PmRow> =
            Envelope::decode(&event.value).map_err(|e| RelayErrorKind::Decode(e.to_string()))?;

        let Some(row) = envelope.after else {
            debug!("message event without after-state skipped");
            return Ok(());
        };

        let is_new_unread = match envelope.op {
            ChangeOp::Create => row.msg_new != 0,
            ChangeOp::Update => {
                row.msg_new != 0 && envelope.before.as_ref().is_some_and(|b| b.msg_new == 0)
            }
            ChangeOp::Delete | ChangeOp::Read => false,
        };
        if !is_new_unread {
            return Ok(());
        }

        let chats = self.directory.lookup(row.msg_rid);
        if chats.is_empty() {
            return Ok(());
        }

        let blocked = self
            .enricher
            .blocklist(row.msg_rid)
            .await
            .map_err(|e| RelayErrorKind::Lookup(e.to_string()))?;
        if blocked.contains(&row.msg_sid) {
            debug!(
                sender = row.msg_sid,
                receiver = row.msg_rid,
                "message from blocked sender suppressed"
            );
            return Ok(());
        }

        let rendered = formatter::render_direct_message(&row);
        for chat_id in chats {
            self.dispatch(chat_id, &rendered).await?;
        }
        Ok(())
    }

    async fn dispatch(
        &self,
        chat_id: i64,
        rendered: &formatter::RenderedMessage,
    ) -> Result<(), RelayErrorKind> {
        self.dispatch_tx
            .send(OutboundItem {
                chat_id,
                text: rendered.text.clone(),
                hint: rendered.hint,
            })
            .await
            .map_err(|_| RelayErrorKind::QueueClosed)
    }
}

/// Loop-internal error classification; decides log level and whether
/// the loop continues.
#[derive(Debug)]
pub(crate) enum RelayErrorKind {
    Decode(String),
    Lookup(String),
    QueueClosed,
}

async fn run_decode_loop<F, Fut>(
    mut rx: mpsc::Receiver<RawEvent>,
    stream: &'static str,
    process: F,
) where
    F: Fn(RawEvent) -> Fut,
    Fut: std::future::Future<Output = Result<(), RelayErrorKind>>,
{
    while let Some(event) = rx.recv().await {
        let offset = event.offset;
        match process(event).await {
            Ok(()) => {}
            Err(RelayErrorKind::Decode(e)) => {
                debug!(stream, offset, error = %e, "undecodable event dropped");
            }
            Err(RelayErrorKind::Lookup(e)) => {
                error!(stream, offset, error = %e, "enrichment failed, event dropped");
            }
            Err(RelayErrorKind::QueueClosed) => {
                info!(stream, "dispatch queue closed, decoder loop exiting");
                return;
            }
        }
    }
    info!(stream, "event queue drained, decoder loop exiting");
}

/// The assembled relay pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    subscribers: Arc<dyn SubscriberStore>,
    enrichment: Arc<dyn EnrichmentStore>,
    transport: Arc<dyn NotificationTransport>,
    directory: Arc<SubscriberDirectory>,
}

impl Pipeline {
    /// Creates a pipeline over the given collaborators.
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        subscribers: Arc<dyn SubscriberStore>,
        enrichment: Arc<dyn EnrichmentStore>,
        transport: Arc<dyn NotificationTransport>,
    ) -> Self {
        Self {
            config,
            subscribers,
            enrichment,
            transport,
            directory: Arc::new(SubscriberDirectory::new()),
        }
    }

    /// The shared subscriber directory.
    #[must_use]
    pub fn directory(&self) -> Arc<SubscriberDirectory> {
        Arc::clone(&self.directory)
    }

    /// Loads the initial directory snapshot and starts every stage.
    ///
    /// Returns once the poll thread is running; events flow until
    /// [`PipelineHandle::shutdown`].
    ///
    /// # Errors
    ///
    /// Fails if the initial directory load fails or the poll thread
    /// cannot be spawned. A pipeline that cannot resolve subscribers
    /// must not consume.
    pub async fn start(
        &self,
        source: Box<dyn BlockingStreamSource>,
        notify_topic: &str,
        message_topic: &str,
    ) -> Result<PipelineHandle, crate::error::RelayError> {
        self.directory.reload(self.subscribers.as_ref()).await?;

        let (dispatch_tx, dispatch_rx) = dispatch::channel(self.config.dispatch_queue_size);
        let sender_task = dispatch::spawn_sender(dispatch_rx, Arc::clone(&self.transport));

        let processor = Arc::new(Processor {
            directory: Arc::clone(&self.directory),
            enricher: Enricher::new(
                Arc::clone(&self.enrichment),
                self.config.actor_cache_capacity,
            ),
            dispatch_tx,
            staleness_window: self.config.staleness_window,
        });

        let (notify_tx, notify_rx) = mpsc::channel(self.config.event_queue_size);
        let (message_tx, message_rx) = mpsc::channel(self.config.event_queue_size);

        let p = Arc::clone(&processor);
        let notify_task = tokio::spawn(async move {
            run_decode_loop(notify_rx, "notify", |ev| {
                let p = Arc::clone(&p);
                async move { p.process_notify(ev).await }
            })
            .await;
        });

        let p = Arc::clone(&processor);
        let message_task = tokio::spawn(async move {
            run_decode_loop(message_rx, "message", |ev| {
                let p = Arc::clone(&p);
                async move { p.process_message(ev).await }
            })
            .await;
        });
        drop(processor);

        let refresh_task = self.config.directory_refresh_interval.map(|interval| {
            let directory = Arc::clone(&self.directory);
            let store = Arc::clone(&self.subscribers);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = directory.reload(store.as_ref()).await {
                        warn!(error = %e, "periodic directory refresh failed, keeping old snapshot");
                    }
                }
            })
        });

        let router = EventRouter::new(notify_topic, message_topic, notify_tx, message_tx);
        let ingest = ingest::spawn_poll_thread(source, router, Duration::from_secs(3))?;

        info!(
            notify_topic,
            message_topic,
            owners = self.directory.owner_count(),
            "relay pipeline started"
        );

        Ok(PipelineHandle {
            ingest: Some(ingest),
            tasks: vec![notify_task, message_task, sender_task],
            refresh_task,
        })
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("owners", &self.directory.owner_count())
            .finish_non_exhaustive()
    }
}

/// Handle to a running pipeline.
pub struct PipelineHandle {
    ingest: Option<IngestHandle>,
    tasks: Vec<JoinHandle<()>>,
    refresh_task: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Stops ingestion and drains every stage.
    ///
    /// The poll thread is joined first; dropping its router closes the
    /// event queues, the decoder loops drain and drop the dispatch
    /// sender, and the sender loop drains what is left. In-flight
    /// events are delivered, nothing past the poll boundary is lost.
    pub async fn shutdown(mut self) {
        if let Some(refresh) = self.refresh_task.take() {
            refresh.abort();
        }

        if let Some(ingest) = self.ingest.take() {
            let joined = tokio::task::spawn_blocking(move || ingest.shutdown()).await;
            if joined.is_err() {
                error!("ingest shutdown task panicked");
            }
        }

        for task in self.tasks.drain(..) {
            if task.await.is_err() {
                error!("pipeline task panicked during shutdown");
            }
        }
        info!("relay pipeline stopped");
    }
}

impl std::fmt::Debug for PipelineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineHandle")
            .field("running", &self.ingest.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockEnrichmentStore, MockSubscriberStore, MockTransport};
    use serde_json::json;

    fn processor(
        links: &[(u64, i64)],
        store: &Arc<MockEnrichmentStore>,
    ) -> (Processor, mpsc::Receiver<OutboundItem>) {
        let directory = Arc::new(SubscriberDirectory::new());
        let mut map = std::collections::HashMap::new();
        for &(owner, chat) in links {
            map.entry(owner)
                .or_insert_with(std::collections::HashSet::new)
                .insert(chat);
        }
        directory.replace(map);

        let (dispatch_tx, dispatch_rx) = mpsc::channel(16);
        let processor = Processor {
            directory,
            enricher: Enricher::new(
                Arc::clone(store) as Arc<dyn crate::store::EnrichmentStore>,
                64,
            ),
            dispatch_tx,
            staleness_window: Duration::from_secs(120),
        };
        (processor, dispatch_rx)
    }

    fn notify_event(op: &str, row: serde_json::Value) -> RawEvent {
        RawEvent {
            stream_id: "notify".into(),
            offset: 0,
            key: None,
            value: json!({"before": null, "after": row, "op": op}).to_string().into_bytes(),
        }
    }

    fn fresh_notify_row(kind: u32) -> serde_json::Value {
        json!({
            "nt_uid": 100, "nt_from_uid": 7, "nt_status": 1, "nt_type": kind,
            "nt_mid": 6714, "nt_related_id": 555, "nt_dateline": now_unix()
        })
    }

    #[tokio::test]
    async fn test_notify_create_fans_out() {
        let store = Arc::new(MockEnrichmentStore::new());
        store.put_field(6714, 42, "Test Topic");
        store.put_actor(7, "alice", "alice");
        let (p, mut rx) = processor(&[(100, 1000), (100, 1001)], &store);

        p.process_notify(notify_event("c", fresh_notify_row(1))).await.unwrap();

        let a = rx.recv().await.unwrap();
        let b = rx.recv().await.unwrap();
        let mut chats = vec![a.chat_id, b.chat_id];
        chats.sort_unstable();
        assert_eq!(chats, vec![1000, 1001]);
        assert_eq!(
            a.text,
            "<code>alice</code> 在你的小组话题 <b>Test Topic</b> 中发表了新回复\n\nhttps://bgm.tv/group/topic/42#post_555"
        );
        assert_eq!(a.text, b.text);
    }

    #[tokio::test]
    async fn test_notify_update_skipped() {
        let store = Arc::new(MockEnrichmentStore::new());
        let (p, mut rx) = processor(&[(100, 1000)], &store);

        p.process_notify(notify_event("u", fresh_notify_row(1))).await.unwrap();
        assert!(rx.try_recv().is_err());
        // No enrichment was attempted for a filtered event.
        assert_eq!(store.actor_lookups(), 0);
    }

    #[tokio::test]
    async fn test_stale_notify_dropped() {
        let store = Arc::new(MockEnrichmentStore::new());
        let (p, mut rx) = processor(&[(100, 1000)], &store);

        let mut row = fresh_notify_row(1);
        row["nt_dateline"] = json!(now_unix() - 3600);
        p.process_notify(notify_event("c", row)).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_notify_without_subscribers_skips_enrichment() {
        let store = Arc::new(MockEnrichmentStore::new());
        let (p, mut rx) = processor(&[(999, 1000)], &store);

        p.process_notify(notify_event("c", fresh_notify_row(1))).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(store.actor_lookups(), 0);
    }

    #[tokio::test]
    async fn test_notify_lookup_failure_surfaces() {
        let store = Arc::new(MockEnrichmentStore::new());
        // Field present, actor missing.
        store.put_field(6714, 42, "t");
        let (p, _rx) = processor(&[(100, 1000)], &store);

        let result = p.process_notify(notify_event("c", fresh_notify_row(1))).await;
        assert!(matches!(result, Err(RelayErrorKind::Lookup(_))));
    }

    #[tokio::test]
    async fn test_notify_unknown_kind_skips_enrichment() {
        let store = Arc::new(MockEnrichmentStore::new());
        let (p, mut rx) = processor(&[(100, 1000)], &store);

        p.process_notify(notify_event("c", fresh_notify_row(16))).await.unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(store.actor_lookups(), 0);
    }

    fn pm_event(op: &str, before: serde_json::Value, after: serde_json::Value) -> RawEvent {
        RawEvent {
            stream_id: "pms".into(),
            offset: 0,
            key: None,
            value: json!({"before": before, "after": after, "op": op})
                .to_string()
                .into_bytes(),
        }
    }

    fn pm_row(msg_new: i32) -> serde_json::Value {
        json!({
            "msg_id": 9, "msg_sid": 7, "msg_rid": 100, "msg_new": msg_new,
            "msg_title": "hi", "msg_dateline": now_unix()
        })
    }

    #[tokio::test]
    async fn test_pm_create_unread_notifies() {
        let store = Arc::new(MockEnrichmentStore::new());
        let (p, mut rx) = processor(&[(100, 1000)], &store);

        p.process_message(pm_event("c", json!(null), pm_row(1))).await.unwrap();
        let item = rx.recv().await.unwrap();
        assert_eq!(item.chat_id, 1000);
        assert_eq!(item.text, "你有一条来自 7 的新私信");
        assert_eq!(item.hint, crate::dispatch::FormatHint::Plain);
    }

    #[tokio::test]
    async fn test_pm_create_already_read_skipped() {
        let store = Arc::new(MockEnrichmentStore::new());
        let (p, mut rx) = processor(&[(100, 1000)], &store);

        p.process_message(pm_event("c", json!(null), pm_row(0))).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pm_update_transition_to_unread_notifies() {
        let store = Arc::new(MockEnrichmentStore::new());
        let (p, mut rx) = processor(&[(100, 1000)], &store);

        p.process_message(pm_event("u", pm_row(0), pm_row(1))).await.unwrap();
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_pm_update_without_before_skipped() {
        let store = Arc::new(MockEnrichmentStore::new());
        let (p, mut rx) = processor(&[(100, 1000)], &store);

        p.process_message(pm_event("u", json!(null), pm_row(1))).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pm_update_still_unread_skipped() {
        let store = Arc::new(MockEnrichmentStore::new());
        let (p, mut rx) = processor(&[(100, 1000)], &store);

        p.process_message(pm_event("u", pm_row(1), pm_row(1))).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pm_blocked_sender_suppressed() {
        let store = Arc::new(MockEnrichmentStore::new());
        store.put_blocklist(100, 7);
        let (p, mut rx) = processor(&[(100, 1000)], &store);

        p.process_message(pm_event("c", json!(null), pm_row(1))).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_undecodable_event_reported_as_decode() {
        let store = Arc::new(MockEnrichmentStore::new());
        let (p, _rx) = processor(&[], &store);

        let garbage = RawEvent {
            stream_id: "notify".into(),
            offset: 3,
            key: None,
            value: b"{not json".to_vec(),
        };
        assert!(matches!(
            p.process_notify(garbage).await,
            Err(RelayErrorKind::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_start_fails_without_directory() {
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            Arc::new(MockSubscriberStore::failing()),
            Arc::new(MockEnrichmentStore::new()),
            Arc::new(MockTransport::new()),
        );

        let source = crate::testing::ScriptedSource::new(Vec::new());
        let result = pipeline.start(Box::new(source), "n", "m").await;
        assert!(result.is_err());
    }
}
