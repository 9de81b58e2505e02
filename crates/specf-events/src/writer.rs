use camino::Utf8PathBuf;
use chrono::Utc;
use specf_utils::types::{EventKind, EventLevel, ExtraFields, RuntimeEvent};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Bound on the event channel; producers block (briefly) rather than the
/// log growing unbounded if the writer task falls behind.
const CHANNEL_CAPACITY: usize = 1024;

/// Handle to the background writer task plus the sender side of its channel.
///
/// Cloning an [`EventSink`] is cheap (it's an `mpsc::Sender`); every
/// component that emits events holds one. Dropping all senders closes the
/// channel and lets the writer task drain and exit.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<RuntimeEvent>,
}

impl EventSink {
    /// Queue an event for the writer task. Never blocks on I/O; returns
    /// immediately unless the channel is saturated.
    pub async fn emit(&self, event: RuntimeEvent) {
        if self.tx.send(event).await.is_err() {
            tracing::warn!("event writer task has shut down; dropping event");
        }
    }

    /// Convenience constructor for a simple `(kind, product_id, run_id)` event.
    pub async fn emit_simple(
        &self,
        level: EventLevel,
        event: EventKind,
        product_id: Option<String>,
        run_id: Option<String>,
        kv: ExtraFields,
    ) {
        self.emit(RuntimeEvent {
            ts: Utc::now(),
            level,
            event,
            product_id,
            run_id,
            kv,
        })
        .await;
    }
}

/// Join handle for the background writer task; await it on shutdown to
/// guarantee every queued event has been flushed to disk.
pub struct EventWriterHandle {
    join: JoinHandle<anyhow::Result<()>>,
}

impl EventWriterHandle {
    /// Wait for the writer task to drain and exit. Call only after every
    /// [`EventSink`] clone has been dropped, or this will hang forever.
    pub async fn join(self) -> anyhow::Result<()> {
        self.join.await?
    }
}

/// Spawn the single-consumer writer task and return a sink for producers
/// plus a handle to await clean shutdown.
///
/// Each event is serialized as one compact JSON line; the file is opened
/// once in append mode and kept open for the task's lifetime.
pub fn spawn_event_writer(path: Utf8PathBuf) -> (EventSink, EventWriterHandle) {
    let (tx, mut rx) = mpsc::channel::<RuntimeEvent>(CHANNEL_CAPACITY);

    let join = tokio::spawn(async move {
        if let Some(parent) = path.parent() {
            specf_utils::paths::ensure_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(path.as_std_path()).await?;

        while let Some(event) = rx.recv().await {
            let mut line = serde_json::to_string(&event)?;
            line.push('\n');
            file.write_all(line.as_bytes()).await?;
        }
        file.flush().await?;
        Ok(())
    });

    (EventSink { tx }, EventWriterHandle { join })
}

#[cfg(test)]
mod tests {
    use super::*;
    use specf_utils::paths::with_isolated_home;
    use specf_utils::types::{EventLevel, RuntimeEvent};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn writes_one_ndjson_line_per_event() {
        let _guard = with_isolated_home();
        let path = Utf8PathBuf::from("events.jsonl");
        let (sink, handle) = spawn_event_writer(path.clone());

        sink.emit(RuntimeEvent {
            ts: Utc::now(),
            level: EventLevel::Info,
            event: EventKind::RunStarted,
            product_id: Some("mouse-acme-x1".into()),
            run_id: Some("run-1".into()),
            kv: BTreeMap::new(),
        })
        .await;
        sink.emit(RuntimeEvent {
            ts: Utc::now(),
            level: EventLevel::Info,
            event: EventKind::RunCompleted,
            product_id: Some("mouse-acme-x1".into()),
            run_id: Some("run-1".into()),
            kv: BTreeMap::new(),
        })
        .await;

        drop(sink);
        handle.join().await.unwrap();

        let content = tokio::fs::read_to_string(path.as_std_path()).await.unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "run_started");
    }

    #[tokio::test]
    async fn preserves_emission_order() {
        let _guard = with_isolated_home();
        let path = Utf8PathBuf::from("ordered.jsonl");
        let (sink, handle) = spawn_event_writer(path.clone());

        for i in 0..20 {
            let mut kv = BTreeMap::new();
            kv.insert("seq".to_string(), serde_json::json!(i));
            sink.emit_simple(EventLevel::Debug, EventKind::PlannerEnqueued, None, None, kv).await;
        }
        drop(sink);
        handle.join().await.unwrap();

        let content = tokio::fs::read_to_string(path.as_std_path()).await.unwrap();
        let seqs: Vec<i64> = content
            .lines()
            .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["seq"].as_i64().unwrap())
            .collect();
        assert_eq!(seqs, (0..20).collect::<Vec<_>>());
    }
}
