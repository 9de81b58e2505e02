//! Append-only NDJSON runtime event log (`_runtime/events.jsonl`).
//!
//! The writer is a single dedicated consumer task fed by a bounded mpsc
//! channel: producers
//! (planner, orchestrator, catalog) never touch the file directly, so
//! concurrent products sharing one event log never interleave partial
//! lines or race on the file handle.

mod writer;

pub use writer::{EventSink, EventWriterHandle, spawn_event_writer};
