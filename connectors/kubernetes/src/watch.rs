//! Bounded watch sessions.
//!
//! One session opens one raw watch stream for one resource kind and drains it
//! through the pipeline until the wall-clock bound expires, the server closes
//! the stream, or the transport fails. The subscription is torn down and
//! reopened every ingestion cycle rather than held open indefinitely; each
//! session resumes from the last resourceVersion the previous one observed,
//! so transitions between two cycles are still delivered. When the server
//! reports the version as expired (410 Gone) the resume point is cleared and
//! the next cycle starts from a fresh list.
//!
//! Failures here are local: a session always resolves to an outcome with its
//! partial count, so one kind failing never aborts ingestion of the others.

use crate::pipeline::Pipeline;
use crate::snapshot::{ChangeKind, ResourceKind, ResourceSnapshot};
use futures::{Stream, StreamExt, TryStreamExt};
use kube::Api;
use kube::api::{WatchEvent, WatchParams};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// HTTP status the server uses to signal an expired resourceVersion.
const GONE: u16 = 410;

/// How a session's subscription ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The wall-clock bound expired and the session cancelled itself
    Timeout,
    /// The server closed the stream (its own watch timeout)
    StreamClosed,
    /// The transport or the watch itself failed
    Error,
}

/// Final state of one closed watch session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub kind: ResourceKind,
    /// Snapshots drained from the stream, significant or not
    pub processed: u64,
    pub end: SessionEnd,
    /// Last resourceVersion observed; the next session for this kind resumes
    /// from it. `None` forces a fresh list (first cycle, or after 410 Gone).
    pub resource_version: Option<String>,
}

/// Open a watch subscription for one resource kind and drain it until the
/// session bound expires.
///
/// Dropping the stream on exit tears down the server-side watch.
pub async fn run_session<K>(
    api: Api<K>,
    kind: ResourceKind,
    pipeline: Arc<Pipeline>,
    max_duration: Duration,
    resume_version: Option<String>,
) -> SessionOutcome
where
    K: Clone + DeserializeOwned + Debug + Send + 'static,
    ResourceSnapshot: From<K>,
{
    info!(
        "Watching {kind} from version {} (bounded at {}s)",
        resume_version.as_deref().unwrap_or("0"),
        max_duration.as_secs()
    );
    let deadline = Instant::now() + max_duration;
    // Ask the server to close slightly inside our own bound so a healthy
    // session usually ends as StreamClosed rather than a mid-frame cutoff.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "session bounds are far below u32::MAX seconds"
    )]
    let server_timeout = max_duration.as_secs().saturating_sub(5).max(1) as u32;
    let params = WatchParams::default().timeout(server_timeout);

    let start = resume_version.as_deref().unwrap_or("0");
    let stream = match api.watch(&params, start).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to open {kind} watch: {e}");
            return SessionOutcome {
                kind,
                processed: 0,
                end: SessionEnd::Error,
                resource_version: resume_version,
            };
        }
    };
    drain(stream.boxed(), kind, pipeline, deadline, resume_version).await
}

/// Drain watch frames through the pipeline until the stream closes, fails,
/// or the deadline passes. Split from the subscription so the session
/// contract is testable against a scripted frame sequence.
pub(crate) async fn drain<K, S>(
    mut stream: S,
    kind: ResourceKind,
    pipeline: Arc<Pipeline>,
    deadline: Instant,
    mut resource_version: Option<String>,
) -> SessionOutcome
where
    K: Clone + DeserializeOwned + Debug + Send + 'static,
    S: Stream<Item = Result<WatchEvent<K>, kube::Error>> + Unpin,
    ResourceSnapshot: From<K>,
{
    let mut processed = 0u64;
    let end = loop {
        let frame = match tokio::time::timeout_at(deadline, stream.try_next()).await {
            Err(_) => break SessionEnd::Timeout,
            Ok(Err(e)) => {
                warn!("{kind} watch transport error after {processed} snapshots: {e}");
                break SessionEnd::Error;
            }
            Ok(Ok(None)) => break SessionEnd::StreamClosed,
            Ok(Ok(Some(frame))) => frame,
        };
        let (change, object) = match frame {
            WatchEvent::Added(o) => (ChangeKind::Added, o),
            WatchEvent::Modified(o) => (ChangeKind::Modified, o),
            WatchEvent::Deleted(o) => (ChangeKind::Deleted, o),
            WatchEvent::Bookmark(bookmark) => {
                resource_version = Some(bookmark.metadata.resource_version);
                continue;
            }
            WatchEvent::Error(e) => {
                if e.code == GONE {
                    warn!("{kind} watch history expired, resyncing from a fresh list: {e}");
                    resource_version = None;
                } else {
                    warn!("{kind} watch error frame: {e}");
                }
                break SessionEnd::Error;
            }
        };
        processed += 1;
        let snapshot = ResourceSnapshot::from(object);
        let version = snapshot.resource_version();
        if !version.is_empty() {
            resource_version = Some(version.to_string());
        }
        // Sink failures are local too; the stream keeps draining.
        if let Err(e) = pipeline.process(change, &snapshot).await {
            error!("Failed to process {kind} {}: {e}", snapshot.name());
        }
    };

    debug!("{kind} session closed ({end:?}) after {processed} snapshots");
    SessionOutcome {
        kind,
        processed,
        end,
        resource_version,
    }
}
