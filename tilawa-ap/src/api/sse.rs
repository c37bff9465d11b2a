//! Server-Sent Events (SSE) broadcaster
//!
//! Streams playback events to connected clients.

use crate::api::server::AppContext;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::time::Duration;
use tilawa_common::events::TilawaEvent;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

/// GET /events - SSE event stream
///
/// The first message is a `PlaybackSnapshot` under the `Snapshot` event name,
/// so a client can render before the next change arrives.
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected");

    // Subscribe before taking the snapshot so nothing falls in between
    let rx = ctx.engine.events().subscribe();
    let snapshot = ctx.engine.snapshot();

    let initial = async_stream::stream! {
        match serde_json::to_string(&snapshot) {
            Ok(json) => {
                yield Ok::<Event, Infallible>(Event::default().event("Snapshot").data(json));
            }
            Err(e) => {
                warn!("Failed to serialize snapshot: {}", e);
            }
        }
    };

    let updates = BroadcastStream::new(rx).filter_map(|result| async move {
        match result {
            Ok(event) => to_sse_event(&event),
            Err(e) => {
                // Lagged: the client missed events; the next ones still apply
                warn!("SSE stream error: {:?}", e);
                None
            }
        }
    });

    Sse::new(initial.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

fn to_sse_event(event: &TilawaEvent) -> Option<Result<Event, Infallible>> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
        Err(e) => {
            warn!("Failed to serialize event: {}", e);
            None
        }
    }
}
