//! Server-Sent Events stream for the dashboard.
//!
//! Each connection is its own task: two initial frames (project list and
//! the processing snapshot), then broadcast fan-out. A lagged client logs
//! and keeps going; a closed channel ends the stream.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures_util::stream::Stream;
use tokio::sync::broadcast::error::RecvError;

use pilot_mem_core::WorkerEvent;

use crate::AppState;

pub async fn stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();

    let projects = {
        let store = state.store.clone();
        tokio::task::spawn_blocking(move || store.get_all_projects())
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default()
    };
    let initial_load = WorkerEvent::InitialLoad { projects };
    let processing_status = WorkerEvent::ProcessingStatus {
        active: state.sessions.is_processing(),
        queue_depth: state.sessions.queue_depth().await,
    };

    let stream = async_stream::stream! {
        yield Ok(Event::default().data(initial_load.to_frame()));
        yield Ok(Event::default().data(processing_status.to_frame()));
        loop {
            match rx.recv().await {
                Ok(event) => yield Ok(Event::default().data(event.to_frame())),
                Err(RecvError::Lagged(n)) => {
                    tracing::warn!("SSE client lagged by {} events", n);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };
    Sse::new(stream)
}
