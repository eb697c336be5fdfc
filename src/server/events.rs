use std::convert::Infallible;

use axum::{
    extract::State,
    http::{header, HeaderName},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
};
use futures::StreamExt;

use super::metrics;
use crate::notifier::ChangeNotifier;

const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// `GET /events`: one subscription session per connection.
///
/// Frames are plain `data:` lines with no event names or keep-alive comments.
/// When the client goes away axum drops the body stream, which drops the
/// session along with any pending sleep or store read.
pub async fn stream_events(State(notifier): State<ChangeNotifier>) -> impl IntoResponse {
    let session = notifier.open_session();
    let events = session.into_stream().map(|event| {
        metrics::record_event_sent(event.kind());
        Ok::<_, Infallible>(Event::default().data(event.payload()))
    });

    (
        [
            (header::CONNECTION, "keep-alive"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Sse::new(events),
    )
}
