use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::chat_bridge::ChatBridge,
    state::session::ConversationId,
};

/// Subscribe to a conversation stream and greet the new subscriber.
pub fn subscribe_conversation(
    bridge: &ChatBridge,
    conversation_id: ConversationId,
) -> broadcast::Receiver<ServerEvent> {
    let receiver = bridge.subscribe(conversation_id);
    if let Ok(event) = ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            conversation_id,
            message: "conversation stream connected".to_string(),
        },
    ) {
        bridge.publish(conversation_id, event);
    }
    receiver
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// releasing the conversation hub once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    bridge: Arc<ChatBridge>,
    conversation_id: ConversationId,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(
                                conversation_id,
                                skipped,
                                "conversation stream lagged; messages skipped"
                            );
                            continue;
                        }
                    }
                }
            }
        }

        drop(receiver);
        bridge.release(conversation_id);
        info!(conversation_id, "conversation SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
