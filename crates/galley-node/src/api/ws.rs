//! WebSocket endpoints.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use galley_core::OrderId;
use galley_orders::{EventFilter, OrderEvent};
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

use crate::state::AppState;

/// Message sent on an order stream.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderStreamMessage {
    /// Sent once after the upgrade.
    Connected { order_id: OrderId },
    /// A committed change to one of the order's items.
    Event { event: OrderEvent },
    /// The receiver fell behind and missed this many events.
    Lagged { missed: u64 },
}

/// Live events of one order.
pub async fn order_stream(
    ws: WebSocketUpgrade,
    Path(order_id): Path<OrderId>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_order_stream(socket, order_id, state))
}

fn encode(msg: &OrderStreamMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            warn!(error = %e, "Failed to encode stream message");
            None
        }
    }
}

async fn handle_order_stream(socket: WebSocket, order_id: OrderId, state: AppState) {
    let events = BroadcastStream::new(state.orders.events().subscribe());
    let (mut sender, receiver) = socket.split();

    if let Some(msg) = encode(&OrderStreamMessage::Connected { order_id }) {
        if sender.send(msg).await.is_err() {
            return;
        }
    }
    debug!(order_id = %order_id, "Order stream connected");

    forward_order_events(order_id, events, sender, receiver).await;
    debug!(order_id = %order_id, "Order stream closed");
}

/// Relay the order's events until the client leaves or the socket fails.
async fn forward_order_events<Tx, Rx, E>(
    order_id: OrderId,
    mut events: BroadcastStream<OrderEvent>,
    mut sender: Tx,
    mut receiver: Rx,
) where
    Tx: Sink<Message> + Unpin,
    Rx: Stream<Item = Result<Message, E>> + Unpin,
{
    let filter = EventFilter::order(order_id);
    loop {
        tokio::select! {
            next = events.next() => {
                let msg = match next {
                    Some(Ok(event)) if filter.matches(&event) => OrderStreamMessage::Event { event },
                    Some(Ok(_)) => continue,
                    Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                        OrderStreamMessage::Lagged { missed }
                    }
                    None => break,
                };
                let Some(msg) = encode(&msg) else { continue };
                if sender.send(msg).await.is_err() {
                    break;
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}
