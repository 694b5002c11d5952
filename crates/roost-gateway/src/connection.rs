//! Per-connection WebSocket task.
//!
//! Each live connection is serviced by one task pair: a send loop draining
//! the registry queue into the socket, and a read loop routing inbound chat
//! frames through the fan-out. The owning task is the only actor that ever
//! unregisters the connection, and does so as its terminal step.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tracing::{error, info, warn};

use roost_types::envelope::OutboundChat;

use crate::fanout::Fanout;

/// Drive a pre-authenticated socket for `identity` until it closes.
pub async fn handle_socket(socket: WebSocket, fanout: Fanout, identity: String) {
    let presence = fanout.presence().clone();
    let (mut sink, mut stream) = socket.split();

    let (conn_id, mut outbound) = presence.register(&identity).await;
    info!("{identity} is now online");
    fanout.presence_changed(&identity, true).await;

    // Send loop: registry queue -> socket. Ends when the queue closes (this
    // connection was replaced) or the socket rejects a write.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    warn!("dropping unserializable event: {e}");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Read loop: inbound chat frames -> fan-out. A read error, a close frame
    // or a malformed frame ends the connection.
    let read_fanout = fanout.clone();
    let read_identity = identity.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            let text = match frame {
                Message::Text(text) => text,
                Message::Close(_) => break,
                // Pings are answered by axum; other frames carry no chat
                _ => continue,
            };

            let chat: OutboundChat = match serde_json::from_str(&text) {
                Ok(chat) => chat,
                Err(e) => {
                    warn!("{read_identity} sent a malformed frame, closing: {e}");
                    break;
                }
            };

            // A durable failure must not kill the connection; the sender
            // simply keeps its session while the message is lost loudly.
            if let Err(e) = read_fanout.send_chat(&read_identity, chat).await {
                error!("message append failed for {read_identity}: {e}");
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => read_task.abort(),
        _ = &mut read_task => send_task.abort(),
    }

    // Terminal step of the lifecycle: unregister only while still owning the
    // registry entry, then tell online friends. A replaced connection owns
    // nothing and stays silent, since the successor is still online.
    if presence.unregister(&identity, conn_id).await {
        info!("{identity} is now offline");
        fanout.presence_changed(&identity, false).await;
    }
}
