use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use duet_types::{Portal, Table};
use duet_types::events::{GatewayCommand, GatewayEvent};

use crate::dispatcher::Dispatcher;
use crate::session::verify_token;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket has to send `Identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

type Subscriptions = Arc<RwLock<HashSet<Table>>>;

/// Handle a single WebSocket connection: Identify handshake, Ready, then the event loop.
pub async fn handle_connection(socket: WebSocket, dispatcher: Dispatcher, jwt_secret: String) {
    let (mut sender, mut receiver) = socket.split();

    let portal = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(portal) => portal,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} portal connected to gateway", portal);

    if !send_event(&mut sender, &GatewayEvent::Ready { portal }).await {
        return;
    }

    // Tell the newcomer who is already here before announcing itself
    for online in dispatcher.online_portals().await {
        let event = GatewayEvent::PresenceUpdate {
            portal: online,
            online: true,
        };
        if !send_event(&mut sender, &event).await {
            return;
        }
    }

    run_connection_loop(sender, receiver, dispatcher, portal).await;
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    dispatcher: Dispatcher,
    portal: Portal,
) {
    // Subscribe before going online so this connection sees its own presence event
    let mut broadcast_rx = dispatcher.subscribe();
    let conn_id = dispatcher.connect(portal).await;

    // Per-connection table subscriptions (shared between send and recv tasks).
    let subscriptions: Subscriptions = Arc::new(RwLock::new(HashSet::new()));
    let send_subscriptions = subscriptions.clone();

    // Direct replies from the recv task to this client only
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<GatewayEvent>();

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward broadcasts -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = broadcast_rx.recv() => {
                    let event = match route(result, &send_subscriptions) {
                        Route::Forward(event) => event,
                        Route::Skip => continue,
                        Route::Close => break,
                    };
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                reply = reply_rx.recv() => {
                    let Some(event) = reply else { break };
                    if !send_event(&mut sender, &event).await {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let recv_subscriptions = subscriptions.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<GatewayCommand>(&text) {
                    Ok(cmd) => {
                        if let Some(reply) = handle_command(portal, cmd, &recv_subscriptions) {
                            if reply_tx.send(reply).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            "{} portal bad command: {} -- raw: {}",
                            portal,
                            e,
                            text.chars().take(200).collect::<String>()
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    dispatcher.disconnect(portal, conn_id).await;
    info!("{} portal disconnected from gateway", portal);
}

async fn wait_for_identify(
    receiver: &mut SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<Portal> {
    let identify = async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(GatewayCommand::Identify { token }) =
                    serde_json::from_str::<GatewayCommand>(&text)
                {
                    return verify_token(jwt_secret, &token).map(|claims| claims.sub);
                }
            }
        }
        None
    };

    tokio::time::timeout(IDENTIFY_TIMEOUT, identify)
        .await
        .ok()
        .flatten()
}

/// Apply a client command. Returns the reply to send back, if any.
fn handle_command(
    portal: Portal,
    cmd: GatewayCommand,
    subscriptions: &Subscriptions,
) -> Option<GatewayEvent> {
    match cmd {
        GatewayCommand::Identify { .. } => None, // Already handled

        GatewayCommand::Subscribe { tables } => {
            debug!("{} portal subscribing to {:?}", portal, tables);
            {
                let mut subs = subscriptions
                    .write()
                    .unwrap_or_else(PoisonError::into_inner);
                *subs = tables.iter().copied().collect();
            }
            Some(GatewayEvent::Subscribed { tables })
        }
    }
}

enum Route {
    Forward(GatewayEvent),
    Skip,
    Close,
}

/// Decide what to do with the next broadcast for this connection.
///
/// A lagged receiver has lost rows, so the connection is closed: the client
/// reconnects and takes a fresh snapshot instead of living with the gap.
fn route(result: Result<GatewayEvent, RecvError>, subscriptions: &Subscriptions) -> Route {
    let event = match result {
        Ok(event) => event,
        Err(RecvError::Lagged(n)) => {
            warn!("Broadcast receiver lagged by {} events, closing connection", n);
            return Route::Close;
        }
        Err(RecvError::Closed) => return Route::Close,
    };

    if let Some(table) = event.table() {
        let subscribed = subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&table);
        if !subscribed {
            return Route::Skip;
        }
    }
    Route::Forward(event)
}

/// Serialize and send one event. Returns false once the socket is gone.
async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &GatewayEvent) -> bool {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!("Failed to encode gateway event: {}", e);
            return true;
        }
    };
    sender.send(Message::Text(text.into())).await.is_ok()
}
