use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use duet_types::api::{LoginRequest, LoginResponse, UploadResponse};
use duet_types::companion::{CompanionReply, CompanionRequest};
use duet_types::events::{GatewayCommand, GatewayEvent};
use duet_types::{NewRow, Portal, Row, Table};

use super::{Backend, Feed};
use crate::error::{Result, SyncError};

/// Identify, Ready, Subscribe and its acknowledgment must all fit in this window.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Backend reached over HTTP, with row-insert feeds over the WebSocket gateway.
#[derive(Clone)]
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
    token: String,
    portal: Portal,
}

impl RemoteBackend {
    /// Pass the password gate and keep the issued session token.
    pub async fn login(base_url: &str, password: &str) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/api/auth/login", base_url))
            .json(&LoginRequest {
                password: password.to_string(),
            })
            .send()
            .await?;
        let login: LoginResponse = check(response)?.json().await?;

        info!("Logged in to {} as {} portal", base_url, login.portal);
        Ok(Self {
            client,
            base_url,
            token: login.token,
            portal: login.portal,
        })
    }

    pub fn portal(&self) -> Portal {
        self.portal
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn gateway_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/gateway", ws_base)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Identify, wait for Ready, subscribe to `table` and wait for the ack.
    /// Rows that arrive before the ack are returned so they are not lost.
    async fn handshake(&self, ws: &mut Socket, table: Table) -> Result<Vec<Row>> {
        send_command(
            ws,
            &GatewayCommand::Identify {
                token: self.token.clone(),
            },
        )
        .await?;

        match next_event(ws).await? {
            Some(GatewayEvent::Ready { portal }) => debug!("Gateway ready for {} portal", portal),
            Some(other) => {
                return Err(SyncError::Gateway(format!("expected Ready, got {:?}", other)));
            }
            None => return Err(SyncError::Gateway("closed before Ready".into())),
        }

        send_command(
            ws,
            &GatewayCommand::Subscribe {
                tables: vec![table],
            },
        )
        .await?;

        let mut early = Vec::new();
        loop {
            match next_event(ws).await? {
                Some(GatewayEvent::Subscribed { .. }) => return Ok(early),
                Some(GatewayEvent::RowInserted { row }) if row.table() == table => early.push(row),
                Some(_) => {}
                None => return Err(SyncError::Gateway("closed before Subscribed".into())),
            }
        }
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    async fn select(&self, table: Table, limit: u32) -> Result<Vec<Row>> {
        let response = self
            .client
            .get(self.url(&format!("/api/rows/{}", table)))
            .query(&[("limit", limit)])
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await?;
        Ok(check(response)?.json().await?)
    }

    async fn insert(&self, row: NewRow) -> Result<Row> {
        let response = self
            .client
            .post(self.url("/api/rows"))
            .header(AUTHORIZATION, self.bearer())
            .json(&row)
            .send()
            .await?;
        Ok(check(response)?.json().await?)
    }

    async fn listen(&self, table: Table) -> Result<Feed> {
        let (mut ws, _) = connect_async(self.gateway_url()).await?;

        let early = tokio::time::timeout(HANDSHAKE_TIMEOUT, self.handshake(&mut ws, table))
            .await
            .map_err(|_| SyncError::Gateway("handshake timed out".into()))??;

        let (tx, feed) = Feed::channel();
        for row in early {
            let _ = tx.send(row);
        }

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    msg = ws.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<GatewayEvent>(&text) {
                                Ok(GatewayEvent::RowInserted { row }) if row.table() == table => {
                                    if tx.send(row).is_err() {
                                        break;
                                    }
                                }
                                Ok(_) => {}
                                Err(e) => warn!("Undecodable gateway event: {}", e),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Gateway feed for {} failed: {}", table, e);
                            break;
                        }
                    },
                }
            }
            let _ = ws.close(None).await;
            debug!("Gateway feed for {} closed", table);
        });

        Ok(feed)
    }

    async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<String> {
        let response = self
            .client
            .put(self.url(&format!("/storage/memories/{}", name)))
            .header(AUTHORIZATION, self.bearer())
            .body(bytes)
            .send()
            .await?;
        let upload: UploadResponse = check(response)?.json().await?;
        Ok(upload.public_url)
    }

    async fn companion(&self, req: &CompanionRequest) -> Result<CompanionReply> {
        let response = self
            .client
            .post(self.url("/api/companion"))
            .header(AUTHORIZATION, self.bearer())
            .json(req)
            .send()
            .await?;

        // A failed model call still carries the fallback reply in a 500 body
        if response.status() == StatusCode::INTERNAL_SERVER_ERROR {
            return match response.json::<CompanionReply>().await {
                Ok(reply) => {
                    debug!("Companion answered with its fallback reply");
                    Ok(reply)
                }
                Err(_) => Err(SyncError::Status(500)),
            };
        }
        Ok(check(response)?.json().await?)
    }
}

fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SyncError::Status(status.as_u16()))
    }
}

async fn send_command(ws: &mut Socket, cmd: &GatewayCommand) -> Result<()> {
    let text = serde_json::to_string(cmd)?;
    ws.send(Message::Text(text.into())).await?;
    Ok(())
}

/// Next decoded event, skipping pings and other control frames.
async fn next_event(ws: &mut Socket) -> Result<Option<GatewayEvent>> {
    while let Some(msg) = ws.next().await {
        match msg? {
            Message::Text(text) => return Ok(Some(serde_json::from_str(&text)?)),
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }
    Ok(None)
}
