use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::{debug, error, warn};

use duet_types::api::Claims;
use duet_types::{NewRow, Row, Table};

use crate::auth::AppState;

/// Rows returned when no limit is given: the current value.
const DEFAULT_LIMIT: u32 = 1;
const MAX_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct RowsQuery {
    pub limit: Option<u32>,
}

/// GET /api/rows/{table}?limit=N
pub async fn list_rows(
    State(state): State<AppState>,
    Path(table): Path<Table>,
    Query(query): Query<RowsQuery>,
) -> Result<Json<Vec<Row>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let db = state.clone();
    let rows = tokio::task::spawn_blocking(move || db.db.select(table, limit))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("DB select error on {}: {}", table, e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok(Json(rows))
}

/// POST /api/rows: append a row and notify every subscribed gateway connection.
pub async fn insert_row(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(new): Json<NewRow>,
) -> Result<impl IntoResponse, StatusCode> {
    check_new_row(&claims, &new)?;

    let db = state.clone();
    let row = tokio::task::spawn_blocking(move || db.db.insert(&new))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .map_err(|e| {
            error!("DB insert error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    debug!("{} portal inserted {} seq {}", claims.sub, row.table(), row.seq());
    state.dispatcher.publish_row(row.clone());

    Ok((StatusCode::CREATED, Json(row)))
}

/// Reject blank payloads and pings sent under the other portal's tag.
fn check_new_row(claims: &Claims, new: &NewRow) -> Result<(), StatusCode> {
    let blank = |s: &str| s.trim().is_empty();

    match new {
        NewRow::MoodLogs { .. } => Ok(()),
        NewRow::DailyQuotes { quote_text, .. } if blank(quote_text) => Err(StatusCode::BAD_REQUEST),
        NewRow::DailyQuotes { .. } => Ok(()),
        NewRow::Memories {
            image_url, caption, ..
        } if blank(image_url) || blank(caption) => Err(StatusCode::BAD_REQUEST),
        NewRow::Memories { .. } => Ok(()),
        NewRow::SecureMessages { message } if blank(message) => Err(StatusCode::BAD_REQUEST),
        NewRow::SecureMessages { .. } => Ok(()),
        NewRow::Interactions { sender, .. } if blank(sender) => Err(StatusCode::BAD_REQUEST),
        NewRow::Interactions {
            interaction_type, ..
        } => {
            if *interaction_type == claims.sub.outgoing_ping() {
                Ok(())
            } else {
                warn!("{} portal tried to send {}", claims.sub, interaction_type.as_str());
                Err(StatusCode::FORBIDDEN)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::Request,
        routing::{get, post},
    };
    use tower::ServiceExt;

    use duet_types::events::GatewayEvent;
    use duet_types::{InteractionKind, MoodId, Portal};

    use super::*;
    use crate::test_support::test_state;

    fn claims(portal: Portal) -> Claims {
        Claims { sub: portal, exp: usize::MAX }
    }

    fn app(state: AppState, portal: Portal) -> Router {
        Router::new()
            .route("/api/rows/{table}", get(list_rows))
            .route("/api/rows", post(insert_row))
            .layer(Extension(claims(portal)))
            .with_state(state)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::post("/api/rows")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[test]
    fn blank_payloads_are_rejected() {
        let c = claims(Portal::Girlfriend);
        let blank_message = NewRow::SecureMessages { message: "  \n".into() };
        assert_eq!(check_new_row(&c, &blank_message), Err(StatusCode::BAD_REQUEST));

        let blank_quote = NewRow::DailyQuotes {
            quote_text: "".into(),
            author: "Boss".into(),
        };
        assert_eq!(check_new_row(&c, &blank_quote), Err(StatusCode::BAD_REQUEST));

        let mood = NewRow::MoodLogs { mood_id: MoodId::Critical };
        assert_eq!(check_new_row(&c, &mood), Ok(()));
    }

    #[test]
    fn pings_must_carry_own_portal_tag() {
        let c = claims(Portal::Boyfriend);
        let own = NewRow::Interactions {
            interaction_type: InteractionKind::BoyfriendPing,
            sender: "SYS_ADMIN".into(),
        };
        let spoofed = NewRow::Interactions {
            interaction_type: InteractionKind::GirlfriendPing,
            sender: "SYS_ADMIN".into(),
        };
        assert_eq!(check_new_row(&c, &own), Ok(()));
        assert_eq!(check_new_row(&c, &spoofed), Err(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn insert_returns_stored_row_and_notifies() {
        let (state, _dir) = test_state().await;
        let mut events = state.dispatcher.subscribe();

        let res = app(state.clone(), Portal::Girlfriend)
            .oneshot(post_json(r#"{"table":"mood_logs","mood_id":"LOW POWER"}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);

        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let row: Row = serde_json::from_slice(&body).unwrap();
        assert_eq!(row.table(), Table::MoodLogs);

        match events.recv().await.unwrap() {
            GatewayEvent::RowInserted { row: echoed } => assert_eq!(echoed, row),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn blank_secure_message_inserts_nothing() {
        let (state, _dir) = test_state().await;

        let res = app(state.clone(), Portal::Boyfriend)
            .oneshot(post_json(r#"{"table":"secure_messages","message":"   "}"#))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(state.db.select(Table::SecureMessages, 10).unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_defaults_to_latest_and_clamps_limit() {
        let (state, _dir) = test_state().await;
        for mood in MoodId::ALL {
            state.db.insert(&NewRow::MoodLogs { mood_id: mood }).unwrap();
        }

        let res = app(state.clone(), Portal::Girlfriend)
            .oneshot(Request::get("/api/rows/mood_logs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let rows: Vec<Row> = serde_json::from_slice(&body).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].seq(), 5);

        let res = app(state, Portal::Girlfriend)
            .oneshot(
                Request::get("/api/rows/mood_logs?limit=500")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let rows: Vec<Row> = serde_json::from_slice(&body).unwrap();
        assert_eq!(rows.len(), 5);
    }

    #[tokio::test]
    async fn unknown_table_is_bad_request() {
        let (state, _dir) = test_state().await;
        let res = app(state, Portal::Girlfriend)
            .oneshot(Request::get("/api/rows/users").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
}
