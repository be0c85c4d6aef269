use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    reminders::{
        dispatch::Delivery,
        dto::UpdateAlertSettings,
        types::{AlertSettings, EmailLog, NotificationItem, NotificationKind, PushPermission, Recipient},
    },
    state::AppState,
};

pub fn notification_routes() -> Router<AppState> {
    Router::new().route(
        "/notifications/current",
        get(current_notification).delete(dismiss_notification),
    )
}

pub fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/alerts/settings", get(get_settings).put(update_settings))
        .route("/alerts/emails", get(email_history))
        .route("/alerts/history", delete(reset_history))
        .route("/alerts/test", post(test_alert))
}

#[instrument(skip(state))]
pub async fn current_notification(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Json<Option<NotificationItem>> {
    Json(state.reminders.inbox().current(user_id, state.clock.now()).await)
}

#[instrument(skip(state))]
pub async fn dismiss_notification(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> StatusCode {
    state.reminders.inbox().dismiss(user_id).await;
    StatusCode::NO_CONTENT
}

#[instrument(skip(state))]
pub async fn get_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<AlertSettings>, (StatusCode, String)> {
    let settings = state
        .reminders
        .store()
        .settings(user_id)
        .await
        .map_err(internal)?;
    Ok(Json(settings))
}

#[instrument(skip(state, payload))]
pub async fn update_settings(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateAlertSettings>,
) -> Result<Json<AlertSettings>, (StatusCode, String)> {
    let store = state.reminders.store();
    let mut settings = store.settings(user_id).await.map_err(internal)?;
    let now = state.clock.now();
    let inbox = state.reminders.inbox();

    if let Some(enabled) = payload.email_enabled {
        settings.email_enabled = enabled;
        let text = format!(
            "Email notifications {}",
            if enabled { "enabled" } else { "disabled" }
        );
        inbox.publish(user_id, text, NotificationKind::Info, now).await;
    }

    if let Some(permission) = payload.push_permission {
        if permission == PushPermission::Granted && state.config.push_webhook_url.is_none() {
            inbox
                .publish(
                    user_id,
                    "Push notifications are not supported on this server.",
                    NotificationKind::Warning,
                    now,
                )
                .await;
            return Err((
                StatusCode::BAD_REQUEST,
                "Push notifications are not configured".into(),
            ));
        }
        settings.push_permission = permission;
        let (text, kind) = match permission {
            PushPermission::Granted => ("Push notifications enabled!", NotificationKind::Success),
            _ => ("Notifications blocked.", NotificationKind::Warning),
        };
        inbox.publish(user_id, text, kind, now).await;
    }

    if let Some(mail) = payload.mail {
        settings.mail = mail;
    }

    store
        .save_settings(user_id, &settings)
        .await
        .map_err(internal)?;
    info!(
        user_id = %user_id,
        email_enabled = settings.email_enabled,
        push = settings.push_permission.as_str(),
        "alert settings updated"
    );
    Ok(Json(settings))
}

#[instrument(skip(state))]
pub async fn email_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<EmailLog>>, (StatusCode, String)> {
    let log = state
        .reminders
        .store()
        .email_log(user_id)
        .await
        .map_err(internal)?;
    Ok(Json(log))
}

#[instrument(skip(state))]
pub async fn reset_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .reminders
        .clear_history(user_id)
        .await
        .map_err(internal)?;
    state
        .reminders
        .inbox()
        .publish(
            user_id,
            "Alert & Email history cleared.",
            NotificationKind::Success,
            state.clock.now(),
        )
        .await;
    info!(user_id = %user_id, "alert history cleared");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn test_alert(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Delivery>, (StatusCode, String)> {
    let recipient = load_recipient(&state, user_id).await?;
    let settings = state
        .reminders
        .store()
        .settings(user_id)
        .await
        .map_err(internal)?;
    let delivery = state
        .reminders
        .dispatcher()
        .test_alert(&recipient, &settings, state.clock.now())
        .await;
    Ok(Json(delivery))
}

async fn load_recipient(state: &AppState, user_id: Uuid) -> Result<Recipient, (StatusCode, String)> {
    state
        .reminders
        .store()
        .recipient(user_id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::UNAUTHORIZED, "User not found".into()))
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    error!(error = %e, "reminder request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{header, Method, Request},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::{
        app::build_app,
        auth::tokens::{JwtKeys, TokenKind},
    };

    async fn call(
        state: &AppState,
        user_id: Uuid,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let token = JwtKeys::from_ref(state)
            .sign(user_id, TokenKind::Access, state.clock.now())
            .unwrap();
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(match body {
                Some(v) => Body::from(v.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let res = build_app(state.clone()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn toggling_email_updates_settings_and_notifies() {
        let state = AppState::fake();
        let user = Uuid::new_v4();

        let (status, body) = call(
            &state,
            user,
            Method::PUT,
            "/api/v1/alerts/settings",
            Some(serde_json::json!({ "email_enabled": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["email_enabled"], false);
        assert_eq!(body["provider"], "simple");

        let (_, note) = call(&state, user, Method::GET, "/api/v1/notifications/current", None).await;
        assert_eq!(note["message"], "Email notifications disabled");
        assert_eq!(note["type"], "info");

        let (status, _) = call(&state, user, Method::DELETE, "/api/v1/notifications/current", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, note) = call(&state, user, Method::GET, "/api/v1/notifications/current", None).await;
        assert!(note.is_null());
    }

    #[tokio::test]
    async fn granting_push_without_a_channel_is_rejected() {
        let state = AppState::fake();
        let user = Uuid::new_v4();
        let (status, _) = call(
            &state,
            user,
            Method::PUT,
            "/api/v1/alerts/settings",
            Some(serde_json::json!({ "push_permission": "granted" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, settings) = call(&state, user, Method::GET, "/api/v1/alerts/settings", None).await;
        assert_eq!(settings["push_permission"], "unknown");
    }

    #[tokio::test]
    async fn reset_clears_history_and_confirms() {
        let state = AppState::fake();
        let user = Uuid::new_v4();
        let (status, _) = call(&state, user, Method::DELETE, "/api/v1/alerts/history", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (_, log) = call(&state, user, Method::GET, "/api/v1/alerts/emails", None).await;
        assert_eq!(log, serde_json::json!([]));
        let (_, note) = call(&state, user, Method::GET, "/api/v1/notifications/current", None).await;
        assert_eq!(note["message"], "Alert & Email history cleared.");
    }

    #[tokio::test]
    async fn test_alert_needs_a_known_user() {
        let state = AppState::fake();
        let (status, _) = call(&state, Uuid::new_v4(), Method::POST, "/api/v1/alerts/test", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
