use axum::{
    Form, Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;

use crate::error::AppError;
use crate::handlers::response::BoundaryResponse;
use crate::services::{Outcome, Resolution};
use crate::state::AppState;

// === リセットリクエスト ===

#[derive(Debug, Deserialize)]
pub struct ResetRequestRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotFormQuery {
    pub email: Option<String>,
}

/// GET /forgot-password
///
/// interactive モードのみ登録される
pub async fn show_forgot_form(
    State(state): State<AppState>,
    Query(query): Query<ForgotFormQuery>,
) -> BoundaryResponse {
    state.router.forgot_form(query.email.as_deref())
}

/// POST /forgot-password（フォーム）
pub async fn request_reset_form(
    State(state): State<AppState>,
    Form(request): Form<ResetRequestRequest>,
) -> Result<BoundaryResponse, AppError> {
    request_reset(&state, &request).await
}

/// POST /rest/forgot-password（JSON）
pub async fn request_reset_json(
    State(state): State<AppState>,
    Json(request): Json<ResetRequestRequest>,
) -> Result<BoundaryResponse, AppError> {
    request_reset(&state, &request).await
}

async fn request_reset(
    state: &AppState,
    request: &ResetRequestRequest,
) -> Result<BoundaryResponse, AppError> {
    let email = request.email.trim();
    let resolution = state.password_reset_service.request_reset(email).await?;
    let visible = visible_outcome(&resolution, state.config.reveal_account_existence);
    Ok(state.router.respond(&resolution, visible))
}

/// アカウント列挙対策
///
/// 存在を明かさない設定の場合、`AccountNotFound` を送信成功として見せる
fn visible_outcome(resolution: &Resolution, reveal_account_existence: bool) -> Outcome {
    match resolution.outcome {
        Outcome::AccountNotFound if !reveal_account_existence => Outcome::ResetRequested,
        outcome => outcome,
    }
}

// === トークン検査 ===

/// GET /forgot-password/{token}
pub async fn inspect_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<BoundaryResponse, AppError> {
    let resolution = state.password_reset_service.inspect_token(&token).await?;
    Ok(state.router.respond(&resolution, resolution.outcome))
}

// === パスワードリセット実行 ===

#[derive(Debug, Deserialize)]
pub struct NewPasswordRequest {
    #[serde(default)]
    pub password: String,
}

/// POST /forgot-password/{token}（フォーム）
///
/// # Security
/// - token, password はログに出力しない
pub async fn consume_token_form(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Form(request): Form<NewPasswordRequest>,
) -> Result<BoundaryResponse, AppError> {
    consume_token(&state, &token, &request).await
}

/// POST /rest/forgot-password/{token}（JSON）
pub async fn consume_token_json(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(request): Json<NewPasswordRequest>,
) -> Result<BoundaryResponse, AppError> {
    consume_token(&state, &token, &request).await
}

async fn consume_token(
    state: &AppState,
    token: &str,
    request: &NewPasswordRequest,
) -> Result<BoundaryResponse, AppError> {
    let resolution = state
        .password_reset_service
        .consume_token(token, &request.password)
        .await?;
    Ok(state.router.respond(&resolution, resolution.outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::http::StatusCode;

    use crate::config::Config;
    use crate::handlers::response::tests::RecordingObserver;
    use crate::handlers::response::{ResponseRouter, ViewNames};
    use crate::models::AccountRecord;
    use crate::repositories::MemoryAccountStore;
    use crate::services::{CredentialHasher, PasswordResetService};
    use crate::services::password_reset::tests::{RecordingNotifier, cheap_hasher, policy};

    struct Harness {
        state: AppState,
        notifier: Arc<RecordingNotifier>,
        observer: Arc<RecordingObserver>,
    }

    async fn harness(pairs: &[(&str, &str)]) -> Harness {
        let vars = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string()));
        let config = Arc::new(Config::from_vars(vars).unwrap());

        let hasher = cheap_hasher();
        let old = hasher.hash("oldpass", None).unwrap();
        let store = Arc::new(MemoryAccountStore::new());
        store
            .insert(AccountRecord::new("a@x.com", old.hash, old.salt))
            .await;

        let notifier = Arc::new(RecordingNotifier::default());
        let observer = Arc::new(RecordingObserver::default());
        let service = PasswordResetService::new(store, notifier.clone(), hasher, policy());
        let router = ResponseRouter::new(
            config.response_mode,
            ViewNames::from_config(&config),
            observer.clone(),
        );

        Harness {
            state: AppState::from_parts(config, service, router),
            notifier,
            observer,
        }
    }

    fn reset_request(email: &str) -> Json<ResetRequestRequest> {
        Json(ResetRequestRequest {
            email: email.to_string(),
        })
    }

    #[test]
    fn test_visible_outcome_masks_only_account_not_found() {
        let missing = Resolution::new(Outcome::AccountNotFound);
        assert_eq!(visible_outcome(&missing, false), Outcome::ResetRequested);
        assert_eq!(visible_outcome(&missing, true), Outcome::AccountNotFound);

        let blocked = Resolution::new(Outcome::AccountInvalid);
        assert_eq!(visible_outcome(&blocked, false), Outcome::AccountInvalid);
    }

    #[tokio::test]
    async fn test_missing_account_masked_by_default() {
        let h = harness(&[]).await;
        let response = request_reset_json(State(h.state.clone()), reset_request("missing@x.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let events = h.observer.events.lock().unwrap();
        assert_eq!(events[0].outcome, Outcome::AccountNotFound);
    }

    #[tokio::test]
    async fn test_missing_account_revealed_when_configured() {
        let h = harness(&[("REVEAL_ACCOUNT_EXISTENCE", "true")]).await;
        let response = request_reset_json(State(h.state.clone()), reset_request("missing@x.com"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_rest_full_flow() {
        let h = harness(&[]).await;
        let response = request_reset_json(State(h.state.clone()), reset_request(" a@x.com "))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let token = h.notifier.last_token().unwrap();

        let response = inspect_token(State(h.state.clone()), Path(token.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = consume_token_json(
            State(h.state.clone()),
            Path(token.clone()),
            Json(NewPasswordRequest {
                password: String::new(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = consume_token_json(
            State(h.state.clone()),
            Path(token.clone()),
            Json(NewPasswordRequest {
                password: "newpass".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = inspect_token(State(h.state.clone()), Path(token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let names: Vec<&str> = h
            .observer
            .events
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.name())
            .collect();
        assert_eq!(
            names,
            [
                "forgot::sent",
                "forgot::valid",
                "forgot::invalid_credential",
                "forgot::success",
                "forgot::not_found",
            ]
        );
    }

    #[tokio::test]
    async fn test_interactive_form_flow() {
        let h = harness(&[("RESPONSE_MODE", "interactive")]).await;
        let response = request_reset_form(
            State(h.state.clone()),
            Form(ResetRequestRequest {
                email: "a@x.com".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(matches!(
            &response,
            BoundaryResponse::View { view, .. } if view == "post-forgot-password"
        ));

        let token = h.notifier.last_token().unwrap();
        let response = consume_token_form(
            State(h.state.clone()),
            Path(token),
            Form(NewPasswordRequest {
                password: "newpass".to_string(),
            }),
        )
        .await
        .unwrap();
        assert!(matches!(
            &response,
            BoundaryResponse::View { view, .. } if view == "change-password-success"
        ));
    }
}
