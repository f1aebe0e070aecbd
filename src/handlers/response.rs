use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::{Config, ResponseMode};
use crate::services::{LifecycleEvent, Outcome, ResetObserver, Resolution};

/// interactive モードのビュー名
#[derive(Debug, Clone)]
pub struct ViewNames {
    pub forgot_password: String,
    pub sent_email: String,
    pub resend_verification: String,
    pub link_expired: String,
    pub new_password: String,
    pub changed_password: String,
    pub not_found: String,
}

impl ViewNames {
    pub fn from_config(config: &Config) -> Self {
        Self {
            forgot_password: config.view_forgot_password.clone(),
            sent_email: config.view_sent_email.clone(),
            resend_verification: config.view_resend_verification.clone(),
            link_expired: config.view_link_expired.clone(),
            new_password: config.view_new_password.clone(),
            changed_password: config.view_changed_password.clone(),
            not_found: config.view_not_found.clone(),
        }
    }
}

/// REST モードのエラーペイロード
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct RestPayload {
    pub error: String,
    pub reason: &'static str,
}

/// 境界レイヤーでの表現
#[derive(Debug)]
pub enum BoundaryResponse {
    /// ステータス + 構造化ペイロード（成功時はペイロードなし）
    Rest {
        status: StatusCode,
        payload: Option<RestPayload>,
    },
    /// ビュー名 + コンテキスト（描画指示）
    View {
        status: StatusCode,
        view: String,
        context: Map<String, Value>,
    },
}

impl BoundaryResponse {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Rest { status, .. } | Self::View { status, .. } => *status,
        }
    }
}

#[derive(Serialize)]
struct RenderInstruction<'a> {
    view: &'a str,
    context: &'a Map<String, Value>,
}

impl IntoResponse for BoundaryResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Rest {
                status,
                payload: Some(payload),
            } => (status, Json(payload)).into_response(),
            Self::Rest {
                status,
                payload: None,
            } => status.into_response(),
            Self::View {
                status,
                view,
                context,
            } => (
                status,
                Json(RenderInstruction {
                    view: &view,
                    context: &context,
                }),
            )
                .into_response(),
        }
    }
}

/// 結果ごとのユーザー向けメッセージ
fn message(outcome: Outcome) -> Option<&'static str> {
    match outcome {
        Outcome::ResetRequested | Outcome::Valid | Outcome::CredentialChanged => None,
        Outcome::InvalidEmail => Some("有効なメールアドレスを入力してください"),
        Outcome::AccountNotFound => Some("アカウントが存在しません"),
        Outcome::AccountInvalid => Some("このアカウントは無効です"),
        Outcome::EmailUnverified => Some("メールアドレスの確認が完了していません"),
        Outcome::NotificationFailed => {
            Some("メールサーバーに接続できませんでした。管理者に連絡してください")
        }
        Outcome::NotFound => Some("無効なリクエストです"),
        Outcome::Expired => Some("リンクの有効期限が切れています"),
        Outcome::InvalidCredential => Some("パスワードを入力してください"),
    }
}

/// 結果を境界レイヤーの表現に変換し、ライフサイクルイベントを通知する
///
/// アカウント存在有無を隠すかどうかは判断しない（呼び出し側が `visible` で指定）
#[derive(Clone)]
pub struct ResponseRouter {
    mode: ResponseMode,
    views: Arc<ViewNames>,
    observer: Arc<dyn ResetObserver>,
}

impl ResponseRouter {
    pub fn new(mode: ResponseMode, views: ViewNames, observer: Arc<dyn ResetObserver>) -> Self {
        Self {
            mode,
            views: Arc::new(views),
            observer,
        }
    }

    pub fn mode(&self) -> ResponseMode {
        self.mode
    }

    /// `resolution` のイベントを1回通知し、`visible` の結果を表現する
    pub fn respond(&self, resolution: &Resolution, visible: Outcome) -> BoundaryResponse {
        self.observer.on_event(&LifecycleEvent::from(resolution));

        match self.mode {
            ResponseMode::Rest => rest_response(visible),
            ResponseMode::Interactive => self.view_response(resolution, visible),
        }
    }

    /// パスワード忘れフォーム（interactive モードのみ）
    pub fn forgot_form(&self, email: Option<&str>) -> BoundaryResponse {
        let mut context = Map::new();
        context.insert("title".to_string(), "パスワードをお忘れの方".into());
        if let Some(email) = email {
            context.insert("email".to_string(), email.into());
        }
        BoundaryResponse::View {
            status: StatusCode::OK,
            view: self.views.forgot_password.clone(),
            context,
        }
    }

    fn view_response(&self, resolution: &Resolution, visible: Outcome) -> BoundaryResponse {
        let views = &self.views;
        let (status, view, title) = match visible {
            Outcome::ResetRequested => (StatusCode::OK, &views.sent_email, "パスワードをお忘れの方"),
            Outcome::NotificationFailed => (
                StatusCode::BAD_GATEWAY,
                &views.sent_email,
                "パスワードをお忘れの方",
            ),
            Outcome::InvalidEmail | Outcome::AccountNotFound | Outcome::AccountInvalid => (
                StatusCode::FORBIDDEN,
                &views.forgot_password,
                "パスワードをお忘れの方",
            ),
            Outcome::EmailUnverified => (
                StatusCode::FORBIDDEN,
                &views.resend_verification,
                "確認メールの再送信",
            ),
            Outcome::NotFound => (StatusCode::NOT_FOUND, &views.not_found, "ページが見つかりません"),
            Outcome::Expired => (StatusCode::OK, &views.link_expired, "リンクの有効期限切れ"),
            Outcome::Valid => (StatusCode::OK, &views.new_password, "新しいパスワードの設定"),
            Outcome::InvalidCredential => (
                StatusCode::FORBIDDEN,
                &views.new_password,
                "新しいパスワードの設定",
            ),
            Outcome::CredentialChanged => {
                (StatusCode::OK, &views.changed_password, "パスワードを変更しました")
            }
        };

        let mut context = Map::new();
        context.insert("title".to_string(), title.into());
        if let Some(error) = message(visible) {
            context.insert("error".to_string(), error.into());
        }
        // フォームの再表示用
        if matches!(
            visible,
            Outcome::InvalidEmail
                | Outcome::AccountNotFound
                | Outcome::AccountInvalid
                | Outcome::EmailUnverified
        ) && let Some(email) = &resolution.email
        {
            context.insert("email".to_string(), email.as_str().into());
        }
        if matches!(visible, Outcome::Valid | Outcome::InvalidCredential)
            && let Some(token) = &resolution.token
        {
            context.insert("token".to_string(), token.as_str().into());
        }

        BoundaryResponse::View {
            status,
            view: view.clone(),
            context,
        }
    }
}

fn rest_response(visible: Outcome) -> BoundaryResponse {
    let status = match visible {
        Outcome::ResetRequested | Outcome::Valid | Outcome::CredentialChanged => {
            return BoundaryResponse::Rest {
                status: StatusCode::NO_CONTENT,
                payload: None,
            };
        }
        Outcome::NotFound => StatusCode::NOT_FOUND,
        Outcome::NotificationFailed => StatusCode::BAD_GATEWAY,
        Outcome::InvalidEmail
        | Outcome::AccountNotFound
        | Outcome::AccountInvalid
        | Outcome::EmailUnverified
        | Outcome::Expired
        | Outcome::InvalidCredential => StatusCode::FORBIDDEN,
    };

    BoundaryResponse::Rest {
        status,
        payload: message(visible).map(|error| RestPayload {
            error: error.to_string(),
            reason: visible.as_str(),
        }),
    }
}
