use serde::Serialize;
use uuid::Uuid;

/// リセット状態機械の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    ResetRequested,
    InvalidEmail,
    AccountNotFound,
    AccountInvalid,
    EmailUnverified,
    /// トークンは保存済みで有効なまま
    NotificationFailed,
    NotFound,
    Expired,
    Valid,
    InvalidCredential,
    CredentialChanged,
}

/// エラー分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// 再入力を促す
    Validation,
    /// 表示可否はポリシー次第
    NotFound,
    /// 常に表示（トークンはクリア済み）
    Expired,
    PolicyBlocked,
    Dependency,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ResetRequested => "reset_requested",
            Self::InvalidEmail => "invalid_email",
            Self::AccountNotFound => "account_not_found",
            Self::AccountInvalid => "account_invalid",
            Self::EmailUnverified => "email_unverified",
            Self::NotificationFailed => "notification_failed",
            Self::NotFound => "not_found",
            Self::Expired => "expired",
            Self::Valid => "valid",
            Self::InvalidCredential => "invalid_credential",
            Self::CredentialChanged => "credential_changed",
        }
    }

    /// 成功系の結果なら None
    pub fn error_class(self) -> Option<ErrorClass> {
        match self {
            Self::ResetRequested | Self::Valid | Self::CredentialChanged => None,
            Self::InvalidEmail | Self::InvalidCredential => Some(ErrorClass::Validation),
            Self::AccountNotFound | Self::NotFound => Some(ErrorClass::NotFound),
            Self::Expired => Some(ErrorClass::Expired),
            Self::AccountInvalid | Self::EmailUnverified => Some(ErrorClass::PolicyBlocked),
            Self::NotificationFailed => Some(ErrorClass::Dependency),
        }
    }

    /// ライフサイクルイベント名
    pub fn event_name(self) -> &'static str {
        match self {
            Self::ResetRequested => "forgot::sent",
            Self::NotificationFailed => "forgot::err",
            Self::CredentialChanged => "forgot::success",
            Self::InvalidEmail => "forgot::invalid_email",
            Self::AccountNotFound => "forgot::account_not_found",
            Self::AccountInvalid => "forgot::account_invalid",
            Self::EmailUnverified => "forgot::email_unverified",
            Self::NotFound => "forgot::not_found",
            Self::Expired => "forgot::expired",
            Self::Valid => "forgot::valid",
            Self::InvalidCredential => "forgot::invalid_credential",
        }
    }
}

/// 結果 + 境界レイヤー向けのコンテキスト
///
/// `token` は提示されたトークンのみ。新規発行したトークンは通知経由でしか渡さない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub outcome: Outcome,
    pub account_id: Option<Uuid>,
    pub email: Option<String>,
    pub token: Option<String>,
}

impl Resolution {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            outcome,
            account_id: None,
            email: None,
            token: None,
        }
    }

    pub fn with_account(mut self, account_id: Uuid, email: &str) -> Self {
        self.account_id = Some(account_id);
        self.email = Some(email.to_string());
        self
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}
