use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// アカウントレコード（永続化レイヤーが所有）
///
/// リセットトークンと有効期限は常に両方あるか両方ないかのどちらか。
/// そのためフィールドは非公開にし、`issue_reset_token` / `clear_reset_token` 経由でのみ変更する
#[derive(Clone, FromRow)]
pub struct AccountRecord {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub credential_hash: String,
    pub credential_salt: String,
    /// 旧パラメータでハッシュ化されたレコードの反復回数
    pub hash_iterations: Option<i32>,
    pub account_invalid: bool,
    pub email_verified: bool,
    reset_token: Option<String>,
    reset_token_expires_at: Option<OffsetDateTime>,
}

// 資格情報とトークンはログに出さない
impl std::fmt::Debug for AccountRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("credential_hash", &"[REDACTED]")
            .field("credential_salt", &"[REDACTED]")
            .field("hash_iterations", &self.hash_iterations)
            .field("account_invalid", &self.account_invalid)
            .field("email_verified", &self.email_verified)
            .field("reset_token", &self.reset_token.as_ref().map(|_| "[REDACTED]"))
            .field("reset_token_expires_at", &self.reset_token_expires_at)
            .finish()
    }
}

/// 保留中のリセット（トークン + 有効期限）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReset<'a> {
    pub token: &'a str,
    pub expires_at: OffsetDateTime,
}

impl AccountRecord {
    /// 保留中のリセットがない新しいレコードを作成
    pub fn new(
        email: impl Into<String>,
        credential_hash: impl Into<String>,
        credential_salt: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            display_name: None,
            credential_hash: credential_hash.into(),
            credential_salt: credential_salt.into(),
            hash_iterations: None,
            account_invalid: false,
            email_verified: true,
            reset_token: None,
            reset_token_expires_at: None,
        }
    }

    pub fn pending_reset(&self) -> Option<PendingReset<'_>> {
        match (&self.reset_token, self.reset_token_expires_at) {
            (Some(token), Some(expires_at)) => Some(PendingReset {
                token,
                expires_at,
            }),
            _ => None,
        }
    }

    pub fn reset_token(&self) -> Option<&str> {
        self.pending_reset().map(|p| p.token)
    }

    pub fn reset_token_expires_at(&self) -> Option<OffsetDateTime> {
        self.pending_reset().map(|p| p.expires_at)
    }

    /// 新しいトークンを設定（既存のトークンは上書きされ無効になる）
    pub fn issue_reset_token(&mut self, token: String, expires_at: OffsetDateTime) {
        self.reset_token = Some(token);
        self.reset_token_expires_at = Some(expires_at);
    }

    pub fn clear_reset_token(&mut self) {
        self.reset_token = None;
        self.reset_token_expires_at = None;
    }

    /// 受信者の表示名（未設定ならメールアドレス）
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.email)
    }
}
