use std::sync::Arc;

use time::Duration;

use crate::config::Config;
use crate::error::AppError;
use crate::models::AccountRecord;
use crate::repositories::{AccountStore, AccountUpdate, StoreError, TokenGuard};
use crate::services::clock::{Clock, SystemClock};
use crate::services::credential::{CostParams, CredentialHasher, HashedCredential};
use crate::services::email::Notifier;
use crate::services::outcome::{Outcome, Resolution};
use crate::services::token::{RandomTokenCodec, TokenCodec};

/// トークン有効期間の上限（30日）
pub const MAX_TOKEN_TTL_SECS: i64 = 30 * 24 * 60 * 60;

/// リセットに関するポリシー
#[derive(Debug, Clone, Copy)]
pub struct ResetPolicy {
    pub token_ttl: Duration,
    pub require_email_verified: bool,
    pub min_password_length: usize,
}

impl ResetPolicy {
    /// 設定からポリシーを構築
    ///
    /// # Errors
    /// - 有効期間が 1 秒未満または上限超過の場合: `AppError::Internal`
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let ttl_secs = config.password_reset_token_ttl_secs;
        if !(1..=MAX_TOKEN_TTL_SECS).contains(&ttl_secs) {
            return Err(AppError::Internal(anyhow::anyhow!(
                "PASSWORD_RESET_TOKEN_TTL_SECS は 1〜{} の範囲で指定してください: {}",
                MAX_TOKEN_TTL_SECS,
                ttl_secs
            )));
        }

        Ok(Self {
            token_ttl: Duration::seconds(ttl_secs),
            require_email_verified: config.require_email_verified,
            min_password_length: config.min_password_length.max(1),
        })
    }
}

/// トークン検索の結果
enum Located {
    Missing,
    Expired(AccountRecord),
    Pending(AccountRecord),
}

/// トークンを消費する理由
enum Retirement {
    Expired,
    Consumed(HashedCredential),
}

/// パスワードリセットサービス
///
/// トークンの状態はレコード上のトークン・有効期限の有無で表す:
/// 保留なし → 保留中 → (消費済み | 期限切れ)。終端状態は「保留なし」と同じ
#[derive(Clone)]
pub struct PasswordResetService {
    store: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    hasher: Arc<dyn CredentialHasher>,
    codec: Arc<dyn TokenCodec>,
    clock: Arc<dyn Clock>,
    policy: ResetPolicy,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    pub fn new(
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
        hasher: Arc<dyn CredentialHasher>,
        policy: ResetPolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            hasher,
            codec: Arc::new(RandomTokenCodec),
            clock: Arc::new(SystemClock),
            policy,
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn TokenCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// パスワードリセットをリクエスト
    ///
    /// アカウント不在を成功に見せるかどうかは呼び出し側で決める
    ///
    /// # Security
    /// - トークン（平文）はログに出力しない
    /// - 送信に失敗しても保存済みトークンは無効にしない
    pub async fn request_reset(&self, email: &str) -> Result<Resolution, AppError> {
        tracing::info!(email = %email, "パスワードリセットリクエスト");

        if !is_valid_email(email) {
            return Ok(Resolution::new(Outcome::InvalidEmail).with_email(email));
        }

        let Some(account) = self.store.find_by_email(email).await? else {
            tracing::info!(email = %email, "パスワードリセット: ユーザー不在");
            return Ok(Resolution::new(Outcome::AccountNotFound).with_email(email));
        };

        if account.account_invalid {
            return Ok(Resolution::new(Outcome::AccountInvalid).with_account(account.id, email));
        }

        if self.policy.require_email_verified && !account.email_verified {
            return Ok(Resolution::new(Outcome::EmailUnverified).with_account(account.id, email));
        }

        let token = self.codec.generate();
        let expires_at = self
            .clock
            .now()
            .checked_add(self.policy.token_ttl)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("トークン有効期限が範囲外です")))?;

        // 最後の書き込みが勝つ（以前のトークンはこの時点で無効）。
        // 書き込むのはトークンのペアのみ
        let change = AccountUpdate::IssueToken {
            token: &token,
            expires_at,
        };
        let account = self
            .store
            .update(account.id, change, TokenGuard::Any)
            .await?;
        let resolution = Resolution::new(Outcome::ResetRequested).with_account(account.id, email);

        if let Err(e) = self
            .notifier
            .send_reset_link(account.display_name(), &account.email, &token)
            .await
        {
            tracing::error!(
                error = ?e,
                account_id = %account.id,
                "パスワードリセットメール送信失敗（トークンは有効なまま）"
            );
            return Ok(Resolution {
                outcome: Outcome::NotificationFailed,
                ..resolution
            });
        }

        tracing::info!(account_id = %account.id, "パスワードリセットトークン発行");

        Ok(resolution)
    }

    /// トークンを検査（新しいパスワード入力画面の表示前）
    ///
    /// 期限切れの場合はトークンをクリアしてから `Expired` を返す
    pub async fn inspect_token(&self, raw: &str) -> Result<Resolution, AppError> {
        match self.locate(raw).await? {
            Located::Missing => Ok(Resolution::new(Outcome::NotFound)),
            Located::Expired(account) => self.retire(account, raw, Retirement::Expired).await,
            Located::Pending(account) => Ok(Resolution::new(Outcome::Valid)
                .with_account(account.id, &account.email)
                .with_token(raw)),
        }
    }

    /// トークンを消費して新しいパスワードを設定
    ///
    /// # Security
    /// - トークン・新パスワードはログに出力しない
    pub async fn consume_token(
        &self,
        raw: &str,
        new_password: &str,
    ) -> Result<Resolution, AppError> {
        let account = match self.locate(raw).await? {
            Located::Missing => return Ok(Resolution::new(Outcome::NotFound)),
            Located::Expired(account) => {
                return self.retire(account, raw, Retirement::Expired).await;
            }
            Located::Pending(account) => account,
        };

        // トークンは消費しない（再入力可能）
        if new_password.chars().count() < self.policy.min_password_length {
            return Ok(Resolution::new(Outcome::InvalidCredential)
                .with_account(account.id, &account.email)
                .with_token(raw));
        }

        // 旧パラメータのレコードは保存済みの反復回数を引き継ぐ
        let cost = account
            .hash_iterations
            .and_then(|iterations| u32::try_from(iterations).ok())
            .map(|iterations| self.hasher.cost().with_iterations(iterations));
        let hashed = self.hash_off_thread(new_password, cost).await?;

        self.retire(account, raw, Retirement::Consumed(hashed)).await
    }

    /// argon2 はCPU負荷が高いのでブロッキングスレッドで実行
    async fn hash_off_thread(
        &self,
        plaintext: &str,
        cost: Option<CostParams>,
    ) -> Result<HashedCredential, AppError> {
        let hasher = self.hasher.clone();
        let plaintext = plaintext.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext, cost))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("ハッシュ化タスクが失敗: {}", e)))?
    }

    /// 書式チェック → ストア検索 → 有効期限チェック
    async fn locate(&self, raw: &str) -> Result<Located, AppError> {
        // 書式不正と不在は区別しない
        if !self.codec.is_well_formed(raw) {
            return Ok(Located::Missing);
        }

        let Some(account) = self.store.find_by_token(raw).await? else {
            return Ok(Located::Missing);
        };

        let Some(pending) = account.pending_reset() else {
            return Ok(Located::Missing);
        };

        // 境界の瞬間も期限切れ扱い
        if self.clock.now() >= pending.expires_at {
            tracing::warn!(account_id = %account.id, "期限切れトークン");
            return Ok(Located::Expired(account));
        }

        Ok(Located::Pending(account))
    }

    /// トークンをクリアして保存（期限切れ・消費の共通経路）
    ///
    /// 保存済みトークンが `raw` のままの場合のみ書き込む。
    /// 競合した場合は別のリクエストが先に消費・再発行しているので `NotFound`
    async fn retire(
        &self,
        account: AccountRecord,
        raw: &str,
        retirement: Retirement,
    ) -> Result<Resolution, AppError> {
        let (outcome, change) = match &retirement {
            Retirement::Expired => (Outcome::Expired, AccountUpdate::ClearToken),
            Retirement::Consumed(hashed) => (
                Outcome::CredentialChanged,
                AccountUpdate::ReplaceCredential {
                    hash: &hashed.hash,
                    salt: &hashed.salt,
                },
            ),
        };

        match self
            .store
            .update(account.id, change, TokenGuard::Matches(raw))
            .await
        {
            Ok(account) => {
                if outcome == Outcome::CredentialChanged {
                    tracing::info!(account_id = %account.id, "パスワードリセット完了");
                }
                Ok(Resolution::new(outcome).with_account(account.id, &account.email))
            }
            Err(StoreError::Conflict) => {
                tracing::warn!(account_id = %account.id, "トークンは既に使用または再発行済み");
                Ok(Resolution::new(Outcome::NotFound))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// メールアドレスの書式チェック
///
/// `local@domain.tld`（tld は英字2〜6文字）
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };

    !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c))
        && !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && (2..=6).contains(&tld.len())
        && tld.chars().all(|c| c.is_ascii_alphabetic())
}
