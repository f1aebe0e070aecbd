pub mod account;
pub mod memory;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::AccountRecord;

pub use account::PgAccountRepository;
pub use memory::MemoryAccountStore;

/// ストア操作のエラー
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// 比較対象のトークンが既に書き換えられていた
    #[error("レコードが競合しました")]
    Conflict,

    #[error("データベースエラー")]
    Database(#[from] sqlx::Error),
}

/// 更新時の前提条件（compare-and-swap）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenGuard<'a> {
    /// 無条件で上書き（最後の書き込みが勝つ）
    Any,
    /// 保存済みトークンがこの値と一致する場合のみ更新
    Matches(&'a str),
}

/// コアが書き込む列の組み合わせ
///
/// それぞれ自分が変更する列だけを書き込む。
/// 読み込み時点のスナップショットを書き戻さないため、並行する資格情報の変更を巻き戻さない
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountUpdate<'a> {
    /// トークンと有効期限のペアのみ書き込む
    IssueToken {
        token: &'a str,
        expires_at: OffsetDateTime,
    },
    /// トークンと有効期限のペアをクリア
    ClearToken,
    /// 資格情報を置き換え、同時にトークンのペアをクリア
    ReplaceCredential { hash: &'a str, salt: &'a str },
}

/// アカウントレコードのキー付きストア
///
/// メールアドレスと有効なリセットトークンの一意性はストア側で保証されている前提
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, StoreError>;

    async fn find_by_token(&self, token: &str) -> Result<Option<AccountRecord>, StoreError>;

    /// `change` が対象とする列だけをアトミックに書き込み、更新後のレコードを返す
    ///
    /// # Errors
    /// - `id` が存在しない、または `guard` が満たされない場合: `StoreError::Conflict`
    async fn update(
        &self,
        id: Uuid,
        change: AccountUpdate<'_>,
        guard: TokenGuard<'_>,
    ) -> Result<AccountRecord, StoreError>;
}
