use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::AccountRecord;
use crate::repositories::{AccountStore, AccountUpdate, StoreError, TokenGuard};

#[derive(Clone)]
pub struct PgAccountRepository {
    pool: PgPool,
}

impl PgAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for PgAccountRepository {
    /// メールアドレスでアカウントを検索
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, StoreError> {
        let account = sqlx::query_as::<_, AccountRecord>(
            r#"
            SELECT id, email, display_name, credential_hash, credential_salt, hash_iterations,
                   account_invalid, email_verified, reset_token, reset_token_expires_at
            FROM accounts
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// 有効なリセットトークンでアカウントを検索
    ///
    /// # Note
    /// 有効期限の検証は呼び出し側で行う
    async fn find_by_token(&self, token: &str) -> Result<Option<AccountRecord>, StoreError> {
        let account = sqlx::query_as::<_, AccountRecord>(
            r#"
            SELECT id, email, display_name, credential_hash, credential_salt, hash_iterations,
                   account_invalid, email_verified, reset_token, reset_token_expires_at
            FROM accounts
            WHERE reset_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// 変更対象の列だけを更新
    ///
    /// `TokenGuard::Matches` の場合は WHERE 句で保存済みトークンを比較し、
    /// 一致しなければ行が返らないので `Conflict` とする
    async fn update(
        &self,
        id: Uuid,
        change: AccountUpdate<'_>,
        guard: TokenGuard<'_>,
    ) -> Result<AccountRecord, StoreError> {
        let expected = match guard {
            TokenGuard::Any => None,
            TokenGuard::Matches(token) => Some(token),
        };

        let query = match change {
            AccountUpdate::IssueToken { token, expires_at } => {
                sqlx::query_as::<_, AccountRecord>(
                    r#"
                    UPDATE accounts
                    SET reset_token = $2,
                        reset_token_expires_at = $3,
                        updated_at = NOW()
                    WHERE id = $1
                      AND ($4::text IS NULL OR reset_token = $4)
                    RETURNING id, email, display_name, credential_hash, credential_salt,
                              hash_iterations, account_invalid, email_verified,
                              reset_token, reset_token_expires_at
                    "#,
                )
                .bind(id)
                .bind(token)
                .bind(expires_at)
                .bind(expected)
            }
            AccountUpdate::ClearToken => sqlx::query_as::<_, AccountRecord>(
                r#"
                UPDATE accounts
                SET reset_token = NULL,
                    reset_token_expires_at = NULL,
                    updated_at = NOW()
                WHERE id = $1
                  AND ($2::text IS NULL OR reset_token = $2)
                RETURNING id, email, display_name, credential_hash, credential_salt,
                          hash_iterations, account_invalid, email_verified,
                          reset_token, reset_token_expires_at
                "#,
            )
            .bind(id)
            .bind(expected),
            AccountUpdate::ReplaceCredential { hash, salt } => {
                sqlx::query_as::<_, AccountRecord>(
                    r#"
                    UPDATE accounts
                    SET credential_hash = $2,
                        credential_salt = $3,
                        reset_token = NULL,
                        reset_token_expires_at = NULL,
                        updated_at = NOW()
                    WHERE id = $1
                      AND ($4::text IS NULL OR reset_token = $4)
                    RETURNING id, email, display_name, credential_hash, credential_salt,
                              hash_iterations, account_invalid, email_verified,
                              reset_token, reset_token_expires_at
                    "#,
                )
                .bind(id)
                .bind(hash)
                .bind(salt)
                .bind(expected)
            }
        };

        query
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::Conflict)
    }
}

/// 実データベースに対する結合テスト
///
/// `DATABASE_URL` を設定して `cargo test -- --ignored` で実行する
#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;
    use time::{Duration, OffsetDateTime};

    async fn repository() -> PgAccountRepository {
        let url = std::env::var("DATABASE_URL").unwrap();
        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect(&url)
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        PgAccountRepository::new(pool)
    }

    async fn insert_account(repo: &PgAccountRepository) -> Uuid {
        let email = format!("{}@x.com", Uuid::new_v4());
        sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO accounts (email, credential_hash, credential_salt, email_verified)
            VALUES ($1, 'hash', 'salt', TRUE)
            RETURNING id
            "#,
        )
        .bind(email)
        .fetch_one(&repo.pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    #[ignore = "DATABASE_URL が必要"]
    async fn test_issue_token_does_not_touch_credential() {
        let repo = repository().await;
        let id = insert_account(&repo).await;

        sqlx::query("UPDATE accounts SET credential_hash = 'rotated' WHERE id = $1")
            .bind(id)
            .execute(&repo.pool)
            .await
            .unwrap();

        let token = Uuid::new_v4().to_string();
        let expires_at = OffsetDateTime::now_utc() + Duration::hours(1);
        let updated = repo
            .update(
                id,
                AccountUpdate::IssueToken {
                    token: &token,
                    expires_at,
                },
                TokenGuard::Any,
            )
            .await
            .unwrap();

        assert_eq!(updated.credential_hash, "rotated");
        assert_eq!(updated.reset_token(), Some(token.as_str()));
        let found = repo.find_by_token(&token).await.unwrap().unwrap();
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    #[ignore = "DATABASE_URL が必要"]
    async fn test_guarded_replace_is_single_use() {
        let repo = repository().await;
        let id = insert_account(&repo).await;

        let token = Uuid::new_v4().to_string();
        let expires_at = OffsetDateTime::now_utc() + Duration::hours(1);
        repo.update(
            id,
            AccountUpdate::IssueToken {
                token: &token,
                expires_at,
            },
            TokenGuard::Any,
        )
        .await
        .unwrap();

        let change = AccountUpdate::ReplaceCredential {
            hash: "new-hash",
            salt: "new-salt",
        };
        let updated = repo
            .update(id, change, TokenGuard::Matches(&token))
            .await
            .unwrap();
        assert_eq!(updated.credential_hash, "new-hash");
        assert!(updated.pending_reset().is_none());

        let result = repo.update(id, change, TokenGuard::Matches(&token)).await;
        assert!(matches!(result, Err(StoreError::Conflict)));
    }
}
