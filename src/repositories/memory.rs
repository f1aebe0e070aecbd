use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::AccountRecord;
use crate::repositories::{AccountStore, AccountUpdate, StoreError, TokenGuard};

/// プロセス内のアカウントストア
///
/// DATABASE_URL 未設定時の開発用およびテスト用。
/// 比較と書き込みは同じ書き込みロック内で行う
#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<Uuid, AccountRecord>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// アカウントを登録（既存IDは置き換え）
    pub async fn insert(&self, account: AccountRecord) {
        self.accounts.write().await.insert(account.id, account);
    }

    pub async fn get(&self, id: Uuid) -> Option<AccountRecord> {
        self.accounts.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<AccountRecord>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().find(|a| a.email == email).cloned())
    }

    async fn find_by_token(&self, token: &str) -> Result<Option<AccountRecord>, StoreError> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .values()
            .find(|a| a.reset_token() == Some(token))
            .cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        change: AccountUpdate<'_>,
        guard: TokenGuard<'_>,
    ) -> Result<AccountRecord, StoreError> {
        let mut accounts = self.accounts.write().await;
        let stored = accounts.get_mut(&id).ok_or(StoreError::Conflict)?;

        if let TokenGuard::Matches(expected) = guard
            && stored.reset_token() != Some(expected)
        {
            return Err(StoreError::Conflict);
        }

        match change {
            AccountUpdate::IssueToken { token, expires_at } => {
                stored.issue_reset_token(token.to_string(), expires_at);
            }
            AccountUpdate::ClearToken => stored.clear_reset_token(),
            AccountUpdate::ReplaceCredential { hash, salt } => {
                stored.credential_hash = hash.to_string();
                stored.credential_salt = salt.to_string();
                stored.clear_reset_token();
            }
        }

        Ok(stored.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    #[tokio::test]
    async fn test_find_by_email_and_token() {
        let store = MemoryAccountStore::new();
        let mut account = AccountRecord::new("a@x.com", "hash", "salt");
        account.issue_reset_token("tok".to_string(), OffsetDateTime::UNIX_EPOCH);
        store.insert(account.clone()).await;

        let found = store.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert!(store.find_by_email("b@x.com").await.unwrap().is_none());

        let found = store.find_by_token("tok").await.unwrap().unwrap();
        assert_eq!(found.id, account.id);
        assert!(store.find_by_token("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_guarded_clear_conflicts_after_token_changed() {
        let store = MemoryAccountStore::new();
        let mut account = AccountRecord::new("a@x.com", "hash", "salt");
        account.issue_reset_token("t1".to_string(), OffsetDateTime::UNIX_EPOCH);
        store.insert(account.clone()).await;

        store
            .update(account.id, AccountUpdate::ClearToken, TokenGuard::Matches("t1"))
            .await
            .unwrap();

        // 2回目は既にクリア済みなので競合
        let result = store
            .update(account.id, AccountUpdate::ClearToken, TokenGuard::Matches("t1"))
            .await;
        assert!(matches!(result, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn test_issue_token_writes_only_token_pair() {
        let store = MemoryAccountStore::new();
        let account = AccountRecord::new("a@x.com", "hash", "salt");
        store.insert(account.clone()).await;

        // 別経路で資格情報が変わった後でも発行は資格情報に触れない
        let mut changed = account.clone();
        changed.credential_hash = "rotated".to_string();
        changed.account_invalid = true;
        store.insert(changed).await;

        let expires_at = OffsetDateTime::UNIX_EPOCH;
        let updated = store
            .update(
                account.id,
                AccountUpdate::IssueToken {
                    token: "t1",
                    expires_at,
                },
                TokenGuard::Any,
            )
            .await
            .unwrap();

        assert_eq!(updated.credential_hash, "rotated");
        assert_eq!(updated.credential_salt, "salt");
        assert!(updated.account_invalid);
        assert_eq!(updated.reset_token(), Some("t1"));
        assert_eq!(updated.reset_token_expires_at(), Some(expires_at));
    }

    #[tokio::test]
    async fn test_replace_credential_clears_token_and_keeps_cost_metadata() {
        let store = MemoryAccountStore::new();
        let mut account = AccountRecord::new("a@x.com", "hash", "salt");
        account.hash_iterations = Some(3);
        account.issue_reset_token("t1".to_string(), OffsetDateTime::UNIX_EPOCH);
        store.insert(account.clone()).await;

        let updated = store
            .update(
                account.id,
                AccountUpdate::ReplaceCredential {
                    hash: "new-hash",
                    salt: "new-salt",
                },
                TokenGuard::Matches("t1"),
            )
            .await
            .unwrap();

        assert_eq!(updated.credential_hash, "new-hash");
        assert_eq!(updated.credential_salt, "new-salt");
        assert_eq!(updated.hash_iterations, Some(3));
        assert!(updated.pending_reset().is_none());
    }

    #[tokio::test]
    async fn test_guarded_replace_conflict_leaves_record_untouched() {
        let store = MemoryAccountStore::new();
        let mut account = AccountRecord::new("a@x.com", "hash", "salt");
        account.issue_reset_token("t2".to_string(), OffsetDateTime::UNIX_EPOCH);
        store.insert(account.clone()).await;

        let result = store
            .update(
                account.id,
                AccountUpdate::ReplaceCredential {
                    hash: "new-hash",
                    salt: "new-salt",
                },
                TokenGuard::Matches("t1"),
            )
            .await;
        assert!(matches!(result, Err(StoreError::Conflict)));

        let stored = store.get(account.id).await.unwrap();
        assert_eq!(stored.credential_hash, "hash");
        assert_eq!(stored.reset_token(), Some("t2"));
    }

    #[tokio::test]
    async fn test_update_unknown_account_conflicts() {
        let store = MemoryAccountStore::new();
        let result = store
            .update(Uuid::new_v4(), AccountUpdate::ClearToken, TokenGuard::Any)
            .await;
        assert!(matches!(result, Err(StoreError::Conflict)));
    }
}
