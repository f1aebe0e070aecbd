use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

use crate::error::AppError;

/// argon2 コストパラメータ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl CostParams {
    /// 反復回数だけを差し替える（旧パラメータのレコード向け）
    pub fn with_iterations(self, iterations: u32) -> Self {
        Self { iterations, ..self }
    }
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// ハッシュ化された資格情報
pub struct HashedCredential {
    pub salt: String,
    /// PHC形式（パラメータとソルトを含む）
    pub hash: String,
}

impl std::fmt::Debug for HashedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashedCredential")
            .field("salt", &"[REDACTED]")
            .field("hash", &"[REDACTED]")
            .finish()
    }
}

/// 平文の資格情報からソルト付きハッシュを導出する
pub trait CredentialHasher: Send + Sync {
    /// 既定のコストパラメータ
    fn cost(&self) -> CostParams;

    /// `cost` が None の場合は既定のコストを使う
    fn hash(&self, plaintext: &str, cost: Option<CostParams>)
    -> Result<HashedCredential, AppError>;

    /// 保存済みハッシュと平文を照合
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, AppError>;
}

/// argon2id による実装
#[derive(Debug, Clone, Default)]
pub struct Argon2CredentialHasher {
    cost: CostParams,
}

impl Argon2CredentialHasher {
    /// コストパラメータを検証して作成
    pub fn new(cost: CostParams) -> Result<Self, AppError> {
        argon2_params(cost)?;
        Ok(Self { cost })
    }
}

fn argon2_params(cost: CostParams) -> Result<Params, AppError> {
    Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None).map_err(|e| {
        tracing::error!(error = ?e, "argon2 パラメータが不正");
        AppError::Internal(anyhow::anyhow!("invalid argon2 params"))
    })
}

impl CredentialHasher for Argon2CredentialHasher {
    fn cost(&self) -> CostParams {
        self.cost
    }

    fn hash(
        &self,
        plaintext: &str,
        cost: Option<CostParams>,
    ) -> Result<HashedCredential, AppError> {
        let cost = cost.unwrap_or(self.cost);
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params(cost)?);

        let salt = SaltString::generate(&mut OsRng);
        let hash = argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| {
                tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
                AppError::Internal(anyhow::anyhow!("password hash error"))
            })?;

        Ok(HashedCredential {
            salt: salt.as_str().to_string(),
            hash: hash.to_string(),
        })
    }

    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, AppError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
            AppError::Internal(anyhow::anyhow!("password hash parse error"))
        })?;

        // パラメータはPHC文字列から読み取られる
        Ok(Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_hasher() -> Argon2CredentialHasher {
        Argon2CredentialHasher::new(CostParams {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_new_rejects_invalid_params() {
        let result = Argon2CredentialHasher::new(CostParams {
            memory_kib: 1,
            iterations: 1,
            parallelism: 1,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_hash_and_verify() {
        let hasher = cheap_hasher();
        let hashed = hasher.hash("newpass", None).unwrap();

        assert!(hashed.hash.starts_with("$argon2id$"));
        assert!(hashed.hash.contains(&hashed.salt));
        assert!(hasher.verify("newpass", &hashed.hash).unwrap());
        assert!(!hasher.verify("oldpass", &hashed.hash).unwrap());
    }

    #[test]
    fn test_salt_differs_per_hash() {
        let hasher = cheap_hasher();
        let a = hasher.hash("same", None).unwrap();
        let b = hasher.hash("same", None).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn test_legacy_iterations_are_encoded_and_verifiable() {
        let hasher = cheap_hasher();
        let legacy = hasher.cost().with_iterations(3);
        let hashed = hasher.hash("newpass", Some(legacy)).unwrap();

        assert!(hashed.hash.contains("t=3"));
        // 既定と異なるコストでも検証できる
        assert!(hasher.verify("newpass", &hashed.hash).unwrap());
    }

    #[test]
    fn test_invalid_params_error() {
        let hasher = cheap_hasher();
        let bad = hasher.cost().with_iterations(0);
        assert!(hasher.hash("newpass", Some(bad)).is_err());
    }

    #[test]
    fn test_verify_invalid_hash_format() {
        let hasher = cheap_hasher();
        assert!(hasher.verify("newpass", "invalid_hash_format").is_err());
    }
}
