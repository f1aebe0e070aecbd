use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::handlers::response::{ResponseRouter, ViewNames};
use crate::repositories::AccountStore;
use crate::services::{
    Argon2CredentialHasher, CostParams, EmailNotifier, PasswordResetService, ResetPolicy,
    TracingObserver,
};

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// パスワードリセットサービス
    pub password_reset_service: PasswordResetService,
    /// 結果 → 応答の変換
    pub router: ResponseRouter,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(config: Config, store: Arc<dyn AccountStore>) -> Result<Self, AppError> {
        let config = Arc::new(config);

        let hasher = Argon2CredentialHasher::new(CostParams {
            memory_kib: config.argon2_memory_kib,
            iterations: config.argon2_iterations,
            parallelism: config.argon2_parallelism,
        })?;
        let notifier = EmailNotifier::new(config.clone());
        let password_reset_service = PasswordResetService::new(
            store,
            Arc::new(notifier),
            Arc::new(hasher),
            ResetPolicy::from_config(&config)?,
        );

        let router = ResponseRouter::new(
            config.response_mode,
            ViewNames::from_config(&config),
            Arc::new(TracingObserver),
        );

        tracing::info!(
            mode = ?config.response_mode,
            route = %config.route_base(),
            ttl_secs = config.password_reset_token_ttl_secs,
            "パスワードリセットサービスを初期化"
        );

        Ok(Self::from_parts(config, password_reset_service, router))
    }

    /// 構築済みの部品から作成
    pub fn from_parts(
        config: Arc<Config>,
        password_reset_service: PasswordResetService,
        router: ResponseRouter,
    ) -> Self {
        Self {
            config,
            password_reset_service,
            router,
        }
    }
}
