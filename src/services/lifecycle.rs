use uuid::Uuid;

use crate::services::outcome::{Outcome, Resolution};

/// リセットのライフサイクルイベント（監査ログ用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub outcome: Outcome,
    pub account_id: Option<Uuid>,
    pub email: Option<String>,
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        self.outcome.event_name()
    }
}

impl From<&Resolution> for LifecycleEvent {
    fn from(resolution: &Resolution) -> Self {
        Self {
            outcome: resolution.outcome,
            account_id: resolution.account_id,
            email: resolution.email.clone(),
        }
    }
}

/// 結果ごとに一度だけ呼ばれるオブザーバー
pub trait ResetObserver: Send + Sync {
    fn on_event(&self, event: &LifecycleEvent);
}

/// tracing に監査ログを出力する既定のオブザーバー
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ResetObserver for TracingObserver {
    fn on_event(&self, event: &LifecycleEvent) {
        let account_id = event.account_id.map(|id| id.to_string());
        let email = event.email.as_deref().unwrap_or("-");
        match event.outcome.error_class() {
            None => tracing::info!(
                event = event.name(),
                account_id = ?account_id,
                email = %email,
                "パスワードリセットイベント"
            ),
            Some(class) => tracing::warn!(
                event = event.name(),
                class = ?class,
                account_id = ?account_id,
                email = %email,
                "パスワードリセットイベント"
            ),
        }
    }
}
