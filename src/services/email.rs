use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;

/// 通知送信エラー
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("メールアドレスが不正です: {0}")]
    InvalidAddress(String),

    #[error("メール送信に失敗しました: {0}")]
    Transport(String),
}

/// リセットトークンをアカウント所有者に届ける
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_reset_link(
        &self,
        display_name: &str,
        email: &str,
        token: &str,
    ) -> Result<(), NotifyError>;
}

/// メール送信サービス
///
/// SMTP 設定がある場合は送信し、`email` feature が無効なら送信失敗とする。
/// SMTP 設定がない場合は開発モードとしてログ出力のみ行う
#[derive(Clone)]
pub struct EmailNotifier {
    config: Arc<Config>,
}

impl EmailNotifier {
    /// 新しい EmailNotifier を作成
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// リセットURLを構築
    fn build_reset_url(&self, token: &str) -> String {
        let base = self
            .config
            .password_reset_url_base
            .as_deref()
            .unwrap_or("http://localhost:3000");
        format!(
            "{}{}/{}",
            base.trim_end_matches('/'),
            self.config.forgot_password_route,
            token
        )
    }

    fn smtp_configured(&self) -> bool {
        self.config.smtp_host.is_some()
            && self.config.smtp_username.is_some()
            && self.config.smtp_password.is_some()
            && self.config.smtp_from_address.is_some()
    }

    #[cfg(feature = "email")]
    async fn send_smtp(
        &self,
        display_name: &str,
        to: &str,
        reset_url: &str,
    ) -> Result<(), NotifyError> {
        use lettre::message::Mailbox;
        use lettre::transport::smtp::authentication::Credentials;
        use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
        use secrecy::ExposeSecret;

        let (Some(host), Some(username), Some(password), Some(from)) = (
            &self.config.smtp_host,
            &self.config.smtp_username,
            &self.config.smtp_password,
            &self.config.smtp_from_address,
        ) else {
            return Err(NotifyError::Transport("SMTP not configured".to_string()));
        };

        let from: Mailbox = from
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(from.clone()))?;
        let to_mailbox = format!("{} <{}>", display_name, to)
            .parse::<Mailbox>()
            .or_else(|_| to.parse::<Mailbox>())
            .map_err(|_| NotifyError::InvalidAddress(to.to_string()))?;

        let message = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject("パスワードの再設定")
            .body(format!(
                "{} 様\n\n以下のリンクから新しいパスワードを設定してください。\n{}\n",
                display_name, reset_url
            ))
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(self.config.smtp_port)
            .credentials(Credentials::new(
                username.expose_secret().clone(),
                password.expose_secret().clone(),
            ))
            .build();

        mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    /// パスワードリセットメールを送信
    ///
    /// # Security
    /// 本番送信時はトークン（URL）をログに出力しない
    async fn send_reset_link(
        &self,
        display_name: &str,
        email: &str,
        token: &str,
    ) -> Result<(), NotifyError> {
        let reset_url = self.build_reset_url(token);

        #[cfg(feature = "email")]
        {
            if self.smtp_configured() {
                self.send_smtp(display_name, email, &reset_url).await?;
                tracing::info!(to = %email, "パスワードリセットメール送信");
                return Ok(());
            }
        }

        // SMTP 設定済みで送信できない場合は失敗として返す
        #[cfg(not(feature = "email"))]
        {
            if self.smtp_configured() {
                tracing::error!(to = %email, "SMTP設定がありますが email feature が無効です");
                return Err(NotifyError::Transport(
                    "email feature が無効です".to_string(),
                ));
            }
        }

        // 開発モード: メール送信せずログ出力のみ
        tracing::info!(
            to = %email,
            name = %display_name,
            "パスワードリセットメール送信（開発モード）"
        );
        tracing::info!("リセットURL: {}", reset_url);

        Ok(())
    }
}
