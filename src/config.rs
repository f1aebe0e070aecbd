use secrecy::SecretBox;
use serde::Deserialize;

/// 境界レイヤーの応答モード（デプロイ単位で一度だけ選択）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// ビュー名 + コンテキストを返す
    Interactive,
    /// ステータス + 構造化ペイロードを返す
    Rest,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    /// 未設定の場合はインメモリストアで起動（開発用）
    #[serde(default)]
    pub database_url: Option<SecretBox<String>>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,

    // SMTP設定（オプション - email機能有効時のみ使用）
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<SecretBox<String>>,
    pub smtp_password: Option<SecretBox<String>>,
    #[serde(default)]
    pub smtp_from_address: Option<String>,

    // パスワードリセット設定
    #[serde(default)]
    pub password_reset_url_base: Option<String>,
    #[serde(default = "default_password_reset_token_ttl_secs")]
    pub password_reset_token_ttl_secs: i64,
    #[serde(default = "default_true")]
    pub require_email_verified: bool,
    /// false の場合、アカウント不在を成功として見せる（列挙攻撃対策）
    #[serde(default)]
    pub reveal_account_existence: bool,
    #[serde(default = "default_response_mode")]
    pub response_mode: ResponseMode,
    #[serde(default = "default_forgot_password_route")]
    pub forgot_password_route: String,
    #[serde(default = "default_min_password_length")]
    pub min_password_length: usize,

    // argon2 コストパラメータ
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,

    // ビュー名（interactive モード）
    #[serde(default = "default_view_forgot_password")]
    pub view_forgot_password: String,
    #[serde(default = "default_view_sent_email")]
    pub view_sent_email: String,
    #[serde(default = "default_view_resend_verification")]
    pub view_resend_verification: String,
    #[serde(default = "default_view_link_expired")]
    pub view_link_expired: String,
    #[serde(default = "default_view_new_password")]
    pub view_new_password: String,
    #[serde(default = "default_view_changed_password")]
    pub view_changed_password: String,
    #[serde(default = "default_view_not_found")]
    pub view_not_found: String,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS: i64 = 3600;
const DEFAULT_FORGOT_PASSWORD_ROUTE: &str = "/forgot-password";
const DEFAULT_MIN_PASSWORD_LENGTH: usize = 1;

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

fn default_password_reset_token_ttl_secs() -> i64 {
    DEFAULT_PASSWORD_RESET_TOKEN_TTL_SECS
}

fn default_true() -> bool {
    true
}

fn default_response_mode() -> ResponseMode {
    ResponseMode::Rest
}

fn default_forgot_password_route() -> String {
    DEFAULT_FORGOT_PASSWORD_ROUTE.to_string()
}

fn default_min_password_length() -> usize {
    DEFAULT_MIN_PASSWORD_LENGTH
}

// argon2::Params::DEFAULT と同じ値
fn default_argon2_memory_kib() -> u32 {
    19 * 1024
}

fn default_argon2_iterations() -> u32 {
    2
}

fn default_argon2_parallelism() -> u32 {
    1
}

fn default_view_forgot_password() -> String {
    "get-forgot-password".to_string()
}

fn default_view_sent_email() -> String {
    "post-forgot-password".to_string()
}

fn default_view_resend_verification() -> String {
    "resend-verification".to_string()
}

fn default_view_link_expired() -> String {
    "link-expired".to_string()
}

fn default_view_new_password() -> String {
    "get-new-password".to_string()
}

fn default_view_changed_password() -> String {
    "change-password-success".to_string()
}

fn default_view_not_found() -> String {
    "not-found".to_string()
}

impl Config {
    pub fn load() -> Result<Self, envy::Error> {
        envy::from_env()
    }

    /// 環境変数から読み込む（テスト用）
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    /// 実際にルーティングされるベースパス
    ///
    /// REST モードでは `/rest` が前置される
    pub fn route_base(&self) -> String {
        match self.response_mode {
            ResponseMode::Rest => format!("/rest{}", self.forgot_password_route),
            ResponseMode::Interactive => self.forgot_password_route.clone(),
        }
    }
}
