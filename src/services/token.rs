use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

/// トークンのランダムバイト数（256ビット）
const TOKEN_BYTES: usize = 32;

/// Base64 (URL-safe, パディングなし) でエンコードした長さ
const TOKEN_LEN: usize = 43;

/// リセットトークンの生成と書式チェック
pub trait TokenCodec: Send + Sync {
    /// 推測不能なトークンを生成
    fn generate(&self) -> String;

    /// ストア検索前の書式チェック
    ///
    /// # Note
    /// DB往復を省くための最適化であり、ストア側の照合の代わりにはならない
    fn is_well_formed(&self, raw: &str) -> bool;
}

/// 32バイトのランダム値を URL-safe Base64 で表現するトークン
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokenCodec;

impl TokenCodec for RandomTokenCodec {
    fn generate(&self) -> String {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    fn is_well_formed(&self, raw: &str) -> bool {
        raw.len() == TOKEN_LEN
            && URL_SAFE_NO_PAD
                .decode(raw)
                .is_ok_and(|bytes| bytes.len() == TOKEN_BYTES)
    }
}
