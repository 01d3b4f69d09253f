//! # Dispatcher 設定
//!
//! 環境変数からディスパッチャの設定を読み込む。

use std::env;

/// ディスパッチャの設定
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// データベース接続 URL
    pub database_url: String,
    /// ポーリング間隔（秒）
    pub poll_interval_secs: u64,
    /// 予約キャンペーンの遡り猶予（秒）
    ///
    /// ポーリングの遅延でちょうどの時刻を逃しても、この猶予内なら発火対象とする。
    pub due_lookback_secs: i64,
    /// 宛先間の送信ディレイ（ミリ秒）
    pub send_delay_ms: u64,
    /// メーラー設定
    pub mailer: MailerConfig,
}

/// メール送信バックエンドの設定
///
/// `MAILER_BACKEND` 環境変数で送信バックエンドを切り替える:
/// - `smtp`: Mailpit（開発）/ SMTP サーバー経由で送信
/// - `noop`: 送信しない（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// 送信バックエンド（"smtp" | "noop"）
    pub backend:        String,
    /// SMTP ホスト（backend=smtp の場合に使用）
    pub smtp_host:      String,
    /// SMTP ポート（backend=smtp の場合に使用）
    pub smtp_port:      u16,
    /// キャンペーンに送信元が未設定の場合のフォールバックアドレス
    pub from_address:   String,
    /// メールフッターに表示する物理住所（特定電子メール法対応、省略可）
    pub postal_address: Option<String>,
}

impl DispatcherConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL が設定されていません"),
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .expect("POLL_INTERVAL_SECS は正の整数である必要があります"),
            due_lookback_secs: env::var("DUE_LOOKBACK_SECS")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .expect("DUE_LOOKBACK_SECS は正の整数である必要があります"),
            send_delay_ms: env::var("SEND_DELAY_MS")
                .unwrap_or_else(|_| "200".to_string())
                .parse()
                .expect("SEND_DELAY_MS は正の整数である必要があります"),
            mailer: MailerConfig::from_env(),
        }
    }
}

impl MailerConfig {
    /// 環境変数からメーラー設定を読み込む
    fn from_env() -> Self {
        Self {
            backend:        env::var("MAILER_BACKEND").unwrap_or_else(|_| "noop".to_string()),
            smtp_host:      env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".to_string()),
            smtp_port:      env::var("SMTP_PORT")
                .unwrap_or_else(|_| "1025".to_string())
                .parse()
                .expect("SMTP_PORT は有効なポート番号である必要があります"),
            from_address:   env::var("MAILER_FROM_ADDRESS")
                .unwrap_or_else(|_| "noreply@sendflow.example.com".to_string()),
            postal_address: env::var("MAILER_POSTAL_ADDRESS").ok(),
        }
    }
}
