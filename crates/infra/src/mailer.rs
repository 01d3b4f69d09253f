//! # メール送信
//!
//! キャンペーンメールの送信を担当するインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `CampaignMailer` trait でメール送信を抽象化
//! - **2 つの実装**: SMTP（Mailpit 開発用 / リレー）、Noop（検証・ドライラン用）
//! - **環境変数切替**: `MAILER_BACKEND` でランタイム選択
//! - **エラーの畳み込み**: プロバイダのネストしたエラーはこの境界で
//!   フラットな `DeliveryError::SendFailed` に変換する

mod noop;
mod smtp;

use async_trait::async_trait;
pub use noop::NoopCampaignMailer;
use sendflow_domain::delivery::{DeliveryError, OutboundEmail};
pub use smtp::SmtpCampaignMailer;

/// メール送信トレイト
///
/// 配信エンジンの中核。メール送信の具体的な方法を抽象化する。
#[async_trait]
pub trait CampaignMailer: Send + Sync {
    /// メールを 1 通送信する
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError>;
}
