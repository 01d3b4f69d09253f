//! Noop 送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。
//! ドライランや SMTP 未設定の環境で使用する。

use async_trait::async_trait;
use sendflow_domain::delivery::{DeliveryError, OutboundEmail};

use super::CampaignMailer;

/// Noop キャンペーン送信（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct NoopCampaignMailer;

#[async_trait]
impl CampaignMailer for NoopCampaignMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Noop: メール送信をスキップ"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sendがエラーを返さない() {
        let mailer = NoopCampaignMailer;
        let email = OutboundEmail {
            to:         "test@example.com".to_string(),
            from_name:  "テスト送信者".to_string(),
            from_email: "sender@example.com".to_string(),
            reply_to:   None,
            subject:    "テスト件名".to_string(),
            html_body:  "<p>テスト</p>".to_string(),
            text_body:  "テスト".to_string(),
        };

        let result = mailer.send(&email).await;
        assert!(result.is_ok());
    }
}
