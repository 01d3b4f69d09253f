//! SMTP 送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用してメールを送信する。
//! 開発環境では Mailpit（ローカル SMTP サーバー）に接続する。

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{Mailbox, Message, MultiPart, SinglePart, header::ContentType},
};
use sendflow_domain::delivery::{DeliveryError, OutboundEmail};

use super::CampaignMailer;

/// SMTP キャンペーン送信
///
/// `lettre::AsyncSmtpTransport<Tokio1Executor>` をラップする。
/// 差出人はキャンペーンごとに異なるため、メッセージ単位で
/// `OutboundEmail` の差出人情報から組み立てる。
pub struct SmtpCampaignMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpCampaignMailer {
    /// 新しい SMTP 送信インスタンスを作成
    ///
    /// # 引数
    ///
    /// - `host`: SMTP サーバーのホスト名（例: "localhost"）
    /// - `port`: SMTP サーバーのポート番号（例: 1025 for Mailpit）
    pub fn new(host: &str, port: u16) -> Self {
        // builder_dangerous: TLS なしで接続（Mailpit 等のローカル SMTP 向け）
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();

        Self { transport }
    }
}

#[async_trait]
impl CampaignMailer for SmtpCampaignMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), DeliveryError> {
        let from: Mailbox = format!("{} <{}>", email.from_name, email.from_email)
            .parse()
            .map_err(|e| DeliveryError::SendFailed(format!("差出人アドレス不正: {e}")))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| DeliveryError::SendFailed(format!("宛先アドレス不正: {e}")))?;

        let mut builder = Message::builder().from(from).to(to).subject(&email.subject);
        if let Some(reply_to) = &email.reply_to {
            let mailbox: Mailbox = reply_to
                .parse()
                .map_err(|e| DeliveryError::SendFailed(format!("返信先アドレス不正: {e}")))?;
            builder = builder.reply_to(mailbox);
        }

        let message = builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| DeliveryError::SendFailed(format!("メッセージ構築失敗: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::SendFailed(format!("SMTP 送信失敗: {e}")))?;

        Ok(())
    }
}
