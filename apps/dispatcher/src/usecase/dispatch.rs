//! # ディスパッチエンジン
//!
//! 宛先リストを入力順に走査し、1 宛先ずつメールプロバイダ経由で送信する。
//!
//! ## 設計方針
//!
//! - **逐次送信**: 並列化しない。送信順序とクレジット判定の正しさを優先する
//! - **宛先単位の失敗はデータ**: 個別の送信失敗は結果に記録するだけで、
//!   バッチ全体を中断しない
//! - **クレジット上限で停止**: 成功数が利用可能クレジットに達したら、
//!   残りの宛先はプロバイダを呼ばずに失敗として記録する
//! - **送信間ディレイ**: プロバイダのレート制限を尊重するため、
//!   プロバイダ呼び出しの間に固定の待機を挟む

use std::time::Duration;

use sendflow_domain::{
    campaign::{Campaign, Recipient},
    delivery::OutboundEmail,
};
use sendflow_infra::mailer::CampaignMailer;
use sendflow_shared::{event_log::event, log_business_event};

use crate::renderer::EmailContent;

/// クレジット上限により送信を打ち切った宛先の失敗理由
pub const CREDIT_LIMIT_REACHED: &str = "credit limit reached";

/// 送信に成功した宛先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRecipient {
    pub address: String,
}

/// 送信に失敗した宛先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRecipient {
    pub address: String,
    pub error:   String,
}

/// ディスパッチ結果
///
/// 宛先ごとの成否を保持する。失敗はエラーではなく結果の一部。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub success: Vec<SentRecipient>,
    pub failed:  Vec<FailedRecipient>,
}

impl DispatchOutcome {
    pub fn sent_count(&self) -> u32 {
        self.success.len() as u32
    }

    pub fn total(&self) -> usize {
        self.success.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// キャンペーンを宛先リストへ配信する
///
/// `from_email` は呼び出し側で解決済みの送信元アドレス
/// （キャンペーンの値、空ならデプロイ設定のフォールバック）。
/// 成功数が `available_credits` に達した時点で残りの宛先への
/// プロバイダ呼び出しを止め、失敗として記録する。
pub async fn dispatch(
    mailer: &dyn CampaignMailer,
    campaign: &Campaign,
    recipients: &[Recipient],
    content: &EmailContent,
    from_email: &str,
    available_credits: i64,
    send_delay: Duration,
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();
    let mut provider_calls: usize = 0;

    for recipient in recipients {
        // クレジット上限に達したら以降はプロバイダを呼ばない
        if i64::from(outcome.sent_count()) >= available_credits {
            outcome.failed.push(FailedRecipient {
                address: recipient.address.clone(),
                error:   CREDIT_LIMIT_REACHED.to_string(),
            });
            continue;
        }

        if provider_calls > 0 {
            tokio::time::sleep(send_delay).await;
        }
        provider_calls += 1;

        let email = OutboundEmail {
            to:         recipient.address.clone(),
            from_name:  campaign.from_name().as_str().to_string(),
            from_email: from_email.to_string(),
            reply_to:   None,
            subject:    campaign.subject().to_string(),
            html_body:  content.html.clone(),
            text_body:  content.text.clone(),
        };

        match mailer.send(&email).await {
            Ok(()) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_SENT,
                    event.result = event::result::SUCCESS,
                    event.campaign_id = %campaign.id(),
                    "メールを送信しました"
                );
                outcome.success.push(SentRecipient {
                    address: recipient.address.clone(),
                });
            }
            Err(e) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_FAILED,
                    event.result = event::result::FAILURE,
                    event.campaign_id = %campaign.id(),
                    error = %e,
                    "メールの送信に失敗しました"
                );
                outcome.failed.push(FailedRecipient {
                    address: recipient.address.clone(),
                    error:   e.to_string(),
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use sendflow_domain::{
        campaign::{
            Campaign,
            CampaignId,
            CampaignName,
            NewCampaign,
            Schedule,
            SenderName,
        },
        user::UserId,
    };
    use sendflow_infra::mock::MockMailer;
    use serde_json::json;

    use super::*;

    fn test_campaign() -> Campaign {
        Campaign::new(NewCampaign {
            id: CampaignId::new(),
            user_id: UserId::new(),
            name: CampaignName::new("テストキャンペーン").unwrap(),
            subject: "件名".to_string(),
            from_name: SenderName::new("SendFlow").unwrap(),
            from_email: "news@example.com".to_string(),
            recipients: json!([]),
            canvas: json!([]),
            schedule: Schedule::Immediate,
            now: Utc::now(),
        })
    }

    fn recipients(addresses: &[&str]) -> Vec<Recipient> {
        addresses
            .iter()
            .map(|a| Recipient {
                address: (*a).to_string(),
            })
            .collect()
    }

    fn content() -> EmailContent {
        EmailContent {
            html: "<p>本文</p>".to_string(),
            text: "本文".to_string(),
        }
    }

    #[tokio::test]
    async fn test_全宛先に送信できる() {
        let mailer = MockMailer::new();
        let outcome = dispatch(
            &mailer,
            &test_campaign(),
            &recipients(&["a@example.com", "b@example.com"]),
            &content(),
            "news@example.com",
            10,
            Duration::ZERO,
        )
        .await;

        assert_eq!(outcome.sent_count(), 2);
        assert!(outcome.all_succeeded());
        assert_eq!(mailer.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_個別の失敗はバッチを中断しない() {
        // Arrange: 2 件目だけ失敗させる
        let mailer = MockMailer::new();
        mailer.fail_for("b@example.com");

        // Act
        let outcome = dispatch(
            &mailer,
            &test_campaign(),
            &recipients(&["a@example.com", "b@example.com", "c@example.com"]),
            &content(),
            "news@example.com",
            10,
            Duration::ZERO,
        )
        .await;

        // Assert: 1 件目と 3 件目は成功、2 件目のみ失敗
        assert_eq!(
            outcome
                .success
                .iter()
                .map(|s| s.address.as_str())
                .collect::<Vec<_>>(),
            vec!["a@example.com", "c@example.com"]
        );
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].address, "b@example.com");
        assert!(outcome.failed[0].error.contains("550"));
    }

    #[tokio::test]
    async fn test_成功数がクレジットに達したら残りはプロバイダを呼ばない() {
        let mailer = MockMailer::new();
        let outcome = dispatch(
            &mailer,
            &test_campaign(),
            &recipients(&["a@example.com", "b@example.com", "c@example.com"]),
            &content(),
            "news@example.com",
            2,
            Duration::ZERO,
        )
        .await;

        assert_eq!(outcome.sent_count(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.failed[0].error, CREDIT_LIMIT_REACHED);
        // プロバイダ呼び出しは 2 回だけ
        assert_eq!(mailer.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_失敗は成功数に数えない() {
        // Arrange: クレジット 2、1 件目が失敗するので 3 件目まで送信が試みられる
        let mailer = MockMailer::new();
        mailer.fail_for("a@example.com");

        // Act
        let outcome = dispatch(
            &mailer,
            &test_campaign(),
            &recipients(&["a@example.com", "b@example.com", "c@example.com"]),
            &content(),
            "news@example.com",
            2,
            Duration::ZERO,
        )
        .await;

        // Assert
        assert_eq!(outcome.sent_count(), 2);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(mailer.sent_count(), 2);
    }

    #[tokio::test]
    async fn test_クレジットゼロならプロバイダを一度も呼ばない() {
        let mailer = MockMailer::new();
        let outcome = dispatch(
            &mailer,
            &test_campaign(),
            &recipients(&["a@example.com", "b@example.com"]),
            &content(),
            "news@example.com",
            0,
            Duration::ZERO,
        )
        .await;

        assert_eq!(outcome.sent_count(), 0);
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(mailer.sent_count(), 0);
    }
}
