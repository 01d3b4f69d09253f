//! # キャンペーン処理パイプライン
//!
//! クレーム済みキャンペーン 1 件を終端状態（sent / failed）まで導く。
//!
//! ## 処理フロー
//!
//! 1. 受信者スナップショットを解決（空ならコンタクトリストにフォールバック）
//! 2. キャンバスを解決し、メール本文をレンダリング
//! 3. クレジット事前ガード（不足なら送信ゼロで即失敗）
//! 4. ディスパッチ（逐次送信、宛先単位の成否を記録）
//! 5. 実際の成功数だけクレジットを引き落とす
//! 6. 終端状態を永続化し、監査ログを 1 件追記する
//!
//! ## 順序保証
//!
//! 監査ログはディスパッチ完了とクレジット引き落としの後に書く。
//! ログから履歴を再構成したとき、引き落としと件数が矛盾しない。

use std::{sync::Arc, time::Duration};

use sendflow_domain::{
    audit_log::{AuditStatus, CampaignAuditLog, NewCampaignAuditLog},
    campaign::{Campaign, Recipient, parse_recipients},
    canvas::parse_canvas,
    clock::Clock,
    credit::{available_credits, plan_debit},
    error::DomainError,
};
use sendflow_infra::{
    mailer::CampaignMailer,
    repository::{
        AuditLogRepository,
        CampaignRepository,
        ContactRepository,
        CreditRepository,
    },
};
use sendflow_shared::{event_log::event, log_business_event};

use crate::{
    error::DispatchError,
    renderer::CanvasRenderer,
    usecase::dispatch::{DispatchOutcome, dispatch},
};

/// キャンペーン処理パイプラインの依存
pub struct ProcessorDeps {
    pub campaign_repo:  Arc<dyn CampaignRepository>,
    pub credit_repo:    Arc<dyn CreditRepository>,
    pub audit_log_repo: Arc<dyn AuditLogRepository>,
    pub contact_repo:   Arc<dyn ContactRepository>,
    pub mailer:         Arc<dyn CampaignMailer>,
    pub clock:          Arc<dyn Clock>,
}

/// キャンペーン処理パイプライン
pub struct CampaignProcessor {
    campaign_repo:       Arc<dyn CampaignRepository>,
    credit_repo:         Arc<dyn CreditRepository>,
    audit_log_repo:      Arc<dyn AuditLogRepository>,
    contact_repo:        Arc<dyn ContactRepository>,
    mailer:              Arc<dyn CampaignMailer>,
    renderer:            CanvasRenderer,
    clock:               Arc<dyn Clock>,
    send_delay:          Duration,
    fallback_from_email: String,
    postal_address:      Option<String>,
}

impl CampaignProcessor {
    pub fn new(
        deps: ProcessorDeps,
        renderer: CanvasRenderer,
        send_delay: Duration,
        fallback_from_email: String,
        postal_address: Option<String>,
    ) -> Self {
        Self {
            campaign_repo: deps.campaign_repo,
            credit_repo: deps.credit_repo,
            audit_log_repo: deps.audit_log_repo,
            contact_repo: deps.contact_repo,
            mailer: deps.mailer,
            renderer,
            clock: deps.clock,
            send_delay,
            fallback_from_email,
            postal_address,
        }
    }

    /// 送信元アドレスを解決する
    ///
    /// キャンペーンに送信元が設定されていない場合は
    /// デプロイ設定のフォールバックを使う。
    fn effective_from_email<'a>(&'a self, campaign: &'a Campaign) -> &'a str {
        let email = campaign.from_email().trim();
        if email.is_empty() {
            &self.fallback_from_email
        } else {
            email
        }
    }

    /// クレーム済みの単発キャンペーンを処理する
    ///
    /// タクソノミー上のエラー（データ形式・宛先なし・クレジット不足・
    /// プロバイダ障害）はすべて failed 終端状態に収束させ、監査ログを残す。
    /// 戻り値のエラーは終端状態の永続化自体に失敗した場合のみ。
    pub async fn process_one_shot(&self, campaign: Campaign) -> Result<AuditStatus, DispatchError> {
        match self.run_dispatch(&campaign).await {
            Ok(outcome) => {
                let now = self.clock.now();
                let sent_count = outcome.sent_count();
                let total = outcome.total();
                let message = format!("{sent_count}/{total} 件送信しました");

                if outcome.all_succeeded() {
                    let updated = campaign.clone().completed_sent(sent_count, now)?;
                    self.campaign_repo.save(&updated).await?;
                    self.append_audit(&campaign, AuditStatus::Sent, message, None)
                        .await?;
                    log_business_event!(
                        event.category = event::category::CAMPAIGN,
                        event.action = event::action::CAMPAIGN_SENT,
                        event.result = event::result::SUCCESS,
                        event.campaign_id = %campaign.id(),
                        event.user_id = %campaign.user_id(),
                        sent_count,
                        "キャンペーンを配信しました"
                    );
                    Ok(AuditStatus::Sent)
                } else {
                    let reason = format!("{} 件の送信に失敗しました", outcome.failed.len());
                    let detail = outcome
                        .failed
                        .first()
                        .map(|f| format!("{}: {}", f.address, f.error));
                    let updated = campaign
                        .clone()
                        .completed_failed(sent_count, reason, now)?;
                    self.campaign_repo.save(&updated).await?;
                    self.append_audit(&campaign, AuditStatus::Failed, message, detail)
                        .await?;
                    log_business_event!(
                        event.category = event::category::CAMPAIGN,
                        event.action = event::action::CAMPAIGN_FAILED,
                        event.result = event::result::FAILURE,
                        event.campaign_id = %campaign.id(),
                        event.user_id = %campaign.user_id(),
                        sent_count,
                        failed_count = outcome.failed.len(),
                        "キャンペーンの配信が一部失敗しました"
                    );
                    Ok(AuditStatus::Failed)
                }
            }
            Err(e) => {
                let now = self.clock.now();
                let updated = campaign.clone().completed_failed(0, e.to_string(), now)?;
                self.campaign_repo.save(&updated).await?;
                self.append_audit(
                    &campaign,
                    AuditStatus::Failed,
                    "配信に失敗しました".to_string(),
                    Some(e.to_string()),
                )
                .await?;
                log_business_event!(
                    event.category = event::category::CAMPAIGN,
                    event.action = event::action::CAMPAIGN_FAILED,
                    event.result = event::result::FAILURE,
                    event.campaign_id = %campaign.id(),
                    event.user_id = %campaign.user_id(),
                    error = %e,
                    "キャンペーンの配信に失敗しました"
                );
                Ok(AuditStatus::Failed)
            }
        }
    }

    /// 定期キャンペーンの 1 回分の発火を処理する
    ///
    /// 状態遷移は行わず、`last_sent_at` のウォーターマークを進める。
    /// 失敗時もウォーターマークを進め、同一ピリオド内での再発火を防ぐ。
    pub async fn process_recurring(&self, campaign: Campaign) -> Result<AuditStatus, DispatchError> {
        let result = self.run_dispatch(&campaign).await;
        let now = self.clock.now();

        match result {
            Ok(outcome) => {
                let sent_count = outcome.sent_count();
                let total = outcome.total();
                self.campaign_repo
                    .record_recurring_fire(campaign.id(), now, sent_count)
                    .await?;

                let (status, detail) = if outcome.all_succeeded() {
                    (AuditStatus::Sent, None)
                } else {
                    let detail = outcome
                        .failed
                        .first()
                        .map(|f| format!("{}: {}", f.address, f.error));
                    (AuditStatus::Failed, detail)
                };
                let message = format!("{sent_count}/{total} 件送信しました（定期配信）");
                self.append_audit(&campaign, status, message, detail).await?;
                log_business_event!(
                    event.category = event::category::CAMPAIGN,
                    event.action = event::action::RECURRING_FIRED,
                    event.result = event::result::SUCCESS,
                    event.campaign_id = %campaign.id(),
                    event.user_id = %campaign.user_id(),
                    sent_count,
                    "定期キャンペーンを発火しました"
                );
                Ok(status)
            }
            Err(e) => {
                self.campaign_repo
                    .record_recurring_fire(campaign.id(), now, 0)
                    .await?;
                self.append_audit(
                    &campaign,
                    AuditStatus::Failed,
                    "定期配信に失敗しました".to_string(),
                    Some(e.to_string()),
                )
                .await?;
                log_business_event!(
                    event.category = event::category::CAMPAIGN,
                    event.action = event::action::RECURRING_FIRED,
                    event.result = event::result::FAILURE,
                    event.campaign_id = %campaign.id(),
                    event.user_id = %campaign.user_id(),
                    error = %e,
                    "定期キャンペーンの発火に失敗しました"
                );
                Ok(AuditStatus::Failed)
            }
        }
    }

    /// レンダリング → クレジットガード → ディスパッチ → 引き落とし
    async fn run_dispatch(&self, campaign: &Campaign) -> Result<DispatchOutcome, DispatchError> {
        let recipients = self.resolve_recipients(campaign).await?;
        let elements = parse_canvas(campaign.canvas()).map_err(into_data_format)?;
        let from_email = self.effective_from_email(campaign);
        let content = self.renderer.render(
            &elements,
            campaign.subject(),
            campaign.from_name().as_str(),
            from_email,
            self.postal_address.as_deref(),
        )?;

        // クレジット事前ガード
        let grants = self.credit_repo.find_grants(campaign.user_id()).await?;
        let base_allowance = self.credit_repo.base_allowance(campaign.user_id()).await?;
        let available = available_credits(&grants, base_allowance);
        let required = recipients.len() as i64;
        if available < required {
            return Err(DispatchError::InsufficientCredits {
                required,
                available,
            });
        }

        let outcome = dispatch(
            self.mailer.as_ref(),
            campaign,
            &recipients,
            &content,
            from_email,
            available,
            self.send_delay,
        )
        .await;

        // 引き落とすのは実際に成功した送信数のみ
        let sent = i64::from(outcome.sent_count());
        if sent > 0 {
            let plan = plan_debit(&grants, base_allowance, sent);
            let new_base = self
                .credit_repo
                .apply_debit(campaign.user_id(), &plan)
                .await?;
            log_business_event!(
                event.category = event::category::CREDIT,
                event.action = event::action::CREDIT_DEBITED,
                event.result = event::result::SUCCESS,
                event.user_id = %campaign.user_id(),
                amount = sent,
                new_base_allowance = new_base,
                "クレジットを引き落としました"
            );
        }

        Ok(outcome)
    }

    /// 受信者スナップショットを解決する
    ///
    /// スナップショットが空の場合はユーザーのコンタクトリストに
    /// フォールバックする。それでも空なら宛先なしエラー。
    async fn resolve_recipients(
        &self,
        campaign: &Campaign,
    ) -> Result<Vec<Recipient>, DispatchError> {
        let mut recipients =
            parse_recipients(campaign.recipients()).map_err(into_data_format)?;

        if recipients.is_empty() {
            recipients = self
                .contact_repo
                .list_addresses(campaign.user_id())
                .await?
                .into_iter()
                .map(|address| Recipient { address })
                .collect();
        }

        if recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }
        Ok(recipients)
    }

    async fn append_audit(
        &self,
        campaign: &Campaign,
        status: AuditStatus,
        message: String,
        error_detail: Option<String>,
    ) -> Result<(), DispatchError> {
        let log = CampaignAuditLog::new(NewCampaignAuditLog {
            user_id: campaign.user_id().clone(),
            campaign_id: campaign.id().clone(),
            campaign_name: campaign.name().as_str().to_string(),
            status,
            message,
            error_detail,
            now: self.clock.now(),
        });
        self.audit_log_repo.insert(&log).await?;
        Ok(())
    }
}

/// ドメインのデータ形式エラーをタクソノミー上の `DataFormat` に畳み込む
fn into_data_format(e: DomainError) -> DispatchError {
    match e {
        DomainError::DataFormat(msg) => DispatchError::DataFormat(msg),
        other => DispatchError::Domain(other),
    }
}
