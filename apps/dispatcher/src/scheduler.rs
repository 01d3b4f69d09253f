//! # スケジューラポーラー
//!
//! 一定間隔で配信時刻の到来したキャンペーンを探し、処理パイプラインに渡す。
//!
//! ## 設計方針
//!
//! - **シングルインスタンス前提**: クレジット台帳はロックなしで扱うため、
//!   ポーラーは 1 プロセスのみで動かすこと。レプリカを並べると
//!   二重送信・二重引き落としが起きる（デプロイ上の制約）
//! - **tick 内は逐次処理**: 1 tick の中でキャンペーンを 1 件ずつ処理する
//! - **失敗の分離**: 1 件の処理失敗は同じ tick の残りの処理を妨げない
//! - **クレームしてから処理**: 重い処理の前にステータスを更新し、
//!   次の tick が同じキャンペーンを二重処理しないようにする

use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use sendflow_domain::{campaign::Schedule, clock::Clock};
use sendflow_infra::repository::CampaignRepository;
use sendflow_shared::{event_log::event, log_business_event};

use crate::usecase::CampaignProcessor;

/// ポーラーの実行コンテキスト
///
/// リポジトリ・処理パイプライン・Clock を注入して構成する。
/// グローバル状態には依存しない。
pub struct SchedulerContext {
    campaign_repo: Arc<dyn CampaignRepository>,
    processor:     CampaignProcessor,
    clock:         Arc<dyn Clock>,
    poll_interval: StdDuration,
    due_lookback:  Duration,
}

impl SchedulerContext {
    pub fn new(
        campaign_repo: Arc<dyn CampaignRepository>,
        processor: CampaignProcessor,
        clock: Arc<dyn Clock>,
        poll_interval: StdDuration,
        due_lookback: Duration,
    ) -> Self {
        Self {
            campaign_repo,
            processor,
            clock,
            poll_interval,
            due_lookback,
        }
    }

    /// ポーリングループを開始する
    ///
    /// 初回の tick は起動直後に実行する（プロセス再起動で取りこぼした
    /// 配信を遅延なく拾うため）。
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            let now = self.clock.now();
            self.tick(now).await;
        }
    }

    /// 1 回分のポーリングを実行する
    ///
    /// 期限の来た単発キャンペーンと、ケイデンスに合致した定期キャンペーンを
    /// 順に処理する。個々の失敗はログに残して処理を続行する。
    pub async fn tick(&self, now: DateTime<Utc>) {
        self.tick_scheduled(now).await;
        self.tick_recurring(now).await;
    }

    /// 期限内の単発キャンペーンをクレームして処理する
    async fn tick_scheduled(&self, now: DateTime<Utc>) {
        let due = match self
            .campaign_repo
            .find_due_scheduled(now, self.due_lookback)
            .await
        {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "予約キャンペーンの検索に失敗しました");
                return;
            }
        };

        for campaign in due {
            // 先にクレームする。既に別の tick が処理していればスキップ
            match self.campaign_repo.claim(campaign.id(), now).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::error!(
                        campaign_id = %campaign.id(),
                        error = %e,
                        "キャンペーンのクレームに失敗しました"
                    );
                    continue;
                }
            }
            log_business_event!(
                event.category = event::category::CAMPAIGN,
                event.action = event::action::CAMPAIGN_CLAIMED,
                event.result = event::result::SUCCESS,
                event.campaign_id = %campaign.id(),
                event.user_id = %campaign.user_id(),
                "キャンペーンをクレームしました"
            );

            let claimed = match campaign.clone().claimed(now) {
                Ok(claimed) => claimed,
                Err(e) => {
                    tracing::error!(
                        campaign_id = %campaign.id(),
                        error = %e,
                        "クレーム後の状態遷移に失敗しました"
                    );
                    continue;
                }
            };

            if let Err(e) = self.processor.process_one_shot(claimed).await {
                tracing::error!(
                    campaign_id = %campaign.id(),
                    error = %e,
                    "キャンペーンの処理に失敗しました"
                );
            }
        }
    }

    /// ケイデンスに合致した定期キャンペーンを処理する
    async fn tick_recurring(&self, now: DateTime<Utc>) {
        let candidates = match self.campaign_repo.find_active_recurring(now).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::error!(error = %e, "定期キャンペーンの検索に失敗しました");
                return;
            }
        };

        for campaign in candidates {
            let Schedule::Recurring { at, cadence } = campaign.schedule() else {
                continue;
            };
            if !cadence.is_due(*at, campaign.last_sent_at(), now) {
                continue;
            }

            if let Err(e) = self.processor.process_recurring(campaign.clone()).await {
                tracing::error!(
                    campaign_id = %campaign.id(),
                    error = %e,
                    "定期キャンペーンの処理に失敗しました"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_スケジューラコンテキストはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SchedulerContext>();
    }
}
