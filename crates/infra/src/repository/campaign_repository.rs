//! # CampaignRepository
//!
//! キャンペーンの永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **クレームは条件付き UPDATE**: `status = 'scheduled'` の行だけを
//!   `processing` に遷移させ、影響行数でクレーム成否を判定する。
//!   同じキャンペーンを 2 度処理しない冪等性の要
//! - **due 判定の分担**: 1 回限りの配信は SQL のルックバック窓で絞り込み、
//!   定期配信の cadence 判定は JSON を持つドメイン側で行う

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sendflow_domain::{
    DomainError,
    campaign::{Campaign, CampaignId, CampaignName, CampaignRecord, CampaignStatus, Schedule, SenderName},
    user::UserId,
};
use serde_json::Value as JsonValue;
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::error::InfraError;

/// キャンペーンリポジトリトレイト
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// 配信期限を迎えた 1 回限りのキャンペーンを取得する
    ///
    /// 予約時刻が `[now - lookback, now]` に入る予約配信と、
    /// 配信待ちのままの即時配信が対象。
    async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
        lookback: Duration,
    ) -> Result<Vec<Campaign>, InfraError>;

    /// 配信待ちの定期キャンペーンを取得する
    ///
    /// cadence の発火判定（曜日・時刻帯・ウォーターマーク）は
    /// 呼び出し側がドメイン関数で行う。
    async fn find_active_recurring(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>, InfraError>;

    /// キャンペーンをクレームする
    ///
    /// `scheduled` 状態の行だけを `processing` に更新し、
    /// 更新できた場合のみ `true` を返す（冪等）。
    async fn claim(&self, id: &CampaignId, now: DateTime<Utc>) -> Result<bool, InfraError>;

    /// キャンペーンを保存する（upsert）
    async fn save(&self, campaign: &Campaign) -> Result<(), InfraError>;

    /// 定期配信の発火を記録する
    ///
    /// `last_sent_at` ウォーターマークの更新と累計送信数の加算のみを行い、
    /// ステータスは変更しない。
    async fn record_recurring_fire(
        &self,
        id: &CampaignId,
        last_sent_at: DateTime<Utc>,
        sent_increment: u32,
    ) -> Result<(), InfraError>;
}

const CAMPAIGN_COLUMNS: &str = r#"
    id, user_id, name, subject, from_name, from_email,
    recipients, canvas, schedule_kind, scheduled_at, cadence,
    status, started_at, completed_at, sent_count, failure_reason,
    last_sent_at, created_at, updated_at
"#;

/// PostgreSQL 実装の CampaignRepository
#[derive(Debug, Clone)]
pub struct PostgresCampaignRepository {
    pool: PgPool,
}

impl PostgresCampaignRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for PostgresCampaignRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_due_scheduled(
        &self,
        now: DateTime<Utc>,
        lookback: Duration,
    ) -> Result<Vec<Campaign>, InfraError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS}
            FROM campaigns
            WHERE status = 'scheduled'
              AND (
                schedule_kind = 'immediate'
                OR (schedule_kind = 'scheduled' AND scheduled_at BETWEEN $1 AND $2)
              )
            ORDER BY scheduled_at NULLS FIRST
            "#
        ))
        .bind(now - lookback)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_campaign).collect()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_active_recurring(&self, _now: DateTime<Utc>) -> Result<Vec<Campaign>, InfraError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {CAMPAIGN_COLUMNS}
            FROM campaigns
            WHERE status = 'scheduled'
              AND schedule_kind = 'recurring'
            ORDER BY scheduled_at
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_campaign).collect()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn claim(&self, id: &CampaignId, now: DateTime<Utc>) -> Result<bool, InfraError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'processing', started_at = $2, updated_at = $2
            WHERE id = $1 AND status = 'scheduled'
            "#,
        )
        .bind(id.as_uuid())
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn save(&self, campaign: &Campaign) -> Result<(), InfraError> {
        let cadence = match campaign.schedule() {
            Schedule::Recurring { cadence, .. } => Some(serde_json::to_value(cadence)?),
            _ => None,
        };

        sqlx::query(
            r#"
            INSERT INTO campaigns (
                id, user_id, name, subject, from_name, from_email,
                recipients, canvas, schedule_kind, scheduled_at, cadence,
                status, started_at, completed_at, sent_count, failure_reason,
                last_sent_at, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6,
                $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16,
                $17, $18, $19
            )
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at,
                sent_count = EXCLUDED.sent_count,
                failure_reason = EXCLUDED.failure_reason,
                last_sent_at = EXCLUDED.last_sent_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(campaign.id().as_uuid())
        .bind(campaign.user_id().as_uuid())
        .bind(campaign.name().as_str())
        .bind(campaign.subject())
        .bind(campaign.from_name().as_str())
        .bind(campaign.from_email())
        .bind(campaign.recipients())
        .bind(campaign.canvas())
        .bind(campaign.schedule().kind())
        .bind(campaign.schedule().scheduled_at())
        .bind(cadence)
        .bind(<&'static str>::from(campaign.status()))
        .bind(campaign.started_at())
        .bind(campaign.completed_at())
        .bind(campaign.sent_count().map(|c| c as i32))
        .bind(campaign.failure_reason())
        .bind(campaign.last_sent_at())
        .bind(campaign.created_at())
        .bind(campaign.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn record_recurring_fire(
        &self,
        id: &CampaignId,
        last_sent_at: DateTime<Utc>,
        sent_increment: u32,
    ) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            UPDATE campaigns
            SET last_sent_at = $2,
                sent_count = COALESCE(sent_count, 0) + $3,
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(last_sent_at)
        .bind(sent_increment as i32)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// フラット行からキャンペーンを復元する
///
/// 不変条件の検証はドメインの `from_db` に委譲する。
/// 不変条件を満たさない行は `InfraError::Unexpected` として表面化させる。
fn row_to_campaign(row: PgRow) -> Result<Campaign, InfraError> {
    let status: CampaignStatus = row
        .try_get::<String, _>("status")?
        .parse()
        .map_err(restore_error)?;
    let name = CampaignName::new(row.try_get::<String, _>("name")?).map_err(restore_error)?;
    let from_name =
        SenderName::new(row.try_get::<String, _>("from_name")?).map_err(restore_error)?;
    let cadence: Option<JsonValue> = row.try_get("cadence")?;
    let schedule = Schedule::from_db_parts(
        &row.try_get::<String, _>("schedule_kind")?,
        row.try_get("scheduled_at")?,
        cadence.as_ref(),
    )
    .map_err(restore_error)?;

    Campaign::from_db(CampaignRecord {
        id: CampaignId::from_uuid(row.try_get("id")?),
        user_id: UserId::from_uuid(row.try_get("user_id")?),
        name,
        subject: row.try_get("subject")?,
        from_name,
        from_email: row.try_get("from_email")?,
        recipients: row.try_get("recipients")?,
        canvas: row.try_get("canvas")?,
        schedule,
        status,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        sent_count: row
            .try_get::<Option<i32>, _>("sent_count")?
            .map(|c| c.max(0) as u32),
        failure_reason: row.try_get("failure_reason")?,
        last_sent_at: row.try_get("last_sent_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
    .map_err(restore_error)
}

fn restore_error(e: DomainError) -> InfraError {
    InfraError::unexpected(format!("キャンペーンの復元に失敗: {e}"))
}
