//! # AuditLogRepository
//!
//! 配信監査ログの永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **insert-only**: 監査ログは追記のみ。更新・削除の操作は提供しない
//! - **処理 1 回につき 1 件**: 書き込みタイミングはユースケース層が保証する

use async_trait::async_trait;
use sendflow_domain::audit_log::CampaignAuditLog;
use sqlx::PgPool;

use crate::error::InfraError;

/// 監査ログリポジトリトレイト
#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// 監査ログを挿入する
    async fn insert(&self, log: &CampaignAuditLog) -> Result<(), InfraError>;
}

/// PostgreSQL 実装の AuditLogRepository
#[derive(Debug, Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn insert(&self, log: &CampaignAuditLog) -> Result<(), InfraError> {
        sqlx::query(
            r#"
            INSERT INTO campaign_audit_logs (
                id, user_id, campaign_id, campaign_name,
                status, message, error_detail, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(log.id.as_uuid())
        .bind(log.user_id.as_uuid())
        .bind(log.campaign_id.as_uuid())
        .bind(&log.campaign_name)
        .bind(<&'static str>::from(log.status))
        .bind(&log.message)
        .bind(&log.error_detail)
        .bind(log.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
