//! # CreditRepository
//!
//! 送信クレジット台帳の永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **計画と適用の分離**: 引き落とし計画はドメインの純粋関数
//!   `plan_debit` が立て、ここでは計画を 1 トランザクションで適用するだけ
//! - **残高ガード**: 各 UPDATE に `remaining >= 引き落とし量` の条件を付け、
//!   並行する引き落としで残高が負になる経路を DB 側でも塞ぐ

use async_trait::async_trait;
use sendflow_domain::{
    credit::{CreditGrant, CreditGrantId, DebitPlan},
    user::UserId,
};
use sqlx::{PgPool, Row};

use crate::error::InfraError;

/// クレジットリポジトリトレイト
#[async_trait]
pub trait CreditRepository: Send + Sync {
    /// ユーザーの付与クレジットを取得順に取得する
    async fn find_grants(&self, user_id: &UserId) -> Result<Vec<CreditGrant>, InfraError>;

    /// ユーザーの基本送信枠を取得する
    async fn base_allowance(&self, user_id: &UserId) -> Result<i64, InfraError>;

    /// 引き落とし計画を 1 トランザクションで適用する
    ///
    /// 適用後の基本送信枠を返す。
    async fn apply_debit(&self, user_id: &UserId, plan: &DebitPlan) -> Result<i64, InfraError>;
}

/// PostgreSQL 実装の CreditRepository
#[derive(Debug, Clone)]
pub struct PostgresCreditRepository {
    pool: PgPool,
}

impl PostgresCreditRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditRepository for PostgresCreditRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_grants(&self, user_id: &UserId) -> Result<Vec<CreditGrant>, InfraError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, remaining, acquired_at
            FROM credit_grants
            WHERE user_id = $1 AND remaining > 0
            ORDER BY acquired_at
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CreditGrant {
                    id: CreditGrantId::from_uuid(row.try_get("id")?),
                    user_id: UserId::from_uuid(row.try_get("user_id")?),
                    remaining: row.try_get("remaining")?,
                    acquired_at: row.try_get("acquired_at")?,
                })
            })
            .collect()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn base_allowance(&self, user_id: &UserId) -> Result<i64, InfraError> {
        let row = sqlx::query("SELECT base_allowance FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| {
                InfraError::unexpected(format!("ユーザーが見つかりません: {user_id}"))
            })?;

        Ok(row.try_get("base_allowance")?)
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn apply_debit(&self, user_id: &UserId, plan: &DebitPlan) -> Result<i64, InfraError> {
        let mut tx = self.pool.begin().await?;

        for debit in &plan.grant_debits {
            let result = sqlx::query(
                r#"
                UPDATE credit_grants
                SET remaining = remaining - $2
                WHERE id = $1 AND remaining >= $2
                "#,
            )
            .bind(debit.grant_id.as_uuid())
            .bind(debit.amount)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() != 1 {
                return Err(InfraError::conflict(
                    "CreditGrant",
                    debit.grant_id.to_string(),
                ));
            }
        }

        let row = sqlx::query(
            r#"
            UPDATE users
            SET base_allowance = GREATEST(base_allowance - $2, 0)
            WHERE id = $1
            RETURNING base_allowance
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(plan.base_debit)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(row.try_get("base_allowance")?)
    }
}
