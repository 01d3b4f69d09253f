//! # ContactRepository
//!
//! 連絡先リストの読み取りを担当するリポジトリ。
//!
//! キャンペーンの受信者スナップショットが空のとき、
//! ユーザーの連絡先リスト全体をフォールバックとして使用する。

use async_trait::async_trait;
use sendflow_domain::user::UserId;
use sqlx::{PgPool, Row};

use crate::error::InfraError;

/// 連絡先リポジトリトレイト
#[async_trait]
pub trait ContactRepository: Send + Sync {
    /// ユーザーの配信可能な連絡先アドレスを取得する
    async fn list_addresses(&self, user_id: &UserId) -> Result<Vec<String>, InfraError>;
}

/// PostgreSQL 実装の ContactRepository
#[derive(Debug, Clone)]
pub struct PostgresContactRepository {
    pool: PgPool,
}

impl PostgresContactRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContactRepository for PostgresContactRepository {
    #[tracing::instrument(skip_all, level = "debug")]
    async fn list_addresses(&self, user_id: &UserId) -> Result<Vec<String>, InfraError> {
        let rows = sqlx::query(
            r#"
            SELECT address
            FROM contacts
            WHERE user_id = $1 AND NOT unsubscribed
            ORDER BY created_at
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| Ok(row.try_get("address")?))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresContactRepository>();
    }
}
