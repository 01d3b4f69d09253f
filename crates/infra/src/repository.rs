//! # リポジトリ実装
//!
//! 配信コアが扱うエンティティの永続化を担当する。
//!
//! ## 設計方針
//!
//! - **依存性逆転**: トレイトをここで定義し、PostgreSQL 実装と
//!   テスト用モック（`mock` モジュール）が同じトレイトを実装する
//! - **ランタイムクエリ API**: `sqlx::query(...).bind(...)` を使用し、
//!   ビルドにデータベース接続を要求しない
//! - **復元はドメインに委譲**: フラット行 → エンティティの変換は
//!   `from_db` 系のドメイン関数が不変条件ごと検証する

pub mod audit_log_repository;
pub mod campaign_repository;
pub mod contact_repository;
pub mod credit_repository;

pub use audit_log_repository::{AuditLogRepository, PostgresAuditLogRepository};
pub use campaign_repository::{CampaignRepository, PostgresCampaignRepository};
pub use contact_repository::{ContactRepository, PostgresContactRepository};
pub use credit_repository::{CreditRepository, PostgresCreditRepository};
