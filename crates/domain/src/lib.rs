//! # SendFlow ドメイン層
//!
//! キャンペーン配信のビジネスロジックを担うドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! このクレートは DDD（ドメイン駆動設計）の原則に従い、以下を提供する:
//!
//! - **エンティティ**: 一意の識別子を持つオブジェクト（例: Campaign）
//! - **値オブジェクト**: 識別子を持たない不変オブジェクト（例: CampaignName,
//!   Cadence）
//! - **ドメインサービス**: エンティティに属さない純粋なビジネスロジック
//!   （例: クレジット引き落とし計画、キャンバス行グルーピング）
//! - **ドメインエラー**: ビジネスルール違反を表現するエラー型
//!
//! ## 依存関係の方向
//!
//! ```text
//! dispatcher → infra → domain
//! ```
//!
//! ドメイン層はインフラ層（DB、SMTP）には一切依存しない。
//! これにより、配信パイプラインの中核ロジックが純粋関数としてテスト可能になる。
//!
//! ## モジュール構成
//!
//! - [`campaign`] - キャンペーンエンティティ、状態遷移、スケジュール
//! - [`canvas`] - メール本文のレイアウト記述（タグ付きユニオン + 行グルーピング）
//! - [`credit`] - 送信クレジット台帳の計算
//! - [`audit_log`] - 配信監査ログ
//! - [`delivery`] - 送信メッセージとプロバイダエラー
//! - [`error`] - ドメイン層で発生するエラーの定義

#[macro_use]
mod macros;

pub mod audit_log;
pub mod campaign;
pub mod canvas;
pub mod clock;
pub mod credit;
pub mod delivery;
pub mod error;
pub mod user;

pub use error::DomainError;
