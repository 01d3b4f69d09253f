//! # キャンペーン
//!
//! メール配信キャンペーンのエンティティ、スケジュール、受信者スナップショットを管理する。
//!
//! ## 概念モデル
//!
//! - **Campaign**: 配信の単位。件名・差出人・受信者・キャンバスを保持する
//! - **Schedule**: 配信タイミング（即時 / 予約 / 定期）
//! - **Cadence**: 定期配信の頻度ルール（日次・週次・月次 + 終了日時）
//! - **Recipient**: 受信者スナップショットの 1 エントリ
//!
//! ## 使用例
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use sendflow_domain::campaign::{
//!     Campaign, CampaignId, CampaignName, CampaignStatus, NewCampaign, Schedule, SenderName,
//! };
//! use sendflow_domain::user::UserId;
//! use serde_json::json;
//!
//! let campaign = Campaign::new(NewCampaign {
//!     id: CampaignId::new(),
//!     user_id: UserId::new(),
//!     name: CampaignName::new("8月ニュースレター")?,
//!     subject: "今月のお知らせ".to_string(),
//!     from_name: SenderName::new("SendFlow 通信")?,
//!     from_email: "news@example.com".to_string(),
//!     recipients: json!(["a@example.com"]),
//!     canvas: json!([]),
//!     schedule: Schedule::Immediate,
//!     now: chrono::Utc::now(),
//! });
//! assert_eq!(campaign.status(), CampaignStatus::Scheduled);
//! # Ok(())
//! # }
//! ```

mod recipients;
mod schedule;
mod state;

pub use recipients::*;
pub use schedule::*;
pub use state::*;
