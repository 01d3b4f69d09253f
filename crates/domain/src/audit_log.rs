//! # 配信監査ログ
//!
//! キャンペーン処理の監査証跡を記録するドメインモデル。
//!
//! ## 設計方針
//!
//! - **不変性**: 監査ログは一度作成されたら変更されない（insert-only）
//! - **1 処理 1 件**: 終端状態（Sent / Failed）に到達した処理 1 回につき
//!   ちょうど 1 件を記録する。定期配信も発火 1 回につき 1 件
//! - **引き落とし後に記録**: クレジット引き落としの後に書き込む。
//!   万一ログ記録に失敗しても課金は既に確定している

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{campaign::CampaignId, user::UserId};

define_uuid_id! {
    /// 監査ログ ID
    pub struct AuditLogId;
}

/// 監査ログに記録する処理結果
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "snake_case")]
pub enum AuditStatus {
    /// 配信完了
    Sent,
    /// 配信失敗（部分失敗を含む）
    Failed,
}

/// 配信監査ログエンティティ
///
/// キャンペーン名は記録時点のスナップショット。キャンペーンが後から
/// 改名・削除されてもログの可読性を保つ。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignAuditLog {
    pub id: AuditLogId,
    pub user_id: UserId,
    pub campaign_id: CampaignId,
    pub campaign_name: String,
    pub status: AuditStatus,
    /// 人間可読な結果メッセージ（例: "2/3 件送信"）
    pub message: String,
    /// 失敗時の詳細（タクソノミー上のエラー文言）
    pub error_detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// 監査ログの新規作成パラメータ
pub struct NewCampaignAuditLog {
    pub user_id: UserId,
    pub campaign_id: CampaignId,
    pub campaign_name: String,
    pub status: AuditStatus,
    pub message: String,
    pub error_detail: Option<String>,
    pub now: DateTime<Utc>,
}

impl CampaignAuditLog {
    pub fn new(params: NewCampaignAuditLog) -> Self {
        Self {
            id: AuditLogId::new(),
            user_id: params.user_id,
            campaign_id: params.campaign_id,
            campaign_name: params.campaign_name,
            status: params.status,
            message: params.message,
            error_detail: params.error_detail,
            created_at: params.now,
        }
    }
}
