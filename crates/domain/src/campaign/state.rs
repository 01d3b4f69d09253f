//! # キャンペーンエンティティとステートマシン
//!
//! 配信キャンペーンのライフサイクル（予約 → 処理中 → 送信完了 / 失敗）を管理する。
//!
//! 状態遷移は ADT（代数的データ型）で表現し、不正な状態を型レベルで防止する。
//! 共通フィールドをエンティティ外側に、状態固有フィールドを `state` enum に分離する。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use strum::IntoStaticStr;

use super::schedule::Schedule;
use crate::{DomainError, user::UserId};

define_uuid_id! {
    /// キャンペーン ID
    pub struct CampaignId;
}

define_validated_string! {
    /// キャンペーン名（最大 200 文字）
    pub struct CampaignName {
        label: "キャンペーン名",
        max_length: 200,
    }
}

define_validated_string! {
    /// 差出人表示名（最大 100 文字）
    pub struct SenderName {
        label: "差出人名",
        max_length: 100,
    }
}

/// キャンペーンステータス
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "snake_case")]
pub enum CampaignStatus {
    /// 配信待ち（予約済み・定期共通）
    Scheduled,
    /// 配信処理中（クレーム済み）
    Processing,
    /// 送信完了
    Sent,
    /// 配信失敗
    Failed,
}

impl std::str::FromStr for CampaignStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "processing" => Ok(Self::Processing),
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            _ => Err(DomainError::Validation(format!(
                "不正なキャンペーンステータス: {}",
                s
            ))),
        }
    }
}

/// キャンペーンの状態（ADT ベースステートマシン）
///
/// 各状態で有効なフィールドのみを持たせることで、不正な状態を型レベルで防止する。
/// 定期キャンペーンはステータスを遷移させず、`last_sent_at` の更新のみで発火を記録する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CampaignState {
    /// 配信待ち
    Scheduled,
    /// 配信処理中
    Processing(ProcessingState),
    /// 送信完了
    Sent(CompletedState),
    /// 配信失敗
    Failed(FailedState),
}

/// Processing 状態の固有フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingState {
    /// クレーム日時（処理中キャンペーンには必ず存在する）
    pub started_at: DateTime<Utc>,
}

/// Sent 状態の固有フィールド
///
/// Processing からのみ遷移可能。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedState {
    /// クレーム日時
    pub started_at:   DateTime<Utc>,
    /// 完了日時
    pub completed_at: DateTime<Utc>,
    /// 実際に送信成功した件数
    pub sent_count:   u32,
}

/// Failed 状態の固有フィールド
///
/// Processing からのみ遷移可能。部分失敗時は `sent_count > 0` になる。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedState {
    /// クレーム日時
    pub started_at:   DateTime<Utc>,
    /// 完了日時
    pub completed_at: DateTime<Utc>,
    /// 失敗確定までに送信成功した件数
    pub sent_count:   u32,
    /// 失敗理由（監査ログと同じ文言）
    pub reason:       String,
}

/// キャンペーンエンティティ
///
/// 配信の単位。作成時点の受信者スナップショットとキャンバス JSON を保持し、
/// ポーラーにクレームされてから送信完了 / 失敗の終端状態に遷移する。
///
/// 共通フィールドを外側に、状態固有フィールドを `state` enum に分離。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Campaign {
    id: CampaignId,
    user_id: UserId,
    name: CampaignName,
    subject: String,
    from_name: SenderName,
    from_email: String,
    recipients: JsonValue,
    canvas: JsonValue,
    schedule: Schedule,
    last_sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    state: CampaignState,
}

/// キャンペーンの新規作成パラメータ
pub struct NewCampaign {
    pub id: CampaignId,
    pub user_id: UserId,
    pub name: CampaignName,
    pub subject: String,
    pub from_name: SenderName,
    pub from_email: String,
    pub recipients: JsonValue,
    pub canvas: JsonValue,
    pub schedule: Schedule,
    pub now: DateTime<Utc>,
}

/// キャンペーンの DB 復元パラメータ
///
/// DB スキーマのフラット構造を表現する。`from_db()` で不変条件を検証して ADT に変換する。
pub struct CampaignRecord {
    pub id: CampaignId,
    pub user_id: UserId,
    pub name: CampaignName,
    pub subject: String,
    pub from_name: SenderName,
    pub from_email: String,
    pub recipients: JsonValue,
    pub canvas: JsonValue,
    pub schedule: Schedule,
    pub status: CampaignStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub sent_count: Option<u32>,
    pub failure_reason: Option<String>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// 新しいキャンペーンを作成する
    pub fn new(params: NewCampaign) -> Self {
        Self {
            id: params.id,
            user_id: params.user_id,
            name: params.name,
            subject: params.subject,
            from_name: params.from_name,
            from_email: params.from_email,
            recipients: params.recipients,
            canvas: params.canvas,
            schedule: params.schedule,
            last_sent_at: None,
            created_at: params.now,
            updated_at: params.now,
            state: CampaignState::Scheduled,
        }
    }

    /// 既存のデータから復元する
    ///
    /// DB のフラット構造から ADT に変換し、不変条件を検証する。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 不変条件違反（例: Processing で started_at が None）
    pub fn from_db(record: CampaignRecord) -> Result<Self, DomainError> {
        let state = match record.status {
            CampaignStatus::Scheduled => CampaignState::Scheduled,
            CampaignStatus::Processing => {
                let started_at = record.started_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Processing キャンペーンには started_at が必要です".to_string(),
                    )
                })?;
                CampaignState::Processing(ProcessingState { started_at })
            }
            CampaignStatus::Sent => {
                let started_at = record.started_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Sent キャンペーンには started_at が必要です".to_string(),
                    )
                })?;
                let completed_at = record.completed_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Sent キャンペーンには completed_at が必要です".to_string(),
                    )
                })?;
                let sent_count = record.sent_count.ok_or_else(|| {
                    DomainError::Validation(
                        "Sent キャンペーンには sent_count が必要です".to_string(),
                    )
                })?;
                CampaignState::Sent(CompletedState {
                    started_at,
                    completed_at,
                    sent_count,
                })
            }
            CampaignStatus::Failed => {
                let started_at = record.started_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Failed キャンペーンには started_at が必要です".to_string(),
                    )
                })?;
                let completed_at = record.completed_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Failed キャンペーンには completed_at が必要です".to_string(),
                    )
                })?;
                let reason = record.failure_reason.ok_or_else(|| {
                    DomainError::Validation(
                        "Failed キャンペーンには failure_reason が必要です".to_string(),
                    )
                })?;
                CampaignState::Failed(FailedState {
                    started_at,
                    completed_at,
                    sent_count: record.sent_count.unwrap_or(0),
                    reason,
                })
            }
        };

        Ok(Self {
            id: record.id,
            user_id: record.user_id,
            name: record.name,
            subject: record.subject,
            from_name: record.from_name,
            from_email: record.from_email,
            recipients: record.recipients,
            canvas: record.canvas,
            schedule: record.schedule,
            last_sent_at: record.last_sent_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
            state,
        })
    }

    // Getter メソッド

    pub fn id(&self) -> &CampaignId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn name(&self) -> &CampaignName {
        &self.name
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn from_name(&self) -> &SenderName {
        &self.from_name
    }

    pub fn from_email(&self) -> &str {
        &self.from_email
    }

    pub fn recipients(&self) -> &JsonValue {
        &self.recipients
    }

    pub fn canvas(&self) -> &JsonValue {
        &self.canvas
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn last_sent_at(&self) -> Option<DateTime<Utc>> {
        self.last_sent_at
    }

    pub fn status(&self) -> CampaignStatus {
        match &self.state {
            CampaignState::Scheduled => CampaignStatus::Scheduled,
            CampaignState::Processing(_) => CampaignStatus::Processing,
            CampaignState::Sent(_) => CampaignStatus::Sent,
            CampaignState::Failed(_) => CampaignStatus::Failed,
        }
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            CampaignState::Scheduled => None,
            CampaignState::Processing(s) => Some(s.started_at),
            CampaignState::Sent(s) => Some(s.started_at),
            CampaignState::Failed(s) => Some(s.started_at),
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            CampaignState::Sent(s) => Some(s.completed_at),
            CampaignState::Failed(s) => Some(s.completed_at),
            _ => None,
        }
    }

    pub fn sent_count(&self) -> Option<u32> {
        match &self.state {
            CampaignState::Sent(s) => Some(s.sent_count),
            CampaignState::Failed(s) => Some(s.sent_count),
            _ => None,
        }
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.state {
            CampaignState::Failed(s) => Some(&s.reason),
            _ => None,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 状態への直接アクセス（パターンマッチ用）
    pub fn state(&self) -> &CampaignState {
        &self.state
    }

    // ビジネスロジックメソッド

    /// ポーラーにクレームされた新しいキャンペーンを返す
    ///
    /// Scheduled → Processing。1 回の配信につき必ず 1 度だけ通過する。
    /// DB 側では条件付き UPDATE が同じ遷移を原子的に行うため、
    /// このメソッドはクレーム成功後のメモリ上の状態を揃える役割を持つ。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: Scheduled 以外の状態で呼び出した場合
    pub fn claimed(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            CampaignState::Scheduled => Ok(Self {
                state: CampaignState::Processing(ProcessingState { started_at: now }),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "クレームは配信待ち状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 配信完了した新しいキャンペーンを返す
    ///
    /// Processing → Sent。`sent_count` は実際に送信成功した件数。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: Processing 以外の状態で呼び出した場合
    pub fn completed_sent(self, sent_count: u32, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            CampaignState::Processing(processing) => Ok(Self {
                state: CampaignState::Sent(CompletedState {
                    started_at:   processing.started_at,
                    completed_at: now,
                    sent_count,
                }),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "配信完了は処理中状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 配信失敗した新しいキャンペーンを返す
    ///
    /// Processing → Failed。部分失敗時も `sent_count` に成功分を記録する。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: Processing 以外の状態で呼び出した場合
    pub fn completed_failed(
        self,
        sent_count: u32,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        match self.state {
            CampaignState::Processing(processing) => Ok(Self {
                state: CampaignState::Failed(FailedState {
                    started_at:   processing.started_at,
                    completed_at: now,
                    sent_count,
                    reason,
                }),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "配信失敗は処理中状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 定期配信の発火を記録した新しいキャンペーンを返す
    ///
    /// 定期キャンペーンはステータスを遷移させず Scheduled のまま残り、
    /// `last_sent_at` ウォーターマークの更新のみで発火を記録する
    /// （同日内の再発火を防ぐ）。
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 定期スケジュールでない、または Scheduled 以外の場合
    pub fn recurring_fired(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if !matches!(self.schedule, Schedule::Recurring { .. }) {
            return Err(DomainError::Validation(
                "定期発火は定期スケジュールのキャンペーンでのみ可能です".to_string(),
            ));
        }
        match self.state {
            CampaignState::Scheduled => Ok(Self {
                last_sent_at: Some(now),
                updated_at: now,
                ..self
            }),
            _ => Err(DomainError::Validation(format!(
                "定期発火は配信待ち状態でのみ可能です（現在: {}）",
                self.status()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use serde_json::json;

    use super::*;
    use crate::campaign::{Cadence, Frequency};

    /// テスト用の固定タイムスタンプ
    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[fixture]
    fn test_campaign(now: DateTime<Utc>) -> Campaign {
        Campaign::new(NewCampaign {
            id: CampaignId::new(),
            user_id: UserId::new(),
            name: CampaignName::new("テストキャンペーン").unwrap(),
            subject: "お知らせ".to_string(),
            from_name: SenderName::new("テスト送信者").unwrap(),
            from_email: "sender@example.com".to_string(),
            recipients: json!(["a@example.com", "b@example.com"]),
            canvas: json!([]),
            schedule: Schedule::Scheduled { at: now },
            now,
        })
    }

    #[fixture]
    fn recurring_campaign(now: DateTime<Utc>) -> Campaign {
        Campaign::new(NewCampaign {
            id: CampaignId::new(),
            user_id: UserId::new(),
            name: CampaignName::new("定期キャンペーン").unwrap(),
            subject: "週報".to_string(),
            from_name: SenderName::new("テスト送信者").unwrap(),
            from_email: "sender@example.com".to_string(),
            recipients: json!(["a@example.com"]),
            canvas: json!([]),
            schedule: Schedule::Recurring {
                at:      now,
                cadence: Cadence {
                    frequency: Frequency::Daily,
                    days_of_week: vec![],
                    ends_at: None,
                },
            },
            now,
        })
    }

    mod campaign {
        use pretty_assertions::assert_eq;

        use super::*;

        /// Campaign の getter から CampaignRecord を構築するヘルパー。
        /// 構造体更新構文 `..record_from(&campaign)` と組み合わせて、
        /// テストで差異のあるフィールドだけを指定するために使用する。
        fn record_from(campaign: &Campaign) -> CampaignRecord {
            CampaignRecord {
                id: campaign.id().clone(),
                user_id: campaign.user_id().clone(),
                name: campaign.name().clone(),
                subject: campaign.subject().to_string(),
                from_name: campaign.from_name().clone(),
                from_email: campaign.from_email().to_string(),
                recipients: campaign.recipients().clone(),
                canvas: campaign.canvas().clone(),
                schedule: campaign.schedule().clone(),
                status: campaign.status(),
                started_at: campaign.started_at(),
                completed_at: campaign.completed_at(),
                sent_count: campaign.sent_count(),
                failure_reason: campaign.failure_reason().map(String::from),
                last_sent_at: campaign.last_sent_at(),
                created_at: campaign.created_at(),
                updated_at: campaign.updated_at(),
            }
        }

        #[rstest]
        fn test_新規作成の初期状態(test_campaign: Campaign) {
            let expected = Campaign::from_db(record_from(&test_campaign)).unwrap();
            assert_eq!(test_campaign, expected);
        }

        #[rstest]
        fn test_クレーム後の状態(test_campaign: Campaign, now: DateTime<Utc>) {
            let before = test_campaign.clone();
            let sut = test_campaign.claimed(now).unwrap();

            let expected = Campaign::from_db(CampaignRecord {
                status: CampaignStatus::Processing,
                started_at: Some(now),
                updated_at: now,
                ..record_from(&before)
            })
            .unwrap();
            assert_eq!(sut, expected);
        }

        #[rstest]
        fn test_配信完了後の状態(test_campaign: Campaign, now: DateTime<Utc>) {
            let campaign = test_campaign.claimed(now).unwrap();
            let before = campaign.clone();

            let sut = campaign.completed_sent(2, now).unwrap();

            let expected = Campaign::from_db(CampaignRecord {
                status: CampaignStatus::Sent,
                completed_at: Some(now),
                sent_count: Some(2),
                updated_at: now,
                ..record_from(&before)
            })
            .unwrap();
            assert_eq!(sut, expected);
        }

        #[rstest]
        fn test_配信失敗後の状態(test_campaign: Campaign, now: DateTime<Utc>) {
            let campaign = test_campaign.claimed(now).unwrap();
            let before = campaign.clone();

            let sut = campaign
                .completed_failed(1, "credit limit reached".to_string(), now)
                .unwrap();

            let expected = Campaign::from_db(CampaignRecord {
                status: CampaignStatus::Failed,
                completed_at: Some(now),
                sent_count: Some(1),
                failure_reason: Some("credit limit reached".to_string()),
                updated_at: now,
                ..record_from(&before)
            })
            .unwrap();
            assert_eq!(sut, expected);
        }

        #[rstest]
        fn test_配信待ち以外でクレームするとエラー(
            test_campaign: Campaign,
            now: DateTime<Utc>,
        ) {
            let campaign = test_campaign.claimed(now).unwrap();

            let result = campaign.claimed(now);

            assert!(result.is_err());
        }

        #[rstest]
        fn test_処理中以外で配信完了するとエラー(
            test_campaign: Campaign,
            now: DateTime<Utc>,
        ) {
            let result = test_campaign.completed_sent(1, now);

            assert!(result.is_err());
        }

        #[rstest]
        fn test_処理中以外で配信失敗するとエラー(
            test_campaign: Campaign,
            now: DateTime<Utc>,
        ) {
            let result = test_campaign.completed_failed(0, "error".to_string(), now);

            assert!(result.is_err());
        }

        // --- recurring_fired() テスト ---

        #[rstest]
        fn test_定期発火後の状態(recurring_campaign: Campaign, now: DateTime<Utc>) {
            let before = recurring_campaign.clone();

            let sut = recurring_campaign.recurring_fired(now).unwrap();

            let expected = Campaign::from_db(CampaignRecord {
                last_sent_at: Some(now),
                updated_at: now,
                ..record_from(&before)
            })
            .unwrap();
            assert_eq!(sut, expected);
            assert_eq!(sut.status(), CampaignStatus::Scheduled);
        }

        #[rstest]
        fn test_一回限りのキャンペーンの定期発火はエラー(
            test_campaign: Campaign,
            now: DateTime<Utc>,
        ) {
            let result = test_campaign.recurring_fired(now);

            assert!(result.is_err());
        }

        // --- from_db() 不変条件バリデーション ---

        #[rstest]
        fn test_from_db_processingでstarted_at欠損はエラー(test_campaign: Campaign) {
            let result = Campaign::from_db(CampaignRecord {
                status: CampaignStatus::Processing,
                started_at: None,
                ..record_from(&test_campaign)
            });

            assert!(result.is_err());
        }

        #[rstest]
        fn test_from_db_sentでcompleted_at欠損はエラー(
            test_campaign: Campaign,
            now: DateTime<Utc>,
        ) {
            let result = Campaign::from_db(CampaignRecord {
                status: CampaignStatus::Sent,
                started_at: Some(now),
                completed_at: None,
                sent_count: Some(1),
                ..record_from(&test_campaign)
            });

            assert!(result.is_err());
        }

        #[rstest]
        fn test_from_db_sentでsent_count欠損はエラー(
            test_campaign: Campaign,
            now: DateTime<Utc>,
        ) {
            let result = Campaign::from_db(CampaignRecord {
                status: CampaignStatus::Sent,
                started_at: Some(now),
                completed_at: Some(now),
                sent_count: None,
                ..record_from(&test_campaign)
            });

            assert!(result.is_err());
        }

        #[rstest]
        fn test_from_db_failedでfailure_reason欠損はエラー(
            test_campaign: Campaign,
            now: DateTime<Utc>,
        ) {
            let result = Campaign::from_db(CampaignRecord {
                status: CampaignStatus::Failed,
                started_at: Some(now),
                completed_at: Some(now),
                sent_count: Some(0),
                failure_reason: None,
                ..record_from(&test_campaign)
            });

            assert!(result.is_err());
        }
    }
}
