//! # 配信スケジュール
//!
//! キャンペーンの配信タイミングを表現する値オブジェクト。
//!
//! - **Immediate**: 作成直後の最初のポーリングで配信
//! - **Scheduled**: 指定時刻にちょうど 1 回配信
//! - **Recurring**: 基準時刻（アンカー）の時刻帯に、頻度ルールに従って繰り返し配信
//!
//! 「due 判定」は純粋関数として実装し、ポーラーから固定時刻を注入してテストする。

use chrono::{DateTime, Datelike, Duration, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use strum::IntoStaticStr;

use crate::DomainError;

/// アンカー時刻周辺の発火許容幅（分）
///
/// ポーリング間隔（60 秒）より広く取り、ポーラーの遅延やプロセス再起動で
/// ちょうどの時刻を逃しても同じ日のうちに発火できるようにする。
const FIRE_WINDOW_MINUTES: i64 = 5;

const MINUTES_PER_DAY: i64 = 24 * 60;

/// 配信スケジュール
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Schedule {
    /// 即時配信
    Immediate,
    /// 予約配信（1 回限り）
    Scheduled { at: DateTime<Utc> },
    /// 定期配信
    Recurring { at: DateTime<Utc>, cadence: Cadence },
}

/// 定期配信の頻度ルール
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    pub frequency: Frequency,
    /// 週次の配信曜日。空の場合はアンカーの曜日のみ
    #[serde(default)]
    pub days_of_week: Vec<DayOfWeek>,
    /// 定期配信の終了日時。None なら無期限
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

/// 定期配信の頻度
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "snake_case")]
pub enum Frequency {
    /// 毎日
    Daily,
    /// 毎週（days_of_week で曜日を指定）
    Weekly,
    /// 毎月（アンカーと同じ日付）
    Monthly,
}

/// 配信曜日
///
/// chrono の `Weekday` に直接 serde を生やさず、スナップショット JSON の
/// 表現（小文字英語名）をドメイン側で固定するための enum。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub fn to_weekday(self) -> Weekday {
        match self {
            Self::Monday => Weekday::Mon,
            Self::Tuesday => Weekday::Tue,
            Self::Wednesday => Weekday::Wed,
            Self::Thursday => Weekday::Thu,
            Self::Friday => Weekday::Fri,
            Self::Saturday => Weekday::Sat,
            Self::Sunday => Weekday::Sun,
        }
    }
}

impl Schedule {
    /// DB のフラットカラム（kind 文字列 + 時刻 + cadence JSON）から復元する
    ///
    /// # Errors
    ///
    /// - `DomainError::DataFormat`: kind が未知、必須カラムの欠損、cadence JSON の破損
    pub fn from_db_parts(
        kind: &str,
        scheduled_at: Option<DateTime<Utc>>,
        cadence: Option<&JsonValue>,
    ) -> Result<Self, DomainError> {
        match kind {
            "immediate" => Ok(Self::Immediate),
            "scheduled" => {
                let at = scheduled_at.ok_or_else(|| {
                    DomainError::DataFormat(
                        "予約スケジュールには scheduled_at が必要です".to_string(),
                    )
                })?;
                Ok(Self::Scheduled { at })
            }
            "recurring" => {
                let at = scheduled_at.ok_or_else(|| {
                    DomainError::DataFormat(
                        "定期スケジュールには scheduled_at が必要です".to_string(),
                    )
                })?;
                let cadence_value = cadence.ok_or_else(|| {
                    DomainError::DataFormat("定期スケジュールには cadence が必要です".to_string())
                })?;
                let cadence = serde_json::from_value(cadence_value.clone()).map_err(|e| {
                    DomainError::DataFormat(format!("cadence JSON を解釈できません: {}", e))
                })?;
                Ok(Self::Recurring { at, cadence })
            }
            _ => Err(DomainError::DataFormat(format!(
                "不正なスケジュール種別: {}",
                kind
            ))),
        }
    }

    /// DB の schedule_kind カラム値
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    /// 予約時刻（定期の場合はアンカー時刻）
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Immediate => None,
            Self::Scheduled { at } | Self::Recurring { at, .. } => Some(*at),
        }
    }

    /// 1 回限りの配信が今回のポーリングで発火すべきか
    ///
    /// 即時配信は常に発火対象（配信待ちである限り）。予約配信は
    /// `at ∈ [now - lookback, now]` のときのみ発火する。未来の予約は対象外、
    /// ルックバック窓より古い予約は取りこぼしとして発火させない
    /// （起動直後に過去分を一斉送信しないための安全弁）。
    pub fn due_once(&self, now: DateTime<Utc>, lookback: Duration) -> bool {
        match self {
            Self::Immediate => true,
            Self::Scheduled { at } => *at <= now && *at >= now - lookback,
            Self::Recurring { .. } => false,
        }
    }
}

impl Cadence {
    /// 定期配信が今回のポーリングで発火すべきか
    ///
    /// 判定は 4 段階:
    ///
    /// 1. `ends_at` を過ぎていれば発火しない（期限切れ）
    /// 2. `last_sent_at` が今日なら発火しない（1 日 1 回のウォーターマーク）
    /// 3. 現在時刻がアンカーの時刻帯 ±5 分に入っていなければ発火しない
    ///    （日付境界をまたぐ差は短い方を採用する）
    /// 4. 頻度ルールの曜日 / 日付条件を満たさなければ発火しない
    pub fn is_due(
        &self,
        anchor: DateTime<Utc>,
        last_sent_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        if let Some(ends_at) = self.ends_at
            && now > ends_at
        {
            return false;
        }

        if let Some(last) = last_sent_at
            && last.date_naive() == now.date_naive()
        {
            return false;
        }

        if !within_time_window(anchor, now) {
            return false;
        }

        match self.frequency {
            Frequency::Daily => true,
            Frequency::Weekly => {
                if self.days_of_week.is_empty() {
                    now.weekday() == anchor.weekday()
                } else {
                    self.days_of_week
                        .iter()
                        .any(|d| d.to_weekday() == now.weekday())
                }
            }
            Frequency::Monthly => now.day() == anchor.day(),
        }
    }

    /// 定期配信が終了日時を過ぎているか
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.ends_at.is_some_and(|ends_at| now > ends_at)
    }
}

/// 現在時刻がアンカーの時刻帯 ±5 分に入っているか
fn within_time_window(anchor: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    let anchor_minutes = i64::from(anchor.time().num_seconds_from_midnight() / 60);
    let now_minutes = i64::from(now.time().num_seconds_from_midnight() / 60);

    let diff = (now_minutes - anchor_minutes).abs();
    let wrapped = diff.min(MINUTES_PER_DAY - diff);

    wrapped <= FIRE_WINDOW_MINUTES
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn lookback() -> Duration {
        Duration::seconds(120)
    }

    // --- due_once() ---

    #[rstest]
    fn test_即時配信は常に発火対象() {
        let schedule = Schedule::Immediate;

        assert!(schedule.due_once(at(2025, 8, 1, 10, 0), lookback()));
    }

    #[rstest]
    fn test_予約時刻がルックバック窓内なら発火() {
        let schedule = Schedule::Scheduled {
            at: at(2025, 8, 1, 10, 0),
        };

        assert!(schedule.due_once(at(2025, 8, 1, 10, 1), lookback()));
    }

    #[rstest]
    fn test_未来の予約は発火しない() {
        let schedule = Schedule::Scheduled {
            at: at(2025, 8, 1, 10, 5),
        };

        assert!(!schedule.due_once(at(2025, 8, 1, 10, 0), lookback()));
    }

    #[rstest]
    fn test_ルックバック窓より古い予約は発火しない() {
        let schedule = Schedule::Scheduled {
            at: at(2025, 8, 1, 9, 0),
        };

        assert!(!schedule.due_once(at(2025, 8, 1, 10, 0), lookback()));
    }

    #[rstest]
    fn test_定期スケジュールはdue_onceの対象外() {
        let schedule = Schedule::Recurring {
            at:      at(2025, 8, 1, 10, 0),
            cadence: daily(),
        };

        assert!(!schedule.due_once(at(2025, 8, 1, 10, 0), lookback()));
    }

    // --- Cadence::is_due() ---

    fn daily() -> Cadence {
        Cadence {
            frequency: Frequency::Daily,
            days_of_week: vec![],
            ends_at: None,
        }
    }

    #[rstest]
    fn test_日次はアンカー時刻帯なら毎日発火() {
        let anchor = at(2025, 8, 1, 10, 0);

        assert!(daily().is_due(anchor, None, at(2025, 8, 2, 10, 3)));
        assert!(daily().is_due(anchor, None, at(2025, 8, 15, 9, 57)));
    }

    #[rstest]
    fn test_時刻帯の外では発火しない() {
        let anchor = at(2025, 8, 1, 10, 0);

        assert!(!daily().is_due(anchor, None, at(2025, 8, 2, 10, 6)));
        assert!(!daily().is_due(anchor, None, at(2025, 8, 2, 22, 0)));
    }

    #[rstest]
    fn test_日付境界をまたぐ時刻帯判定() {
        // アンカー 23:58、現在 00:01 → 差は 3 分（短い方を採用）
        let anchor = at(2025, 8, 1, 23, 58);

        assert!(daily().is_due(anchor, None, at(2025, 8, 3, 0, 1)));
    }

    #[rstest]
    fn test_同日に発火済みなら発火しない() {
        let anchor = at(2025, 8, 1, 10, 0);
        let last_sent = at(2025, 8, 2, 10, 1);

        assert!(!daily().is_due(anchor, Some(last_sent), at(2025, 8, 2, 10, 3)));
    }

    #[rstest]
    fn test_前日の発火は翌日の発火を妨げない() {
        let anchor = at(2025, 8, 1, 10, 0);
        let last_sent = at(2025, 8, 2, 10, 1);

        assert!(daily().is_due(anchor, Some(last_sent), at(2025, 8, 3, 10, 1)));
    }

    #[rstest]
    fn test_終了日時を過ぎたら発火しない() {
        let anchor = at(2025, 8, 1, 10, 0);
        let cadence = Cadence {
            ends_at: Some(at(2025, 8, 10, 0, 0)),
            ..daily()
        };

        assert!(!cadence.is_due(anchor, None, at(2025, 8, 11, 10, 0)));
        assert!(cadence.is_expired(at(2025, 8, 11, 10, 0)));
    }

    #[rstest]
    fn test_週次は指定曜日のみ発火() {
        let anchor = at(2025, 8, 1, 10, 0); // 金曜
        let cadence = Cadence {
            frequency: Frequency::Weekly,
            days_of_week: vec![DayOfWeek::Monday, DayOfWeek::Wednesday],
            ends_at: None,
        };

        // 2025-08-04 は月曜、2025-08-05 は火曜
        assert!(cadence.is_due(anchor, None, at(2025, 8, 4, 10, 0)));
        assert!(!cadence.is_due(anchor, None, at(2025, 8, 5, 10, 0)));
    }

    #[rstest]
    fn test_週次で曜日未指定ならアンカーの曜日に発火() {
        let anchor = at(2025, 8, 1, 10, 0); // 金曜
        let cadence = Cadence {
            frequency: Frequency::Weekly,
            days_of_week: vec![],
            ends_at: None,
        };

        // 2025-08-08 は金曜
        assert!(cadence.is_due(anchor, None, at(2025, 8, 8, 10, 0)));
        assert!(!cadence.is_due(anchor, None, at(2025, 8, 7, 10, 0)));
    }

    #[rstest]
    fn test_月次はアンカーと同じ日付の時刻帯で一度だけ発火() {
        let anchor = at(2025, 1, 15, 9, 30);
        let cadence = Cadence {
            frequency: Frequency::Monthly,
            days_of_week: vec![],
            ends_at: None,
        };

        // 発火日: 同じ日付 + 時刻帯内
        assert!(cadence.is_due(anchor, None, at(2025, 2, 15, 9, 32)));
        // 同日 2 回目のポーリングはウォーターマークで抑止
        assert!(!cadence.is_due(anchor, Some(at(2025, 2, 15, 9, 32)), at(2025, 2, 15, 9, 33)));
        // 別の日付では発火しない
        assert!(!cadence.is_due(anchor, None, at(2025, 2, 14, 9, 30)));
        assert!(!cadence.is_due(anchor, None, at(2025, 2, 16, 9, 30)));
    }

    #[rstest]
    fn test_月末アンカーは短い月では発火しない() {
        let anchor = at(2025, 1, 31, 9, 0);
        let cadence = Cadence {
            frequency: Frequency::Monthly,
            days_of_week: vec![],
            ends_at: None,
        };

        assert!(!cadence.is_due(anchor, None, at(2025, 2, 28, 9, 0)));
        assert!(cadence.is_due(anchor, None, at(2025, 3, 31, 9, 0)));
    }

    // --- from_db_parts() ---

    #[rstest]
    fn test_from_db_parts_定期スケジュールの復元() {
        let cadence_json = json!({
            "frequency": "weekly",
            "days_of_week": ["monday", "friday"],
        });

        let schedule =
            Schedule::from_db_parts("recurring", Some(at(2025, 8, 1, 10, 0)), Some(&cadence_json))
                .unwrap();

        let Schedule::Recurring { at: anchor, cadence } = schedule else {
            panic!("定期スケジュールではない");
        };
        assert_eq!(anchor, at(2025, 8, 1, 10, 0));
        assert_eq!(cadence.frequency, Frequency::Weekly);
        assert_eq!(
            cadence.days_of_week,
            vec![DayOfWeek::Monday, DayOfWeek::Friday]
        );
        assert_eq!(cadence.ends_at, None);
    }

    #[rstest]
    fn test_from_db_parts_未知の種別はエラー() {
        let result = Schedule::from_db_parts("hourly", None, None);

        assert!(result.is_err());
    }

    #[rstest]
    fn test_from_db_parts_予約で時刻欠損はエラー() {
        let result = Schedule::from_db_parts("scheduled", None, None);

        assert!(result.is_err());
    }
}
