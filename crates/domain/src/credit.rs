//! # 送信クレジット台帳
//!
//! ユーザーの送信枠（クレジット）の計算ロジック。
//!
//! クレジットは 2 種類から成る:
//!
//! - **付与クレジット（CreditGrant）**: 購入・特典で付与される残高。取得順に消費する
//! - **基本送信枠（base allowance）**: プランに含まれる枠。付与クレジットを
//!   使い切った後に消費し、ゼロで打ち止めになる（負にはならない）
//!
//! 引き落としは純粋関数 [`plan_debit`] で計画を立て、インフラ層が計画を
//! 1 トランザクションで適用する。計画と適用を分離することで、
//! 「付与クレジット優先・取得順・ゼロ下限」の会計ルールを DB なしで検証できる。

use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::user::UserId;

define_uuid_id! {
    /// 付与クレジット ID
    pub struct CreditGrantId;
}

/// 付与クレジット
///
/// 不変条件: `remaining >= 0`（引き落とし計画が保証する）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditGrant {
    pub id: CreditGrantId,
    pub user_id: UserId,
    pub remaining: i64,
    pub acquired_at: DateTime<Utc>,
}

/// 1 つの付与クレジットに対する引き落とし
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantDebit {
    pub grant_id: CreditGrantId,
    /// この付与から引き落とす量
    pub amount: i64,
    /// 引き落とし後の残高
    pub new_remaining: i64,
}

/// 引き落とし計画
///
/// [`plan_debit`] の出力。インフラ層がこの計画を 1 トランザクションで適用する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebitPlan {
    /// 付与クレジットごとの引き落とし（取得順）
    pub grant_debits: Vec<GrantDebit>,
    /// 基本送信枠からの引き落とし量
    pub base_debit: i64,
    /// 引き落とし後の基本送信枠
    pub new_base_allowance: i64,
}

/// 利用可能なクレジット総量
pub fn available_credits(grants: &[CreditGrant], base_allowance: i64) -> i64 {
    let granted: i64 = grants.iter().map(|g| g.remaining.max(0)).sum();
    granted + base_allowance.max(0)
}

/// 引き落とし計画を立てる
///
/// - 付与クレジットを取得日時の古い順に、各残高をゼロまで使い切ってから
///   次の付与に進む
/// - 付与で賄いきれない分は基本送信枠が吸収し、ゼロで打ち止めになる
/// - `amount` が利用可能量を超えても残高が負になることはない
///   （超過分は単に引き落とされない。呼び出し側が事前ガードで防ぐ）
pub fn plan_debit(grants: &[CreditGrant], base_allowance: i64, amount: i64) -> DebitPlan {
    let mut outstanding = amount.max(0);
    let mut grant_debits = Vec::new();

    for grant in grants
        .iter()
        .filter(|g| g.remaining > 0)
        .sorted_by_key(|g| g.acquired_at)
    {
        if outstanding == 0 {
            break;
        }
        let debit = grant.remaining.min(outstanding);
        grant_debits.push(GrantDebit {
            grant_id: grant.id.clone(),
            amount: debit,
            new_remaining: grant.remaining - debit,
        });
        outstanding -= debit;
    }

    let base_debit = base_allowance.max(0).min(outstanding);

    DebitPlan {
        grant_debits,
        base_debit,
        new_base_allowance: base_allowance.max(0) - base_debit,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn grant(remaining: i64, acquired_day: u32) -> CreditGrant {
        CreditGrant {
            id: CreditGrantId::new(),
            user_id: UserId::new(),
            remaining,
            acquired_at: Utc.with_ymd_and_hms(2025, 8, acquired_day, 0, 0, 0).unwrap(),
        }
    }

    #[rstest]
    fn test_利用可能量は付与残高と基本枠の合計() {
        let grants = vec![grant(30, 1), grant(20, 2)];

        assert_eq!(available_credits(&grants, 100), 150);
    }

    #[rstest]
    fn test_古い付与から順に使い切る() {
        let old = grant(30, 1);
        let new = grant(50, 10);
        // 並び順に依存しないことを確認するため、新しい方を先に渡す
        let grants = vec![new.clone(), old.clone()];

        let plan = plan_debit(&grants, 100, 40);

        assert_eq!(
            plan.grant_debits,
            vec![
                GrantDebit {
                    grant_id: old.id,
                    amount: 30,
                    new_remaining: 0,
                },
                GrantDebit {
                    grant_id: new.id,
                    amount: 10,
                    new_remaining: 40,
                },
            ]
        );
        assert_eq!(plan.base_debit, 0);
        assert_eq!(plan.new_base_allowance, 100);
    }

    #[rstest]
    fn test_付与で賄いきれない分は基本枠が吸収する() {
        let grants = vec![grant(10, 1)];

        let plan = plan_debit(&grants, 100, 25);

        assert_eq!(plan.grant_debits[0].amount, 10);
        assert_eq!(plan.base_debit, 15);
        assert_eq!(plan.new_base_allowance, 85);
    }

    #[rstest]
    fn test_基本枠はゼロで打ち止めになる() {
        let grants = vec![grant(5, 1)];

        let plan = plan_debit(&grants, 3, 100);

        assert_eq!(plan.grant_debits[0].new_remaining, 0);
        assert_eq!(plan.base_debit, 3);
        assert_eq!(plan.new_base_allowance, 0);
    }

    #[rstest]
    fn test_残高ゼロの付与は計画に含めない() {
        let empty = grant(0, 1);
        let active = grant(10, 2);
        let grants = vec![empty, active.clone()];

        let plan = plan_debit(&grants, 0, 5);

        assert_eq!(plan.grant_debits.len(), 1);
        assert_eq!(plan.grant_debits[0].grant_id, active.id);
    }

    #[rstest]
    fn test_引き落とし後も残高は負にならない() {
        let grants = vec![grant(7, 1), grant(3, 2)];

        let plan = plan_debit(&grants, 5, 1000);

        for debit in &plan.grant_debits {
            assert!(debit.new_remaining >= 0);
        }
        assert_eq!(plan.new_base_allowance, 0);
    }

    #[rstest]
    fn test_ゼロ件の引き落としは何も変更しない() {
        let grants = vec![grant(10, 1)];

        let plan = plan_debit(&grants, 100, 0);

        assert!(plan.grant_debits.is_empty());
        assert_eq!(plan.base_debit, 0);
        assert_eq!(plan.new_base_allowance, 100);
    }
}
