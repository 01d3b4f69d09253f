//! # Dispatcher エラー定義
//!
//! ディスパッチ処理で発生するエラーを定義する。
//!
//! ここでのエラーはキャンペーン単体の処理失敗を表し、ポーラー全体を
//! 停止させることはない。発生したエラーは失敗理由としてキャンペーンと
//! 監査ログに記録される。

use sendflow_domain::DomainError;
use sendflow_infra::InfraError;
use thiserror::Error;

/// キャンペーンのディスパッチ処理で発生するエラー
#[derive(Debug, Error)]
pub enum DispatchError {
    /// 宛先リストやキャンバスのスナップショットが解釈できない
    #[error("データ形式エラー: {0}")]
    DataFormat(String),

    /// 宛先が 1 件もない
    #[error("送信先が設定されていません")]
    NoRecipients,

    /// クレジットが不足している
    #[error("クレジットが不足しています: 必要数 {required}、利用可能数 {available}")]
    InsufficientCredits { required: i64, available: i64 },

    /// ドメインエラー
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// インフラエラー
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// 内部エラー
    #[error("内部エラー: {0}")]
    Internal(String),
}
