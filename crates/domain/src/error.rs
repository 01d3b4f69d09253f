//! ドメイン層のエラー定義

use thiserror::Error;

/// ドメイン層で発生するエラー
///
/// ビジネスルール違反やデータ不整合を表現する。
/// インフラ層の技術的エラー（DB 接続失敗など）はここには含めない。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    /// バリデーションエラー（入力値がビジネスルールを満たさない）
    #[error("バリデーションエラー: {0}")]
    Validation(String),

    /// エンティティが見つからない
    #[error("{entity_type} が見つかりません: {id}")]
    NotFound {
        entity_type: &'static str,
        id:          String,
    },

    /// 永続化データの形式不正（JSON スナップショットの破損など）
    #[error("データ形式エラー: {0}")]
    DataFormat(String),
}
