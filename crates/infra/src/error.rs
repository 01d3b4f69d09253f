//! # インフラ層エラー定義
//!
//! データベースや外部サービスとの通信で発生するエラーを表現する。
//!
//! ## 設計方針
//!
//! - **エラーの変換**: sqlx::Error, serde_json::Error を `From` でラップ
//! - **ドメインエラーとの分離**: インフラ固有のエラーを明示
//! - **ログ可能性**: Debug によりログ出力時に詳細情報を表示

use thiserror::Error;

/// インフラ層で発生するエラー
///
/// データベースクエリやシリアライズで発生するエラーの具体的な種別。
/// ユースケース層でこのエラーを受け取り、処理結果の失敗理由に変換する。
#[derive(Debug, Error)]
pub enum InfraError {
    /// データベースエラー
    ///
    /// SQL クエリの実行失敗、接続エラー、制約違反など。
    #[error("データベースエラー: {0}")]
    Database(#[from] sqlx::Error),

    /// シリアライズ/デシリアライズエラー
    ///
    /// JSON の変換に失敗した場合に使用する。
    #[error("シリアライズエラー: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 更新競合
    ///
    /// 条件付き UPDATE が期待した行に一致しなかった場合。
    #[error("競合が発生しました: {entity}(id={id})")]
    Conflict {
        /// エンティティ名（例: "Campaign"）
        entity: String,
        /// エンティティの ID
        id:     String,
    },

    /// 予期しないエラー
    ///
    /// 上記に分類できない予期しないエラー。DB から読んだ行が
    /// ドメインの不変条件を満たさない場合もここに分類する。
    #[error("予期しないエラー: {0}")]
    Unexpected(String),
}

impl InfraError {
    /// 更新競合エラーを生成する
    pub fn conflict(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity: entity.into(),
            id:     id.into(),
        }
    }

    /// 予期しないエラーを生成する
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_displayがエラーメッセージを出力する() {
        let err = InfraError::conflict("Campaign", "C-001");
        assert_eq!(format!("{err}"), "競合が発生しました: Campaign(id=C-001)");
    }

    #[test]
    fn test_from_sqlx_errorで変換できる() {
        let err: InfraError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, InfraError::Database(_)));
    }

    #[test]
    fn test_from_serde_json_errorで変換できる() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: InfraError = json_err.into();
        assert!(matches!(err, InfraError::Serialization(_)));
    }
}
