//! # 配信メッセージ
//!
//! レンダリング済みメールと、メールプロバイダ境界のエラーを定義する。

use thiserror::Error;

/// 送信エラー
///
/// プロバイダ実装はネストしたエラー構造から防御的にメッセージを取り出し、
/// フラットな文字列に畳み込んでからこの型に変換する。
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// メール送信に失敗
    #[error("メール送信に失敗: {0}")]
    SendFailed(String),
}

/// 送信メッセージ
///
/// レンダラーの出力と差出人情報を束ねたもの。メーラーに渡される。
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    /// 送信先メールアドレス
    pub to:         String,
    /// 差出人表示名
    pub from_name:  String,
    /// 差出人メールアドレス
    pub from_email: String,
    /// 返信先（省略時は差出人）
    pub reply_to:   Option<String>,
    /// 件名
    pub subject:    String,
    /// HTML 本文
    pub html_body:  String,
    /// プレーンテキスト本文
    pub text_body:  String,
}
