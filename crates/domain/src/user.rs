//! ユーザー識別子
//!
//! 配信コアはユーザーの認証・プロフィールを扱わないため、
//! ドメイン層に存在するのは所有者を指す ID のみ。

define_uuid_id! {
    /// ユーザー ID
    pub struct UserId;
}
