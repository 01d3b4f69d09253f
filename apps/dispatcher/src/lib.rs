//! # SendFlow Dispatcher ライブラリ
//!
//! ディスパッチャの構成要素（設定・レンダラー・ユースケース・ポーラー）を公開する。
//! バイナリと統合テストの双方からこのクレート経由で利用する。

pub mod config;
pub mod error;
pub mod renderer;
pub mod scheduler;
pub mod usecase;

pub use error::DispatchError;
