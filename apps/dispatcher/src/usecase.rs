//! # ユースケース層
//!
//! クレームされたキャンペーン 1 件を配信し、終端状態まで導くパイプライン。
//! リポジトリ・メーラー・レンダラー・Clock を注入して構成する。

pub mod dispatch;
pub mod process;

pub use dispatch::{DispatchOutcome, FailedRecipient, SentRecipient, dispatch};
pub use process::CampaignProcessor;
