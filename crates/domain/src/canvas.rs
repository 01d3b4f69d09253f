//! # キャンバス
//!
//! メール本文のレイアウト記述。エディタが保存した JSON を取り込み境界で
//! 閉じたタグ付きユニオンに解決し、レンダラーには型付きの要素列だけを渡す。
//!
//! ## 概念モデル
//!
//! - **CanvasElement**: `type` タグで判別される要素（見出し・段落・画像など）。
//!   各バリアントは自分に関係するフィールドのみを持つ
//! - **行グルーピング**: y 座標の近さで要素を視覚的な行にまとめる純粋な幾何計算
//!
//! 未知の `type` を持つ要素は取り込み時に読み飛ばす（レンダラーには届かない）。

mod element;
mod layout;

pub use element::*;
pub use layout::*;
