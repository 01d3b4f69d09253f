//! # キャンバス要素
//!
//! エディタが保存するレイアウト JSON の要素定義。
//!
//! 要素はフラットなオブジェクトで、`type` タグと位置（x, y）、
//! 種別ごとの内容・スタイルフィールドを持つ。スタイルは全て省略可能で、
//! 欠損時はレンダラー側の既定値にフォールバックする。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::DomainError;

/// キャンバス要素（閉じたタグ付きユニオン）
///
/// JSON の `type` タグで判別する。未知のタグはデシリアライズエラーになり、
/// [`parse_canvas`] が取り込み時に読み飛ばす。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CanvasElement {
    /// 見出し
    Heading(TextElement),
    /// 小見出し
    Subheading(TextElement),
    /// 段落
    Paragraph(TextElement),
    /// 画像
    Image(ImageElement),
    /// ボタン（リンクまたは mailto）
    Button(ButtonElement),
    /// 水平線
    Line(LineElement),
}

/// キャンバス上の位置
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// テキスト系要素のスタイル
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub font_size: Option<f64>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub alignment: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
}

/// 見出し・小見出し・段落の共通フィールド
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub position: Position,
    #[serde(flatten)]
    pub style: TextStyle,
}

/// 画像要素
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageElement {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub alt: String,
    #[serde(flatten)]
    pub position: Position,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
}

/// ボタン要素
///
/// リンク先は `href`（URL）または `mailto`（メールアドレス）のどちらか。
/// 両方指定された場合は `mailto` を優先する。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ButtonElement {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub href: Option<String>,
    #[serde(default)]
    pub mailto: Option<String>,
    #[serde(flatten)]
    pub position: Position,
    #[serde(flatten)]
    pub style: TextStyle,
}

/// 水平線要素
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineElement {
    #[serde(flatten)]
    pub position: Position,
    #[serde(default)]
    pub width: Option<f64>,
    #[serde(default)]
    pub color: Option<String>,
}

impl CanvasElement {
    pub fn position(&self) -> Position {
        match self {
            Self::Heading(e) | Self::Subheading(e) | Self::Paragraph(e) => e.position,
            Self::Image(e) => e.position,
            Self::Button(e) => e.position,
            Self::Line(e) => e.position,
        }
    }

    pub fn x(&self) -> f64 {
        self.position().x
    }

    pub fn y(&self) -> f64 {
        self.position().y
    }
}

/// キャンバス JSON を型付き要素列に解決する
///
/// - `null` は空キャンバスとして扱う
/// - 未知の `type`、および要素として解釈できないエントリは読み飛ばす
///
/// # Errors
///
/// - `DomainError::DataFormat`: トップレベルが配列でも null でもない場合
pub fn parse_canvas(snapshot: &JsonValue) -> Result<Vec<CanvasElement>, DomainError> {
    let entries = match snapshot {
        JsonValue::Null => return Ok(vec![]),
        JsonValue::Array(entries) => entries,
        _ => {
            return Err(DomainError::DataFormat(
                "キャンバス JSON が配列ではありません".to_string(),
            ));
        }
    };

    let elements = entries
        .iter()
        .filter_map(|entry| serde_json::from_value(entry.clone()).ok())
        .collect();

    Ok(elements)
}
