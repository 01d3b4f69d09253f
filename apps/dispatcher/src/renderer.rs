//! # キャンバスレンダラー
//!
//! キャンバス要素列からメール本文（HTML / プレーンテキスト）を生成する。
//!
//! ## 設計方針
//!
//! - **純粋関数**: I/O を行わず、同じ入力からは常に同じ出力を生成する
//! - **`include_str!` によるコンパイル時埋め込み**: ドキュメントシェルの
//!   テンプレートはバイナリに埋め込まれる
//! - **行構造の写像**: ドメインの行グルーピングをそのまま HTML に写す。
//!   単一要素の行はブロック、複数要素の行は等幅カラムのテーブルになる
//! - **スタイル欠損は既定値**: 色・サイズ等が無くてもエラーにしない

use sendflow_domain::canvas::{
    ButtonElement,
    CanvasElement,
    ImageElement,
    LineElement,
    TextElement,
    TextStyle,
    group_into_rows,
};
use tera::{Context, Tera};

use crate::error::DispatchError;

/// レンダリング済みのメール本文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub html: String,
    pub text: String,
}

/// キャンバスレンダラー
///
/// tera テンプレートエンジンでドキュメントシェルを構築し、
/// 要素ごとの HTML はコードで組み立てる。
pub struct CanvasRenderer {
    engine: Tera,
}

impl CanvasRenderer {
    /// 新しいレンダラーインスタンスを作成
    pub fn new() -> Result<Self, DispatchError> {
        let mut engine = Tera::default();

        engine
            .add_raw_templates(vec![
                ("base.html", include_str!("../templates/email/base.html")),
                (
                    "fallback.html",
                    include_str!("../templates/email/fallback.html"),
                ),
            ])
            .map_err(|e| DispatchError::Internal(format!("テンプレート登録に失敗: {e}")))?;

        Ok(Self { engine })
    }

    /// キャンバス要素列からメール本文を生成する
    ///
    /// 要素が空の場合は件名入りのフォールバック文面を生成する（エラーにしない）。
    ///
    /// # 引数
    ///
    /// - `from_address`: フッターに表示する物理住所（省略可）
    pub fn render(
        &self,
        elements: &[CanvasElement],
        subject: &str,
        from_name: &str,
        from_email: &str,
        from_address: Option<&str>,
    ) -> Result<EmailContent, DispatchError> {
        let mut context = Context::new();
        context.insert("subject", subject);
        context.insert("from_name", from_name);
        context.insert("from_email", from_email);
        context.insert("from_address", &from_address);

        if elements.is_empty() {
            let html = self
                .engine
                .render("fallback.html", &context)
                .map_err(|e| DispatchError::Internal(format!("レンダリングに失敗: {e}")))?;
            let text = fallback_text(subject, from_name, from_address);
            return Ok(EmailContent { html, text });
        }

        let rows = group_into_rows(elements.to_vec());
        let body = rows.iter().map(|row| render_row(row)).collect::<String>();
        context.insert("body", &body);

        let html = self
            .engine
            .render("base.html", &context)
            .map_err(|e| DispatchError::Internal(format!("レンダリングに失敗: {e}")))?;
        let text = render_text(elements, from_name, from_address);

        Ok(EmailContent { html, text })
    }
}

// ===== HTML =====

/// 1 行分の HTML を生成する
///
/// 単一要素の行はブロックのまま、複数要素の行は等幅カラムのテーブルにする。
fn render_row(row: &[CanvasElement]) -> String {
    match row {
        [single] => render_element_html(single),
        columns => {
            let width = 100.0 / columns.len() as f64;
            let cells = columns
                .iter()
                .map(|element| {
                    format!(
                        "<td valign=\"top\" style=\"width: {width:.1}%; padding: 0 8px;\">{}</td>",
                        render_element_html(element)
                    )
                })
                .collect::<String>();
            format!(
                "<table role=\"presentation\" width=\"100%\" cellpadding=\"0\" \
                 cellspacing=\"0\"><tr>{cells}</tr></table>"
            )
        }
    }
}

fn render_element_html(element: &CanvasElement) -> String {
    match element {
        CanvasElement::Heading(e) => render_text_block("h1", e, 24.0),
        CanvasElement::Subheading(e) => render_text_block("h2", e, 18.0),
        CanvasElement::Paragraph(e) => render_text_block("p", e, 14.0),
        CanvasElement::Image(e) => render_image(e),
        CanvasElement::Button(e) => render_button(e),
        CanvasElement::Line(e) => render_line(e),
    }
}

fn render_text_block(tag: &str, element: &TextElement, default_font_size: f64) -> String {
    let css = text_style_css(&element.style, default_font_size);
    format!(
        "<{tag} style=\"{css}\">{}</{tag}>",
        tera::escape_html(&element.content)
    )
}

fn render_image(element: &ImageElement) -> String {
    let width = element.width.unwrap_or(536.0);
    let height = element
        .height
        .map_or_else(|| "auto".to_string(), |h| format!("{h:.0}px"));
    format!(
        "<img src=\"{}\" alt=\"{}\" style=\"display: block; max-width: 100%; width: {width:.0}px; \
         height: {height}; margin: 8px 0;\">",
        tera::escape_html(&element.src),
        tera::escape_html(&element.alt)
    )
}

fn render_button(element: &ButtonElement) -> String {
    let target = button_target(element);
    let css = text_style_css(&element.style, 14.0);
    format!(
        "<a href=\"{}\" style=\"display: inline-block; padding: 10px 24px; background-color: \
         #2563eb; color: #ffffff; border-radius: 4px; text-decoration: none; margin: 8px 0; \
         {css}\">{}</a>",
        tera::escape_html(&target),
        tera::escape_html(&element.content)
    )
}

fn render_line(element: &LineElement) -> String {
    let color = element.color.as_deref().unwrap_or("#dddddd");
    let width = element.width.map_or_else(
        || "100%".to_string(),
        |w| format!("{w:.0}px"),
    );
    format!(
        "<hr style=\"border: none; border-top: 1px solid {}; width: {width}; margin: 16px 0;\">",
        tera::escape_html(color)
    )
}

/// ボタンのリンク先を解決する（mailto 優先）
fn button_target(element: &ButtonElement) -> String {
    if let Some(mailto) = &element.mailto
        && !mailto.is_empty()
    {
        return format!("mailto:{mailto}");
    }
    element.href.clone().unwrap_or_else(|| "#".to_string())
}

/// テキスト系スタイルをインライン CSS に変換する
fn text_style_css(style: &TextStyle, default_font_size: f64) -> String {
    let mut css = String::new();
    css.push_str("margin: 8px 0;");
    css.push_str(&format!(
        " color: {};",
        style.color.as_deref().unwrap_or("#333333")
    ));
    css.push_str(&format!(
        " font-size: {:.0}px;",
        style.font_size.unwrap_or(default_font_size)
    ));
    if style.bold {
        css.push_str(" font-weight: bold;");
    }
    if style.italic {
        css.push_str(" font-style: italic;");
    }
    if style.underline {
        css.push_str(" text-decoration: underline;");
    }
    if let Some(alignment) = &style.alignment {
        css.push_str(&format!(" text-align: {alignment};"));
    }
    if let Some(background) = &style.background {
        css.push_str(&format!(" background-color: {background};"));
    }
    css
}

// ===== プレーンテキスト =====

/// プレーンテキスト版を生成する
///
/// 行グルーピングを行わず要素を入力順に走査し、空行区切りで連結する。
fn render_text(
    elements: &[CanvasElement],
    from_name: &str,
    from_address: Option<&str>,
) -> String {
    let mut blocks: Vec<String> = elements.iter().map(render_element_text).collect();

    blocks.push(format!("-- \n{from_name}"));
    if let Some(address) = from_address {
        blocks.push(address.to_string());
    }

    blocks.join("\n\n")
}

fn render_element_text(element: &CanvasElement) -> String {
    match element {
        CanvasElement::Heading(e) | CanvasElement::Subheading(e) | CanvasElement::Paragraph(e) => {
            e.content.clone()
        }
        CanvasElement::Image(e) => format!("[Image: {}]", e.alt),
        CanvasElement::Button(e) => format!("[{}] - {}", e.content, button_target(e)),
        CanvasElement::Line(_) => "---".to_string(),
    }
}

fn fallback_text(subject: &str, from_name: &str, from_address: Option<&str>) -> String {
    let mut blocks = vec![
        subject.to_string(),
        format!("{from_name} からのお知らせです。"),
        format!("-- \n{from_name}"),
    ];
    if let Some(address) = from_address {
        blocks.push(address.to_string());
    }
    blocks.join("\n\n")
}
