//! # 行グルーピング
//!
//! キャンバス要素を y 座標の近さで視覚的な「行」にまとめる純粋な幾何計算。
//! レンダラーはこの行構造をそのまま HTML のブロック / テーブルに写像する。

use itertools::Itertools;

use super::element::CanvasElement;

/// 同一行とみなす y 座標の許容差
const ROW_TIE_THRESHOLD: f64 = 15.0;

/// 要素を視覚的な行にグルーピングする
///
/// - 各要素は、基準 y 座標との差が ±15.0 以内の既存行があればそこに加わり、
///   なければ新しい行を作る（基準は行の最初の要素の y 座標）
/// - 行は上から下へ、行内の要素は左から右へ整列する
/// - 入力が同じなら出力も同じ（決定的）
pub fn group_into_rows(elements: Vec<CanvasElement>) -> Vec<Vec<CanvasElement>> {
    let mut rows: Vec<Row> = Vec::new();

    for element in elements {
        let y = element.y();
        match rows
            .iter_mut()
            .find(|row| (y - row.reference_y).abs() <= ROW_TIE_THRESHOLD)
        {
            Some(row) => row.elements.push(element),
            None => rows.push(Row {
                reference_y: y,
                elements:    vec![element],
            }),
        }
    }

    rows.sort_by(|a, b| a.reference_y.total_cmp(&b.reference_y));

    rows.into_iter()
        .map(|row| {
            row.elements
                .into_iter()
                .sorted_by(|a, b| a.x().total_cmp(&b.x()))
                .collect()
        })
        .collect()
}

struct Row {
    reference_y: f64,
    elements:    Vec<CanvasElement>,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;
    use crate::canvas::parse_canvas;

    fn elements(snapshot: serde_json::Value) -> Vec<CanvasElement> {
        parse_canvas(&snapshot).unwrap()
    }

    fn contents(rows: &[Vec<CanvasElement>]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|e| match e {
                        CanvasElement::Heading(t)
                        | CanvasElement::Subheading(t)
                        | CanvasElement::Paragraph(t) => t.content.clone(),
                        _ => String::new(),
                    })
                    .collect()
            })
            .collect()
    }

    #[rstest]
    fn test_y座標が近い要素は同じ行にまとまる() {
        let rows = group_into_rows(elements(json!([
            {"type": "paragraph", "content": "左", "x": 0.0, "y": 100.0},
            {"type": "paragraph", "content": "右", "x": 200.0, "y": 110.0},
            {"type": "paragraph", "content": "下", "x": 0.0, "y": 200.0},
        ])));

        assert_eq!(contents(&rows), vec![vec!["左", "右"], vec!["下"]]);
    }

    #[rstest]
    fn test_許容差を超える要素は別の行になる() {
        let rows = group_into_rows(elements(json!([
            {"type": "paragraph", "content": "上", "y": 100.0},
            {"type": "paragraph", "content": "下", "y": 116.0},
        ])));

        assert_eq!(contents(&rows), vec![vec!["上"], vec!["下"]]);
    }

    #[rstest]
    fn test_行は上から下_行内は左から右に整列する() {
        let rows = group_into_rows(elements(json!([
            {"type": "paragraph", "content": "下段", "y": 300.0},
            {"type": "paragraph", "content": "上段右", "x": 100.0, "y": 10.0},
            {"type": "paragraph", "content": "上段左", "x": 0.0, "y": 12.0},
        ])));

        assert_eq!(contents(&rows), vec![vec!["上段左", "上段右"], vec!["下段"]]);
    }

    #[rstest]
    fn test_同じ入力からは同じ行構造が得られる() {
        let snapshot = json!([
            {"type": "heading", "content": "A", "x": 50.0, "y": 0.0},
            {"type": "paragraph", "content": "B", "x": 0.0, "y": 8.0},
            {"type": "line", "y": 60.0},
            {"type": "paragraph", "content": "C", "x": 10.0, "y": 62.0},
        ]);

        let first = group_into_rows(elements(snapshot.clone()));
        let second = group_into_rows(elements(snapshot));

        assert_eq!(first, second);
    }

    #[rstest]
    fn test_空のキャンバスは空の行構造() {
        let rows = group_into_rows(vec![]);

        assert!(rows.is_empty());
    }
}
