//! # 受信者スナップショット
//!
//! キャンペーン作成時点の受信者リスト（JSON スナップショット）の解釈。
//!
//! スナップショットには歴史的に 2 つの形が混在する:
//! 文字列要素（`"a@example.com"`）とオブジェクト要素
//! （`{"address": "..."}` または `{"email": "..."}`）。
//! どちらも受け付け、アドレスを持たない要素は黙って読み飛ばす。

use serde_json::Value as JsonValue;

use crate::DomainError;

/// 受信者スナップショットの 1 エントリ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    pub address: String,
}

/// 受信者スナップショット JSON を解釈する
///
/// - `null` は空リストとして扱う（スナップショット未設定）
/// - 配列要素は文字列 / オブジェクトの両形式を受け付ける
/// - アドレスを持たない要素、空文字のアドレスは読み飛ばす
///
/// # Errors
///
/// - `DomainError::DataFormat`: トップレベルが配列でも null でもない場合
pub fn parse_recipients(snapshot: &JsonValue) -> Result<Vec<Recipient>, DomainError> {
    let entries = match snapshot {
        JsonValue::Null => return Ok(vec![]),
        JsonValue::Array(entries) => entries,
        _ => {
            return Err(DomainError::DataFormat(
                "受信者スナップショットが配列ではありません".to_string(),
            ));
        }
    };

    let recipients = entries
        .iter()
        .filter_map(extract_address)
        .map(|address| Recipient { address })
        .collect();

    Ok(recipients)
}

fn extract_address(entry: &JsonValue) -> Option<String> {
    let raw = match entry {
        JsonValue::String(s) => s.as_str(),
        JsonValue::Object(map) => map
            .get("address")
            .or_else(|| map.get("email"))
            .and_then(JsonValue::as_str)?,
        _ => return None,
    };

    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn addresses(snapshot: &JsonValue) -> Vec<String> {
        parse_recipients(snapshot)
            .unwrap()
            .into_iter()
            .map(|r| r.address)
            .collect()
    }

    #[rstest]
    fn test_文字列要素の配列を解釈できる() {
        let snapshot = json!(["a@example.com", "b@example.com"]);

        assert_eq!(addresses(&snapshot), vec!["a@example.com", "b@example.com"]);
    }

    #[rstest]
    fn test_オブジェクト要素はaddressまたはemailキーを受け付ける() {
        let snapshot = json!([
            {"address": "a@example.com"},
            {"email": "b@example.com", "name": "B"},
        ]);

        assert_eq!(addresses(&snapshot), vec!["a@example.com", "b@example.com"]);
    }

    #[rstest]
    fn test_両形式の混在を解釈できる() {
        let snapshot = json!(["a@example.com", {"address": "b@example.com"}]);

        assert_eq!(addresses(&snapshot), vec!["a@example.com", "b@example.com"]);
    }

    #[rstest]
    fn test_アドレスを持たない要素は読み飛ばす() {
        let snapshot = json!([
            {"name": "アドレスなし"},
            "  ",
            42,
            "a@example.com",
        ]);

        assert_eq!(addresses(&snapshot), vec!["a@example.com"]);
    }

    #[rstest]
    fn test_nullは空リストとして扱う() {
        assert_eq!(addresses(&JsonValue::Null), Vec::<String>::new());
    }

    #[rstest]
    fn test_配列以外はデータ形式エラー() {
        let result = parse_recipients(&json!({"recipients": []}));

        assert!(matches!(result, Err(DomainError::DataFormat(_))));
    }
}
