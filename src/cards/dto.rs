use serde::{Deserialize, Serialize};

use crate::{cards::repo_types::CardsParam, db::PageParams, error::AppError};

/// Card as returned to clients; timestamps are `YYYY-MM-DD HH:MM:SS` UTC.
#[derive(Debug, Serialize)]
pub struct Card {
    pub activities_no: String,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub marked_status: Option<String>,
    pub marked: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CardsPage {
    pub next: Option<String>,
    pub prev: Option<String>,
    pub total: i64,
    pub data: Vec<Card>,
}

/// Author comes from the access token, never from the body.
#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub marked_status: Option<String>,
    #[serde(default)]
    pub marked: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCardRequest {
    #[serde(default)]
    pub activities_no: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub marked_status: Option<String>,
    #[serde(default)]
    pub marked: Option<String>,
}

/// Raw query string of `GET /card`; parsed by hand so every bad value is reported.
#[derive(Debug, Default, Deserialize)]
pub struct ListCardsQuery {
    pub author_id: Option<String>,
    pub page: Option<String>,
    pub size: Option<String>,
}

fn parse_int(name: &str, raw: Option<&str>, default: i64, errs: &mut Vec<String>) -> i64 {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => default,
        Some(v) => v.parse::<i64>().unwrap_or_else(|e| {
            errs.push(format!("{name}: {e}"));
            default
        }),
    }
}

impl ListCardsQuery {
    pub fn into_param(self) -> Result<CardsParam, AppError> {
        let mut errs = Vec::new();
        let author_id = parse_int("author_id", self.author_id.as_deref(), 0, &mut errs);
        let page = parse_int("page", self.page.as_deref(), PageParams::DEFAULT_PAGE, &mut errs);
        let size = parse_int("size", self.size.as_deref(), PageParams::DEFAULT_SIZE, &mut errs);

        if !errs.is_empty() {
            return Err(AppError::BadRequest(format!(
                "invalid query parameters: {}",
                errs.join("; ")
            )));
        }

        Ok(CardsParam {
            author_id,
            page: PageParams::new(page, size),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_use_defaults() {
        let param = ListCardsQuery::default().into_param().unwrap();
        assert_eq!(param.author_id, 0);
        assert_eq!(param.page, PageParams::default());
    }

    #[test]
    fn empty_values_are_absent() {
        let param = ListCardsQuery {
            author_id: Some(String::new()),
            page: Some("3".into()),
            size: Some(" ".into()),
        }
        .into_param()
        .unwrap();
        assert_eq!(param.author_id, 0);
        assert_eq!(param.page, PageParams::new(3, 10));
    }

    #[test]
    fn every_bad_value_is_reported() {
        let err = ListCardsQuery {
            author_id: Some("abc".into()),
            page: Some("1".into()),
            size: Some("ten".into()),
        }
        .into_param()
        .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(msg.contains("author_id"));
        assert!(msg.contains("size"));
        assert!(!msg.contains("page"));
    }

    #[test]
    fn update_request_tolerates_missing_fields() {
        let req: UpdateCardRequest =
            serde_json::from_str(r#"{"activities_no": "AC-0001", "marked": null}"#).unwrap();
        assert_eq!(req.activities_no, "AC-0001");
        assert!(req.title.is_none());
        assert!(req.marked.is_none());
    }
}
