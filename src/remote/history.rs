use async_trait::async_trait;
use serde::Deserialize;

use super::{PageResult, RemotePageSource};
use crate::error::Result;
use crate::http::ApiClient;
use crate::types::{HistoryQuery, Record};

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    data: Vec<Record>,
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pagination {
    #[serde(alias = "current_page")]
    current_page: u32,
    #[serde(alias = "total_pages")]
    total_pages: u32,
    #[serde(default, alias = "total_items")]
    total_items: u64,
}

/// `GET /history` through the authenticated client.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    api: ApiClient,
}

impl HttpPageSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    fn query_params(query: &HistoryQuery, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("userId", query.subject_id.clone()),
            ("page", page.to_string()),
        ];
        if let Some(day) = &query.filters.day {
            params.push(("filterDay", day.clone()));
        }
        if let Some(class) = &query.filters.classification {
            params.push(("filterClass", class.clone()));
        }
        params
    }
}

#[async_trait]
impl RemotePageSource for HttpPageSource {
    async fn fetch_page(&self, query: &HistoryQuery, page: u32) -> Result<PageResult> {
        let params = Self::query_params(query, page);
        let response: HistoryResponse = self.api.get_json("history", &params).await?;
        tracing::debug!(
            scope_key = %query.scope_key(),
            page,
            rows = response.data.len(),
            total_pages = response.pagination.total_pages,
            "history page fetched"
        );
        Ok(PageResult {
            records: response.data,
            current_page: response.pagination.current_page,
            total_pages: response.pagination.total_pages,
            total_items: response.pagination.total_items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_map_to_service_parameters() {
        let query = HistoryQuery::new("7")
            .with_day("2024-05-01")
            .with_classification("Normal");
        let params = HttpPageSource::query_params(&query, 2);
        assert_eq!(
            params,
            vec![
                ("userId", "7".to_string()),
                ("page", "2".to_string()),
                ("filterDay", "2024-05-01".to_string()),
                ("filterClass", "Normal".to_string()),
            ]
        );
    }

    #[test]
    fn pagination_accepts_both_casings() {
        let camel: HistoryResponse = serde_json::from_str(
            r#"{"data": [], "pagination": {"currentPage": 1, "totalPages": 3, "totalItems": 55}}"#,
        )
        .unwrap();
        let snake: HistoryResponse = serde_json::from_str(
            r#"{"data": [], "pagination": {"current_page": 1, "total_pages": 3}}"#,
        )
        .unwrap();
        assert_eq!(camel.pagination.total_items, 55);
        assert_eq!(snake.pagination.total_pages, 3);
    }
}
