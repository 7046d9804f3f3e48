// src/fetch/endpoints.rs

//! Typed wrappers over the utility site's endpoints.

use reqwest::Method;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::LookupItem;

use super::Fetcher;

/// Form id the site expects on the schedule search form.
const SCHEDULE_FORM_ID: &str = "disconnection_detailed_search_form";

impl Fetcher {
    /// Autocomplete cities matching `query`.
    pub async fn autocomplete_cities(&self, query: &str) -> Result<Vec<LookupItem>> {
        self.autocomplete("/autocomplete/read_city".to_string(), query)
            .await
    }

    /// Autocomplete streets of a city matching `query`.
    pub async fn autocomplete_streets(&self, city_id: i64, query: &str) -> Result<Vec<LookupItem>> {
        self.autocomplete(format!("/autocomplete/read_street/{city_id}"), query)
            .await
    }

    /// Autocomplete houses of a street matching `query`.
    pub async fn autocomplete_houses(
        &self,
        street_id: i64,
        query: &str,
    ) -> Result<Vec<LookupItem>> {
        self.autocomplete(format!("/autocomplete/read_house/{street_id}"), query)
            .await
    }

    async fn autocomplete(&self, path: String, query: &str) -> Result<Vec<LookupItem>> {
        let params = [("q", query.to_string())];
        let payload = self.fetch(&path, &params, None, Method::GET).await?;

        let items = payload
            .as_array()
            .map(|entries| entries.iter().filter_map(LookupItem::from_api).collect())
            .unwrap_or_default();
        Ok(items)
    }

    /// Fetch the raw schedule markup for an address.
    ///
    /// The endpoint answers with an AJAX command list; the schedule HTML is
    /// the `data` of the element whose `command` is `"insert"`.
    pub async fn schedule_markup(
        &self,
        city_id: i64,
        street_id: i64,
        house_id: i64,
    ) -> Result<String> {
        let params = [
            ("search_type", "0".to_string()),
            ("city_id", city_id.to_string()),
            ("street_id", street_id.to_string()),
            ("house_id", house_id.to_string()),
            ("ajax_form", "1".to_string()),
        ];
        let form = [
            ("search_type", "0".to_string()),
            ("city_id", city_id.to_string()),
            ("street_id", street_id.to_string()),
            ("house_id", house_id.to_string()),
            ("form_id", SCHEDULE_FORM_ID.to_string()),
        ];

        let payload = self
            .fetch("/disconnection/detailed", &params, Some(&form), Method::POST)
            .await?;
        extract_insert_markup(&payload)
    }
}

/// Pull the inserted HTML fragment out of an AJAX command list.
fn extract_insert_markup(payload: &Value) -> Result<String> {
    payload
        .as_array()
        .and_then(|commands| {
            commands
                .iter()
                .find(|c| c.get("command").and_then(Value::as_str) == Some("insert"))
        })
        .and_then(|c| c.get("data").and_then(Value::as_str))
        .map(String::from)
        .ok_or_else(|| {
            AppError::source_unavailable(
                "/disconnection/detailed",
                0,
                "payload carries no insert command",
            )
        })
}
