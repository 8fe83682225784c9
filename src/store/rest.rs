use super::{rows_from_value, value_key, Row, StoreError, TableStore};
use crate::collections::default_order;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// PostgREST-style backend reached over HTTP (`/rest/v1/<collection>`).
pub struct RestStore {
    label: String,
    client: Client,
    base_url: String,
    api_key: String,
    page_size: usize,
    order_by: BTreeMap<String, String>,
}

impl RestStore {
    pub fn new(
        label: &str,
        base_url: &str,
        api_key: &str,
        page_size: usize,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("attendance-migrate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            label: label.to_string(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            page_size: page_size.max(1),
            order_by: BTreeMap::new(),
        })
    }

    /// Per-collection `order` overrides; other collections page by
    /// [`default_order`].
    pub fn with_order_by(mut self, order_by: BTreeMap<String, String>) -> Self {
        self.order_by = order_by;
        self
    }

    fn order_for(&self, collection: &str) -> &str {
        self.order_by
            .get(collection)
            .map(String::as_str)
            .unwrap_or_else(|| default_order(collection))
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.api_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
    }

    fn read_rows(&self, collection: &str, url: &str, resp: Response) -> Result<Vec<Row>, StoreError> {
        let resp = check_status(url, resp)?;
        let body: Value = resp.json()?;
        rows_from_value(collection, body)
    }
}

fn check_status(url: &str, resp: Response) -> Result<Response, StoreError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().unwrap_or_default();
    Err(StoreError::Http {
        status: status.as_u16(),
        url: url.to_string(),
        body,
    })
}

impl TableStore for RestStore {
    fn label(&self) -> &str {
        &self.label
    }

    fn fetch_all(&self, collection: &str) -> Result<Vec<Row>, StoreError> {
        let url = self.collection_url(collection);
        let order = self.order_for(collection);
        let limit = self.page_size.to_string();
        let mut out: Vec<Row> = Vec::new();
        let mut offset = 0usize;
        loop {
            let off = offset.to_string();
            let resp = self
                .authorized(self.client.get(&url))
                .query(&[
                    ("select", "*"),
                    ("order", order),
                    ("limit", limit.as_str()),
                    ("offset", off.as_str()),
                ])
                .send()?;
            let page = self.read_rows(collection, &url, resp)?;
            let got = page.len();
            debug!(store = %self.label, collection, offset, got, "fetched page");
            // The backend may cap a page below `limit`, so only an empty
            // page ends the collection.
            if got == 0 {
                break;
            }
            out.extend(page);
            offset += got;
        }
        Ok(out)
    }

    fn insert(&self, collection: &str, rows: &[Row]) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = self.collection_url(collection);
        let resp = self
            .authorized(self.client.post(&url))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()?;
        check_status(&url, resp)?;
        Ok(())
    }

    fn find_eq(
        &self,
        collection: &str,
        column: &str,
        value: &Value,
    ) -> Result<Vec<Row>, StoreError> {
        let url = self.collection_url(collection);
        let filter = match value_key(value) {
            Some(v) => format!("eq.{}", v),
            None => "is.null".to_string(),
        };
        let resp = self
            .authorized(self.client.get(&url))
            .query(&[("select", "*"), (column, filter.as_str())])
            .send()?;
        self.read_rows(collection, &url, resp)
    }
}
