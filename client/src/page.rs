//! Page controller: ties the entered key, the balance table and the stored
//! rows together.
//!
//! Fetches are split into `begin_*` / [`Page::finish`] so a UI can run the
//! network call elsewhere and hand the result back. A key can only have one
//! fetch in flight at a time.

use std::collections::HashSet;

use chrono::{Local, NaiveDate};
use openai_balance_protocol::{format_balance, DateRange, Row, UsageQuery, UsageResponse};

use crate::rows::RowStore;
use crate::storage::{Storage, StorageError};
use crate::usage_client::{ClientError, UsageClient};

/// Storage key holding the JSON array of rows.
pub const ROWS_KEY: &str = "rows";

/// Name used when a rename is submitted empty.
const FALLBACK_NAME: &str = "Key";

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("a fetch for this key is already running")]
    InFlight,

    #[error("no row at index {0}")]
    NoSuchRow(usize),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    /// Key entered in the form; updates the summary and share query.
    Submit,
    /// Refresh button on an existing row.
    Refresh,
}

/// A started fetch. Hand it back to [`Page::finish`] with the result.
#[derive(Debug, Clone)]
pub struct FetchTicket {
    pub kind: FetchKind,
    pub query: UsageQuery,
}

pub struct Page {
    storage: Storage,
    rows: RowStore,
    range: Option<DateRange>,
    share_query: Option<String>,
    total_usage: f64,
    error: Option<String>,
    in_flight: HashSet<String>,
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

impl Page {
    /// Rehydrate rows from `storage` and pick up a date range from a share
    /// query when one is given. A stored value that fails to parse is an error.
    pub fn load(storage: Storage, share_query: Option<&str>) -> Result<Self, PageError> {
        let mut rows = RowStore::new();
        if let Some(stored) = storage.get_item::<Vec<Row>>(ROWS_KEY)? {
            log::debug!("rehydrated {} rows", stored.len());
            rows.replace_all(stored);
        }

        let range = share_query.and_then(DateRange::from_share_query);
        Ok(Self {
            storage,
            rows,
            range,
            share_query: range.map(|r| r.to_share_query()),
            total_usage: 0.0,
            error: None,
            in_flight: HashSet::new(),
        })
    }

    pub fn rows(&self) -> &[Row] {
        self.rows.rows()
    }

    /// Range the next submit will use, if one has been chosen.
    pub fn range(&self) -> Option<DateRange> {
        self.range
    }

    /// Range shown in the summary: the chosen one, or the default for `today`.
    pub fn display_range(&self, today: NaiveDate) -> DateRange {
        self.range.unwrap_or_else(|| DateRange::default_for(today))
    }

    pub fn share_query(&self) -> Option<&str> {
        self.share_query.as_deref()
    }

    /// Dollars, from the last submitted key.
    pub fn total_usage(&self) -> f64 {
        self.total_usage
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_loading(&self, key: &str) -> bool {
        self.in_flight.contains(key)
    }

    pub fn set_range(&mut self, range: DateRange) {
        self.range = Some(range);
        self.share_query = Some(range.to_share_query());
    }

    pub fn begin_submit(&mut self, key: &str, today: NaiveDate) -> Result<FetchTicket, PageError> {
        let range = self.display_range(today);
        self.claim(key)?;
        self.error = None;
        self.set_range(range);
        Ok(FetchTicket {
            kind: FetchKind::Submit,
            query: UsageQuery::new(key, range),
        })
    }

    /// Refreshes always use the default range, ignoring any chosen one.
    pub fn begin_refresh(&mut self, index: usize, today: NaiveDate) -> Result<FetchTicket, PageError> {
        let key = self
            .rows
            .get(index)
            .map(|row| row.key.clone())
            .ok_or(PageError::NoSuchRow(index))?;
        self.claim(&key)?;
        Ok(FetchTicket {
            kind: FetchKind::Refresh,
            query: UsageQuery::new(key, DateRange::default_for(today)),
        })
    }

    fn claim(&mut self, key: &str) -> Result<(), PageError> {
        if !self.in_flight.insert(key.to_string()) {
            return Err(PageError::InFlight);
        }
        Ok(())
    }

    /// Apply a fetch result. Network and decode failures land in the error
    /// slot; only storage failures are returned.
    pub fn finish(
        &mut self,
        ticket: FetchTicket,
        result: Result<UsageResponse, ClientError>,
    ) -> Result<(), PageError> {
        let FetchTicket { kind, query } = ticket;
        self.in_flight.remove(&query.key);

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                log::warn!("usage fetch failed: {}", e);
                self.error = Some(e.to_string());
                return Ok(());
            }
        };

        if let Some(msg) = response.error_message() {
            log::warn!("upstream error: {}", msg);
            self.error = Some(msg);
        }

        if self.rows.upsert(&query.key, response.total_usage) {
            self.persist()?;
        }

        if kind == FetchKind::Submit {
            self.total_usage = format_balance(response.total_usage.unwrap_or(0.0));
            self.range = Some(query.range);
        }
        Ok(())
    }

    /// Rename the row at `index`; an empty name becomes `Key`. Returns false
    /// for an out-of-range index.
    pub fn rename(&mut self, index: usize, name: &str) -> Result<bool, PageError> {
        let name = if name.is_empty() { FALLBACK_NAME } else { name };
        if !self.rows.rename(index, name) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    pub async fn submit(&mut self, client: &UsageClient, key: &str) -> Result<(), PageError> {
        let ticket = self.begin_submit(key, local_today())?;
        let result = client.get_usage(&ticket.query).await;
        self.finish(ticket, result)
    }

    pub async fn refresh(&mut self, client: &UsageClient, index: usize) -> Result<(), PageError> {
        let ticket = self.begin_refresh(index, local_today())?;
        let result = client.get_usage(&ticket.query).await;
        self.finish(ticket, result)
    }

    fn persist(&self) -> Result<(), StorageError> {
        self.storage.set_item(ROWS_KEY, self.rows.rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn usage(total: f64) -> Result<UsageResponse, ClientError> {
        Ok(UsageResponse {
            total_usage: Some(total),
            error: None,
        })
    }

    fn stored_rows(page: &Page) -> Vec<Row> {
        page.storage.get_item(ROWS_KEY).unwrap().unwrap_or_default()
    }

    fn empty_page() -> Page {
        Page::load(Storage::in_memory().unwrap(), None).unwrap()
    }

    #[test]
    fn test_submit_adds_row_and_persists() {
        let mut page = empty_page();
        let today = date(2024, 3, 15);

        let ticket = page.begin_submit("sk-a", today).unwrap();
        assert_eq!(ticket.query.range, DateRange::new(date(2024, 1, 15), date(2024, 3, 16)));
        assert_eq!(page.share_query(), Some("startDate=2024-01-15&endDate=2024-03-16"));
        assert!(page.is_loading("sk-a"));

        page.finish(ticket, usage(12345.0)).unwrap();
        assert!(!page.is_loading("sk-a"));
        assert_eq!(page.total_usage(), 123.45);
        assert_eq!(page.rows().len(), 1);
        assert_eq!(page.rows()[0].usage, "$123.45");
        assert_eq!(stored_rows(&page), page.rows());
    }

    #[test]
    fn test_in_flight_guard_per_key() {
        let mut page = empty_page();
        let today = date(2024, 3, 15);

        let first = page.begin_submit("sk-a", today).unwrap();
        assert!(matches!(page.begin_submit("sk-a", today), Err(PageError::InFlight)));

        // other keys are independent
        let other = page.begin_submit("sk-b", today).unwrap();
        page.finish(other, usage(1.0)).unwrap();

        page.finish(first, usage(2.0)).unwrap();
        assert!(page.begin_submit("sk-a", today).is_ok());
    }

    #[test]
    fn test_submit_reuses_chosen_range() {
        let mut page = empty_page();
        let custom = DateRange::new(date(2023, 6, 1), date(2023, 7, 1));
        page.set_range(custom);

        let ticket = page.begin_submit("sk-a", date(2024, 3, 15)).unwrap();
        assert_eq!(ticket.query.range, custom);
        assert_eq!(page.share_query(), Some("startDate=2023-06-01&endDate=2023-07-01"));
    }

    #[test]
    fn test_refresh_ignores_chosen_range() {
        let mut page = empty_page();
        let ticket = page.begin_submit("sk-a", date(2024, 3, 15)).unwrap();
        page.finish(ticket, usage(100.0)).unwrap();

        page.set_range(DateRange::new(date(2023, 6, 1), date(2023, 7, 1)));
        let ticket = page.begin_refresh(0, date(2024, 5, 10)).unwrap();
        assert_eq!(ticket.kind, FetchKind::Refresh);
        assert_eq!(ticket.query.key, "sk-a");
        assert_eq!(ticket.query.range, DateRange::default_for(date(2024, 5, 10)));

        page.finish(ticket, usage(250.0)).unwrap();
        assert_eq!(page.rows()[0].usage, "$2.5");
        // summary still reflects the last submit
        assert_eq!(page.total_usage(), 1.0);
        assert_eq!(page.range(), Some(DateRange::new(date(2023, 6, 1), date(2023, 7, 1))));
    }

    #[test]
    fn test_rejected_submit_keeps_error() {
        let mut page = empty_page();
        let today = date(2024, 3, 15);

        let _pending = page.begin_submit("sk-a", today).unwrap();
        let failed = page.begin_submit("sk-bad", today).unwrap();
        let body = UsageResponse {
            total_usage: None,
            error: Some(serde_json::json!("quota exceeded")),
        };
        page.finish(failed, Ok(body)).unwrap();

        assert!(matches!(page.begin_submit("sk-a", today), Err(PageError::InFlight)));
        assert_eq!(page.error(), Some("quota exceeded"));
    }

    #[test]
    fn test_reloads_name_new_rows_distinctly() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("storage.db");
        let today = date(2024, 3, 15);

        for key in ["sk-a", "sk-b", "sk-c"] {
            let mut page = Page::load(Storage::open(&db).unwrap(), None).unwrap();
            let ticket = page.begin_submit(key, today).unwrap();
            page.finish(ticket, usage(100.0)).unwrap();
        }

        let page = Page::load(Storage::open(&db).unwrap(), None).unwrap();
        let names: Vec<&str> = page.rows().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["Key 1", "Key 2", "Key 3"]);
    }

    #[test]
    fn test_refresh_unknown_row() {
        let mut page = empty_page();
        assert!(matches!(
            page.begin_refresh(3, date(2024, 3, 15)),
            Err(PageError::NoSuchRow(3))
        ));
    }

    #[test]
    fn test_zero_usage_for_new_key_does_not_persist() {
        let mut page = empty_page();
        let ticket = page.begin_submit("sk-a", date(2024, 3, 15)).unwrap();
        page.finish(ticket, usage(0.0)).unwrap();

        assert!(page.rows().is_empty());
        assert_eq!(page.storage.get_item::<Vec<Row>>(ROWS_KEY).unwrap(), None);
    }

    #[test]
    fn test_upstream_error_lands_in_error_slot() {
        let mut page = empty_page();
        let ticket = page.begin_submit("sk-bad", date(2024, 3, 15)).unwrap();
        let body = UsageResponse {
            total_usage: None,
            error: Some(serde_json::json!({ "message": "Incorrect API key provided" })),
        };
        page.finish(ticket, Ok(body)).unwrap();

        assert_eq!(page.error(), Some("Incorrect API key provided"));
        assert!(page.rows().is_empty());
        assert_eq!(page.total_usage(), 0.0);

        // the next submit clears it
        page.begin_submit("sk-good", date(2024, 3, 15)).unwrap();
        assert_eq!(page.error(), None);
    }

    #[test]
    fn test_rename_persists_and_defaults_empty_name() {
        let mut page = empty_page();
        let ticket = page.begin_submit("sk-a", date(2024, 3, 15)).unwrap();
        page.finish(ticket, usage(100.0)).unwrap();

        assert!(page.rename(0, " personal ").unwrap());
        assert_eq!(stored_rows(&page)[0].name, " personal ");

        assert!(page.rename(0, "").unwrap());
        assert_eq!(page.rows()[0].name, "Key");

        assert!(!page.rename(5, "ghost").unwrap());
    }

    #[test]
    fn test_load_rehydrates_rows_and_share_query() {
        let storage = Storage::in_memory().unwrap();
        let rows = vec![
            Row {
                name: "Key 1".into(),
                key: "sk-a".into(),
                usage: "$1".into(),
            },
            Row {
                name: "team".into(),
                key: "sk-b".into(),
                usage: "$20.5".into(),
            },
        ];
        storage.set_item(ROWS_KEY, &rows).unwrap();

        let page = Page::load(storage, Some("?startDate=2024-01-01&endDate=2024-02-01")).unwrap();
        assert_eq!(page.rows(), rows.as_slice());
        assert_eq!(page.range(), Some(DateRange::new(date(2024, 1, 1), date(2024, 2, 1))));
    }

    #[test]
    fn test_load_malformed_rows_is_error() {
        let storage = Storage::in_memory().unwrap();
        storage.set_raw(ROWS_KEY, "{not json").unwrap();
        assert!(matches!(
            Page::load(storage, None),
            Err(PageError::Storage(StorageError::Json(_)))
        ));
    }
}
