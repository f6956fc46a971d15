use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::messages::USAGE_PATH;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One line of the balance table. Persisted as-is, so field names are part of
/// the stored format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub name: String,
    pub key: String,
    pub usage: String,
}

/// Billing period, inclusive start and exclusive end as the billing API expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Two months back through tomorrow, relative to `today`.
    pub fn default_for(today: NaiveDate) -> Self {
        let start = today.checked_sub_months(Months::new(2)).unwrap_or(today);
        let end = today.checked_add_days(Days::new(1)).unwrap_or(today);
        Self { start, end }
    }

    pub fn start_str(&self) -> String {
        self.start.format(DATE_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(DATE_FORMAT).to_string()
    }

    /// Shareable query string, `startDate=YYYY-MM-DD&endDate=YYYY-MM-DD`.
    pub fn to_share_query(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .append_pair("startDate", &self.start_str())
            .append_pair("endDate", &self.end_str())
            .finish()
    }

    /// Parse a range back out of a share query. Accepts a bare query, one
    /// with a leading `?`, or a whole URL. Both dates must be present and valid.
    pub fn from_share_query(input: &str) -> Option<Self> {
        let query = match input.rsplit_once('?') {
            Some((_, q)) => q,
            None => input,
        };

        let mut start = None;
        let mut end = None;
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match name.as_ref() {
                "startDate" => start = parse_date(&value),
                "endDate" => end = parse_date(&value),
                _ => {}
            }
        }

        Some(Self {
            start: start?,
            end: end?,
        })
    }
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

/// A single billing usage lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageQuery {
    pub key: String,
    pub range: DateRange,
}

impl UsageQuery {
    pub fn new(key: impl Into<String>, range: DateRange) -> Self {
        Self {
            key: key.into(),
            range,
        }
    }

    /// Upstream path and query handed to the relay in the `path` header.
    pub fn usage_path(&self) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("start_date", &self.range.start_str())
            .append_pair("end_date", &self.range.end_str())
            .finish();
        format!("{USAGE_PATH}?{query}")
    }
}
