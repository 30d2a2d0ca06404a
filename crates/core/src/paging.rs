//! Cursor paging: order, limit clamping and page assembly

use crate::error::{HorizonError, HorizonResult};
use crate::model::Pageable;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

impl Order {
    /// Comparison placing records strictly after the cursor
    pub fn cursor_op(&self) -> &'static str {
        match self {
            Order::Asc => ">",
            Order::Desc => "<",
        }
    }

    pub fn sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }

    pub fn reverse(&self) -> Order {
        match self {
            Order::Asc => Order::Desc,
            Order::Desc => Order::Asc,
        }
    }
}

/// A validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Paging key of the last record already seen
    pub cursor: Option<i64>,
    pub limit: u32,
    pub order: Order,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            cursor: None,
            limit: DEFAULT_LIMIT,
            order: Order::Desc,
        }
    }
}

impl PageRequest {
    pub fn new(cursor: Option<i64>, limit: u32, order: Order) -> Self {
        Self {
            cursor,
            limit: clamp_limit(limit),
            order,
        }
    }

    /// Parse raw query parameters.
    ///
    /// Limits above 200 clamp to 200; zero, negative or non-numeric limits
    /// fall back to 10. A malformed cursor or an unknown order is rejected.
    pub fn from_query(
        cursor: Option<&str>,
        limit: Option<&str>,
        order: Option<&str>,
    ) -> HorizonResult<Self> {
        let cursor = match cursor.map(str::trim).filter(|c| !c.is_empty()) {
            None => None,
            Some(raw) => {
                let value = i64::from_str(raw)
                    .map_err(|_| HorizonError::Validation(format!("invalid cursor: {}", raw)))?;
                if value < 0 {
                    return Err(HorizonError::Validation(format!("invalid cursor: {}", raw)));
                }
                Some(value)
            }
        };

        let limit = limit
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l > 0)
            .map(|l| l.min(MAX_LIMIT as i64) as u32)
            .unwrap_or(DEFAULT_LIMIT);

        let order = match order.map(str::trim).filter(|o| !o.is_empty()) {
            None => Order::default(),
            Some(raw) => Order::from_str(&raw.to_ascii_lowercase())
                .map_err(|_| HorizonError::Validation(format!("invalid order: {}", raw)))?,
        };

        Ok(Self {
            cursor,
            limit,
            order,
        })
    }

    /// The same walk continued after `cursor`
    pub fn after(&self, cursor: i64) -> Self {
        Self {
            cursor: Some(cursor),
            ..*self
        }
    }
}

fn clamp_limit(limit: u32) -> u32 {
    if limit == 0 {
        DEFAULT_LIMIT
    } else {
        limit.min(MAX_LIMIT)
    }
}

/// One slice of an ordered walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub request: PageRequest,
}

impl<T: Pageable> Page<T> {
    pub fn new(records: Vec<T>, request: PageRequest) -> Self {
        Self { records, request }
    }

    /// Request for the page after this one
    pub fn next(&self) -> PageRequest {
        match self.records.last() {
            Some(last) => self.request.after(last.paging_key()),
            None => self.request,
        }
    }

    /// Request walking back from the first record of this page
    pub fn prev(&self) -> PageRequest {
        let reversed = PageRequest {
            order: self.request.order.reverse(),
            ..self.request
        };
        match self.records.first() {
            Some(first) => reversed.after(first.paging_key()),
            None => reversed,
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            records: self.records.into_iter().map(f).collect(),
            request: self.request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Row(i64);

    impl Pageable for Row {
        fn paging_key(&self) -> i64 {
            self.0
        }
    }

    #[test]
    fn test_defaults() {
        let req = PageRequest::from_query(None, None, None).unwrap();
        assert_eq!(req, PageRequest::default());
        assert_eq!(req.order, Order::Desc);
        assert_eq!(req.limit, 10);
    }

    #[test]
    fn test_limit_clamping() {
        let clamp = |l: &str| PageRequest::from_query(None, Some(l), None).unwrap().limit;
        assert_eq!(clamp("500"), 200);
        assert_eq!(clamp("200"), 200);
        assert_eq!(clamp("1"), 1);
        assert_eq!(clamp("0"), 10);
        assert_eq!(clamp("-5"), 10);
        assert_eq!(clamp("abc"), 10);
    }

    #[test]
    fn test_cursor_and_order_parsing() {
        let req = PageRequest::from_query(Some("12884905984"), Some("2"), Some("ASC")).unwrap();
        assert_eq!(req.cursor, Some(12884905984));
        assert_eq!(req.order, Order::Asc);

        assert!(PageRequest::from_query(Some("abc"), None, None).is_err());
        assert!(PageRequest::from_query(Some("-1"), None, None).is_err());
        assert!(PageRequest::from_query(None, None, Some("sideways")).is_err());
        assert_eq!(
            PageRequest::from_query(Some(""), None, None).unwrap().cursor,
            None
        );
    }

    #[test]
    fn test_order_sql() {
        assert_eq!(Order::Asc.cursor_op(), ">");
        assert_eq!(Order::Desc.cursor_op(), "<");
        assert_eq!(Order::Desc.sql(), "DESC");
        assert_eq!(Order::Asc.to_string(), "asc");
    }

    #[test]
    fn test_page_links() {
        let req = PageRequest::new(None, 2, Order::Desc);
        let page = Page::new(vec![Row(9), Row(7)], req);

        let next = page.next();
        assert_eq!(next.cursor, Some(7));
        assert_eq!(next.order, Order::Desc);

        let prev = page.prev();
        assert_eq!(prev.cursor, Some(9));
        assert_eq!(prev.order, Order::Asc);
    }
}
