//! Listing filter and pagination window for student queries.

use serde::Serialize;

use crate::database::models::Student;

/// Name search. An empty term matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentFilter {
    search: Option<String>,
}

impl StudentFilter {
    pub fn new(search: Option<&str>) -> Self {
        Self {
            search: search.filter(|s| !s.is_empty()).map(str::to_string),
        }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Case-insensitive substring match on first or last name
    pub fn matches(&self, student: &Student) -> bool {
        match &self.search {
            None => true,
            Some(term) => {
                let term = term.to_lowercase();
                student.first_name.to_lowercase().contains(&term)
                    || student.last_name.to_lowercase().contains(&term)
            }
        }
    }

    /// ILIKE pattern with the term's wildcard characters escaped
    pub fn like_pattern(&self) -> Option<String> {
        self.search.as_deref().map(|term| {
            let mut escaped = String::with_capacity(term.len() + 2);
            escaped.push('%');
            for c in term.chars() {
                if matches!(c, '\\' | '%' | '_') {
                    escaped.push('\\');
                }
                escaped.push(c);
            }
            escaped.push('%');
            escaped
        })
    }
}

/// 1-indexed page with a fixed size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: i64, limit: i64) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Build from raw query values. Missing, non-numeric or non-positive values
    /// fall back to page 1 and `default_limit`.
    pub fn from_query(page: Option<&str>, limit: Option<&str>, default_limit: i64, max_limit: Option<i64>) -> Self {
        let page = page.and_then(leading_int).filter(|p| *p >= 1).unwrap_or(1);
        let mut limit = limit.and_then(leading_int).filter(|l| *l >= 1).unwrap_or(default_limit);
        if let Some(max) = max_limit {
            limit = limit.min(max);
        }
        Self::new(page, limit)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: i64) -> i64 {
        if total <= 0 {
            0
        } else {
            (total + self.limit - 1) / self.limit
        }
    }
}

/// One window of results plus the count across all pages
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Response body for the listing endpoint
#[derive(Debug, Clone, Serialize)]
pub struct StudentPage {
    pub students: Vec<Student>,
    #[serde(rename = "totalPages")]
    pub total_pages: i64,
}

/// Integer prefix of a query value, so "2", " 2" and "2abc" all read as 2
fn leading_int(raw: &str) -> Option<i64> {
    let raw = raw.trim_start();
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}
