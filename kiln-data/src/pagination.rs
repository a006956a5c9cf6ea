use kiln_core::OperationError;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_SORT: &str = "\"id\" desc";

/// Page/limit/sort parameters of a listing, plus its results once executed.
///
/// Zero or empty parameters are replaced by their defaults the first time
/// they are read, so `Pagination::default()` is a valid first page. The value
/// belongs to a single request; it is not meant to be shared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination<T> {
    #[serde(default)]
    limit: u64,
    #[serde(default)]
    page: u64,
    #[serde(default)]
    sort: String,
    #[serde(default)]
    total_rows: i64,
    #[serde(default)]
    total_pages: u64,
    #[serde(default = "Vec::new")]
    rows: Vec<T>,
}

impl<T> Default for Pagination<T> {
    fn default() -> Self {
        Self {
            limit: 0,
            page: 0,
            sort: String::new(),
            total_rows: 0,
            total_pages: 0,
            rows: Vec::new(),
        }
    }
}

impl<T> Pagination<T> {
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page,
            limit,
            ..Self::default()
        }
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    pub fn limit(&mut self) -> u64 {
        if self.limit == 0 {
            self.limit = DEFAULT_LIMIT;
        }
        self.limit
    }

    pub fn page(&mut self) -> u64 {
        if self.page == 0 {
            self.page = DEFAULT_PAGE;
        }
        self.page
    }

    /// The `ORDER BY` clause body, e.g. `"id" desc`.
    pub fn sort(&mut self) -> &str {
        if self.sort.is_empty() {
            self.sort = DEFAULT_SORT.to_string();
        }
        &self.sort
    }

    pub fn offset(&mut self) -> u64 {
        (self.page() - 1) * self.limit()
    }

    pub fn total_rows(&self) -> i64 {
        self.total_rows
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<T> {
        self.rows
    }

    /// Record the store's row count and derive `total_pages` (ceiling division).
    pub fn set_totals(&mut self, total_rows: i64) {
        let limit = self.limit();
        self.total_rows = total_rows;
        let rows = total_rows.max(0) as u64;
        self.total_pages = rows.div_ceil(limit);
    }

    pub fn set_rows(&mut self, rows: Vec<T>) {
        self.rows = rows;
    }

    /// Build pagination from raw query parameters.
    ///
    /// Unparseable or non-positive `page`/`per_page` fall back to 1 and 10.
    /// `sort` must be one of `valid_sort_fields`; it is quoted and ordered
    /// descending when `sortDesc=true`, ascending otherwise.
    pub fn from_request(
        request: &PageRequest,
        valid_sort_fields: &[&str],
    ) -> Result<Self, OperationError> {
        let page = parse_positive(request.page.as_deref()).unwrap_or(DEFAULT_PAGE);
        let limit = parse_positive(request.per_page.as_deref()).unwrap_or(DEFAULT_LIMIT);

        let sort = match request.sort.as_deref().map(str::trim) {
            None | Some("") => String::new(),
            Some(field) => {
                if !valid_sort_fields.contains(&field) {
                    return Err(OperationError::invalid_request("Invalid sort field"));
                }
                let direction = if request.sort_desc.as_deref() == Some("true") {
                    "DESC"
                } else {
                    "ASC"
                };
                format!("\"{field}\" {direction}")
            }
        };

        Ok(Self::new(page, limit).with_sort(sort))
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|s| s.trim().parse::<u64>().ok()).filter(|n| *n > 0)
}

/// Raw listing parameters as they arrive on a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<String>,
    pub per_page: Option<String>,
    pub sort: Option<String>,
    #[serde(rename = "sortDesc")]
    pub sort_desc: Option<String>,
}
