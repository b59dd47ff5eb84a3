//! This modules defines the common functionality for paging data.

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of records per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may request.
    pub max_page_size: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 10,
            max_page_size: 1000,
        }
    }
}

/// A window into a sorted result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// The 1-based page number.
    pub page: u64,
    /// The maximum number of records on the page.
    pub limit: u64,
}

impl PageWindow {
    /// Create a window from raw `page` and `limit` request values.
    ///
    /// Missing, non-numeric or non-positive values are replaced by the defaults in `config`,
    /// and `limit` is capped at `config.max_page_size`.
    pub fn from_raw(page: Option<&str>, limit: Option<&str>, config: &PaginationConfig) -> Self {
        let page = parse_positive(page).unwrap_or(config.default_page);
        let limit = parse_positive(limit)
            .unwrap_or(config.default_page_size)
            .min(config.max_page_size);

        Self { page, limit }
    }

    /// The number of records before the first record of the page.
    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// The number of pages needed to show `total_count` records.
    pub fn total_pages(&self, total_count: u64) -> u64 {
        total_count.div_ceil(self.limit)
    }
}

fn parse_positive(raw: Option<&str>) -> Option<u64> {
    raw.and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|value| *value >= 1)
}

#[cfg(test)]
mod tests {
    use super::{PageWindow, PaginationConfig};

    #[test]
    fn defaults_when_missing() {
        let window = PageWindow::from_raw(None, None, &PaginationConfig::default());

        assert_eq!(window, PageWindow { page: 1, limit: 10 });
        assert_eq!(window.skip(), 0);
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = PaginationConfig::default();

        for raw in ["0", "-3", "abc", "", "1.5"] {
            let window = PageWindow::from_raw(Some(raw), Some(raw), &config);
            assert_eq!(window, PageWindow { page: 1, limit: 10 }, "input {raw:?}");
        }
    }

    #[test]
    fn skip_is_previous_pages_times_limit() {
        let config = PaginationConfig::default();

        for page in 1..=5u64 {
            for limit in [1u64, 7, 10, 25] {
                let window = PageWindow::from_raw(
                    Some(&page.to_string()),
                    Some(&limit.to_string()),
                    &config,
                );
                assert_eq!(window.skip(), (page - 1) * limit);
            }
        }
    }

    #[test]
    fn limit_is_capped() {
        let config = PaginationConfig {
            max_page_size: 50,
            ..Default::default()
        };

        let window = PageWindow::from_raw(Some("2"), Some("500"), &config);

        assert_eq!(window.limit, 50);
        assert_eq!(window.skip(), 50);
    }

    #[test]
    fn total_pages_rounds_up() {
        let window = PageWindow { page: 1, limit: 10 };

        assert_eq!(window.total_pages(0), 0);
        assert_eq!(window.total_pages(10), 1);
        assert_eq!(window.total_pages(11), 2);
    }
}
