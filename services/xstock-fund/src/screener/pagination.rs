//! Page parameters and descriptors.

use serde::{Deserialize, Serialize};
use xstock_common::{Validate, ValidationError, ValidationResult};

/// Requested page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    /// 1-based page number
    #[serde(default = "default_page_num")]
    pub page_num: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page_num: default_page_num(),
            page_size: default_page_size(),
        }
    }
}

fn default_page_num() -> usize {
    1
}
fn default_page_size() -> usize {
    10
}

impl PageParams {
    pub fn new(page_num: usize, page_size: usize) -> Self {
        Self {
            page_num,
            page_size,
        }
    }
}

impl Validate for PageParams {
    fn validate(&self) -> ValidationResult<()> {
        if self.page_num == 0 {
            return Err(ValidationError::InvalidValue {
                field: "page_num".into(),
                reason: "pages start at 1".into(),
            });
        }
        if self.page_size == 0 {
            return Err(ValidationError::InvalidValue {
                field: "page_size".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

/// Where a page sits within the full result.
///
/// `start_index..end_index` is the slice of the result on this page; a
/// page past the end has an empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub total_count: usize,
    pub page_count: usize,
    pub page_num: usize,
    pub page_size: usize,
    pub start_index: usize,
    pub end_index: usize,
    pub has_prev: bool,
    pub has_next: bool,
}

impl Pagination {
    pub fn new(total_count: usize, params: PageParams) -> Self {
        let page_size = params.page_size.max(1);
        let page_num = params.page_num.max(1);
        let page_count = total_count.div_ceil(page_size);

        let start_index = ((page_num - 1).saturating_mul(page_size)).min(total_count);
        let end_index = start_index.saturating_add(page_size).min(total_count);

        Self {
            total_count,
            page_count,
            page_num,
            page_size,
            start_index,
            end_index,
            has_prev: page_num > 1,
            has_next: page_num < page_count,
        }
    }

    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
