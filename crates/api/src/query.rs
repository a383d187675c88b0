use serde::Deserialize;

use scriptforge_core::store::clamp_page;

/// Generic pagination parameters (`?limit=&offset=`).
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// Clamped `(limit, offset)`.
    pub fn page(&self) -> (i64, i64) {
        clamp_page(self.limit, self.offset)
    }
}
