use mongodb::bson::Document;
use mongodb::options::FindOptions;
use serde::{Deserialize, Serialize};

/// Hard cap on the page size a client can request.
pub const MAX_PAGE_SIZE: u32 = 50;

/// The query parameters accepted by every listing endpoint.
#[derive(Debug, FromForm)]
pub struct ListRequest {
    #[field(name = "isClosed")]
    pub is_closed: Option<bool>,
    pub search: Option<String>,
    #[field(default = 1)]
    pub page: u32,
    #[field(default = 10)]
    pub limit: u32,
}

impl ListRequest {
    /// The requested page, starting at 1.
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// The effective page size, capped at [`MAX_PAGE_SIZE`].
    pub fn page_size(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    /// Number of documents to skip to reach the requested page.
    pub fn skip(&self) -> u64 {
        u64::from((self.page() - 1) * self.page_size())
    }

    /// Find options applying this pagination on top of the given sort.
    pub fn find_options(&self, sort: Document) -> FindOptions {
        FindOptions::builder()
            .sort(sort)
            .skip(self.skip())
            .limit(i64::from(self.page_size()))
            .build()
    }
}

/// One page of results plus the total count of everything matching the
/// filter.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total_count: u64,
}
