use serde::Deserialize;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

/// Catalog pages have a fixed size; only the page number is a parameter.
/// Anything below 1 is clamped, never turned into a negative offset.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CatalogPage {
    pub page: Option<i64>,
}

impl CatalogPage {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_page_clamps_below_one() {
        assert_eq!(CatalogPage { page: None }.page(), 1);
        assert_eq!(CatalogPage { page: Some(0) }.page(), 1);
        assert_eq!(CatalogPage { page: Some(-3) }.page(), 1);
        assert_eq!(CatalogPage { page: Some(7) }.page(), 7);
    }

    #[test]
    fn pagination_never_produces_a_negative_offset() {
        let (page, per_page, offset) = Pagination {
            page: Some(-1),
            per_page: Some(500),
        }
        .normalize();
        assert_eq!(page, 1);
        assert_eq!(per_page, 100);
        assert_eq!(offset, 0);
    }
}
