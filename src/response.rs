use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub total: Option<i64>,
    pub has_next_page: Option<bool>,
    pub has_previous_page: Option<bool>,
}

impl Meta {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        Self {
            page: Some(page),
            per_page: Some(per_page),
            total: Some(total),
            has_next_page: Some(page * per_page < total),
            has_previous_page: Some(page > 1),
        }
    }

    pub fn empty() -> Self {
        Self {
            page: None,
            per_page: None,
            total: None,
            has_next_page: None,
            has_previous_page: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_next_page_iff_more_rows_remain() {
        let meta = Meta::new(1, 6, 13);
        assert_eq!(meta.has_next_page, Some(true));
        assert_eq!(meta.has_previous_page, Some(false));

        let meta = Meta::new(3, 6, 13);
        assert_eq!(meta.has_next_page, Some(false));
        assert_eq!(meta.has_previous_page, Some(true));

        // Exactly two full pages: page 2 has no successor.
        let meta = Meta::new(2, 6, 12);
        assert_eq!(meta.has_next_page, Some(false));
    }
}
