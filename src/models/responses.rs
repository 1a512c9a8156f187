use serde::{Deserialize, Serialize};

/// Every successful response wraps its payload in `data`
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct PageMeta {
    pub total: u32,
    pub page: u32,
    pub limit: u32,
}

impl PageMeta {
    pub fn has_more(&self) -> bool {
        self.page.saturating_mul(self.limit) < self.total
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegisterData {
    pub token: String,
    pub agent: crate::models::Agent,
    #[serde(default)]
    pub contract: Option<crate::models::Contract>,
    #[serde(default)]
    pub ships: Vec<crate::models::Ship>,
}

#[derive(Debug, Deserialize)]
pub struct OrbitData {
    pub nav: crate::models::ShipNav,
}

#[cfg(test)]
mod tests {
    use super::PageMeta;

    #[test]
    fn last_page_has_no_more() {
        assert!(PageMeta { total: 45, page: 2, limit: 20 }.has_more());
        assert!(!PageMeta { total: 45, page: 3, limit: 20 }.has_more());
        assert!(!PageMeta { total: 0, page: 1, limit: 20 }.has_more());
    }
}
