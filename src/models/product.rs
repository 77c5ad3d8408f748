use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default, alias = "sale_price")]
    pub sale_price: Option<f64>,
    #[serde(default, alias = "category_id")]
    pub category_id: Option<u64>,
    #[serde(default, alias = "category_name")]
    pub category_name: Option<String>,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
    #[serde(default, alias = "stock_quantity")]
    pub stock_quantity: u32,
}

impl Product {
    /// Sale price when one is set, list price otherwise.
    pub fn effective_price(&self) -> f64 {
        self.sale_price.unwrap_or(self.price)
    }

    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: u64,
    pub name: String,
    #[serde(default, alias = "product_count")]
    pub product_count: u32,
}
