use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: u64,
    #[serde(alias = "product_id")]
    pub product_id: u64,
    #[serde(default, alias = "product_name")]
    pub product_name: String,
    pub price: f64,
    #[serde(default, alias = "sale_price")]
    pub sale_price: Option<f64>,
    #[serde(alias = "qty")]
    pub quantity: u32,
    #[serde(default, alias = "image_url")]
    pub image_url: Option<String>,
}

impl CartItem {
    pub fn effective_price(&self) -> f64 {
        self.sale_price.unwrap_or(self.price)
    }

    pub fn line_total(&self) -> f64 {
        self.effective_price() * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default, alias = "cart_items", alias = "cartItems")]
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: u64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCartItem {
    pub quantity: u32,
}
