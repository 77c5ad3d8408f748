use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyClaim {
    pub id: u64,
    #[serde(alias = "order_id")]
    pub order_id: u64,
    #[serde(alias = "product_id")]
    pub product_id: u64,
    #[serde(default, alias = "product_name")]
    pub product_name: Option<String>,
    pub description: String,
    pub status: String,
    #[serde(default, alias = "created_at")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyClaimRequest {
    pub order_id: u64,
    pub product_id: u64,
    pub description: String,
}
