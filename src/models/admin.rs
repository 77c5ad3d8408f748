use serde::{Deserialize, Serialize};

use super::order::OrderStatus;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    #[serde(default, alias = "total_orders")]
    pub total_orders: u64,
    #[serde(default, alias = "pending_orders")]
    pub pending_orders: u64,
    #[serde(default, alias = "total_revenue")]
    pub total_revenue: f64,
    #[serde(default, alias = "total_products")]
    pub total_products: u64,
    #[serde(default, alias = "total_users")]
    pub total_users: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}
