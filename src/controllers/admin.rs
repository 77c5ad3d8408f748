use crate::api::{ApiClient, ApiRequest, Page, RetryPolicy};
use crate::models::{DashboardStats, Order, OrderStatus, OrderStatusUpdate};
use crate::resource::Resource;

use super::cell::ResourceCell;
use super::fetch;

/// Back-office dashboard. The server decides who may call these.
pub struct AdminController {
    api: ApiClient,
    retry: RetryPolicy,
    stats: ResourceCell<DashboardStats>,
    orders: ResourceCell<Page<Order>>,
    status_update: ResourceCell<Order>,
}

impl AdminController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            retry: RetryPolicy::default(),
            stats: ResourceCell::new(),
            orders: ResourceCell::new(),
            status_update: ResourceCell::new(),
        }
    }

    pub fn stats(&self) -> &ResourceCell<DashboardStats> {
        &self.stats
    }

    pub fn orders(&self) -> &ResourceCell<Page<Order>> {
        &self.orders
    }

    pub fn status_update(&self) -> &ResourceCell<Order> {
        &self.status_update
    }

    pub async fn load_dashboard(&self) -> Resource<DashboardStats> {
        self.stats
            .run(fetch(
                &self.api,
                &self.retry,
                ApiRequest::get("admin/dashboard"),
            ))
            .await
    }

    pub async fn load_orders(
        &self,
        page: u32,
        page_size: u32,
        status: Option<OrderStatus>,
    ) -> Resource<Page<Order>> {
        let request = ApiRequest::get("admin/orders")
            .query("page", page.max(1))
            .query("pageSize", page_size.max(1))
            .query_opt("status", status);
        self.orders
            .run(fetch(&self.api, &self.retry, request))
            .await
    }

    /// Change an order's status and patch the loaded order list with the
    /// server's answer.
    pub async fn update_order_status(&self, order_id: u64, status: OrderStatus) -> Resource<Order> {
        let request = ApiRequest::put(format!("admin/orders/{}/status", order_id))
            .json(&OrderStatusUpdate { status });
        let outcome = self.status_update.run(self.api.send(request)).await;

        if let Some(updated) = outcome.data() {
            tracing::info!(order_id, status = %updated.status, "Order status changed");
            self.orders.patch(|page| {
                let mut changed = false;
                for order in page.items.iter_mut().filter(|o| o.id == updated.id) {
                    *order = updated.clone();
                    changed = true;
                }
                changed
            });
        }
        outcome
    }
}
