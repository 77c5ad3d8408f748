use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::api::{ApiClient, ApiError, ApiRequest, Page, RetryPolicy};
use crate::models::{CheckoutRequest, Order};
use crate::realtime::{HubConnection, RealtimeBinding};
use crate::resource::Resource;

use super::cell::ResourceCell;
use super::fetch;

pub const ORDER_UPDATED: &str = "OrderUpdated";

/// Order history, order detail and checkout.
pub struct OrderController {
    api: ApiClient,
    retry: RetryPolicy,
    list: ResourceCell<Page<Order>>,
    detail: ResourceCell<Order>,
    checkout: ResourceCell<Order>,
    page: Mutex<(u32, u32)>,
    open_order: Mutex<Option<u64>>,
}

impl OrderController {
    pub fn new(api: ApiClient) -> Self {
        Self::with_retry(api, RetryPolicy::default())
    }

    pub fn with_retry(api: ApiClient, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry,
            list: ResourceCell::new(),
            detail: ResourceCell::new(),
            checkout: ResourceCell::new(),
            page: Mutex::new((1, 10)),
            open_order: Mutex::new(None),
        }
    }

    pub fn list(&self) -> &ResourceCell<Page<Order>> {
        &self.list
    }

    pub fn detail(&self) -> &ResourceCell<Order> {
        &self.detail
    }

    pub fn checkout_state(&self) -> &ResourceCell<Order> {
        &self.checkout
    }

    pub async fn load(&self, page: u32, page_size: u32) -> Resource<Page<Order>> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        *self.page.lock() = (page, page_size);

        let request = ApiRequest::get("orders")
            .query("page", page)
            .query("pageSize", page_size);
        self.list
            .run(fetch(&self.api, &self.retry, request))
            .await
    }

    pub async fn refresh(&self) -> Resource<Page<Order>> {
        let (page, page_size) = *self.page.lock();
        self.load(page, page_size).await
    }

    pub async fn open(&self, id: u64) -> Resource<Order> {
        *self.open_order.lock() = Some(id);
        self.detail
            .run(fetch(
                &self.api,
                &self.retry,
                ApiRequest::get(format!("orders/{}", id)),
            ))
            .await
    }

    /// Place an order from the current cart.
    pub async fn checkout(&self, request: CheckoutRequest) -> Resource<Order> {
        if request.shipping_address.trim().is_empty() {
            let ticket = self.checkout.begin();
            let err = ApiError::InvalidInput("shipping address is required".to_string());
            self.checkout.settle(ticket, Err(err.clone()));
            return Resource::Error(err);
        }
        let outcome = self
            .checkout
            .run(self.api.send(ApiRequest::post("orders").json(&request)))
            .await;
        if let Some(order) = outcome.data() {
            tracing::info!(order_id = order.id, total = order.total_amount, "Order placed");
        }
        outcome
    }

    /// Cancel an order, then show its new state in the detail cell.
    pub async fn cancel(&self, id: u64) -> Resource<Order> {
        *self.open_order.lock() = Some(id);
        self.detail
            .run(async {
                self.api
                    .execute(ApiRequest::put(format!("orders/{}/cancel", id)))
                    .await?;
                self.api.get::<Order>(format!("orders/{}", id)).await
            })
            .await
    }

    /// Refetch on `OrderUpdated`: the list always, the open detail when
    /// the event names it or names nothing.
    pub fn follow(self: &Arc<Self>, connection: &HubConnection) -> RealtimeBinding {
        let mut binding = RealtimeBinding::new(connection);
        let mut updates = binding.channel(ORDER_UPDATED);
        let controller: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(event) = updates.recv().await {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                let updated: Option<u64> = event.argument(0);
                tracing::debug!(event = %event.name, order_id = ?updated, "Refreshing orders");

                controller.refresh().await;
                let open = *controller.open_order.lock();
                if let Some(open) = open {
                    if updated.is_none() || updated == Some(open) {
                        controller.open(open).await;
                    }
                }
            }
        });

        binding
    }
}
