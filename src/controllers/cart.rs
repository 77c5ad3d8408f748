use parking_lot::Mutex;

use crate::api::{ApiClient, ApiRequest, RetryPolicy};
use crate::models::{AddToCart, Cart, CartItem, UpdateCartItem};
use crate::resource::Resource;

use super::cell::ResourceCell;
use super::fetch;

/// Money summary for a set of cart lines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartTotals {
    pub item_count: u32,
    pub subtotal: f64,
    pub discount: f64,
    pub shipping: f64,
    pub total: f64,
}

impl CartTotals {
    /// Each line is charged at its sale price when present, list price
    /// otherwise. Negative discount or shipping counts as zero and the
    /// total never drops below zero.
    pub fn compute(items: &[CartItem], discount: f64, shipping: f64) -> Self {
        let subtotal: f64 = items.iter().map(CartItem::line_total).sum();
        let item_count = items
            .iter()
            .fold(0u32, |count, item| count.saturating_add(item.quantity));
        let discount = discount.max(0.0);
        let shipping = shipping.max(0.0);
        let total = (subtotal - discount + shipping).max(0.0);

        Self {
            item_count,
            subtotal,
            discount,
            shipping,
            total,
        }
    }
}

/// Cart screen state.
///
/// Every mutation reloads the cart afterwards, so the cell always shows
/// what the server holds.
pub struct CartController {
    api: ApiClient,
    retry: RetryPolicy,
    cart: ResourceCell<Cart>,
    adjustments: Mutex<Adjustments>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Adjustments {
    discount: f64,
    shipping: f64,
}

impl CartController {
    pub fn new(api: ApiClient) -> Self {
        Self::with_retry(api, RetryPolicy::default())
    }

    pub fn with_retry(api: ApiClient, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry,
            cart: ResourceCell::new(),
            adjustments: Mutex::new(Adjustments::default()),
        }
    }

    pub fn cart(&self) -> &ResourceCell<Cart> {
        &self.cart
    }

    pub async fn load(&self) -> Resource<Cart> {
        self.cart
            .run(fetch(&self.api, &self.retry, ApiRequest::get("cart")))
            .await
    }

    pub async fn add(&self, product_id: u64, quantity: u32) -> Resource<Cart> {
        let request = ApiRequest::post("cart").json(&AddToCart {
            product_id,
            quantity: quantity.max(1),
        });
        self.mutate(request).await
    }

    /// Set a line's quantity; zero removes the line.
    pub async fn update(&self, item_id: u64, quantity: u32) -> Resource<Cart> {
        if quantity == 0 {
            return self.remove(item_id).await;
        }
        let request =
            ApiRequest::put(format!("cart/{}", item_id)).json(&UpdateCartItem { quantity });
        self.mutate(request).await
    }

    pub async fn remove(&self, item_id: u64) -> Resource<Cart> {
        self.mutate(ApiRequest::delete(format!("cart/{}", item_id)))
            .await
    }

    pub async fn clear(&self) -> Resource<Cart> {
        self.mutate(ApiRequest::delete("cart")).await
    }

    pub fn set_discount(&self, discount: f64) {
        self.adjustments.lock().discount = discount;
    }

    pub fn set_shipping(&self, shipping: f64) {
        self.adjustments.lock().shipping = shipping;
    }

    /// Totals for the cart currently shown, if it has loaded.
    pub fn totals(&self) -> Option<CartTotals> {
        let cart = self.cart.data()?;
        let adjustments = *self.adjustments.lock();
        Some(CartTotals::compute(
            &cart.items,
            adjustments.discount,
            adjustments.shipping,
        ))
    }

    async fn mutate(&self, request: ApiRequest) -> Resource<Cart> {
        self.cart
            .run(async {
                self.api.execute(request).await?;
                self.api.get::<Cart>("cart").await
            })
            .await
    }
}
