//! Screen controllers.
//!
//! Each controller owns one [`ResourceCell`] per independent operation
//! and republishes API results through it. Push events either trigger a
//! refetch or apply a local patch; they are never the only source of
//! truth.

mod admin;
mod auth;
mod cart;
mod cell;
mod chat;
mod orders;
mod pagination;
mod products;
mod reducer;
mod warranty;

pub use admin::AdminController;
pub use auth::AuthController;
pub use cart::{CartController, CartTotals};
pub use cell::{ResourceCell, Ticket};
pub use chat::{
    ChatController, Delivery, ThreadIntent, ThreadReducer, MARK_AS_READ, MESSAGE_READ,
    RECEIVE_MESSAGE, SEND_MESSAGE,
};
pub use orders::{OrderController, ORDER_UPDATED};
pub use pagination::paginate;
pub use products::{filter_products, ProductController, ProductFilter, ProductQuery, PRODUCT_UPDATED};
pub use reducer::Reducer;
pub use warranty::WarrantyController;

use serde::de::DeserializeOwned;

use crate::api::{retry_idempotent, ApiClient, ApiError, ApiRequest, RetryPolicy};

/// Load through the client, repeating idempotent requests per `retry`.
async fn fetch<T: DeserializeOwned>(
    api: &ApiClient,
    retry: &RetryPolicy,
    request: ApiRequest,
) -> Result<T, ApiError> {
    retry_idempotent(retry, request, |request| api.send::<T>(request)).await
}
