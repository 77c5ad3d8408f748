//! Wire contracts.
//!
//! The API answers with camelCase on newer endpoints and snake_case on
//! older ones, sometimes for the same resource. Every struct here is
//! declared once with the camelCase name and accepts the snake_case
//! spelling through `#[serde(alias)]`, so nothing outside this module
//! ever sees either convention.

mod admin;
mod auth;
mod cart;
mod chat;
mod order;
mod product;
mod warranty;

pub use admin::{DashboardStats, OrderStatusUpdate};
pub use auth::{AuthSession, LoginRequest, RegisterRequest, Role, UserProfile};
pub use cart::{AddToCart, Cart, CartItem, UpdateCartItem};
pub use chat::{ChatMessage, Conversation, MessageRead, SendMessage};
pub use order::{CheckoutRequest, Order, OrderItem, OrderStatus};
pub use product::{Category, Product};
pub use warranty::{WarrantyClaim, WarrantyClaimRequest};
