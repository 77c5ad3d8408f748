pub mod api;
pub mod app;
pub mod config;
pub mod controllers;
pub mod logging;
pub mod models;
pub mod realtime;
pub mod resource;

pub use app::Storefront;
pub use resource::Resource;
