use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::api::{ApiClient, ApiRequest, Page, RetryPolicy};
use crate::models::{Category, Product};
use crate::realtime::{HubConnection, RealtimeBinding};
use crate::resource::Resource;

use super::cell::ResourceCell;
use super::fetch;

pub const PRODUCT_UPDATED: &str = "ProductUpdated";

/// Server-side listing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    pub page: u32,
    pub page_size: u32,
    pub search: Option<String>,
    pub category_id: Option<u64>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            search: None,
            category_id: None,
        }
    }
}

impl ProductQuery {
    fn request(&self) -> ApiRequest {
        ApiRequest::get("product")
            .query("page", self.page.max(1))
            .query("pageSize", self.page_size.max(1))
            .query_opt(
                "search",
                self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            )
            .query_opt("categoryId", self.category_id)
    }
}

/// In-memory narrowing of an already loaded product list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductFilter {
    /// Case-insensitive match against name and description.
    pub search: Option<String>,
    pub category_id: Option<u64>,
    /// Bounds on the effective (sale-aware) price, inclusive.
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub in_stock_only: bool,
}

impl ProductFilter {
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(needle) = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            let needle = needle.to_lowercase();
            let in_name = product.name.to_lowercase().contains(&needle);
            let in_description = product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_name && !in_description {
                return false;
            }
        }
        if self.category_id.is_some() && product.category_id != self.category_id {
            return false;
        }
        let price = product.effective_price();
        if self.min_price.is_some_and(|min| price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| price > max) {
            return false;
        }
        !(self.in_stock_only && !product.in_stock())
    }
}

pub fn filter_products(products: &[Product], filter: &ProductFilter) -> Vec<Product> {
    products
        .iter()
        .filter(|product| filter.matches(product))
        .cloned()
        .collect()
}

/// Catalogue screens: paged list, product detail, categories.
pub struct ProductController {
    api: ApiClient,
    retry: RetryPolicy,
    list: ResourceCell<Page<Product>>,
    detail: ResourceCell<Product>,
    categories: ResourceCell<Vec<Category>>,
    query: Mutex<ProductQuery>,
    open_product: Mutex<Option<u64>>,
}

impl ProductController {
    pub fn new(api: ApiClient) -> Self {
        Self::with_retry(api, RetryPolicy::default())
    }

    pub fn with_retry(api: ApiClient, retry: RetryPolicy) -> Self {
        Self {
            api,
            retry,
            list: ResourceCell::new(),
            detail: ResourceCell::new(),
            categories: ResourceCell::new(),
            query: Mutex::new(ProductQuery::default()),
            open_product: Mutex::new(None),
        }
    }

    pub fn list(&self) -> &ResourceCell<Page<Product>> {
        &self.list
    }

    pub fn detail(&self) -> &ResourceCell<Product> {
        &self.detail
    }

    pub fn categories(&self) -> &ResourceCell<Vec<Category>> {
        &self.categories
    }

    pub fn query(&self) -> ProductQuery {
        self.query.lock().clone()
    }

    pub async fn load(&self, query: ProductQuery) -> Resource<Page<Product>> {
        let request = query.request();
        *self.query.lock() = query;
        self.list
            .run(fetch(&self.api, &self.retry, request))
            .await
    }

    /// Re-run the last listing query.
    pub async fn refresh(&self) -> Resource<Page<Product>> {
        let query = self.query();
        self.load(query).await
    }

    pub async fn next_page(&self) -> Option<Resource<Page<Product>>> {
        let has_next = self
            .list
            .data()
            .is_some_and(|page| page.pagination.has_next);
        if !has_next {
            return None;
        }
        let mut query = self.query();
        query.page += 1;
        Some(self.load(query).await)
    }

    pub async fn open(&self, id: u64) -> Resource<Product> {
        *self.open_product.lock() = Some(id);
        self.detail
            .run(fetch(
                &self.api,
                &self.retry,
                ApiRequest::get(format!("product/{}", id)),
            ))
            .await
    }

    pub async fn load_categories(&self) -> Resource<Vec<Category>> {
        self.categories
            .run(fetch(
                &self.api,
                &self.retry,
                ApiRequest::get("store/categories"),
            ))
            .await
    }

    /// Refetch on `ProductUpdated`: the list always, the open detail when
    /// the event names it or names nothing.
    pub fn follow(self: &Arc<Self>, connection: &HubConnection) -> RealtimeBinding {
        let mut binding = RealtimeBinding::new(connection);
        let mut updates = binding.channel(PRODUCT_UPDATED);
        let controller: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            while let Some(event) = updates.recv().await {
                let Some(controller) = controller.upgrade() else {
                    break;
                };
                let updated: Option<u64> = event.argument(0);
                tracing::debug!(event = %event.name, product_id = ?updated, "Refreshing products");

                controller.refresh().await;
                let open = *controller.open_product.lock();
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
