use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::models::{WarrantyClaim, WarrantyClaimRequest};
use crate::resource::Resource;

use super::cell::ResourceCell;

pub struct WarrantyController {
    api: ApiClient,
    claims: ResourceCell<Vec<WarrantyClaim>>,
    submission: ResourceCell<WarrantyClaim>,
}

impl WarrantyController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            claims: ResourceCell::new(),
            submission: ResourceCell::new(),
        }
    }

    pub fn claims(&self) -> &ResourceCell<Vec<WarrantyClaim>> {
        &self.claims
    }

    pub fn submission(&self) -> &ResourceCell<WarrantyClaim> {
        &self.submission
    }

    pub async fn load(&self) -> Resource<Vec<WarrantyClaim>> {
        self.claims
            .run(self.api.get::<Vec<WarrantyClaim>>("warranties"))
            .await
    }

    /// File a claim; on success it is prepended to the loaded list.
    pub async fn submit(&self, claim: WarrantyClaimRequest) -> Resource<WarrantyClaim> {
        let outcome = if claim.description.trim().is_empty() {
            let ticket = self.submission.begin();
            let err = ApiError::InvalidInput("description is required".to_string());
            self.submission.settle(ticket, Err(err.clone()));
            Resource::Error(err)
        } else {
            self.submission
                .run(self.api.send(ApiRequest::post("warranties").json(&claim)))
                .await
        };

        if let Some(created) = outcome.data() {
            self.claims.patch(|claims| {
                if claims.iter().any(|c| c.id == created.id) {
                    return false;
                }
                claims.insert(0, created.clone());
                true
            });
        }
        outcome
    }
}
