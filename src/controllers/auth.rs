use crate::api::{ApiClient, ApiError, ApiRequest};
use crate::config::CredentialStore;
use crate::models::{AuthSession, LoginRequest, RegisterRequest, Role, UserProfile};
use crate::resource::Resource;

use super::cell::ResourceCell;

/// Login, registration and the signed-in user's profile.
///
/// A successful login or registration stores the token and role in the
/// credential store; every later request picks them up from there.
pub struct AuthController {
    api: ApiClient,
    session: ResourceCell<Role>,
    profile: ResourceCell<UserProfile>,
}

impl AuthController {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            session: ResourceCell::new(),
            profile: ResourceCell::new(),
        }
    }

    pub fn session(&self) -> &ResourceCell<Role> {
        &self.session
    }

    pub fn profile(&self) -> &ResourceCell<UserProfile> {
        &self.profile
    }

    fn credentials(&self) -> &CredentialStore {
        self.api.credentials()
    }

    pub async fn login(&self, email: &str, password: &str) -> Resource<Role> {
        if email.trim().is_empty() || password.is_empty() {
            return self.reject("email and password are required");
        }
        let request = ApiRequest::post("users/login").json(&LoginRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
        });
        self.authenticate(request).await
    }

    pub async fn register(&self, form: RegisterRequest) -> Resource<Role> {
        if form.email.trim().is_empty() || form.password.is_empty() || form.full_name.trim().is_empty() {
            return self.reject("name, email and password are required");
        }
        self.authenticate(ApiRequest::post("users/register").json(&form))
            .await
    }

    /// Forget the session locally. The server keeps no session state.
    pub fn logout(&self) {
        self.credentials().clear();
        self.session.reset();
        self.profile.reset();
        tracing::info!("Signed out");
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials().is_authenticated()
    }

    /// Role of the stored session, if signed in.
    pub fn role(&self) -> Option<Role> {
        if !self.is_authenticated() {
            return None;
        }
        Some(
            self.credentials()
                .role()
                .map(|raw| Role::parse(&raw))
                .unwrap_or(Role::Customer),
        )
    }

    pub async fn load_profile(&self) -> Resource<UserProfile> {
        self.profile
            .run(self.api.get::<UserProfile>("users/me"))
            .await
    }

    async fn authenticate(&self, request: ApiRequest) -> Resource<Role> {
        let credentials = self.credentials().clone();
        self.session
            .run(async move {
                let session: AuthSession = self.api.send(request).await?;
                if session.token.trim().is_empty() {
                    return Err(ApiError::Malformed {
                        detail: "session token is empty".to_string(),
                    });
                }

                credentials.set_token(&session.token);
                let role = match session.effective_role() {
                    Some(raw) => {
                        credentials.set_role(raw);
                        Role::parse(raw)
                    }
                    None => {
                        credentials.clear_role();
                        Role::Customer
                    }
                };
                tracing::info!(role = ?role, "Signed in");
                Ok(role)
            })
            .await
    }

    fn reject(&self, message: &str) -> Resource<Role> {
        let ticket = self.session.begin();
        let err = ApiError::InvalidInput(message.to_string());
        self.session.settle(ticket, Err(err.clone()));
        Resource::Error(err)
    }
}
