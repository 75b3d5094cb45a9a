use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::auth::token::TokenStore;
use crate::auth::{hash_password, verify_password};
use crate::cache::{self, keys, Cache};
use crate::config::AdminConfig;
use crate::content::model::{Credentials, NewUser, Role, User, UserView};
use crate::error::{AppError, AppResult};
use crate::response::ApiResponse;
use crate::state::AppState;
use crate::store::{Collection, DynStore, Filter};

/// Identity service: signup, login, cached user listing.
pub struct UserService {
    store: DynStore,
    cache: Option<Arc<dyn Cache>>,
    users_ttl: Duration,
    tokens: Arc<Mutex<TokenStore>>,
    token_ttl: Duration,
}

impl UserService {
    pub fn new(
        store: DynStore,
        cache: Option<Arc<dyn Cache>>,
        users_ttl: Duration,
        tokens: Arc<Mutex<TokenStore>>,
        token_ttl: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            users_ttl,
            tokens,
            token_ttl,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            state.cache.clone(),
            state.config.cache.users_ttl(),
            state.tokens.clone(),
            state.config.auth.token_ttl(),
        )
    }

    /// Sign up a new member. Email must be unique across all users.
    pub async fn create_user(&self, new_user: NewUser) -> AppResult<ApiResponse> {
        let existing = self
            .store
            .find(Collection::Users, &Filter::Eq("email", json!(new_user.email)))
            .await?;
        if !existing.is_empty() {
            return Err(AppError::Conflict("User already exists".into()));
        }

        let now = Utc::now();
        let user = User {
            id: uuid::Uuid::now_v7().to_string(),
            email: new_user.email,
            username: new_user.username,
            password: hash_password(&new_user.password)?,
            role: Role::Member,
            created_at: now,
            updated_at: now,
        };

        self.store
            .insert(Collection::Users, &user.id, &serde_json::to_value(&user)?)
            .await?;
        tracing::info!("Created user {}", user.id);

        Ok(ApiResponse::created("User created successfully").data(json!({ "id": user.id })))
    }

    /// Verify credentials and issue a bearer token. Unknown emails and wrong
    /// passwords are indistinguishable to the caller.
    pub async fn login(&self, credentials: Credentials) -> AppResult<ApiResponse> {
        let matches = self
            .store
            .find(
                Collection::Users,
                &Filter::Eq("email", json!(credentials.email)),
            )
            .await?;
        let Some((_, doc)) = matches.into_iter().next() else {
            return Err(AppError::InvalidCredentials);
        };

        let user: User = serde_json::from_value(doc)?;
        if !verify_password(&credentials.password, &user.password) {
            return Err(AppError::InvalidCredentials);
        }

        let token = self.tokens.lock().await.issue(&user.id, self.token_ttl);
        tracing::info!("User {} logged in", user.id);

        Ok(ApiResponse::ok("Login successful").data(json!({ "token": token })))
    }

    /// All users, read-through cached under the fixed `users` key.
    pub async fn get_users(&self) -> AppResult<ApiResponse> {
        let store = self.store.clone();
        let users: Vec<UserView> = cache::read_through(
            self.cache.as_ref(),
            keys::ALL_USERS,
            self.users_ttl,
            || async move {
                let docs = store.find(Collection::Users, &Filter::All).await?;
                docs.into_iter()
                    .map(|(_, doc)| Ok(UserView::from(serde_json::from_value::<User>(doc)?)))
                    .collect()
            },
        )
        .await?;

        Ok(ApiResponse::ok("Users retrieved successfully!").data(serde_json::to_value(users)?))
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> AppResult<ApiResponse> {
        let doc = self
            .store
            .get(Collection::Users, user_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let user: User = serde_json::from_value(doc)?;

        Ok(ApiResponse::ok("User retrieved successfully")
            .data(serde_json::to_value(UserView::from(user))?))
    }
}

/// Seed the configured admin account unless a user already holds that email.
/// Safe to run on every startup.
pub async fn ensure_admin(store: &DynStore, admin: &AdminConfig) -> AppResult<()> {
    let (Some(email), Some(username), Some(password)) =
        (&admin.email, &admin.username, &admin.password)
    else {
        return Ok(());
    };

    let existing = store
        .find(Collection::Users, &Filter::Eq("email", json!(email)))
        .await?;
    if !existing.is_empty() {
        return Ok(());
    }

    let now = Utc::now();
    let user = User {
        id: uuid::Uuid::now_v7().to_string(),
        email: email.clone(),
        username: username.clone(),
        password: hash_password(password)?,
        role: Role::Admin,
        created_at: now,
        updated_at: now,
    };
    store
        .insert(Collection::Users, &user.id, &serde_json::to_value(&user)?)
        .await?;
    tracing::info!("Admin account {} created", user.id);

    Ok(())
}
