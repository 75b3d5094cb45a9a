use std::sync::Arc;

use tokio::sync::Mutex;

use crate::auth::token::TokenStore;
use crate::cache::Cache;
use crate::config::Config;
use crate::store::DocumentStore;

/// Shared handles, injected once at startup. A `None` cache means every
/// read goes to the store.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub cache: Option<Arc<dyn Cache>>,
    pub tokens: Arc<Mutex<TokenStore>>,
    pub config: Config,
}
