use rand::Rng;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A bearer token issued at login.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub user_id: String,
    pub expires_at: Instant,
}

/// Store for issued bearer tokens. Tokens are opaque and server-side only;
/// restarting the process signs everyone out.
pub struct TokenStore {
    tokens: HashMap<String, AccessToken>,
}

impl TokenStore {
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    /// Issue a new token for a user. Returns the token string.
    pub fn issue(&mut self, user_id: &str, ttl: Duration) -> String {
        self.clear_stale();

        let token = generate_token();
        self.tokens.insert(
            token.clone(),
            AccessToken {
                user_id: user_id.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );

        token
    }

    /// Resolve a token to its user id, if valid and unexpired.
    pub fn resolve(&self, token: &str) -> Option<&str> {
        let access = self.tokens.get(token)?;
        if Instant::now() < access.expires_at {
            Some(access.user_id.as_str())
        } else {
            None
        }
    }

    /// Drop a token. Returns false if it was not present.
    pub fn revoke(&mut self, token: &str) -> bool {
        self.tokens.remove(token).is_some()
    }

    /// Remove expired tokens.
    fn clear_stale(&mut self) {
        let now = Instant::now();
        self.tokens.retain(|_, access| now < access.expires_at);
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
