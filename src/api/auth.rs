use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::store::{KeyValueStore, keys};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignInRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub email: &'a str,
    pub phone_number: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangePasswordRequest<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
    pub confirm_password: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl SignInResponse {
    pub fn tokens(&self) -> TokenPair {
        TokenPair {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

#[derive(Clone)]
pub struct TokenStore {
    store: Arc<dyn KeyValueStore>,
}

impl TokenStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub async fn access_token(&self) -> AppResult<Option<String>> {
        Ok(self
            .store
            .get(keys::ACCESS_TOKEN)
            .await?
            .filter(|t| !t.is_empty()))
    }

    pub async fn refresh_token(&self) -> AppResult<Option<String>> {
        Ok(self
            .store
            .get(keys::REFRESH_TOKEN)
            .await?
            .filter(|t| !t.is_empty()))
    }

    pub async fn save(&self, tokens: &TokenPair) -> AppResult<()> {
        self.store
            .set(keys::ACCESS_TOKEN, tokens.access_token.clone())
            .await?;
        self.store
            .set(keys::REFRESH_TOKEN, tokens.refresh_token.clone())
            .await
    }

    pub async fn clear(&self) -> AppResult<()> {
        self.store.remove(keys::ACCESS_TOKEN).await?;
        self.store.remove(keys::REFRESH_TOKEN).await
    }
}
