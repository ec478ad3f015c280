//! HTTP client for the platform REST API.
//!
//! Every authenticated call goes through [`ApiClient::send_authenticated`],
//! which refreshes the access token and retries exactly once on a 401.

use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::auth::{
    ChangePasswordRequest, SignInRequest, SignInResponse, SignUpRequest, TokenPair, TokenStore,
};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::address::AddressSuggestion;
use crate::models::catalog::FullCatalog;
use crate::models::order::{
    CreatedOrder, OrderListResponse, OrderPayload, OrderSnapshot, sort_newest_first,
};
use crate::models::partner::{
    HoursResponse, OpeningHours, PartnerId, PartnerListResponse, PartnerProfile, PartnerSummary,
};
use crate::observability::metrics::Metrics;

const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

#[derive(Debug, Serialize)]
struct PushTokenRequest<'a> {
    token: &'a str,
    app_type: &'static str,
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: TokenStore,
    metrics: Arc<Metrics>,
}

impl ApiClient {
    pub fn new(config: &Config, tokens: TokenStore, metrics: Arc<Metrics>) -> AppResult<Self> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;
        Ok(Self::with_client(http, &config.api_base_url, tokens, metrics))
    }

    pub fn with_client(
        http: Client,
        base_url: &str,
        tokens: TokenStore,
        metrics: Arc<Metrics>,
    ) -> Self {
        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Self {
            http,
            base_url,
            tokens,
            metrics,
        }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Absolute URL for an API path. Paths without a query string always end in `/`.
    pub fn url(&self, path: &str) -> String {
        let mut url = format!("{}{}", self.base_url, path.trim_start_matches('/'));
        if !url.contains('?') && !url.ends_with('/') {
            url.push('/');
        }
        url
    }

    fn url_for_query(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Sends a request with the current bearer token. A 401 triggers one token
    /// refresh and one retry; a second 401 is returned as `Unauthorized`.
    pub async fn send_authenticated<F>(&self, build: F) -> AppResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let request_id = Uuid::new_v4();

        let response = self.send_once(&build, request_id).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        debug!(%request_id, "access token rejected; refreshing");
        self.refresh().await?;

        let response = self.send_once(&build, request_id).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(%request_id, "request rejected again after token refresh");
            return Err(AppError::Unauthorized);
        }

        Ok(response)
    }

    async fn send_once<F>(&self, build: &F, request_id: Uuid) -> AppResult<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut request = build(&self.http).header(REQUEST_ID_HEADER, request_id.to_string());
        if let Some(token) = self.tokens.access_token().await? {
            request = request.bearer_auth(token);
        }

        Ok(request.send().await?)
    }

    /// Exchanges the refresh token for a new token pair. A rejected refresh
    /// token signs the user out locally.
    pub async fn refresh(&self) -> AppResult<()> {
        let Some(refresh_token) = self.tokens.refresh_token().await? else {
            self.count_refresh("missing");
            return Err(AppError::Unauthorized);
        };

        let response = self
            .http
            .post(self.url("auth/refresh-token/"))
            .bearer_auth(refresh_token)
            .json(&json!({}))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let tokens: TokenPair = response.json().await?;
                self.tokens.save(&tokens).await?;
                self.count_refresh("success");
                Ok(())
            }
            StatusCode::UNAUTHORIZED => {
                self.tokens.clear().await?;
                self.count_refresh("rejected");
                info!("refresh token rejected; signed out");
                Err(AppError::Unauthorized)
            }
            status => {
                self.count_refresh("error");
                Err(error_for(status, response).await)
            }
        }
    }

    fn count_refresh(&self, outcome: &str) {
        self.metrics
            .auth_refresh_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let url = self.url(path);
        let response = self.send_authenticated(|http| http.get(&url)).await?;
        read_json(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> AppResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .send_authenticated(|http| http.post(&url).json(body))
            .await?;
        read_json(response).await
    }

    pub async fn partner(&self, id: PartnerId) -> AppResult<PartnerProfile> {
        self.get_json(&format!("partners/{id}/")).await
    }

    pub async fn partner_hours(&self, id: PartnerId) -> AppResult<Vec<OpeningHours>> {
        let hours: HoursResponse = self.get_json(&format!("partners/{id}/hours/")).await?;
        Ok(hours.into_hours())
    }

    /// Restaurants delivering in `city`. Other business types are dropped.
    pub async fn restaurants(&self, city: &str) -> AppResult<Vec<PartnerSummary>> {
        let url = self.url_for_query("partners/");
        let response = self
            .send_authenticated(|http| http.get(&url).query(&[("city", city)]))
            .await?;
        let listing: PartnerListResponse = read_json(response).await?;
        Ok(listing
            .partners
            .into_iter()
            .filter(PartnerSummary::is_restaurant)
            .collect())
    }

    pub async fn catalog(&self, id: PartnerId) -> AppResult<FullCatalog> {
        self.get_json(&format!("partners/{id}/catalogs/full/?partner_id={id}"))
            .await
    }

    pub async fn address_suggestions(&self, query: &str) -> AppResult<Vec<AddressSuggestion>> {
        let url = self.url_for_query("address-autocomplete");
        let response = self
            .send_authenticated(|http| http.get(&url).query(&[("q", query)]))
            .await?;
        read_json(response).await
    }

    /// `POST orders/`. Only `201 Created` counts as accepted.
    pub async fn submit_order(&self, payload: &OrderPayload) -> AppResult<CreatedOrder> {
        let url = self.url("orders/");
        let response = self
            .send_authenticated(|http| http.post(&url).json(payload))
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "order submission rejected");
            return Err(AppError::OrderRejected {
                status: status.as_u16(),
            });
        }

        Ok(response.json().await?)
    }

    pub async fn latest_order(&self) -> AppResult<Option<OrderSnapshot>> {
        let orders: OrderListResponse = self.get_json("orders/?limit=1").await?;
        Ok(orders.into_first())
    }

    pub async fn order_history(&self, customer_id: i64) -> AppResult<Vec<OrderSnapshot>> {
        let orders: OrderListResponse = self
            .get_json(&format!("orders/?customer_id={customer_id}"))
            .await?;
        let mut orders = orders.into_orders();
        sort_newest_first(&mut orders);
        Ok(orders)
    }

    pub async fn register_push_token(&self, token: &str) -> AppResult<()> {
        let url = self.url("users/push-token/");
        let body = PushTokenRequest {
            token,
            app_type: "customer",
        };
        let response = self
            .send_authenticated(|http| http.post(&url).json(&body))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(error_for(status, response).await);
        }
        Ok(())
    }

    pub async fn user_profile(&self, email: &str) -> AppResult<UserProfile> {
        let url = self.url_for_query("users/profile/");
        let response = self
            .send_authenticated(|http| http.get(&url).query(&[("email", email)]))
            .await?;
        read_json(response).await
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AppResult<SignInResponse> {
        let response = self
            .http
            .post(self.url("auth/sign-in/?client_id=customer"))
            .json(&SignInRequest { email, password })
            .send()
            .await?;

        let signed_in: SignInResponse = read_json(response).await?;
        self.tokens.save(&signed_in.tokens()).await?;
        info!("signed in");
        Ok(signed_in)
    }

    /// Registers a customer account. Only `201 Created` counts as success; the
    /// user still has to sign in afterwards.
    pub async fn sign_up(&self, request: &SignUpRequest<'_>) -> AppResult<UserProfile> {
        let response = self
            .http
            .post(self.url("auth/sign-up/"))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            return Err(error_for(status, response).await);
        }
        info!("signed up");
        let body = response.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }

    pub async fn change_password(&self, request: &ChangePasswordRequest<'_>) -> AppResult<()> {
        let url = self.url("auth/change-password/");
        let response = self
            .send_authenticated(|http| http.post(&url).json(request))
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(error_for(status, response).await);
        }
        Ok(())
    }

    /// Tells the server to revoke the refresh token, then forgets both tokens
    /// regardless of the outcome.
    pub async fn sign_out(&self) -> AppResult<()> {
        if let Some(refresh_token) = self.tokens.refresh_token().await? {
            let url = self.url("auth/sign-out/");
            let result = self
                .send_authenticated(|http| {
                    http.post(&url)
                        .json(&json!({ "refresh_token": refresh_token }))
                })
                .await;
            if let Err(err) = result {
                warn!(error = %err, "sign-out request failed");
            }
        }

        self.tokens.clear().await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> AppResult<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(error_for(status, response).await);
    }

    Ok(response.json().await?)
}

async fn error_for(status: StatusCode, response: Response) -> AppError {
    let body = response.text().await.unwrap_or_default();
    let message = detail_message(body);
    match status {
        StatusCode::UNAUTHORIZED => AppError::Unauthorized,
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        _ => AppError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

/// Prefers the `detail` field of a JSON error body over the raw text.
fn detail_message(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("detail")?.as_str().map(str::to_string))
        .unwrap_or(body)
}
