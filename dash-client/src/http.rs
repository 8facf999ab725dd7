//! HTTP client for the dash-server REST API

use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::models::{CreateOrderRequest, LoginRequest, LoginResponse, OrderQuery, UpdateStatusRequest};
use shared::{Dish, Order, OrderItem, OrderStatus, OrderType};

use crate::{ClientConfig, ClientError, ClientResult};

/// Session header understood by the server
const SESSION_HEADER: &str = "session-id";
const PROPAGATION_HEADER: &str = "x-order-propagation";
/// `GET /dishes` page size (server max)
const MENU_PAGE: usize = 100;

/// Whether the server handed an order write to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Published,
    /// Saved, but kitchen screens will only see it after their next backfill
    Degraded,
    /// Header missing or unrecognized
    Unknown,
}

impl Propagation {
    fn from_header(value: Option<&str>) -> Self {
        match value {
            Some("published") => Propagation::Published,
            Some("degraded") => Propagation::Degraded,
            _ => Propagation::Unknown,
        }
    }
}

/// Result of `POST /orders` or `PUT /orders/{id}/status`
#[derive(Debug, Clone, PartialEq)]
pub struct OrderWrite {
    pub order: Order,
    pub propagation: Propagation,
}

/// REST client; clones share the connection pool
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session_id: Option<String>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session_id: None,
        })
    }

    /// Set the session id
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method, &url);
        if let Some(session) = &self.session_id {
            request = request.header(SESSION_HEADER, session);
        }
        request
    }

    /// Handle the HTTP response
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await?;
            return Err(ClientError::from_response(status, &text));
        }
        response.json().await.map_err(Into::into)
    }

    /// 订单写操作：解析订单并记录事件是否送达代理
    async fn handle_order_write(response: reqwest::Response) -> ClientResult<OrderWrite> {
        let propagation = Propagation::from_header(
            response
                .headers()
                .get(PROPAGATION_HEADER)
                .and_then(|v| v.to_str().ok()),
        );
        let order: Order = Self::handle_response(response).await?;
        if propagation == Propagation::Degraded {
            tracing::warn!(order_id = %order.id, "Order saved but realtime propagation degraded");
        }
        Ok(OrderWrite { order, propagation })
    }

    // ========== Auth API ==========

    /// Login and keep the returned session for later calls
    pub async fn login(&mut self, email: &str, password: &str) -> ClientResult<LoginResponse> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.request(Method::POST, "/login").json(&body).send().await?;
        let login: LoginResponse = Self::handle_response(response).await?;
        self.session_id = Some(login.session_id.clone());
        tracing::info!(role = %login.role, "Logged in");
        Ok(login)
    }

    pub async fn logout(&mut self) -> ClientResult<()> {
        let response = self.request(Method::POST, "/logout").send().await?;
        let _: serde_json::Value = Self::handle_response(response).await?;
        self.session_id = None;
        Ok(())
    }

    // ========== Orders API ==========

    /// Newest first
    pub async fn list_orders(&self, query: &OrderQuery) -> ClientResult<Vec<Order>> {
        let response = self
            .request(Method::GET, "/orders")
            .query(query)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn get_order(&self, id: &str) -> ClientResult<Order> {
        let response = self
            .request(Method::GET, &format!("/orders/{}", id))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn create_order(
        &self,
        items: Vec<OrderItem>,
        order_type: OrderType,
    ) -> ClientResult<OrderWrite> {
        let body = CreateOrderRequest { items, order_type };
        let response = self.request(Method::POST, "/orders").json(&body).send().await?;
        Self::handle_order_write(response).await
    }

    pub async fn update_status(&self, id: &str, status: OrderStatus) -> ClientResult<OrderWrite> {
        let response = self
            .request(Method::PUT, &format!("/orders/{}/status", id))
            .json(&UpdateStatusRequest { status })
            .send()
            .await?;
        Self::handle_order_write(response).await
    }

    // ========== Dishes API ==========

    pub async fn list_dishes(&self, offset: usize, limit: usize) -> ClientResult<Vec<Dish>> {
        let response = self
            .request(Method::GET, "/dishes")
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Whole menu, page by page until a short page
    pub async fn load_menu(&self) -> ClientResult<Vec<Dish>> {
        let mut menu = Vec::new();
        loop {
            let page = self.list_dishes(menu.len(), MENU_PAGE).await?;
            let done = page.len() < MENU_PAGE;
            menu.extend(page);
            if done {
                return Ok(menu);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propagation_header() {
        assert_eq!(Propagation::from_header(Some("published")), Propagation::Published);
        assert_eq!(Propagation::from_header(Some("degraded")), Propagation::Degraded);
        assert_eq!(Propagation::from_header(Some("later")), Propagation::Unknown);
        assert_eq!(Propagation::from_header(None), Propagation::Unknown);
    }
}
