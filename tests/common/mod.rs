//! In-memory store and gateway doubles for service-level tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duka_backend::database::analytics_repository::AnalyticsStore;
use duka_backend::database::error::{DatabaseError, DatabaseErrorKind};
use duka_backend::database::order_repository::{
    Order, OrderStore, OrderTransaction, PaymentCompletion, PaymentFailure,
};
use duka_backend::database::otp_repository::{OtpSession, OtpSessionStore};
use duka_backend::database::user_repository::{User, UserStore};
use duka_backend::payments::error::{PaymentError, PaymentResult};
use duka_backend::payments::provider::{StkGateway, StkPushOrder};
use duka_backend::payments::types::{StkPushResponse, StkQueryResponse};
use duka_backend::services::mailer::{MailError, Mailer};
use std::collections::HashMap;
use std::sync::Mutex;

pub fn pending_order(order_id: &str, checkout_request_id: &str) -> Order {
    Order {
        order_id: order_id.to_string(),
        payment_status: "pending".to_string(),
        status: "pending".to_string(),
        mpesa_checkout_request_id: Some(checkout_request_id.to_string()),
        mpesa_receipt_number: None,
        mpesa_transaction_id: None,
        mpesa_phone_number: None,
        mpesa_failure_reason: None,
        paid_amount: None,
        mpesa_transaction_date: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

#[derive(Default)]
pub struct MemoryOrderStore {
    pub orders: Mutex<HashMap<String, Order>>,
}

impl MemoryOrderStore {
    pub fn with_order(order: Order) -> Self {
        let store = Self::default();
        store
            .orders
            .lock()
            .unwrap()
            .insert(order.order_id.clone(), order);
        store
    }

    pub fn get(&self, order_id: &str) -> Option<Order> {
        self.orders.lock().unwrap().get(order_id).cloned()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn find_by_checkout_request_id(
        &self,
        checkout_request_id: &str,
    ) -> Result<Option<Order>, DatabaseError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .values()
            .find(|o| o.mpesa_checkout_request_id.as_deref() == Some(checkout_request_id))
            .cloned())
    }

    async fn attach_checkout_request(
        &self,
        order_id: &str,
        checkout_request_id: &str,
    ) -> Result<bool, DatabaseError> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(order_id) {
            Some(order) if order.payment_status == "pending" => {
                order.mpesa_checkout_request_id = Some(checkout_request_id.to_string());
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_completion(
        &self,
        order_id: &str,
        completion: &PaymentCompletion,
    ) -> Result<bool, DatabaseError> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(order_id) {
            Some(order) if order.payment_status != "failed" => {
                order.payment_status = "completed".to_string();
                order.status = "processing".to_string();
                order.mpesa_receipt_number = completion.receipt.clone();
                order.mpesa_transaction_id = completion.transaction_id.clone();
                order.mpesa_phone_number = completion.phone.clone();
                order.paid_amount = completion.paid_amount;
                order.mpesa_transaction_date = completion.transaction_time;
                order.mpesa_failure_reason = None;
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn apply_failure(
        &self,
        order_id: &str,
        failure: &PaymentFailure,
    ) -> Result<bool, DatabaseError> {
        let mut orders = self.orders.lock().unwrap();
        match orders.get_mut(order_id) {
            Some(order) if order.payment_status != "completed" => {
                order.payment_status = "failed".to_string();
                order.mpesa_failure_reason = Some(failure.reason.clone());
                order.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn transactions_for_order(
        &self,
        _order_id: &str,
    ) -> Result<Vec<OrderTransaction>, DatabaseError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct MemoryOtpStore {
    pub sessions: Mutex<HashMap<String, OtpSession>>,
}

impl MemoryOtpStore {
    pub fn get(&self, email: &str) -> Option<OtpSession> {
        self.sessions.lock().unwrap().get(email).cloned()
    }
}

#[async_trait]
impl OtpSessionStore for MemoryOtpStore {
    async fn find(&self, email: &str) -> Result<Option<OtpSession>, DatabaseError> {
        Ok(self.sessions.lock().unwrap().get(email).cloned())
    }

    async fn upsert(&self, session: &OtpSession) -> Result<(), DatabaseError> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.email.clone(), session.clone());
        Ok(())
    }

    async fn record_failed_attempt(&self, email: &str) -> Result<i32, DatabaseError> {
        let mut sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get_mut(email)
            .ok_or_else(|| DatabaseError::new(DatabaseErrorKind::NotFound))?;
        session.attempts += 1;
        Ok(session.attempts)
    }

    async fn mark_verified(&self, email: &str, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(session) = sessions.get_mut(email) {
            session.verified = true;
            session.verified_at = Some(at);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    pub users: Mutex<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn with_users(users: Vec<User>) -> Self {
        let store = Self::default();
        {
            let mut map = store.users.lock().unwrap();
            for user in users {
                map.insert(user.email.clone(), user);
            }
        }
        store
    }

    pub fn contains(&self, email: &str) -> bool {
        self.users.lock().unwrap().contains_key(email)
    }

    pub fn get(&self, email: &str) -> Option<User> {
        self.users.lock().unwrap().get(email).cloned()
    }
}

pub fn user(email: &str, is_admin: bool) -> User {
    User {
        email: email.to_string(),
        user_name: Some("Test User".to_string()),
        email_verified: false,
        is_admin,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        Ok(self.users.lock().unwrap().get(email).cloned())
    }

    async fn set_email_verified(&self, email: &str) -> Result<bool, DatabaseError> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(email) {
            Some(user) => {
                user.email_verified = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn purge(&self, email: &str) -> Result<bool, DatabaseError> {
        Ok(self.users.lock().unwrap().remove(email).is_some())
    }
}

#[derive(Default)]
pub struct MemoryAnalytics {
    pub events: Mutex<Vec<(String, String, serde_json::Value)>>,
}

impl MemoryAnalytics {
    pub fn events_named(&self, event: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _, _)| name == event)
            .count()
    }
}

#[async_trait]
impl AnalyticsStore for MemoryAnalytics {
    async fn record(
        &self,
        event: &str,
        email: &str,
        metadata: serde_json::Value,
    ) -> Result<(), DatabaseError> {
        self.events
            .lock()
            .unwrap()
            .push((event.to_string(), email.to_string(), metadata));
        Ok(())
    }
}

/// A single captured delivery
#[derive(Debug, Clone)]
pub struct SentMail {
    pub to: String,
    pub user_name: Option<String>,
    pub code: String,
}

/// Mailer that captures every code it is asked to deliver
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn last_for(&self, email: &str) -> Option<SentMail> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|mail| mail.to == email)
            .cloned()
    }

    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.last_for(email).map(|mail| mail.code)
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_otp(
        &self,
        to: &str,
        user_name: Option<&str>,
        code: &str,
        _expires_in_seconds: i64,
    ) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            user_name: user_name.map(|s| s.to_string()),
            code: code.to_string(),
        });
        Ok(())
    }
}

/// Gateway double returning canned provider responses
pub struct StubGateway {
    pub push_response: Mutex<Option<PaymentResult<StkPushResponse>>>,
    pub query_response: Mutex<Option<PaymentResult<StkQueryResponse>>>,
}

impl Default for StubGateway {
    fn default() -> Self {
        Self {
            push_response: Mutex::new(None),
            query_response: Mutex::new(None),
        }
    }
}

impl StubGateway {
    pub fn accepting_push(checkout_request_id: &str) -> Self {
        let stub = Self::default();
        *stub.push_response.lock().unwrap() = Some(Ok(StkPushResponse {
            merchant_request_id: "merchant-1".to_string(),
            checkout_request_id: checkout_request_id.to_string(),
            response_code: "0".to_string(),
            response_description: "Success. Request accepted for processing".to_string(),
            customer_message: Some("Enter your PIN".to_string()),
        }));
        stub
    }

    pub fn with_query(response: StkQueryResponse) -> Self {
        let stub = Self::default();
        *stub.query_response.lock().unwrap() = Some(Ok(response));
        stub
    }
}

#[async_trait]
impl StkGateway for StubGateway {
    async fn initiate(&self, _order: &StkPushOrder) -> PaymentResult<StkPushResponse> {
        self.push_response
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(PaymentError::NetworkError {
                message: "no stub response configured".to_string(),
            }))
    }

    async fn query(&self, _checkout_request_id: &str) -> PaymentResult<StkQueryResponse> {
        self.query_response
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(PaymentError::NetworkError {
                message: "no stub response configured".to_string(),
            }))
    }
}

pub fn query_response(
    response_code: &str,
    result_code: Option<&str>,
    result_desc: Option<&str>,
) -> StkQueryResponse {
    StkQueryResponse {
        response_code: response_code.to_string(),
        response_description: Some("ok".to_string()),
        merchant_request_id: Some("merchant-1".to_string()),
        checkout_request_id: Some("ws_CO_1".to_string()),
        result_code: result_code.map(|s| s.to_string()),
        result_desc: result_desc.map(|s| s.to_string()),
    }
}
