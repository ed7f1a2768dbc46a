//! Logging no-op payment and notification collaborators.

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use voltstream_core::traits::{Notifier, PaymentProvider};
use voltstream_core::types::id::UserId;
use voltstream_core::AppResult;

/// Logs the charge and returns a synthetic transaction reference.
#[derive(Debug, Default)]
pub struct LoggingPaymentProvider;

#[async_trait]
impl PaymentProvider for LoggingPaymentProvider {
    async fn charge_amount(
        &self,
        user_id: UserId,
        amount: f64,
        currency: &str,
        context: serde_json::Value,
    ) -> AppResult<String> {
        let reference = format!("pay-{}", Uuid::new_v4());
        info!(
            user_id = %user_id,
            amount = amount,
            currency = currency,
            reference = %reference,
            context = %context,
            "Payment captured (logging provider)"
        );
        Ok(reference)
    }
}

/// Logs notifications instead of delivering them.
#[derive(Debug, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, user_id: UserId, event_type: &str, payload: serde_json::Value) {
        info!(
            user_id = %user_id,
            event_type = event_type,
            payload = %payload,
            "Notification (logging notifier)"
        );
    }
}
