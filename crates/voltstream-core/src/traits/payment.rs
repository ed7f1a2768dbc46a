//! Payment collaborator interface.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::id::UserId;

/// Captures a charge against a user's payment method.
///
/// Invoked only after a session reaches COMPLETED with a non-zero cost.
/// Capture, refunds, and provider selection live outside this core.
#[async_trait]
pub trait PaymentProvider: Send + Sync + 'static {
    /// Charge `amount` in `currency` to the user's payment method.
    ///
    /// `context` carries opaque correlation data (session id, station id)
    /// for the provider's records. Returns the provider's transaction
    /// reference.
    async fn charge_amount(
        &self,
        user_id: UserId,
        amount: f64,
        currency: &str,
        context: serde_json::Value,
    ) -> AppResult<String>;
}
