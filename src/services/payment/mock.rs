use std::time::Duration;

use async_trait::async_trait;

use super::{PaymentGateway, PaymentReceipt, PaymentRequest};
use crate::services::short_code;

/// Settles every charge after a fixed delay. Dropping the future cancels the
/// pending timer.
pub struct MockPaymentGateway {
    delay: Duration,
}

impl MockPaymentGateway {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn charge(&self, request: &PaymentRequest) -> anyhow::Result<PaymentReceipt> {
        anyhow::ensure!(
            request.amount.is_finite() && request.amount >= 0.0,
            "invalid payment amount {}",
            request.amount
        );

        tokio::time::sleep(self.delay).await;

        let transaction_id = short_code("TXN");
        tracing::info!(
            booking_id = %request.booking_id,
            amount = request.amount,
            payment_type = request.payment_type.as_str(),
            transaction_id = %transaction_id,
            "mock payment settled"
        );
        Ok(PaymentReceipt { transaction_id })
    }
}
