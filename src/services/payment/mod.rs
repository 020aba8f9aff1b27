pub mod mock;

use async_trait::async_trait;

use crate::models::{PaymentMethod, PaymentType};

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub booking_id: String,
    pub user_id: String,
    pub amount: f64,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub transaction_id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn charge(&self, request: &PaymentRequest) -> anyhow::Result<PaymentReceipt>;
}
