use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub user_id: String,
    pub amount: f64,
    pub payment_type: PaymentType,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub status: PaymentRecordStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    Advance,
    Remaining,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Advance => "advance",
            PaymentType::Remaining => "remaining",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "remaining" => PaymentType::Remaining,
            _ => PaymentType::Advance,
        }
    }
}

/// Outcome of one gateway charge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Completed,
    Failed,
}

impl PaymentRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRecordStatus::Completed => "completed",
            PaymentRecordStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => PaymentRecordStatus::Completed,
            _ => PaymentRecordStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Card,
    Upi,
    Wallet,
    Bank,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::Upi => "upi",
            PaymentMethod::Wallet => "wallet",
            PaymentMethod::Bank => "bank",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "upi" => PaymentMethod::Upi,
            "wallet" => PaymentMethod::Wallet,
            "bank" => PaymentMethod::Bank,
            _ => PaymentMethod::Card,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_status_storage_form() {
        for status in [PaymentRecordStatus::Completed, PaymentRecordStatus::Failed] {
            assert_eq!(PaymentRecordStatus::parse(status.as_str()), status);
        }
        assert_eq!(
            serde_json::to_string(&PaymentRecordStatus::Completed).unwrap(),
            "\"completed\""
        );
    }

    #[test]
    fn test_payment_type_storage_form() {
        assert_eq!(PaymentType::parse("remaining"), PaymentType::Remaining);
        assert_eq!(PaymentType::parse("advance"), PaymentType::Advance);
    }
}
