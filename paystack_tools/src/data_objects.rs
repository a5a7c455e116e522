use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CHARGE_SUCCESS_EVENT: &str = "charge.success";
pub const CHARGE_FAILED_EVENT: &str = "charge.failed";

/// Every Paystack response wraps its payload in this envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: bool,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

//-------------------------------------- InitializeTransactionRequest ------------------------------------------------
#[derive(Debug, Clone, Serialize)]
pub struct InitializeTransactionRequest {
    pub email: String,
    /// Amount in kobo. The gateway only ever sees minor units.
    pub amount: i64,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

//--------------------------------------  InitializedTransaction  ----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

//--------------------------------------      ChargeStatus        ----------------------------------------------------
/// The gateway's view of a transaction. Everything that is not a terminal success or failure is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    Success,
    Failed,
    Abandoned,
    Pending,
    Ongoing,
    Processing,
    Queued,
    Reversed,
    #[serde(other)]
    Unknown,
}

impl ChargeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ChargeStatus::Success)
    }

    /// Abandoned sessions are reported by the gateway as a distinct status, but for reconciliation they are
    /// failures: the customer walked away and the session cannot complete.
    pub fn is_failure(&self) -> bool {
        matches!(self, ChargeStatus::Failed | ChargeStatus::Abandoned | ChargeStatus::Reversed)
    }
}

//--------------------------------------        Customer          ----------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

//--------------------------------------     TransactionData      ----------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionData {
    #[serde(default)]
    pub id: i64,
    pub status: ChargeStatus,
    pub reference: String,
    /// Amount in kobo.
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default)]
    pub gateway_response: String,
    #[serde(default)]
    pub metadata: Value,
}

//--------------------------------------    TransactionFilter     ----------------------------------------------------
/// Filters for the transaction list endpoint. Empty fields are omitted from the query string.
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
    pub status: Option<ChargeStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TransactionFilter {
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(n) = self.per_page {
            params.push(("perPage", n.to_string()));
        }
        if let Some(n) = self.page {
            params.push(("page", n.to_string()));
        }
        if let Some(status) = self.status {
            let s = serde_json::to_value(status).ok().and_then(|v| v.as_str().map(String::from));
            if let Some(s) = s {
                params.push(("status", s));
            }
        }
        if let Some(from) = self.from {
            params.push(("from", from.to_rfc3339()));
        }
        if let Some(to) = self.to {
            params.push(("to", to.to_rfc3339()));
        }
        params
    }
}

//--------------------------------------       WebhookEvent       ----------------------------------------------------
/// The payload Paystack POSTs to the webhook endpoint, after the HMAC signature has been checked.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub data: TransactionData,
}

impl WebhookEvent {
    pub fn is_charge_success(&self) -> bool {
        self.event == CHARGE_SUCCESS_EVENT
    }

    pub fn is_charge_failed(&self) -> bool {
        self.event == CHARGE_FAILED_EVENT
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const VERIFY_JSON: &str = r#"{
      "status": true,
      "message": "Verification successful",
      "data": {
        "id": 4099260516,
        "status": "success",
        "reference": "PAY-1718908500000-A1B2C3",
        "amount": 1000000,
        "paid_at": "2024-06-20T19:15:00.000Z",
        "created_at": "2024-06-20T19:05:00.000Z",
        "channel": "card",
        "currency": "NGN",
        "gateway_response": "Successful",
        "metadata": {"link_type": "product"},
        "customer": {
          "id": 181873746,
          "first_name": "Ada",
          "last_name": "Obi",
          "email": "ada@example.com",
          "phone": null
        }
      }
    }"#;

    #[test]
    fn deserialize_verify_response() {
        let envelope: ApiEnvelope<TransactionData> = serde_json::from_str(VERIFY_JSON).unwrap();
        assert!(envelope.status);
        let tx = envelope.data.unwrap();
        assert_eq!(tx.status, ChargeStatus::Success);
        assert!(tx.status.is_success());
        assert_eq!(tx.reference, "PAY-1718908500000-A1B2C3");
        assert_eq!(tx.amount, 1_000_000);
        assert_eq!(tx.customer.email, "ada@example.com");
        assert!(tx.paid_at.is_some());
    }

    #[test]
    fn unknown_charge_status_does_not_fail_deserialization() {
        let tx: TransactionData = serde_json::from_str(
            r#"{"status": "part_debited", "reference": "PAY-1-X", "amount": 100}"#,
        )
        .unwrap();
        assert_eq!(tx.status, ChargeStatus::Unknown);
        assert!(!tx.status.is_success());
        assert!(!tx.status.is_failure());
    }

    #[test]
    fn webhook_event_discrimination() {
        let event: WebhookEvent = serde_json::from_str(
            r#"{"event": "charge.success", "data": {"status": "success", "reference": "PAY-2-Y", "amount": 5000}}"#,
        )
        .unwrap();
        assert!(event.is_charge_success());
        assert!(!event.is_charge_failed());
        let event: WebhookEvent = serde_json::from_str(
            r#"{"event": "subscription.create", "data": {"status": "pending", "reference": "PAY-3-Z", "amount": 1}}"#,
        )
        .unwrap();
        assert!(!event.is_charge_success());
        assert!(!event.is_charge_failed());
    }

    #[test]
    fn filter_query_params() {
        let filter = TransactionFilter {
            per_page: Some(50),
            page: Some(2),
            status: Some(ChargeStatus::Abandoned),
            ..Default::default()
        };
        let params = filter.to_query();
        assert!(params.contains(&("perPage", "50".to_string())));
        assert!(params.contains(&("page", "2".to_string())));
        assert!(params.contains(&("status", "abandoned".to_string())));
        assert!(TransactionFilter::default().to_query().is_empty());
    }
}
