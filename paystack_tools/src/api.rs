use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{
    config::PaystackConfig,
    data_objects::{ApiEnvelope, InitializeTransactionRequest, InitializedTransaction, TransactionData, TransactionFilter},
    PaystackApiError,
};

/// All gateway calls share one bounded timeout. A timed-out call is an *unknown* outcome, never a payment result;
/// the error taxonomy reflects that by reporting it as `Unavailable`.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct PaystackApi {
    config: PaystackConfig,
    client: Arc<Client>,
}

impl PaystackApi {
    pub fn new(config: PaystackConfig) -> Result<Self, PaystackApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let bearer = format!("Bearer {}", config.secret_key.reveal());
        let val = HeaderValue::from_str(&bearer).map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        headers.insert("Authorization", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PaystackApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        body: Option<B>,
    ) -> Result<T, PaystackApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PaystackApiError::Unavailable(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            let envelope =
                response.json::<ApiEnvelope<T>>().await.map_err(|e| PaystackApiError::JsonError(e.to_string()))?;
            if !envelope.status {
                return Err(PaystackApiError::QueryError(envelope.message));
            }
            envelope.data.ok_or_else(|| PaystackApiError::JsonError("Response envelope carried no data".into()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaystackApiError::Unavailable(e.to_string()))?;
            Err(PaystackApiError::from_status(status, message))
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    /// Begins a new payment session with the gateway. The caller supplies the reference; the gateway echoes it back
    /// along with the hosted checkout URL the customer should be sent to.
    pub async fn initialize_transaction(
        &self,
        email: &str,
        amount_kobo: i64,
        reference: &str,
        callback_url: Option<String>,
        metadata: Option<Value>,
    ) -> Result<InitializedTransaction, PaystackApiError> {
        let body = InitializeTransactionRequest {
            email: email.to_string(),
            amount: amount_kobo,
            reference: reference.to_string(),
            callback_url,
            metadata,
        };
        debug!("Initializing transaction {reference} for {amount_kobo} kobo");
        let result = self
            .rest_query::<InitializedTransaction, InitializeTransactionRequest>(
                Method::POST,
                "/transaction/initialize",
                &[],
                Some(body),
            )
            .await?;
        info!("Initialized transaction {reference}");
        Ok(result)
    }

    /// Asks the gateway for its current view of the transaction. Side-effect free; callers decide what to persist.
    pub async fn verify_transaction(&self, reference: &str) -> Result<TransactionData, PaystackApiError> {
        let path = format!("/transaction/verify/{reference}");
        debug!("Verifying transaction {reference}");
        self.rest_query::<TransactionData, ()>(Method::GET, &path, &[], None).await
    }

    pub async fn get_transaction(&self, id: i64) -> Result<TransactionData, PaystackApiError> {
        let path = format!("/transaction/{id}");
        debug!("Fetching transaction #{id}");
        self.rest_query::<TransactionData, ()>(Method::GET, &path, &[], None).await
    }

    pub async fn list_transactions(&self, filter: TransactionFilter) -> Result<Vec<TransactionData>, PaystackApiError> {
        let params = filter.to_query();
        debug!("Listing transactions with {} filter params", params.len());
        self.rest_query::<Vec<TransactionData>, ()>(Method::GET, "/transaction", &params, None).await
    }
}
