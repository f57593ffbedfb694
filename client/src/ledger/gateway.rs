//! # Gateway Ledger
//!
//! [`LedgerNetwork`] over a JSON/HTTP gateway in front of a real network.
//!
//! | Call | Endpoint |
//! |------|----------|
//! | submit | `POST {base}/transactions` with `{"transaction": base64(bincode(tx))}` |
//! | receipt | `GET {base}/receipts/{transactionId}` (polled while `UNKNOWN`) |
//! | query | `POST {base}/queries` with the query as JSON |
//!
//! Timeouts are applied by the caller; this backend never gives up on a
//! pending receipt by itself.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    LedgerNetwork, LedgerQuery, QueryResponse, SignedTransaction, TransactionId,
    TransactionReceipt, TransportError,
};
use crate::utils::truncate_string;

#[derive(Serialize)]
struct SubmitRequest<'a> {
    transaction: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    transaction_id: TransactionId,
}

/// HTTP gateway client.
///
/// ## Usage
///
/// ```rust,ignore
/// let ledger = GatewayLedger::new(&config.gateway_url, config.request_timeout, config.receipt_poll_interval)?;
/// let id = ledger.submit(&signed).await?;
/// let receipt = ledger.receipt(&id).await?;
/// ```
#[derive(Clone)]
pub struct GatewayLedger {
    http: Client,
    base_url: String,
    poll_interval: Duration,
}

impl GatewayLedger {
    /// Create a gateway client.
    ///
    /// ## Arguments
    ///
    /// * `base_url` - Gateway root, without trailing slash
    /// * `request_timeout` - Bound on each individual HTTP request
    /// * `poll_interval` - Delay between receipt polls
    pub fn new(
        base_url: &str,
        request_timeout: Duration,
        poll_interval: Duration,
    ) -> Result<Self, TransportError> {
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        info!("Ledger gateway client initialized: {}", base_url);

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            poll_interval,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Map a non-2xx response to a transport error.
async fn ensure_success(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Http(format!("{}: {}", status, truncate_string(&body, 200))))
}

fn http_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Http(format!("request timed out: {}", e))
    } else {
        TransportError::Http(e.to_string())
    }
}

#[async_trait]
impl LedgerNetwork for GatewayLedger {
    async fn submit(&self, transaction: &SignedTransaction) -> Result<TransactionId, TransportError> {
        let encoded = transaction
            .to_base64()
            .map_err(|e| TransportError::Protocol(format!("Failed to serialize: {}", e)))?;

        debug!("Submitting transaction {}", truncate_string(&encoded, 32));

        let response = self
            .http
            .post(self.url("transactions"))
            .json(&SubmitRequest {
                transaction: &encoded,
            })
            .send()
            .await
            .map_err(http_error)?;

        let accepted: SubmitResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::Protocol(format!("Invalid submit response: {}", e)))?;

        Ok(accepted.transaction_id)
    }

    async fn receipt(&self, transaction_id: &TransactionId) -> Result<TransactionReceipt, TransportError> {
        let url = self.url(&format!("receipts/{}", transaction_id));

        loop {
            let response = self.http.get(&url).send().await.map_err(http_error)?;

            // The gateway may not know the id until it has gossiped it.
            if response.status() == StatusCode::NOT_FOUND {
                debug!("Receipt for {} not yet known", transaction_id);
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            let receipt: TransactionReceipt = ensure_success(response)
                .await?
                .json()
                .await
                .map_err(|e| TransportError::Protocol(format!("Invalid receipt: {}", e)))?;

            if receipt.transaction_id != *transaction_id {
                return Err(TransportError::Protocol(format!(
                    "Asked for receipt of {}, got {}",
                    transaction_id, receipt.transaction_id
                )));
            }

            if receipt.status.is_pending() {
                debug!("Receipt for {} still pending", transaction_id);
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            return Ok(receipt);
        }
    }

    async fn query(&self, query: &LedgerQuery) -> Result<QueryResponse, TransportError> {
        let response = self
            .http
            .post(self.url("queries"))
            .json(query)
            .send()
            .await
            .map_err(http_error)?;

        ensure_success(response)
            .await?
            .json()
            .await
            .map_err(|e| TransportError::Protocol(format!("Invalid query response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountId, ReceiptStatus};
    use mockito::Matcher;

    fn transaction_id() -> TransactionId {
        "0.0.2@1700000000.000000001".parse().unwrap()
    }

    fn ledger(server: &mockito::Server) -> GatewayLedger {
        GatewayLedger::new(&server.url(), Duration::from_secs(5), Duration::from_millis(10)).unwrap()
    }

    #[tokio::test]
    async fn test_submit_posts_base64_transaction() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/transactions")
            .match_body(Matcher::Regex(r#"\{"transaction":"[A-Za-z0-9+/=]+"\}"#.to_string()))
            .with_status(200)
            .with_body(r#"{"transactionId": "0.0.2@1700000000.000000001"}"#)
            .create_async()
            .await;

        let tx = SignedTransaction {
            body_bytes: vec![1, 2, 3],
            signatures: Vec::new(),
        };
        let id = ledger(&server).submit(&tx).await.unwrap();
        assert_eq!(id, transaction_id());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_submit_http_error_is_transport() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/transactions")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let tx = SignedTransaction {
            body_bytes: vec![1],
            signatures: Vec::new(),
        };
        let err = ledger(&server).submit(&tx).await.unwrap_err();
        assert!(matches!(err, TransportError::Http(_)));
    }

    #[tokio::test]
    async fn test_non_ascii_error_body_is_transport() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/queries")
            .with_status(503)
            .with_body("€".repeat(300))
            .create_async()
            .await;

        let err = ledger(&server)
            .query(&LedgerQuery::AccountBalance {
                account: AccountId::new(0, 0, 1001),
            })
            .await
            .unwrap_err();
        match err {
            TransportError::Http(message) => {
                assert!(message.starts_with("503"));
                assert!(message.contains("€..."));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receipt_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/receipts/0.0.2@1700000000.000000001")
            .with_status(200)
            .with_body(
                r#"{"transactionId": "0.0.2@1700000000.000000001", "status": "SUCCESS", "accountId": "0.0.1001"}"#,
            )
            .create_async()
            .await;

        let receipt = ledger(&server).receipt(&transaction_id()).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::Success);
        assert_eq!(receipt.account_id, Some(AccountId::new(0, 0, 1001)));
    }

    #[tokio::test]
    async fn test_receipt_failure_status_is_returned_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/receipts/0.0.2@1700000000.000000001")
            .with_status(200)
            .with_body(r#"{"transactionId": "0.0.2@1700000000.000000001", "status": "INVALID_SIGNATURE"}"#)
            .expect(1)
            .create_async()
            .await;

        let receipt = ledger(&server).receipt(&transaction_id()).await.unwrap();
        assert_eq!(receipt.status, ReceiptStatus::InvalidSignature);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_pending_receipt_keeps_polling() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/receipts/0.0.2@1700000000.000000001")
            .with_status(200)
            .with_body(r#"{"transactionId": "0.0.2@1700000000.000000001", "status": "UNKNOWN"}"#)
            .expect_at_least(2)
            .create_async()
            .await;

        let ledger = ledger(&server);
        let waited = tokio::time::timeout(Duration::from_millis(200), ledger.receipt(&transaction_id())).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_query_round_trip() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/queries")
            .match_body(Matcher::PartialJsonString(
                r#"{"query": "accountBalance", "account": "0.0.1001"}"#.to_string(),
            ))
            .with_status(200)
            .with_body(r#"{"response": "accountBalance", "account": "0.0.1001", "native": 500, "assets": {"0.0.1002": 1}}"#)
            .create_async()
            .await;

        let response = ledger(&server)
            .query(&LedgerQuery::AccountBalance {
                account: AccountId::new(0, 0, 1001),
            })
            .await
            .unwrap();

        match response {
            QueryResponse::AccountBalance(balance) => {
                assert_eq!(balance.native, 500);
                assert_eq!(balance.assets.len(), 1);
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
