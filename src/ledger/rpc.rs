//! JSON-RPC implementation of [`LedgerRpc`].

use super::rejection::{classify_message, classify_transaction_error, failed_instruction};
use super::{Checkpoint, LedgerRpc, SignatureOutcome};
use crate::error::{Error, RejectionKind, Result};
use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, warn};

/// Ledger access over a JSON-RPC endpoint.
pub struct SolanaRpc {
    client: RpcClient,
    commitment: CommitmentConfig,
}

impl SolanaRpc {
    /// Create a client for `url` at the given commitment.
    #[must_use]
    pub fn new(url: String, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_commitment(url, commitment),
            commitment,
        }
    }

    /// Endpoint URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.client.url()
    }
}

fn rpc_error(context: &str, e: &ClientError) -> Error {
    Error::Rpc(format!("{context}: {e}"))
}

#[async_trait]
impl LedgerRpc for SolanaRpc {
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let response = self
            .client
            .get_account_with_commitment(address, self.commitment)
            .await
            .map_err(|e| rpc_error(&format!("get_account {address}"), &e))?;
        Ok(response.value.map(|account| account.data))
    }

    async fn get_latest_checkpoint(&self) -> Result<Checkpoint> {
        let (blockhash, last_valid_block_height) = self
            .client
            .get_latest_blockhash_with_commitment(self.commitment)
            .await
            .map_err(|e| rpc_error("get_latest_blockhash", &e))?;
        Ok(Checkpoint {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        let config = RpcSendTransactionConfig {
            preflight_commitment: Some(self.commitment.commitment),
            ..RpcSendTransactionConfig::default()
        };

        match self
            .client
            .send_transaction_with_config(transaction, config)
            .await
        {
            Ok(signature) => {
                debug!("Submitted transaction {signature}");
                Ok(signature)
            }
            Err(e) => {
                let message = e.to_string();
                let tx_err = e.get_transaction_error();
                let kind = match &tx_err {
                    Some(tx_err) => classify_transaction_error(tx_err),
                    None => classify_message(&message),
                };
                warn!("send_transaction failed ({kind}): {message}");
                if kind == RejectionKind::Other && tx_err.is_none() {
                    // No structured rejection: we cannot tell whether the node
                    // accepted the transaction.
                    return Err(Error::Rpc(format!("send_transaction: {message}")));
                }
                Err(Error::SubmissionRejected {
                    kind,
                    message,
                    instruction: tx_err.as_ref().and_then(failed_instruction),
                })
            }
        }
    }

    async fn signature_status(&self, signature: &Signature) -> Result<Option<SignatureOutcome>> {
        let response = self
            .client
            .get_signature_statuses(&[*signature])
            .await
            .map_err(|e| rpc_error(&format!("get_signature_statuses {signature}"), &e))?;

        let status = response.value.into_iter().next().flatten();
        Ok(status.and_then(|status| {
            if let Some(err) = status.err.clone() {
                return Some(Err(err));
            }
            status
                .satisfies_commitment(self.commitment)
                .then_some(Ok(()))
        }))
    }

    async fn block_height(&self) -> Result<u64> {
        self.client
            .get_block_height_with_commitment(self.commitment)
            .await
            .map_err(|e| rpc_error("get_block_height", &e))
    }
}
