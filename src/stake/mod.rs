//! Conditional transaction assembly and submission.
//!
//! # Architecture
//!
//! ```text
//! ProxyStake / RegisterAgent
//!        │ plan()
//!        ▼
//!   ActionPlan ──▶ Submitter::execute
//!                    ├─ probe state accounts (fresh every attempt)
//!                    ├─ assemble: creators for absent accounts, then core
//!                    ├─ checkpoint (retry with backoff)
//!                    ├─ compile v0 + sign
//!                    ├─ submit
//!                    └─ confirm until the checkpoint's last valid height
//! ```

mod actions;
pub mod instructions;
pub mod plan;
mod submit;

pub use actions::{ProxyStake, RegisterAgent};
pub use plan::{
    assemble, AccountRole, ActionPlan, AssembledAction, LabeledInstruction, PlannedAccount,
};
pub use submit::{build_transaction, SubmitSettings, Submitted, Submitter};

use crate::address::AddressBook;
use crate::credentials::RelayCredentials;
use crate::error::{Error, Result};
use crate::ledger::{ConfigAccount, LedgerRpc};
use crate::payment::SettledPayment;
use crate::redact::REDACTED;
use serde_json::json;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of registering an agent.
pub struct AgentRegistration {
    /// Id assigned to the agent.
    pub agent_id: u16,
    /// Agent account.
    pub agent: Pubkey,
    /// Agent performance account.
    pub agent_perf: Pubkey,
    /// Confirmed registration transaction.
    pub signature: Signature,
    identity: Keypair,
}

impl AgentRegistration {
    /// Identity generated for the agent.
    #[must_use]
    pub fn identity(&self) -> &Keypair {
        &self.identity
    }

    /// Record including the identity's secret key. Pass through
    /// [`crate::redact::redact_secret_fields`] before showing it to anyone.
    #[must_use]
    pub fn to_record(&self) -> serde_json::Value {
        json!({
            "agentId": self.agent_id,
            "agent": self.agent.to_string(),
            "agentPerf": self.agent_perf.to_string(),
            "publicKey": self.identity.pubkey().to_string(),
            "privateKey": self.identity.to_base58_string(),
            "signature": self.signature.to_string(),
        })
    }
}

impl fmt::Debug for AgentRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistration")
            .field("agent_id", &self.agent_id)
            .field("agent", &self.agent)
            .field("agent_perf", &self.agent_perf)
            .field("signature", &self.signature)
            .field("identity", &self.identity.pubkey())
            .field("identity_secret", &REDACTED)
            .finish()
    }
}

/// Stake relay bound to one program deployment.
#[derive(Clone)]
pub struct StakeRelay {
    book: AddressBook,
    stake_mint: Pubkey,
    submitter: Submitter,
}

impl StakeRelay {
    /// Create a relay.
    ///
    /// # Arguments
    ///
    /// * `book` - resolver for the deployment's program id and config id
    /// * `stake_mint` - mint stakes are denominated in
    /// * `ledger` - ledger access
    /// * `settings` - retry and polling parameters
    #[must_use]
    pub fn new(
        book: AddressBook,
        stake_mint: Pubkey,
        ledger: Arc<dyn LedgerRpc>,
        settings: SubmitSettings,
    ) -> Self {
        Self {
            book,
            stake_mint,
            submitter: Submitter::new(ledger, settings),
        }
    }

    /// Address resolver.
    #[must_use]
    pub fn book(&self) -> &AddressBook {
        &self.book
    }

    /// Read and decode the deployment's config account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the account does not exist, a layout
    /// error if it does not decode, or [`Error::Rpc`] on transport failure.
    pub async fn load_config(&self) -> Result<ConfigAccount> {
        let address = self.book.config()?.address;
        let record = self.submitter.prober().probe(&address).await?;
        let data = record.data.ok_or_else(|| {
            Error::Config(format!(
                "config account {address} (id {}) does not exist",
                self.book.config_id()
            ))
        })?;
        ConfigAccount::decode(&data)
    }

    /// Check a stake request against the live config without signing anything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BelowMinimumStake`] for an amount under the minimum,
    /// [`Error::Validation`] if staking is paused, or [`Error::Config`] if the
    /// deployment uses a different mint.
    pub async fn preflight(&self, request: &ProxyStake) -> Result<ConfigAccount> {
        let config = self.load_config().await?;
        if config.stake_mint != self.stake_mint {
            return Err(Error::Config(format!(
                "deployment stakes {}, relay is configured for {}",
                config.stake_mint, self.stake_mint
            )));
        }
        if config.paused {
            return Err(Error::Validation("staking is paused".into()));
        }
        if request.amount < config.min_stake_amount {
            return Err(Error::BelowMinimumStake {
                amount: request.amount,
                minimum: config.min_stake_amount,
            });
        }
        Ok(config)
    }

    /// Stake on behalf of a beneficiary, funded by a settled payment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the payment does not cover the stake,
    /// any [`StakeRelay::preflight`] error, or a submission error.
    pub async fn proxy_stake(
        &self,
        credentials: &RelayCredentials,
        request: &ProxyStake,
        payment: &SettledPayment,
    ) -> Result<Submitted> {
        if payment.amount() != request.amount {
            return Err(Error::Validation(format!(
                "payment of {} does not match stake of {}",
                payment.amount(),
                request.amount
            )));
        }

        self.preflight(request).await?;

        let relay = credentials.relay();
        let plan = request.plan(&self.book, &relay.pubkey(), &self.stake_mint)?;
        info!(
            "Proxy stake of {} on theme {} agent {} for {} (payment {})",
            request.amount,
            request.theme_id,
            request.agent_id,
            request.beneficiary,
            payment.receipt().transaction
        );

        self.submitter.execute(&plan, relay, &[]).await.map_err(|e| {
            warn!(
                "Proxy stake for {} failed after settlement {}: {e}",
                request.beneficiary,
                payment.receipt().transaction
            );
            e
        })
    }

    /// Register the next agent, signed by the admin and a new agent identity.
    ///
    /// The agent id comes from the config's counter, so every attempt re-reads
    /// the config and re-plans: a concurrent registration that claimed the id
    /// moves this one on to the next.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Credentials`] without an admin key, [`Error::Config`]
    /// if the admin key is not the deployment's admin, or a submission error.
    pub async fn register_agent(
        &self,
        credentials: &RelayCredentials,
    ) -> Result<AgentRegistration> {
        let admin = credentials.admin()?;
        let identity = Keypair::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let config = self.load_config().await?;
            if config.admin != admin.pubkey() {
                return Err(Error::Config(format!(
                    "admin key {} is not the deployment admin {}",
                    admin.pubkey(),
                    config.admin
                )));
            }

            let action = RegisterAgent {
                agent_id: config.next_agent_id,
                agent_identity: identity.pubkey(),
            };
            let plan = action.plan(&self.book, &admin.pubkey())?;
            info!(
                "Registering agent {} with identity {}",
                action.agent_id,
                identity.pubkey()
            );

            match self.submitter.attempt(&plan, admin, &[&identity], attempt).await {
                Ok(submitted) => {
                    return Ok(AgentRegistration {
                        agent_id: action.agent_id,
                        agent: self.book.agent(action.agent_id)?.address,
                        agent_perf: self.book.agent_perf(action.agent_id)?.address,
                        signature: submitted.signature,
                        identity,
                    });
                }
                Err(e) if self.submitter.should_rebuild(&e, attempt) => {
                    warn!(
                        "Registering agent {} attempt {attempt} {e}; re-reading config",
                        action.agent_id
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
