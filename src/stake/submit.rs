//! Probe, assemble, sign, submit and confirm.

use crate::error::{Error, RejectionKind, Result};
use crate::ledger::{
    classify_transaction_error, failed_instruction, restrict_to_creators, AccountProber,
    Checkpoint, LedgerRpc,
};
use crate::stake::plan::{assemble, ActionPlan, AssembledAction};
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::{TransactionError, VersionedTransaction};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Consecutive failed status polls tolerated before giving up.
const MAX_POLL_FAILURES: u32 = 10;

/// Retry and polling parameters of the submit loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitSettings {
    /// Transactions built per action before giving up on rejections.
    pub max_submit_attempts: u32,
    /// Attempts at fetching a checkpoint.
    pub checkpoint_retries: u32,
    /// Initial backoff between checkpoint fetches; doubles each time.
    pub retry_backoff: Duration,
    /// Interval between confirmation polls.
    pub poll_interval: Duration,
}

impl Default for SubmitSettings {
    fn default() -> Self {
        Self {
            max_submit_attempts: 3,
            checkpoint_retries: 3,
            retry_backoff: Duration::from_millis(250),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// A confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    /// Transaction signature.
    pub signature: Signature,
    /// Instruction labels of the confirmed transaction.
    pub instructions: Vec<&'static str>,
    /// Number of transactions built, including the confirmed one.
    pub attempts: u32,
}

/// Compile and sign a v0 transaction. `payer` is signer zero and pays fees.
///
/// # Errors
///
/// Returns [`Error::Signing`] if the message cannot be compiled or a required
/// signature is missing.
pub fn build_transaction(
    payer: &Keypair,
    co_signers: &[&Keypair],
    instructions: &[Instruction],
    blockhash: Hash,
) -> Result<VersionedTransaction> {
    let message = v0::Message::try_compile(&payer.pubkey(), instructions, &[], blockhash)
        .map_err(|e| Error::Signing(format!("compile message: {e}")))?;

    let signers: Vec<&dyn Signer> = std::iter::once(payer as &dyn Signer)
        .chain(co_signers.iter().map(|k| *k as &dyn Signer))
        .collect();

    VersionedTransaction::try_new(VersionedMessage::V0(message), &signers)
        .map_err(|e| Error::Signing(format!("sign transaction: {e}")))
}

/// Drives one action to a confirmed signature.
#[derive(Clone)]
pub struct Submitter {
    ledger: Arc<dyn LedgerRpc>,
    prober: AccountProber,
    settings: SubmitSettings,
}

impl Submitter {
    /// Create a submitter over `ledger`.
    #[must_use]
    pub fn new(ledger: Arc<dyn LedgerRpc>, settings: SubmitSettings) -> Self {
        Self {
            prober: AccountProber::new(Arc::clone(&ledger)),
            ledger,
            settings,
        }
    }

    /// Prober sharing this submitter's ledger.
    #[must_use]
    pub fn prober(&self) -> &AccountProber {
        &self.prober
    }

    /// Transactions built per action before giving up on rejections.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.settings.max_submit_attempts.max(1)
    }

    /// Run `plan` to confirmation.
    ///
    /// Each attempt probes fresh, assembles, and signs against a fresh
    /// checkpoint. An attempt rejected for an expired checkpoint or a duplicate
    /// initialization is rebuilt; signed bytes are never resubmitted.
    ///
    /// # Errors
    ///
    /// - [`Error::Rpc`] if probing or a checkpoint fetch keeps failing
    /// - [`Error::SubmissionRejected`] for a fatal rejection or when attempts run out
    /// - [`Error::TransactionFailed`] if the transaction landed with an error
    /// - [`Error::ConfirmationExpired`] if the outcome is unknown
    pub async fn execute(
        &self,
        plan: &ActionPlan,
        payer: &Keypair,
        co_signers: &[&Keypair],
    ) -> Result<Submitted> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(plan, payer, co_signers, attempt).await {
                Ok(submitted) => return Ok(submitted),
                Err(e) if self.should_rebuild(&e, attempt) => {
                    warn!("{} attempt {attempt} {e}; rebuilding", plan.action);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Make attempt number `attempt` at `plan`: probe, assemble, sign, submit
    /// and confirm exactly one transaction.
    ///
    /// Callers whose plan depends on ledger state beyond the probed accounts
    /// loop over this themselves, re-planning between attempts.
    ///
    /// # Errors
    ///
    /// As [`Submitter::execute`], without any rebuilding.
    pub async fn attempt(
        &self,
        plan: &ActionPlan,
        payer: &Keypair,
        co_signers: &[&Keypair],
        attempt: u32,
    ) -> Result<Submitted> {
        let records = self.prober.probe_all(&plan.state_addresses()).await?;
        let assembled = assemble(plan, &records)?;
        debug!(
            "{} attempt {attempt}/{}: {:?}",
            plan.action,
            self.max_attempts(),
            assembled.labels()
        );

        let signature = self.submit_once(plan, &assembled, payer, co_signers).await?;
        info!(
            "{} confirmed: {signature} ({:?})",
            plan.action,
            assembled.labels()
        );
        Ok(Submitted {
            signature,
            instructions: assembled.labels(),
            attempts: attempt,
        })
    }

    /// Whether `err` from attempt number `attempt` calls for a rebuilt
    /// transaction.
    #[must_use]
    pub fn should_rebuild(&self, err: &Error, attempt: u32) -> bool {
        attempt < self.max_attempts()
            && matches!(
                err,
                Error::SubmissionRejected { kind, .. } if *kind != RejectionKind::Other
            )
    }

    async fn submit_once(
        &self,
        plan: &ActionPlan,
        assembled: &AssembledAction,
        payer: &Keypair,
        co_signers: &[&Keypair],
    ) -> Result<Signature> {
        let checkpoint = self.fetch_checkpoint().await?;
        let transaction = build_transaction(
            payer,
            co_signers,
            &assembled.instructions(),
            checkpoint.blockhash,
        )?;

        let signature = self.ledger.send_transaction(&transaction).await.map_err(|e| {
            warn!(
                "{} submission failed (blockhash {}, instructions {:?}): {e}",
                plan.action,
                checkpoint.blockhash,
                assembled.labels()
            );
            narrow_rejection(e, assembled.creators)
        })?;
        debug!(
            "{} submitted as {signature}, valid through block {}",
            plan.action, checkpoint.last_valid_block_height
        );

        self.confirm(signature, &checkpoint, assembled.creators).await?;
        Ok(signature)
    }

    async fn fetch_checkpoint(&self) -> Result<Checkpoint> {
        let attempts = self.settings.checkpoint_retries.max(1);
        let mut backoff = self.settings.retry_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.ledger.get_latest_checkpoint().await {
                Ok(checkpoint) => return Ok(checkpoint),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    warn!(
                        "Checkpoint fetch {attempt}/{attempts} failed: {e}; retrying in {backoff:?}"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Poll until the signature lands or the checkpoint's horizon passes.
    async fn confirm(
        &self,
        signature: Signature,
        checkpoint: &Checkpoint,
        creators: usize,
    ) -> Result<()> {
        let expired = || Error::ConfirmationExpired {
            signature,
            last_valid_block_height: checkpoint.last_valid_block_height,
        };
        let mut failures = 0;

        loop {
            match self.poll(&signature, checkpoint, creators).await {
                Ok(Poll::Landed) => return Ok(()),
                Ok(Poll::Expired) => {
                    warn!(
                        "{signature} not confirmed by block {}; outcome unknown",
                        checkpoint.last_valid_block_height
                    );
                    return Err(expired());
                }
                Ok(Poll::Pending) => failures = 0,
                Err(e @ (Error::TransactionFailed { .. } | Error::SubmissionRejected { .. })) => {
                    return Err(e);
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Status poll for {signature} failed ({failures}/{MAX_POLL_FAILURES}): {e}"
                    );
                    if failures >= MAX_POLL_FAILURES {
                        return Err(expired());
                    }
                }
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    async fn poll(
        &self,
        signature: &Signature,
        checkpoint: &Checkpoint,
        creators: usize,
    ) -> Result<Poll> {
        if let Some(outcome) = self.ledger.signature_status(signature).await? {
            return match outcome {
                Ok(()) => Ok(Poll::Landed),
                Err(tx_err) => Err(landed_error(signature, &tx_err, creators)),
            };
        }

        let height = self.ledger.block_height().await?;
        if height <= checkpoint.last_valid_block_height {
            return Ok(Poll::Pending);
        }

        // Past the horizon: one last look, since the status may have raced the height.
        match self.ledger.signature_status(signature).await? {
            Some(Ok(())) => Ok(Poll::Landed),
            Some(Err(tx_err)) => Err(landed_error(signature, &tx_err, creators)),
            None => Ok(Poll::Expired),
        }
    }
}

/// Error for a transaction that landed and failed. A creator that lost an
/// initialization race becomes a rebuildable rejection.
fn landed_error(signature: &Signature, tx_err: &TransactionError, creators: usize) -> Error {
    let instruction = failed_instruction(tx_err);
    let kind = restrict_to_creators(classify_transaction_error(tx_err), instruction, creators);
    warn!("{signature} landed with error ({kind}): {tx_err}");
    if kind == RejectionKind::DuplicateInitialization {
        Error::SubmissionRejected {
            kind,
            message: tx_err.to_string(),
            instruction,
        }
    } else {
        Error::TransactionFailed {
            signature: *signature,
            message: tx_err.to_string(),
        }
    }
}

/// Re-classify a submission rejection against the assembled creators.
fn narrow_rejection(err: Error, creators: usize) -> Error {
    match err {
        Error::SubmissionRejected {
            kind,
            message,
            instruction,
        } => Error::SubmissionRejected {
            kind: restrict_to_creators(kind, instruction, creators),
            message,
            instruction,
        },
        other => other,
    }
}

enum Poll {
    Landed,
    Pending,
    Expired,
}
