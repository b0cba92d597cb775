//! Local signing of aggregator-built transactions
//!
//! The aggregator returns a transaction with the fee payer already set and
//! the wallet's signature slot empty. We fill only the wallet's slot so a
//! co-signature from the fee payer survives.

use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;

use crate::utils::error::{SwapError, SwapResult};
use crate::utils::types::Wallet;

/// Sign a bincode-serialized `VersionedTransaction` with `wallet`.
pub fn sign_serialized(raw: &[u8], wallet: &Wallet) -> SwapResult<Vec<u8>> {
    let mut tx: VersionedTransaction = bincode::deserialize(raw).map_err(SwapError::signing)?;

    let required = tx.message.header().num_required_signatures as usize;
    let owner = wallet.pubkey();
    let slot = tx
        .message
        .static_account_keys()
        .iter()
        .take(required)
        .position(|key| *key == owner)
        .ok_or_else(|| SwapError::signing(format!("{} is not a required signer", owner)))?;

    if tx.signatures.len() < required {
        tx.signatures.resize(required, Signature::default());
    }
    tx.signatures[slot] = wallet.sign_message(&tx.message.serialize());

    bincode::serialize(&tx).map_err(SwapError::signing)
}
