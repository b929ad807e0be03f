//! # Swap Proofs
//!
//! A swap proof is one standing offer: "this locked name, for this price,
//! no earlier than this time". Concretely it is a transaction template with
//! one input and two outputs:
//!
//! ```text
//! inputs:  [0] locked name coin      (sequence enables the lock time)
//! outputs: [0] TRANSFER of the name  (recipient filled in by the buyer)
//!          [1] price -> payment addr (moved to the END when filled)
//! locktime: lock_time
//! ```
//!
//! The seller signs input 0 with `SINGLEREVERSE | ANYONECANPAY`, which pins
//! the locked input and the LAST output and nothing else. The buyer is then
//! free to add funding inputs, a change output and a fee output in front,
//! and to fill in the TRANSFER covenant's recipient, all without touching
//! the seller's signature. The lock script makes sure output 0 still carries
//! a `TRANSFER`, so the name cannot be steered anywhere else.
//!
//! ## Lifecycle
//!
//! `unsigned -> signed -> (valid | invalid)`. Validity is re-checked against
//! the ledger every time: the moment any sibling proof is filled, the locked
//! coin is gone and every other proof for that listing turns invalid.

use thiserror::Error;
use tracing::{debug, info};

use super::error::SwapError;
use super::{fund_preserving_name_slot, sign_input};
use crate::chain::{
    hash_name, validate_name, Address, Coin, Covenant, CovenantKind, MutableTx, Outpoint, Output,
    SighashType, Transaction, TxHash,
};
use crate::config::SEQUENCE_LOCKTIME_ENABLED;
use crate::context::Context;
use crate::crypto::keys::SIGNATURE_LENGTH;
use crate::crypto::{LockKeypair, LockPublicKey};
use crate::error::{ServiceError, ValidationError};
use crate::script::{create_lock_script, verify_input, Script, ScriptError};

// ---------------------------------------------------------------------------
// Verification Outcome
// ---------------------------------------------------------------------------

/// Why a proof failed verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidReason {
    #[error("proof is not signed")]
    Unsigned,

    #[error("locked coin is gone (already spent or never existed)")]
    CoinMissing,

    #[error("locked coin has covenant {0}, expected FINALIZE")]
    WrongCovenant(CovenantKind),

    #[error("locked coin holds name {found:?}, proof is for {expected:?}")]
    NameMismatch {
        expected: String,
        found: Option<String>,
    },

    #[error("signature uses sighash type 0x{0:02x}, expected SINGLEREVERSE|ANYONECANPAY")]
    WrongSighashType(u8),

    #[error("script evaluation failed: {0}")]
    Script(ScriptError),

    #[error("proof parameters are malformed: {0}")]
    Malformed(ValidationError),
}

/// Result of checking a proof against ledger state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Valid,
    Invalid(InvalidReason),
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verification::Valid)
    }
}

// ---------------------------------------------------------------------------
// SwapProof
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapProof {
    locking_tx_hash: TxHash,
    locking_output_idx: u32,
    name: String,
    public_key: LockPublicKey,
    payment_addr: Address,
    price: u64,
    lock_time: u32,
    fee: u64,
    fee_addr: Option<Address>,
    signature: Option<Vec<u8>>,
}

/// Builder for [`SwapProof`]. Validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct SwapProofBuilder {
    locking: Outpoint,
    name: String,
    public_key: LockPublicKey,
    payment_addr: Address,
    price: u64,
    lock_time: u32,
    fee: u64,
    fee_addr: Option<Address>,
    signature: Option<Vec<u8>>,
}

impl SwapProofBuilder {
    pub fn new(
        name: impl Into<String>,
        locking: Outpoint,
        public_key: LockPublicKey,
        payment_addr: Address,
    ) -> Self {
        Self {
            locking,
            name: name.into(),
            public_key,
            payment_addr,
            price: 0,
            lock_time: 0,
            fee: 0,
            fee_addr: None,
            signature: None,
        }
    }

    pub fn price(mut self, price: u64) -> Self {
        self.price = price;
        self
    }

    /// Absolute lock time: a height below 500M, Unix seconds otherwise.
    pub fn lock_time(mut self, lock_time: u32) -> Self {
        self.lock_time = lock_time;
        self
    }

    /// Marketplace fee, paid by the buyer on top of the price.
    pub fn fee(mut self, fee: u64, fee_addr: Option<Address>) -> Self {
        self.fee = fee;
        self.fee_addr = fee_addr;
        self
    }

    pub fn signature(mut self, signature: Option<Vec<u8>>) -> Self {
        self.signature = signature;
        self
    }

    pub fn build(self) -> Result<SwapProof, ValidationError> {
        validate_name(&self.name)?;
        if self.price == 0 {
            return Err(ValidationError::ZeroPrice);
        }
        if self.fee > 0 && self.fee_addr.is_none() {
            return Err(ValidationError::MissingFeeAddress);
        }

        Ok(SwapProof {
            locking_tx_hash: self.locking.hash,
            locking_output_idx: self.locking.index,
            name: self.name,
            public_key: self.public_key,
            payment_addr: self.payment_addr,
            price: self.price,
            lock_time: self.lock_time,
            fee: self.fee,
            fee_addr: self.fee_addr,
            signature: self.signature,
        })
    }
}

impl SwapProof {
    // -- Accessors ----------------------------------------------------------

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn outpoint(&self) -> Outpoint {
        Outpoint::new(self.locking_tx_hash, self.locking_output_idx)
    }

    pub fn public_key(&self) -> &LockPublicKey {
        &self.public_key
    }

    pub fn payment_addr(&self) -> &Address {
        &self.payment_addr
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    pub fn fee(&self) -> u64 {
        self.fee
    }

    pub fn fee_addr(&self) -> Option<&Address> {
        self.fee_addr.as_ref()
    }

    /// `signature || sighash type`, if signed.
    pub fn signature(&self) -> Option<&[u8]> {
        self.signature.as_deref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    pub fn lock_script(&self) -> Script {
        create_lock_script(&self.public_key)
    }

    // -- Template -----------------------------------------------------------

    /// The canonical two-output template for `coin`, with the stored
    /// signature attached if there is one.
    pub fn template(&self, coin: &Coin) -> MutableTx {
        self.build_template(coin, Covenant::new(CovenantKind::Transfer))
    }

    fn build_template(&self, coin: &Coin, transfer: Covenant) -> MutableTx {
        let witness = match &self.signature {
            Some(sig) => vec![sig.clone(), self.lock_script().encode()],
            None => Vec::new(),
        };

        let mut mtx = MutableTx::new();
        mtx.add_coin(coin.clone(), SEQUENCE_LOCKTIME_ENABLED).witness = witness;
        mtx.add_output(Output {
            value: coin.value,
            address: coin.address.clone(),
            covenant: transfer,
        });
        mtx.add_output(self.payment_output());
        mtx.tx.locktime = self.lock_time;
        mtx
    }

    fn payment_output(&self) -> Output {
        Output::new(self.price, self.payment_addr.clone())
    }

    /// The locked coin must still hold this name under a `FINALIZE`.
    fn check_locked_coin<'c>(&self, coin: Option<&'c Coin>) -> Result<&'c Coin, InvalidReason> {
        let coin = coin.ok_or(InvalidReason::CoinMissing)?;
        if coin.covenant.kind != CovenantKind::Finalize {
            return Err(InvalidReason::WrongCovenant(coin.covenant.kind));
        }
        match coin.covenant.finalized_name() {
            Some(found) if found == self.name => Ok(coin),
            found => Err(InvalidReason::NameMismatch {
                expected: self.name.clone(),
                found: found.map(str::to_string),
            }),
        }
    }

    fn coin_error(&self, reason: InvalidReason) -> SwapError {
        match reason {
            InvalidReason::CoinMissing => SwapError::CoinNotFound {
                outpoint: self.outpoint(),
            },
            InvalidReason::WrongCovenant(found) => SwapError::UnexpectedCovenant {
                outpoint: self.outpoint(),
                expected: CovenantKind::Finalize,
                found,
            },
            other => SwapError::InvalidProof(other),
        }
    }

    // -- Verification -------------------------------------------------------

    /// Verify against an already-fetched coin (`None` = spent).
    pub fn verify_against(&self, coin: Option<&Coin>) -> Verification {
        let Some(signature) = &self.signature else {
            return Verification::Invalid(InvalidReason::Unsigned);
        };

        let coin = match self.check_locked_coin(coin) {
            Ok(coin) => coin,
            Err(reason) => return Verification::Invalid(reason),
        };

        if signature.len() == SIGNATURE_LENGTH + 1 {
            let ty = signature[SIGNATURE_LENGTH];
            if ty != SighashType::SWAP_PROOF.to_byte() {
                return Verification::Invalid(InvalidReason::WrongSighashType(ty));
            }
        }

        let mtx = self.template(coin);
        match verify_input(&mtx.tx, 0, coin) {
            Ok(()) => Verification::Valid,
            Err(e) => Verification::Invalid(InvalidReason::Script(e)),
        }
    }

    /// Fetch the locked coin and verify against it.
    ///
    /// `Err` only if the ledger could not be queried. A spent coin, a wrong
    /// covenant, a missing or bad signature are all `Ok(Invalid(_))`.
    pub async fn verify(&self, ctx: &Context) -> Result<Verification, ServiceError> {
        if !self.is_signed() {
            return Ok(Verification::Invalid(InvalidReason::Unsigned));
        }

        let coin = ctx.ledger().get_coin(&self.outpoint()).await?;
        let verification = self.verify_against(coin.as_ref());
        if let Verification::Invalid(reason) = &verification {
            debug!(name = %self.name, price = self.price, %reason, "swap proof failed verification");
        }
        Ok(verification)
    }

    // -- Signing ------------------------------------------------------------

    /// Sign against a coin the caller already fetched, then self-verify.
    pub fn sign_with_coin(&mut self, coin: &Coin, keypair: &LockKeypair) -> Result<(), SwapError> {
        if keypair.public_key() != self.public_key {
            return Err(SwapError::KeyMismatch);
        }
        let coin = self
            .check_locked_coin(Some(coin))
            .map_err(|r| self.coin_error(r))?;

        let mtx = self.template(coin);
        let signature = sign_input(&mtx, 0, &self.lock_script(), keypair, SighashType::SWAP_PROOF)?;
        self.signature = Some(signature);

        match self.verify_against(Some(coin)) {
            Verification::Valid => Ok(()),
            Verification::Invalid(reason) => {
                self.signature = None;
                Err(SwapError::SelfCheck(reason))
            }
        }
    }

    /// Fetch the locked coin, sign, and self-verify.
    pub async fn sign(&mut self, ctx: &Context, keypair: &LockKeypair) -> Result<(), SwapError> {
        let coin = ctx.ledger().get_coin(&self.outpoint()).await?;
        let coin = coin.ok_or(SwapError::CoinNotFound {
            outpoint: self.outpoint(),
        })?;
        self.sign_with_coin(&coin, keypair)?;
        debug!(
            name = %self.name,
            price = self.price,
            lock_time = self.lock_time,
            "signed swap proof"
        );
        Ok(())
    }

    // -- Fill ---------------------------------------------------------------

    /// Complete the proof as the buyer: point the name at `recipient`, fund
    /// the price plus fees from the wallet, sign the wallet's inputs, and
    /// sanity-check the seller's input. Returns the transaction ready for
    /// broadcast.
    pub async fn fill(&self, ctx: &Context, recipient: &Address) -> Result<Transaction, SwapError> {
        if !self.is_signed() {
            return Err(SwapError::InvalidProof(InvalidReason::Unsigned));
        }

        let ledger = ctx.ledger();
        let info = ledger
            .get_name_info(&self.name)
            .await?
            .ok_or_else(|| SwapError::NameNotFound(self.name.clone()))?;
        let coin = ledger.get_coin(&self.outpoint()).await?;
        let coin = self
            .check_locked_coin(coin.as_ref())
            .map_err(|r| self.coin_error(r))?;

        let transfer = Covenant::transfer(&hash_name(&self.name), info.height, recipient);
        let mut mtx = self.build_template(coin, transfer);

        if self.fee > 0 {
            let fee_addr = self
                .fee_addr
                .clone()
                .ok_or(ValidationError::MissingFeeAddress)?;
            mtx.add_output(Output::new(self.fee, fee_addr));
        }

        let mut funded = fund_preserving_name_slot(ctx, mtx).await?;

        // The seller's signature commits to the last output.
        let payment = self.payment_output();
        let tx = &mut funded.tx;
        let payment_pos = tx
            .outputs
            .iter()
            .skip(1)
            .position(|o| *o == payment)
            .map(|p| p + 1)
            .ok_or(SwapError::FundingLayout("payment output"))?;
        let payment = tx.outputs.remove(payment_pos);
        tx.outputs.push(payment);

        let signed = ctx.wallet().sign_inputs_from(1, funded).await?;
        verify_input(&signed.tx, 0, coin).map_err(SwapError::SanityCheck)?;

        info!(
            name = %self.name,
            price = self.price,
            inputs = signed.tx.inputs.len(),
            outputs = signed.tx.outputs.len(),
            "filled swap proof"
        );
        Ok(signed.into_tx())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::lock_script_address;

    fn finalized_coin(name: &str, kp: &LockKeypair) -> Coin {
        let mut covenant = Covenant::new(CovenantKind::Finalize);
        covenant.push_bytes(&hash_name(name));
        covenant.push_u32(100);
        covenant.push_bytes(name.as_bytes());
        Coin {
            hash: TxHash::from_bytes([3; 32]),
            index: 0,
            value: 0,
            address: lock_script_address(&kp.public_key()),
            covenant,
            height: Some(120),
        }
    }

    fn proof_for(coin: &Coin, kp: &LockKeypair) -> SwapProof {
        SwapProofBuilder::new(
            "example",
            coin.outpoint(),
            kp.public_key(),
            Address::new(0, vec![0x42; 20]).unwrap(),
        )
        .price(1_000_000)
        .lock_time(1_700_000_000)
        .build()
        .unwrap()
    }

    #[test]
    fn builder_rejects_bad_params() {
        let kp = LockKeypair::from_bytes(&[1; 32]);
        let coin = finalized_coin("example", &kp);
        let base = || {
            SwapProofBuilder::new(
                "example",
                coin.outpoint(),
                kp.public_key(),
                Address::new(0, vec![1; 20]).unwrap(),
            )
        };
        assert_eq!(base().build().unwrap_err(), ValidationError::ZeroPrice);
        assert_eq!(
            base().price(5).fee(1, None).build().unwrap_err(),
            ValidationError::MissingFeeAddress
        );
        let bad_name = SwapProofBuilder::new(
            "Bad Name",
            coin.outpoint(),
            kp.public_key(),
            Address::new(0, vec![1; 20]).unwrap(),
        )
        .price(5)
        .build();
        assert!(matches!(bad_name, Err(ValidationError::InvalidName(_))));
    }

    #[test]
    fn template_shape() {
        let kp = LockKeypair::from_bytes(&[1; 32]);
        let coin = finalized_coin("example", &kp);
        let proof = proof_for(&coin, &kp);
        let mtx = proof.template(&coin);

        assert_eq!(mtx.tx.inputs.len(), 1);
        assert_eq!(mtx.tx.outputs.len(), 2);
        assert_eq!(mtx.tx.outputs[0].covenant.kind, CovenantKind::Transfer);
        assert_eq!(mtx.tx.outputs[1].value, 1_000_000);
        assert_eq!(mtx.tx.locktime, 1_700_000_000);
        assert_eq!(mtx.tx.inputs[0].sequence, SEQUENCE_LOCKTIME_ENABLED);
        assert!(mtx.tx.inputs[0].witness.is_empty());
    }

    #[test]
    fn sign_then_verify() {
        let kp = LockKeypair::from_bytes(&[1; 32]);
        let coin = finalized_coin("example", &kp);
        let mut proof = proof_for(&coin, &kp);
        proof.sign_with_coin(&coin, &kp).unwrap();

        assert!(proof.is_signed());
        assert_eq!(proof.verify_against(Some(&coin)), Verification::Valid);
    }

    #[test]
    fn unsigned_is_invalid_not_error() {
        let kp = LockKeypair::from_bytes(&[1; 32]);
        let coin = finalized_coin("example", &kp);
        let proof = proof_for(&coin, &kp);
        assert_eq!(
            proof.verify_against(Some(&coin)),
            Verification::Invalid(InvalidReason::Unsigned)
        );
    }

    #[test]
    fn spent_coin_invalidates() {
        let kp = LockKeypair::from_bytes(&[1; 32]);
        let coin = finalized_coin("example", &kp);
        let mut proof = proof_for(&coin, &kp);
        proof.sign_with_coin(&coin, &kp).unwrap();
        assert_eq!(
            proof.verify_against(None),
            Verification::Invalid(InvalidReason::CoinMissing)
        );
    }

    #[test]
    fn wrong_name_or_covenant_invalidates() {
        let kp = LockKeypair::from_bytes(&[1; 32]);
        let coin = finalized_coin("example", &kp);
        let mut proof = proof_for(&coin, &kp);
        proof.sign_with_coin(&coin, &kp).unwrap();

        let other = finalized_coin("other", &kp);
        assert!(matches!(
            proof.verify_against(Some(&other)),
            Verification::Invalid(InvalidReason::NameMismatch { .. })
        ));

        let mut transferred = coin.clone();
        transferred.covenant.kind = CovenantKind::Transfer;
        assert_eq!(
            proof.verify_against(Some(&transferred)),
            Verification::Invalid(InvalidReason::WrongCovenant(CovenantKind::Transfer))
        );
    }

    #[test]
    fn tampered_price_fails_script() {
        let kp = LockKeypair::from_bytes(&[1; 32]);
        let coin = finalized_coin("example", &kp);
        let mut proof = proof_for(&coin, &kp);
        proof.sign_with_coin(&coin, &kp).unwrap();
        proof.price -= 1;
        assert!(matches!(
            proof.verify_against(Some(&coin)),
            Verification::Invalid(InvalidReason::Script(_))
        ));
    }

    #[test]
    fn wrong_key_is_rejected_before_signing() {
        let kp = LockKeypair::from_bytes(&[1; 32]);
        let other = LockKeypair::from_bytes(&[2; 32]);
        let coin = finalized_coin("example", &kp);
        let mut proof = proof_for(&coin, &kp);
        assert!(matches!(
            proof.sign_with_coin(&coin, &other),
            Err(SwapError::KeyMismatch)
        ));
        assert!(!proof.is_signed());
    }
}
