//! # Auction Factory
//!
//! Validates auction parameters once, up front, and then turns a finalized
//! name lock into a signed [`Auction`]: one swap proof per price tick, all
//! spending the same locked coin. Whichever proof a buyer fills first wins;
//! the rest die with the coin.

use serde::{Deserialize, Serialize};
use tracing::info;

use super::container::{Auction, AuctionEntry};
use super::strategy::{PriceTick, ReductionStrategy, ScheduleParams, StrategyFn, StrategyRegistry};
use crate::chain::Address;
use crate::config::{FEE_RATE_BASIS, MILLIS_PER_SECOND};
use crate::context::Context;
use crate::error::ValidationError;
use crate::lock::NameLockFinalize;
use crate::swap::{SwapError, SwapProofBuilder};

/// Everything a seller chooses about an auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionParams {
    /// Unix milliseconds.
    pub start_time: u64,
    /// Unix milliseconds.
    pub end_time: u64,
    pub start_price: u64,
    pub end_price: u64,
    /// Milliseconds between price drops.
    pub step_duration: u64,
    pub reduction_strategy: ReductionStrategy,
    /// Marketplace fee in basis points of each tick's price.
    #[serde(default)]
    pub fee_rate: u64,
    #[serde(default)]
    pub fee_addr: Option<Address>,
}

impl AuctionParams {
    pub fn schedule(&self) -> ScheduleParams {
        ScheduleParams {
            start_time: self.start_time,
            end_time: self.end_time,
            start_price: self.start_price,
            end_price: self.end_price,
            step_duration: self.step_duration,
        }
    }
}

/// A validated set of [`AuctionParams`] bound to its strategy implementation.
#[derive(Debug, Clone)]
pub struct AuctionFactory {
    params: AuctionParams,
    strategy: StrategyFn,
}

impl AuctionFactory {
    /// Validate `params` against the default strategy registry.
    pub fn new(params: AuctionParams) -> Result<Self, ValidationError> {
        Self::with_registry(params, &StrategyRegistry::default())
    }

    pub fn with_registry(
        params: AuctionParams,
        registry: &StrategyRegistry,
    ) -> Result<Self, ValidationError> {
        validate(&params)?;
        let strategy = registry.get(params.reduction_strategy)?;
        Ok(Self { params, strategy })
    }

    pub fn params(&self) -> &AuctionParams {
        &self.params
    }

    /// A fresh pass over the price ticks. Call again to restart.
    pub fn schedule(&self) -> Box<dyn Iterator<Item = PriceTick> + Send> {
        (self.strategy)(&self.params.schedule())
    }

    /// Marketplace fee owed at `price`, rounded down.
    pub fn fee_for(&self, price: u64) -> u64 {
        let fee = u128::from(price) * u128::from(self.params.fee_rate) / u128::from(FEE_RATE_BASIS);
        // fee_rate <= basis, so fee <= price.
        u64::try_from(fee).unwrap_or(price)
    }

    /// Sign one swap proof per tick against the locked coin of `lock`.
    ///
    /// Payment goes to `payment_addr`, or to a fresh wallet address when
    /// none is given. The locked coin is fetched once up front; if it is
    /// gone, nothing is signed.
    pub async fn create_auction(
        &self,
        ctx: &Context,
        lock: &NameLockFinalize,
        payment_addr: Option<Address>,
    ) -> Result<Auction, SwapError> {
        let payment_addr = match payment_addr {
            Some(addr) => addr,
            None => ctx.wallet().create_address().await?,
        };

        let outpoint = lock.outpoint();
        let coin = ctx
            .ledger()
            .get_coin(&outpoint)
            .await?
            .ok_or(SwapError::CoinNotFound { outpoint })?;

        let public_key = lock.public_key();
        let mut data = Vec::new();
        for tick in self.schedule() {
            let lock_time = u32::try_from(tick.lock_time)
                .map_err(|_| ValidationError::InvalidLockTime(tick.lock_time))?;
            let fee = self.fee_for(tick.price);

            let mut proof = SwapProofBuilder::new(
                lock.name.clone(),
                outpoint,
                public_key.clone(),
                payment_addr.clone(),
            )
            .price(tick.price)
            .lock_time(lock_time)
            .fee(fee, self.params.fee_addr.clone())
            .build()?;
            proof.sign_with_coin(&coin, &lock.private_key)?;

            let signature = proof.signature().map(<[u8]>::to_vec).unwrap_or_default();
            data.push(AuctionEntry {
                price: tick.price,
                lock_time,
                fee,
                signature,
            });
        }

        let auction = Auction::new(
            lock.name.clone(),
            outpoint,
            public_key,
            payment_addr,
            self.params.fee_addr.clone(),
            data,
        )?;
        info!(
            name = %lock.name,
            proofs = auction.len(),
            start_price = self.params.start_price,
            end_price = self.params.end_price,
            fee_rate = self.params.fee_rate,
            "created auction"
        );
        Ok(auction)
    }
}

fn validate(params: &AuctionParams) -> Result<(), ValidationError> {
    if params.end_time <= params.start_time {
        return Err(ValidationError::InvalidTimeRange {
            start: params.start_time,
            end: params.end_time,
        });
    }
    if params.end_price == 0 || params.start_price <= params.end_price {
        return Err(ValidationError::InvalidPriceRange {
            start: params.start_price,
            end: params.end_price,
        });
    }
    if params.step_duration == 0 {
        return Err(ValidationError::ZeroStepDuration);
    }
    if params.fee_rate > FEE_RATE_BASIS {
        return Err(ValidationError::InvalidFeeRate(params.fee_rate));
    }
    if params.fee_rate > 0 && params.fee_addr.is_none() {
        return Err(ValidationError::MissingFeeAddress);
    }

    let schedule = params.schedule();
    let steps = schedule.step_count();
    if steps < 2 {
        return Err(ValidationError::TooFewSteps { steps });
    }
    // Every step must lower the price by at least one unit.
    let spread = params.start_price - params.end_price;
    if spread < steps - 1 {
        return Err(ValidationError::PriceSpreadTooSmall { spread, steps });
    }

    let last_millis = params
        .start_time
        .checked_add(params.step_duration.saturating_mul(steps - 1))
        .unwrap_or(u64::MAX);
    let last_lock_time = last_millis / MILLIS_PER_SECOND;
    if last_lock_time > u64::from(u32::MAX) {
        return Err(ValidationError::InvalidLockTime(last_lock_time));
    }
    Ok(())
}
