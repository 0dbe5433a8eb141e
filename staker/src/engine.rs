//! The staker engine — deposits, accrual, custody, contributions, governance.
//!
//! One engine owns all mutable ledger state. Every mutating entry point
//! runs through a single serialized path that rejects nested re-entry,
//! snapshots the ledger, and restores it wholesale on any failure, so a
//! failed operation is never partially visible. Within an operation the
//! order is fixed: fold the global accumulator forward, settle the target
//! deposit against it, validate, mutate ledger state and totals, and only
//! then touch external tokens.

use crate::accrual::GlobalRewardAccrual;
use crate::bridge::AllocationMechanism;
use crate::config::{validate_duration, ClaimFeeParameters, StakerConfig};
use crate::custody::{ensure_delegation_supported, CustodyStrategy, DelegatedCustody, DirectCustody};
use crate::deposit::{Deposit, DepositArena, DepositId};
use crate::error::StakerError;
use regen_oracle::{EarningPowerOracle, WhitelistOracle};
use regen_store::StakerStore;
use regen_token::FungibleToken;
use regen_types::{Address, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Engine with per-delegatee surrogate custody.
pub type DelegatedStaker = StakerEngine<DelegatedCustody>;

/// Engine holding all principal itself; delegatee changes unsupported.
pub type DirectStaker = StakerEngine<DirectCustody>;

/// External collaborators the engine reads and moves value through.
#[derive(Clone)]
pub struct Collaborators {
    pub stake_token: Arc<dyn FungibleToken>,
    pub reward_token: Arc<dyn FungibleToken>,
    pub earning_power_oracle: Arc<dyn EarningPowerOracle>,
    /// `None` disables the staker check (permissionless staking).
    pub staker_whitelist: Option<Arc<dyn WhitelistOracle>>,
    /// `None` disables the contribution check.
    pub contribution_whitelist: Option<Arc<dyn WhitelistOracle>>,
    /// Mandatory, and always a distinct instance from the two above.
    pub allocation_mechanism_whitelist: Arc<dyn WhitelistOracle>,
}

/// The durable, atomically-snapshotted part of the engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct LedgerState {
    accrual: GlobalRewardAccrual,
    deposits: DepositArena,
    config: StakerConfig,
    notifiers: BTreeSet<Address>,
    admin: Address,
    paused: bool,
}

/// The staking-reward engine, generic over its custody strategy.
pub struct StakerEngine<C: CustodyStrategy> {
    address: Address,
    collab: Collaborators,
    custody: C,
    ledger: LedgerState,
    in_call: bool,
}

// Meta keys for persistence.
const META_ACCRUAL: &[u8] = b"accrual";
const META_CONFIG: &[u8] = b"config";
const META_ADMIN: &[u8] = b"admin";
const META_ADDRESS: &[u8] = b"address";
const META_PAUSED: &[u8] = b"paused";
const META_NOTIFIERS: &[u8] = b"notifiers";
const META_NEXT_DEPOSIT_ID: &[u8] = b"next_deposit_id";

impl<C: CustodyStrategy> StakerEngine<C> {
    /// Create a new engine.
    ///
    /// `address` is the engine's own token account: it holds the reward
    /// float, and under direct custody the staked principal as well.
    pub fn new(
        address: Address,
        admin: Address,
        collab: Collaborators,
        custody: C,
        config: StakerConfig,
    ) -> Result<Self, StakerError> {
        ensure_valid(&address)?;
        ensure_valid(&admin)?;
        config.validate()?;
        validate_wiring(&collab)?;
        Ok(Self {
            address,
            collab,
            custody,
            ledger: LedgerState {
                accrual: GlobalRewardAccrual::new(),
                deposits: DepositArena::new(),
                config,
                notifiers: BTreeSet::new(),
                admin,
                paused: false,
            },
            in_call: false,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn admin(&self) -> &Address {
        &self.ledger.admin
    }

    pub fn paused(&self) -> bool {
        self.ledger.paused
    }

    pub fn config(&self) -> &StakerConfig {
        &self.ledger.config
    }

    pub fn accrual(&self) -> &GlobalRewardAccrual {
        &self.ledger.accrual
    }

    pub fn deposit(&self, id: DepositId) -> Result<&Deposit, StakerError> {
        self.ledger.deposits.get(id)
    }

    pub fn deposits(&self) -> impl Iterator<Item = (DepositId, &Deposit)> {
        self.ledger.deposits.iter()
    }

    pub fn is_reward_notifier(&self, address: &Address) -> bool {
        self.ledger.notifiers.contains(address)
    }

    /// The custody account a delegatee's principal would sit in, if it has
    /// been materialized.
    pub fn surrogate_for(&self, delegatee: &Address) -> Option<Address> {
        self.custody.existing_custody_account(&self.address, delegatee)
    }

    /// Preview a deposit's total unclaimed reward as of `now`, without
    /// mutating anything.
    pub fn unclaimed_reward(&self, id: DepositId, now: Timestamp) -> Result<u128, StakerError> {
        let deposit = self.ledger.deposits.get(id)?;
        let accumulated = self.ledger.accrual.reward_per_power(now)?;
        let delta = accumulated
            .checked_sub(deposit.reward_per_power_paid)
            .ok_or(StakerError::Overflow)?;
        let newly = deposit
            .earning_power
            .checked_mul(delta)
            .ok_or(StakerError::Overflow)?
            / crate::accrual::SCALE_FACTOR;
        deposit
            .unclaimed_reward
            .checked_add(newly)
            .ok_or(StakerError::Overflow)
    }

    // ── Deposit operations ───────────────────────────────────────────────

    /// Open a new deposit of `amount`, delegating to `delegatee`, with
    /// `claimer` entitled to claim alongside the owner.
    pub fn stake(
        &mut self,
        owner: &Address,
        amount: u128,
        delegatee: &Address,
        claimer: &Address,
        now: Timestamp,
    ) -> Result<DepositId, StakerError> {
        self.mutate(|e| {
            e.ledger.accrual.checkpoint(now)?;
            e.ensure_not_paused()?;
            if amount == 0 {
                return Err(StakerError::ZeroAmount);
            }
            ensure_valid(owner)?;
            ensure_valid(delegatee)?;
            ensure_valid(claimer)?;
            e.ensure_staker_whitelisted(owner)?;

            let earning_power =
                e.collab
                    .earning_power_oracle
                    .earning_power(amount, owner, delegatee);
            e.ensure_minimum_stake(amount)?;

            let deposit = Deposit {
                owner: owner.clone(),
                delegatee: delegatee.clone(),
                claimer: claimer.clone(),
                balance: amount,
                earning_power,
                unclaimed_reward: 0,
                reward_per_power_paid: e.ledger.accrual.reward_per_power_accumulated,
            };
            let id = e.ledger.deposits.insert(deposit)?;
            e.ledger.accrual.add_stake(amount, earning_power)?;

            let custody_account = e.custody.custody_account(&e.address, delegatee);
            e.collab.stake_token.transfer(owner, &custody_account, amount)?;

            tracing::debug!(deposit = %id, owner = %owner, amount, earning_power, "staked");
            Ok(id)
        })
    }

    /// Add `amount` to an existing deposit.
    pub fn stake_more(
        &mut self,
        caller: &Address,
        id: DepositId,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.checkpoint_and_sync(id, now)?;
            e.ensure_not_paused()?;
            if amount == 0 {
                return Err(StakerError::ZeroAmount);
            }
            let (owner, delegatee, balance, old_power) = {
                let d = e.ledger.deposits.get(id)?;
                (d.owner.clone(), d.delegatee.clone(), d.balance, d.earning_power)
            };
            if *caller != owner {
                return Err(StakerError::NotOwner(caller.clone()));
            }
            e.ensure_staker_whitelisted(&owner)?;

            let new_balance = balance.checked_add(amount).ok_or(StakerError::Overflow)?;
            e.ensure_minimum_stake(new_balance)?;
            let new_power = e
                .collab
                .earning_power_oracle
                .earning_power(new_balance, &owner, &delegatee);

            e.ledger.accrual.add_stake(amount, 0)?;
            e.ledger.accrual.reweigh(old_power, new_power)?;
            {
                let d = e.ledger.deposits.get_mut(id)?;
                d.balance = new_balance;
                d.earning_power = new_power;
            }

            let custody_account = e.custody.custody_account(&e.address, &delegatee);
            e.collab.stake_token.transfer(&owner, &custody_account, amount)?;

            tracing::debug!(deposit = %id, amount, new_balance, "staked more");
            Ok(())
        })
    }

    /// Withdraw `amount` of principal back to the owner.
    pub fn withdraw(
        &mut self,
        caller: &Address,
        id: DepositId,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.checkpoint_and_sync(id, now)?;
            e.ensure_not_paused()?;
            if amount == 0 {
                return Err(StakerError::ZeroAmount);
            }
            let (owner, delegatee, balance, old_power) = {
                let d = e.ledger.deposits.get(id)?;
                (d.owner.clone(), d.delegatee.clone(), d.balance, d.earning_power)
            };
            if *caller != owner {
                return Err(StakerError::NotOwner(caller.clone()));
            }
            if balance < amount {
                return Err(StakerError::InsufficientBalance {
                    requested: amount,
                    available: balance,
                });
            }
            let new_balance = balance - amount;
            e.ensure_minimum_stake(new_balance)?;
            let new_power = e
                .collab
                .earning_power_oracle
                .earning_power(new_balance, &owner, &delegatee);

            e.ledger.accrual.remove_stake(amount, 0)?;
            e.ledger.accrual.reweigh(old_power, new_power)?;
            {
                let d = e.ledger.deposits.get_mut(id)?;
                d.balance = new_balance;
                d.earning_power = new_power;
            }

            let custody_account = e.custody.custody_account(&e.address, &delegatee);
            e.collab.stake_token.transfer(&custody_account, &owner, amount)?;

            tracing::debug!(deposit = %id, amount, new_balance, "withdrew");
            Ok(())
        })
    }

    /// Re-point a deposit's delegated voting power at `new_delegatee`.
    ///
    /// Moves the full principal into the new delegatee's surrogate. Always
    /// fails under direct custody.
    pub fn alter_delegatee(
        &mut self,
        caller: &Address,
        id: DepositId,
        new_delegatee: &Address,
        now: Timestamp,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.checkpoint_and_sync(id, now)?;
            ensure_delegation_supported(&e.custody)?;
            ensure_valid(new_delegatee)?;
            let (owner, old_delegatee, balance, old_power) = {
                let d = e.ledger.deposits.get(id)?;
                (d.owner.clone(), d.delegatee.clone(), d.balance, d.earning_power)
            };
            if *caller != owner {
                return Err(StakerError::NotOwner(caller.clone()));
            }

            let new_power = e
                .collab
                .earning_power_oracle
                .earning_power(balance, &owner, new_delegatee);
            e.ledger.accrual.reweigh(old_power, new_power)?;
            {
                let d = e.ledger.deposits.get_mut(id)?;
                d.delegatee = new_delegatee.clone();
                d.earning_power = new_power;
            }

            let old_custody = e.custody.custody_account(&e.address, &old_delegatee);
            let new_custody = e.custody.custody_account(&e.address, new_delegatee);
            if balance > 0 && old_custody != new_custody {
                e.collab.stake_token.transfer(&old_custody, &new_custody, balance)?;
            }

            tracing::debug!(deposit = %id, delegatee = %new_delegatee, "delegatee altered");
            Ok(())
        })
    }

    /// Designate a new claimer for a deposit.
    pub fn alter_claimer(
        &mut self,
        caller: &Address,
        id: DepositId,
        new_claimer: &Address,
        now: Timestamp,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.checkpoint_and_sync(id, now)?;
            ensure_valid(new_claimer)?;
            let owner = e.ledger.deposits.get(id)?.owner.clone();
            if *caller != owner {
                return Err(StakerError::NotOwner(caller.clone()));
            }
            e.ledger.deposits.get_mut(id)?.claimer = new_claimer.clone();
            tracing::debug!(deposit = %id, claimer = %new_claimer, "claimer altered");
            Ok(())
        })
    }

    /// Pay out a deposit's unclaimed reward to its claimer, minus the fee.
    ///
    /// Returns the net amount paid. When the unclaimed reward does not
    /// exceed the fee this returns 0 and transfers nothing, so the caller
    /// never pays a fee to receive nothing.
    pub fn claim_reward(
        &mut self,
        caller: &Address,
        id: DepositId,
        now: Timestamp,
    ) -> Result<u128, StakerError> {
        self.mutate(|e| {
            e.checkpoint_and_sync(id, now)?;
            e.ensure_not_paused()?;
            let (owner, claimer, unclaimed) = {
                let d = e.ledger.deposits.get(id)?;
                (d.owner.clone(), d.claimer.clone(), d.unclaimed_reward)
            };
            if *caller != owner && *caller != claimer {
                return Err(StakerError::NotOwnerOrClaimer(caller.clone()));
            }

            let fee = e.ledger.config.claim_fee_amount();
            if unclaimed <= fee {
                return Ok(0);
            }
            let net = unclaimed - fee;

            e.ledger.deposits.get_mut(id)?.unclaimed_reward = 0;
            e.ledger.accrual.consume(unclaimed)?;

            e.skim_fee(fee)?;
            e.collab.reward_token.transfer(&e.address, &claimer, net)?;

            tracing::debug!(deposit = %id, net, fee, "reward claimed");
            Ok(net)
        })
    }

    /// Roll a deposit's unclaimed reward (minus the fee) into its balance.
    ///
    /// Only valid when the stake and reward tokens are the same asset.
    pub fn compound_rewards(
        &mut self,
        caller: &Address,
        id: DepositId,
        now: Timestamp,
    ) -> Result<u128, StakerError> {
        self.mutate(|e| {
            e.checkpoint_and_sync(id, now)?;
            e.ensure_not_paused()?;
            if e.collab.stake_token.asset() != e.collab.reward_token.asset() {
                return Err(StakerError::CompoundingUnsupported);
            }
            let (owner, claimer, delegatee, balance, old_power, unclaimed) = {
                let d = e.ledger.deposits.get(id)?;
                (
                    d.owner.clone(),
                    d.claimer.clone(),
                    d.delegatee.clone(),
                    d.balance,
                    d.earning_power,
                    d.unclaimed_reward,
                )
            };
            if *caller != owner && *caller != claimer {
                return Err(StakerError::NotOwnerOrClaimer(caller.clone()));
            }
            e.ensure_staker_whitelisted(&owner)?;

            let fee = e.ledger.config.claim_fee_amount();
            if unclaimed <= fee {
                return Ok(0);
            }
            let net = unclaimed - fee;

            let new_balance = balance.checked_add(net).ok_or(StakerError::Overflow)?;
            e.ensure_minimum_stake(new_balance)?;
            let new_power = e
                .collab
                .earning_power_oracle
                .earning_power(new_balance, &owner, &delegatee);

            e.ledger.accrual.add_stake(net, 0)?;
            e.ledger.accrual.reweigh(old_power, new_power)?;
            e.ledger.accrual.consume(unclaimed)?;
            {
                let d = e.ledger.deposits.get_mut(id)?;
                d.balance = new_balance;
                d.earning_power = new_power;
                d.unclaimed_reward = 0;
            }

            e.skim_fee(fee)?;
            let custody_account = e.custody.custody_account(&e.address, &delegatee);
            if custody_account != e.address {
                e.collab
                    .reward_token
                    .transfer(&e.address, &custody_account, net)?;
            }

            tracing::debug!(deposit = %id, net, new_balance, "rewards compounded");
            Ok(net)
        })
    }

    /// Contribute up to `amount` of unclaimed reward to an allocation
    /// mechanism under a signed authorization.
    ///
    /// The signature is forwarded to the mechanism unopened; allocation
    /// credit accrues to the *calling* address, which owners opt into by
    /// designating claimers as contribution agents. Returns the net amount
    /// contributed after the fee.
    #[allow(clippy::too_many_arguments)]
    pub fn contribute(
        &mut self,
        caller: &Address,
        id: DepositId,
        mechanism: &dyn AllocationMechanism,
        amount: u128,
        deadline: Timestamp,
        signature: &[u8],
        now: Timestamp,
    ) -> Result<u128, StakerError> {
        self.mutate(|e| {
            e.checkpoint_and_sync(id, now)?;
            e.ensure_not_paused()?;
            let (owner, claimer, unclaimed) = {
                let d = e.ledger.deposits.get(id)?;
                (d.owner.clone(), d.claimer.clone(), d.unclaimed_reward)
            };
            if *caller != owner && *caller != claimer {
                return Err(StakerError::NotOwnerOrClaimer(caller.clone()));
            }
            e.ensure_contribution_whitelisted(caller)?;
            let mechanism_address = mechanism.address();
            if !e
                .collab
                .allocation_mechanism_whitelist
                .is_whitelisted(&mechanism_address)
            {
                return Err(StakerError::NotWhitelisted {
                    address: mechanism_address,
                    list: "allocation-mechanism",
                });
            }
            if mechanism.settlement_asset() != e.collab.reward_token.asset() {
                return Err(StakerError::AssetMismatch);
            }
            if now > deadline {
                return Err(StakerError::AuthorizationExpired { deadline, now });
            }
            if amount > unclaimed {
                return Err(StakerError::ExceedsUnclaimedReward {
                    requested: amount,
                    available: unclaimed,
                });
            }

            let fee = e.ledger.config.claim_fee_amount();
            if amount <= fee {
                return Ok(0);
            }
            let net = amount - fee;

            {
                let d = e.ledger.deposits.get_mut(id)?;
                d.unclaimed_reward = unclaimed - amount;
            }
            e.ledger.accrual.consume(amount)?;

            // One-time exact-amount allowance, consumed by the mechanism's
            // delegated-deposit pull.
            e.collab
                .reward_token
                .approve(&e.address, &mechanism_address, net);
            if let Err(err) =
                mechanism.delegated_deposit(&e.address, caller, net, deadline, signature)
            {
                e.collab.reward_token.approve(&e.address, &mechanism_address, 0);
                return Err(StakerError::Mechanism(err.to_string()));
            }
            let remaining = e.collab.reward_token.allowance(&e.address, &mechanism_address);
            if remaining != 0 {
                e.collab.reward_token.approve(&e.address, &mechanism_address, 0);
                return Err(StakerError::AllowanceNotConsumed { remaining });
            }

            e.skim_fee(fee)?;

            tracing::debug!(
                deposit = %id,
                mechanism = %mechanism_address,
                contributor = %caller,
                net,
                "reward contributed"
            );
            Ok(net)
        })
    }

    /// Permissionless resync of a deposit's earning power against the
    /// oracle, paying `tip` out of the deposit's unclaimed reward.
    pub fn bump_earning_power(
        &mut self,
        id: DepositId,
        tip_receiver: &Address,
        tip: u128,
        now: Timestamp,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.checkpoint_and_sync(id, now)?;
            ensure_valid(tip_receiver)?;
            let max_tip = e.ledger.config.max_bump_tip;
            if tip > max_tip {
                return Err(StakerError::TipExceedsMax { tip, max: max_tip });
            }
            let (owner, delegatee, balance, old_power, unclaimed) = {
                let d = e.ledger.deposits.get(id)?;
                (
                    d.owner.clone(),
                    d.delegatee.clone(),
                    d.balance,
                    d.earning_power,
                    d.unclaimed_reward,
                )
            };

            let (new_power, qualifies) = e.collab.earning_power_oracle.new_earning_power(
                balance, &owner, &delegatee, old_power,
            );
            if !qualifies {
                return Err(StakerError::EarningPowerNotQualified);
            }
            if unclaimed < tip {
                return Err(StakerError::ExceedsUnclaimedReward {
                    requested: tip,
                    available: unclaimed,
                });
            }
            // A downward adjustment must leave a full tip buffer behind,
            // or repeated bumps could drain the deposit's rewards.
            if new_power < old_power && unclaimed - tip < max_tip {
                return Err(StakerError::InsufficientTipBuffer);
            }

            e.ledger.accrual.reweigh(old_power, new_power)?;
            {
                let d = e.ledger.deposits.get_mut(id)?;
                d.earning_power = new_power;
                d.unclaimed_reward = unclaimed - tip;
            }
            e.ledger.accrual.consume(tip)?;

            if tip > 0 {
                e.collab.reward_token.transfer(&e.address, tip_receiver, tip)?;
            }

            tracing::debug!(deposit = %id, old_power, new_power, tip, "earning power bumped");
            Ok(())
        })
    }

    // ── Reward notification ──────────────────────────────────────────────

    /// Begin (or extend) a reward distribution of `amount` over the
    /// configured duration.
    ///
    /// The engine's reward-token float must already cover every
    /// outstanding obligation plus the new amount — and, under direct
    /// custody, the staked principal the engine holds — before any state
    /// changes.
    pub fn notify_reward_amount(
        &mut self,
        caller: &Address,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            if !e.ledger.notifiers.contains(caller) {
                return Err(StakerError::NotRewardNotifier(caller.clone()));
            }

            let principal = if e.custody.principal_held_by_engine() {
                e.ledger.accrual.total_staked
            } else {
                0
            };
            let required = e
                .ledger
                .accrual
                .outstanding_obligations()
                .checked_add(amount)
                .and_then(|v| v.checked_add(principal))
                .ok_or(StakerError::Overflow)?;
            let available = e.collab.reward_token.balance_of(&e.address);
            if available < required {
                return Err(StakerError::InsufficientRewardFloat {
                    required,
                    available,
                });
            }

            let duration = e.ledger.config.reward_duration_secs;
            e.ledger.accrual.notify(amount, duration, now)?;

            tracing::info!(
                amount,
                duration = %regen_utils::format_duration(duration),
                rate = e.ledger.accrual.scaled_reward_rate,
                period_end = %e.ledger.accrual.period_end,
                "reward notified"
            );
            Ok(())
        })
    }

    // ── Governance controls ──────────────────────────────────────────────

    /// Change the reward duration. Only allowed between periods.
    pub fn set_reward_duration(
        &mut self,
        caller: &Address,
        secs: u64,
        now: Timestamp,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.ensure_admin(caller)?;
            if e.ledger.accrual.period_active(now) {
                return Err(StakerError::DurationChangeDuringPeriod);
            }
            validate_duration(secs)?;
            e.ledger.config.reward_duration_secs = secs;
            tracing::info!(duration = %regen_utils::format_duration(secs), "reward duration set");
            Ok(())
        })
    }

    /// Change the minimum stake. Increases are locked out mid-period so an
    /// admin cannot strand depositors below a raised floor.
    pub fn set_minimum_stake_amount(
        &mut self,
        caller: &Address,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.ensure_admin(caller)?;
            if amount > e.ledger.config.minimum_stake_amount
                && e.ledger.accrual.period_active(now)
            {
                return Err(StakerError::IncreaseDuringActivePeriod {
                    parameter: "minimum stake amount",
                });
            }
            e.ledger.config.minimum_stake_amount = amount;
            tracing::info!(amount, "minimum stake amount set");
            Ok(())
        })
    }

    /// Change the maximum bump tip. Increases are locked out mid-period so
    /// an admin cannot redirect unclaimed value through tips.
    pub fn set_max_bump_tip(
        &mut self,
        caller: &Address,
        amount: u128,
        now: Timestamp,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.ensure_admin(caller)?;
            if amount > e.ledger.config.max_bump_tip && e.ledger.accrual.period_active(now) {
                return Err(StakerError::IncreaseDuringActivePeriod {
                    parameter: "max bump tip",
                });
            }
            e.ledger.config.max_bump_tip = amount;
            tracing::info!(amount, "max bump tip set");
            Ok(())
        })
    }

    /// Set or clear the claim-fee skim.
    pub fn set_claim_fee_parameters(
        &mut self,
        caller: &Address,
        parameters: Option<ClaimFeeParameters>,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.ensure_admin(caller)?;
            if let Some(fee) = &parameters {
                if fee.amount > e.ledger.config.max_claim_fee {
                    return Err(StakerError::FeeExceedsMax {
                        fee: fee.amount,
                        max: e.ledger.config.max_claim_fee,
                    });
                }
                ensure_valid(&fee.collector)?;
            }
            e.ledger.config.claim_fee = parameters;
            tracing::info!(fee = e.ledger.config.claim_fee_amount(), "claim fee set");
            Ok(())
        })
    }

    /// Replace (or disable) the staker whitelist.
    pub fn set_staker_whitelist(
        &mut self,
        caller: &Address,
        whitelist: Option<Arc<dyn WhitelistOracle>>,
    ) -> Result<(), StakerError> {
        self.ensure_admin(caller)?;
        if let Some(wl) = &whitelist {
            if Arc::ptr_eq(wl, &self.collab.allocation_mechanism_whitelist) {
                return Err(StakerError::WhitelistAliased("staker"));
            }
        }
        self.collab.staker_whitelist = whitelist;
        Ok(())
    }

    /// Replace (or disable) the contribution whitelist.
    pub fn set_contribution_whitelist(
        &mut self,
        caller: &Address,
        whitelist: Option<Arc<dyn WhitelistOracle>>,
    ) -> Result<(), StakerError> {
        self.ensure_admin(caller)?;
        if let Some(wl) = &whitelist {
            if Arc::ptr_eq(wl, &self.collab.allocation_mechanism_whitelist) {
                return Err(StakerError::WhitelistAliased("contribution"));
            }
        }
        self.collab.contribution_whitelist = whitelist;
        Ok(())
    }

    /// Replace the allocation-mechanism whitelist. Cannot be disabled.
    pub fn set_allocation_mechanism_whitelist(
        &mut self,
        caller: &Address,
        whitelist: Arc<dyn WhitelistOracle>,
    ) -> Result<(), StakerError> {
        self.ensure_admin(caller)?;
        let mut collab = self.collab.clone();
        collab.allocation_mechanism_whitelist = whitelist;
        validate_wiring(&collab)?;
        self.collab = collab;
        Ok(())
    }

    /// Authorize or revoke a reward notifier.
    pub fn set_reward_notifier(
        &mut self,
        caller: &Address,
        notifier: &Address,
        enabled: bool,
    ) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.ensure_admin(caller)?;
            ensure_valid(notifier)?;
            if enabled {
                e.ledger.notifiers.insert(notifier.clone());
            } else {
                e.ledger.notifiers.remove(notifier);
            }
            tracing::info!(notifier = %notifier, enabled, "reward notifier set");
            Ok(())
        })
    }

    /// Hand the admin role to a new address.
    pub fn set_admin(&mut self, caller: &Address, new_admin: &Address) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.ensure_admin(caller)?;
            ensure_valid(new_admin)?;
            e.ledger.admin = new_admin.clone();
            tracing::info!(admin = %new_admin, "admin transferred");
            Ok(())
        })
    }

    /// Circuit breaker: block user-facing mutation. Accrual time keeps
    /// running — pausing stops the ledger, not the clock.
    pub fn pause(&mut self, caller: &Address) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.ensure_admin(caller)?;
            e.ledger.paused = true;
            tracing::warn!("engine paused");
            Ok(())
        })
    }

    pub fn unpause(&mut self, caller: &Address) -> Result<(), StakerError> {
        self.mutate(|e| {
            e.ensure_admin(caller)?;
            e.ledger.paused = false;
            tracing::info!("engine unpaused");
            Ok(())
        })
    }

    // ── Persistence ──────────────────────────────────────────────────────

    /// Persist all durable engine state to a store.
    pub fn save_to_store(&self, store: &dyn StakerStore) -> Result<(), StakerError> {
        store.put_meta(META_ACCRUAL, &encode(&self.ledger.accrual)?)?;
        store.put_meta(META_CONFIG, &encode(&self.ledger.config)?)?;
        store.put_meta(META_ADMIN, &encode(&self.ledger.admin)?)?;
        store.put_meta(META_ADDRESS, &encode(&self.address)?)?;
        store.put_meta(META_PAUSED, &encode(&self.ledger.paused)?)?;
        store.put_meta(META_NOTIFIERS, &encode(&self.ledger.notifiers)?)?;
        store.put_meta(META_NEXT_DEPOSIT_ID, &encode(&self.ledger.deposits.next_id())?)?;
        for (id, deposit) in self.ledger.deposits.iter() {
            store.put_deposit(id.raw(), &encode(deposit)?)?;
        }
        Ok(())
    }

    /// Restore an engine from a store, reattaching collaborators and
    /// custody wiring.
    ///
    /// Surrogate accounts are rematerialized deterministically from the
    /// restored deposits, so the custody registry needs no records of its
    /// own.
    pub fn load_from_store(
        store: &dyn StakerStore,
        collab: Collaborators,
        mut custody: C,
    ) -> Result<Self, StakerError> {
        let address: Address = decode(&require_meta(store, META_ADDRESS)?)?;
        let admin: Address = decode(&require_meta(store, META_ADMIN)?)?;
        let accrual: GlobalRewardAccrual = decode(&require_meta(store, META_ACCRUAL)?)?;
        let config: StakerConfig = decode(&require_meta(store, META_CONFIG)?)?;
        let paused: bool = decode(&require_meta(store, META_PAUSED)?)?;
        let notifiers: BTreeSet<Address> = decode(&require_meta(store, META_NOTIFIERS)?)?;
        let next_id: u64 = decode(&require_meta(store, META_NEXT_DEPOSIT_ID)?)?;
        validate_wiring(&collab)?;

        let mut deposits = DepositArena::new();
        for (raw_id, bytes) in store.iter_deposits()? {
            let deposit: Deposit = decode(&bytes)?;
            custody.custody_account(&address, &deposit.delegatee);
            deposits.restore(DepositId::new(raw_id), deposit);
        }
        deposits.reserve_through(next_id);

        tracing::info!(deposits = deposits.len(), "engine state loaded from store");
        Ok(Self {
            address,
            collab,
            custody,
            ledger: LedgerState {
                accrual,
                deposits,
                config,
                notifiers,
                admin,
                paused,
            },
            in_call: false,
        })
    }

    // ── Internal plumbing ────────────────────────────────────────────────

    /// The single serialized mutation path: reject nested re-entry,
    /// snapshot the ledger, restore it wholesale on failure.
    fn mutate<T>(
        &mut self,
        operation: impl FnOnce(&mut Self) -> Result<T, StakerError>,
    ) -> Result<T, StakerError> {
        if self.in_call {
            return Err(StakerError::ReentrantCall);
        }
        self.in_call = true;
        let snapshot = self.ledger.clone();
        let result = operation(self);
        if result.is_err() {
            self.ledger = snapshot;
        }
        self.in_call = false;
        result
    }

    /// Fold the global accumulator forward, then settle the deposit.
    /// Ordering is load-bearing: the accumulator must be updated against
    /// pre-operation totals before the deposit syncs against it.
    fn checkpoint_and_sync(&mut self, id: DepositId, now: Timestamp) -> Result<(), StakerError> {
        self.ledger.accrual.checkpoint(now)?;
        let accumulated = self.ledger.accrual.reward_per_power_accumulated;
        self.ledger.deposits.get_mut(id)?.sync(accumulated)
    }

    fn skim_fee(&self, fee: u128) -> Result<(), StakerError> {
        if fee == 0 {
            return Ok(());
        }
        if let Some(params) = &self.ledger.config.claim_fee {
            self.collab
                .reward_token
                .transfer(&self.address, &params.collector, fee)?;
        }
        Ok(())
    }

    fn ensure_admin(&self, caller: &Address) -> Result<(), StakerError> {
        if *caller != self.ledger.admin {
            return Err(StakerError::NotAdmin(caller.clone()));
        }
        Ok(())
    }

    fn ensure_not_paused(&self) -> Result<(), StakerError> {
        if self.ledger.paused {
            return Err(StakerError::Paused);
        }
        Ok(())
    }

    fn ensure_staker_whitelisted(&self, address: &Address) -> Result<(), StakerError> {
        if let Some(wl) = &self.collab.staker_whitelist {
            if !wl.is_whitelisted(address) {
                return Err(StakerError::NotWhitelisted {
                    address: address.clone(),
                    list: "staker",
                });
            }
        }
        Ok(())
    }

    fn ensure_contribution_whitelisted(&self, address: &Address) -> Result<(), StakerError> {
        if let Some(wl) = &self.collab.contribution_whitelist {
            if !wl.is_whitelisted(address) {
                return Err(StakerError::NotWhitelisted {
                    address: address.clone(),
                    list: "contribution",
                });
            }
        }
        Ok(())
    }

    /// A non-zero balance may never sit below the current floor.
    fn ensure_minimum_stake(&self, resulting_balance: u128) -> Result<(), StakerError> {
        let minimum = self.ledger.config.minimum_stake_amount;
        if resulting_balance != 0 && resulting_balance < minimum {
            return Err(StakerError::BelowMinimumStake {
                balance: resulting_balance,
                minimum,
            });
        }
        Ok(())
    }
}

fn ensure_valid(address: &Address) -> Result<(), StakerError> {
    if !address.is_valid() {
        return Err(StakerError::InvalidAddress(address.clone()));
    }
    Ok(())
}

/// The allocation-mechanism whitelist must be its own instance — sharing
/// it with the staker or contribution whitelist is a misconfiguration.
fn validate_wiring(collab: &Collaborators) -> Result<(), StakerError> {
    if let Some(wl) = &collab.staker_whitelist {
        if Arc::ptr_eq(wl, &collab.allocation_mechanism_whitelist) {
            return Err(StakerError::WhitelistAliased("staker"));
        }
    }
    if let Some(wl) = &collab.contribution_whitelist {
        if Arc::ptr_eq(wl, &collab.allocation_mechanism_whitelist) {
            return Err(StakerError::WhitelistAliased("contribution"));
        }
    }
    Ok(())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StakerError> {
    bincode::serialize(value).map_err(|e| StakerError::Serialization(e.to_string()))
}

fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> Result<T, StakerError> {
    bincode::deserialize(bytes).map_err(|e| StakerError::Serialization(e.to_string()))
}

fn require_meta(store: &dyn StakerStore, key: &[u8]) -> Result<Vec<u8>, StakerError> {
    store.get_meta(key)?.ok_or_else(|| {
        StakerError::Serialization(format!(
            "missing meta record {:?}",
            String::from_utf8_lossy(key)
        ))
    })
}
