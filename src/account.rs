//! Account ledger.
//!
//! Accounts are cross-margined: one collateral pool backs every open position.
//! Positions are appended to the account's history and never removed; closing
//! a position only marks it inactive. Accounts appear on first deposit and are
//! never deleted.

use crate::margin::available_margin;
use crate::market::{MarketError, MarketRegistry};
use crate::position::Position;
use crate::types::{AccountId, AssetId, PositionId, Price, Quote, SignedSize, Timestamp};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub collateral: Quote,
    pub margin_used: Quote,
    pub unrealized_pnl: Quote,
    /// Sum of signed position sizes
    pub net_exposure: Decimal,
    pub is_liquidating: bool,
    pub last_update_time: Timestamp,
    pub positions: Vec<Position>,
    pub total_deposited: Quote,
    pub total_withdrawn: Quote,
    pub realized_pnl: Quote,
}

/// Outcome of closing one position.
#[derive(Debug, Clone)]
pub struct ClosedPosition {
    pub position_id: PositionId,
    pub asset: AssetId,
    pub size: SignedSize,
    pub exit_price: Price,
    pub realized_pnl: Quote,
    pub margin_released: Quote,
    /// Loss beyond collateral, written off
    pub bad_debt: Quote,
}

impl Account {
    pub fn new(id: AccountId, timestamp: Timestamp) -> Self {
        Self {
            id,
            collateral: Quote::zero(),
            margin_used: Quote::zero(),
            unrealized_pnl: Quote::zero(),
            net_exposure: Decimal::ZERO,
            is_liquidating: false,
            last_update_time: timestamp,
            positions: Vec::new(),
            total_deposited: Quote::zero(),
            total_withdrawn: Quote::zero(),
            realized_pnl: Quote::zero(),
        }
    }

    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_active)
    }

    pub fn open_position_count(&self) -> usize {
        self.open_positions().count()
    }

    pub fn next_position_id(&self) -> PositionId {
        PositionId(self.positions.len() as u32)
    }

    pub fn get_position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(id.0 as usize)
    }

    pub fn deposit(&mut self, amount: Quote, timestamp: Timestamp) -> Result<(), AccountError> {
        if amount.value() <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount(amount));
        }
        if self.is_liquidating {
            return Err(AccountError::Liquidating(self.id));
        }
        self.collateral = self
            .collateral
            .checked_add(amount)
            .ok_or(AccountError::InvalidAmount(amount))?;
        self.total_deposited = self.total_deposited.add(amount);
        self.last_update_time = timestamp;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: Quote, timestamp: Timestamp) -> Result<(), AccountError> {
        if amount.value() <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount(amount));
        }
        if self.is_liquidating {
            return Err(AccountError::Liquidating(self.id));
        }
        let available = available_margin(self);
        // collateral is the hard floor even when pnl is positive
        let withdrawable = available.min(self.collateral);
        if amount > withdrawable {
            return Err(AccountError::InsufficientMargin {
                requested: amount,
                available: withdrawable,
            });
        }
        self.collateral = self.collateral.sub(amount);
        self.total_withdrawn = self.total_withdrawn.add(amount);
        self.last_update_time = timestamp;
        Ok(())
    }

    pub fn add_position(&mut self, position: Position, timestamp: Timestamp) {
        self.margin_used = self.margin_used.add(position.margin);
        self.net_exposure = self.net_exposure.saturating_add(position.size.value());
        self.positions.push(position);
        self.last_update_time = timestamp;
    }

    pub fn close_position(
        &mut self,
        id: PositionId,
        exit_price: Price,
        timestamp: Timestamp,
    ) -> Result<ClosedPosition, AccountError> {
        let account_id = self.id;
        let position = self
            .positions
            .get_mut(id.0 as usize)
            .ok_or(AccountError::PositionNotFound(account_id, id))?;
        if !position.is_active {
            return Err(AccountError::PositionClosed(account_id, id));
        }

        let realized = position.unrealized_pnl(exit_price);
        position.is_active = false;
        let closed = ClosedPosition {
            position_id: id,
            asset: position.asset,
            size: position.size,
            exit_price,
            realized_pnl: realized,
            margin_released: position.margin,
            bad_debt: Quote::zero(),
        };

        self.margin_used = self.margin_used.saturating_sub(closed.margin_released);
        self.net_exposure = self.net_exposure.saturating_sub(closed.size.value());
        let bad_debt = self.realize_pnl(realized);
        self.last_update_time = timestamp;

        Ok(ClosedPosition { bad_debt, ..closed })
    }

    /// Moves pnl into collateral. Returns the part of a loss that collateral
    /// could not absorb.
    pub fn realize_pnl(&mut self, pnl: Quote) -> Quote {
        self.realized_pnl = self.realized_pnl.add(pnl);
        let after = self.collateral.add(pnl);
        if after.is_negative() {
            self.collateral = Quote::zero();
            after.abs()
        } else {
            self.collateral = after;
            Quote::zero()
        }
    }

    /// Marks every open position at the registry's last price.
    pub fn refresh_unrealized_pnl(&mut self, markets: &MarketRegistry) {
        self.unrealized_pnl = self
            .open_positions()
            .filter_map(|p| markets.get(p.asset).map(|m| p.unrealized_pnl(m.price)))
            .sum();
    }

    pub fn holds(&self, asset: AssetId) -> bool {
        self.open_positions().any(|p| p.asset == asset)
    }
}

/// Result of the ledger's whole-portfolio liquidation.
#[derive(Debug, Clone)]
pub struct PortfolioLiquidation {
    pub account_id: AccountId,
    pub closed: Vec<ClosedPosition>,
    pub realized_pnl: Quote,
    pub bad_debt: Quote,
    pub collateral_after: Quote,
}

#[derive(Debug, Clone, Default)]
pub struct AccountLedger {
    accounts: HashMap<AccountId, Account>,
}

impl AccountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn get_mut(&mut self, id: AccountId) -> Option<&mut Account> {
        self.accounts.get_mut(&id)
    }

    pub fn account_mut(&mut self, id: AccountId) -> Result<&mut Account, AccountError> {
        self.accounts
            .get_mut(&id)
            .ok_or(AccountError::AccountNotFound(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &Account)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Creates the account on first deposit.
    pub fn deposit(
        &mut self,
        id: AccountId,
        amount: Quote,
        timestamp: Timestamp,
    ) -> Result<Quote, AccountError> {
        if amount.value() <= Decimal::ZERO {
            return Err(AccountError::InvalidAmount(amount));
        }
        let account = self
            .accounts
            .entry(id)
            .or_insert_with(|| Account::new(id, timestamp));
        account.deposit(amount, timestamp)?;
        Ok(account.collateral)
    }

    pub fn withdraw(
        &mut self,
        id: AccountId,
        amount: Quote,
        timestamp: Timestamp,
    ) -> Result<Quote, AccountError> {
        let account = self.account_mut(id)?;
        account.withdraw(amount, timestamp)?;
        Ok(account.collateral)
    }

    pub fn accounts_holding(&self, asset: AssetId) -> Vec<AccountId> {
        self.accounts
            .values()
            .filter(|a| a.holds(asset))
            .map(|a| a.id)
            .collect()
    }

    /// Closes every open position of the account at current prices.
    ///
    /// Every price is resolved before anything is touched, so a rejection
    /// (inactive market) leaves the account exactly as it was. On success the
    /// account is left with `is_liquidating` set; the caller ends the
    /// transaction with [`AccountLedger::unlock`].
    pub(crate) fn liquidate_portfolio(
        &mut self,
        id: AccountId,
        markets: &MarketRegistry,
        timestamp: Timestamp,
    ) -> Result<PortfolioLiquidation, AccountError> {
        let account = self.account_mut(id)?;

        let mut exits: Vec<(PositionId, Price)> = Vec::new();
        for position in account.open_positions() {
            let price = markets.price_of(position.asset)?;
            exits.push((position.id, price));
        }

        account.is_liquidating = true;

        let mut closed = Vec::with_capacity(exits.len());
        for (position_id, price) in exits {
            closed.push(account.close_position(position_id, price, timestamp)?);
        }

        account.margin_used = Quote::zero();
        account.net_exposure = Decimal::ZERO;
        account.unrealized_pnl = Quote::zero();
        account.last_update_time = timestamp;

        Ok(PortfolioLiquidation {
            account_id: id,
            realized_pnl: closed.iter().map(|c| c.realized_pnl).sum(),
            bad_debt: closed.iter().map(|c| c.bad_debt).sum(),
            closed,
            collateral_after: account.collateral,
        })
    }

    pub(crate) fn unlock(&mut self, id: AccountId) {
        if let Some(account) = self.accounts.get_mut(&id) {
            account.is_liquidating = false;
        }
    }

    /// Moves up to `amount` of collateral between accounts, creating the
    /// receiver if needed. Returns the amount actually moved.
    pub(crate) fn transfer_collateral(
        &mut self,
        from: AccountId,
        to: AccountId,
        amount: Quote,
        timestamp: Timestamp,
    ) -> Result<Quote, AccountError> {
        let payer = self.account_mut(from)?;
        let moved = amount.min(payer.collateral);
        if moved.is_zero() {
            return Ok(moved);
        }
        payer.collateral = payer.collateral.sub(moved);
        payer.last_update_time = timestamp;

        let receiver = self
            .accounts
            .entry(to)
            .or_insert_with(|| Account::new(to, timestamp));
        receiver.collateral = receiver.collateral.add(moved);
        receiver.last_update_time = timestamp;
        Ok(moved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountError {
    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Quote),

    #[error("Insufficient margin: requested {requested}, available {available}")]
    InsufficientMargin { requested: Quote, available: Quote },

    #[error("Account {0} is being liquidated")]
    Liquidating(AccountId),

    #[error("Position {1:?} not found on account {0}")]
    PositionNotFound(AccountId, PositionId),

    #[error("Position {1:?} on account {0} is already closed")]
    PositionClosed(AccountId, PositionId),

    #[error("Market error: {0}")]
    Market(#[from] MarketError),
}
