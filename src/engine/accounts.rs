//! Collateral and position operations.

use super::core::Engine;
use super::results::EngineError;
use crate::account::{Account, AccountError, ClosedPosition};
use crate::events::{
    BadDebtEvent, CloseReason, DepositEvent, EventPayload, PositionClosedEvent,
    PositionOpenedEvent, WithdrawalEvent,
};
use crate::liquidation::is_liquidation_eligible as ratio_is_eligible;
use crate::margin::{available_margin, calculate_required_margin, cross_margin_discount, margin_ratio};
use crate::position::Position;
use crate::types::{AccountId, AssetId, Bps, PositionId, Quote, SignedSize};

impl Engine {
    /// Deposit collateral. Creates the account on first use.
    pub fn deposit_collateral(&mut self, account_id: AccountId, amount: Quote) -> Result<Quote, EngineError> {
        let now = self.current_time;
        self.with_account_lock(account_id, |engine| {
            let new_collateral = engine.ledger.deposit(account_id, amount, now)?;
            engine.emit_event(EventPayload::Deposit(DepositEvent {
                account_id,
                amount,
                new_collateral,
            }));
            Ok(new_collateral)
        })
    }

    pub fn withdraw_collateral(&mut self, account_id: AccountId, amount: Quote) -> Result<Quote, EngineError> {
        let now = self.current_time;
        self.with_account_lock(account_id, |engine| {
            let new_collateral = engine.ledger.withdraw(account_id, amount, now)?;
            engine.emit_event(EventPayload::Withdrawal(WithdrawalEvent {
                account_id,
                amount,
                new_collateral,
            }));
            Ok(new_collateral)
        })
    }

    /// Open a new position at the market's current price. Required margin,
    /// after the cross-margin discount, must fit in available margin.
    pub fn open_position(
        &mut self,
        account_id: AccountId,
        asset: AssetId,
        size: SignedSize,
    ) -> Result<PositionId, EngineError> {
        self.ensure_not_paused()?;
        if size.is_zero() {
            return Err(EngineError::InvalidSize);
        }

        self.with_account_lock(account_id, |engine| {
            let now = engine.current_time;
            let price = engine.markets.price_of(asset)?;

            let account = engine
                .ledger
                .get(account_id)
                .ok_or(EngineError::AccountNotFound(account_id))?;
            if account.is_liquidating {
                return Err(AccountError::Liquidating(account_id).into());
            }

            let margin_params = &engine.config.venue.margin;
            let model = engine.correlation.as_ref();
            let required =
                calculate_required_margin(account, asset, size, price, &engine.markets, model, margin_params)?;
            let discount = if account.collateral.is_zero() {
                Bps::ZERO
            } else {
                cross_margin_discount(account, asset, size, &engine.markets, model, margin_params)
            };

            let available = available_margin(account);
            if required > available {
                return Err(EngineError::InsufficientMargin { required, available });
            }

            let position_id = account.next_position_id();
            let position = Position::new(position_id, asset, size, price, required, now);

            let account = engine.ledger.account_mut(account_id)?;
            account.add_position(position, now);
            account.refresh_unrealized_pnl(&engine.markets);
            engine.markets.adjust_open_interest(asset, size.abs())?;

            tracing::debug!(%account_id, %asset, size = %size.value(), margin = %required, "position opened");

            engine.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
                account_id,
                position_id,
                asset,
                size,
                entry_price: price,
                margin: required,
                discount,
            }));

            Ok(position_id)
        })
    }

    /// Close one position at the current price and realize its P&L.
    pub fn close_position(
        &mut self,
        account_id: AccountId,
        position_id: PositionId,
    ) -> Result<ClosedPosition, EngineError> {
        self.with_account_lock(account_id, |engine| {
            let now = engine.current_time;
            let account = engine.ledger.account_mut(account_id)?;
            let asset = account
                .get_position(position_id)
                .map(|p| p.asset)
                .ok_or(AccountError::PositionNotFound(account_id, position_id))?;
            let price = engine.markets.price_of(asset)?;

            let closed = account.close_position(position_id, price, now)?;
            account.refresh_unrealized_pnl(&engine.markets);
            engine.markets.adjust_open_interest(asset, -closed.size.abs())?;

            engine.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
                account_id,
                position_id,
                asset,
                exit_price: price,
                realized_pnl: closed.realized_pnl,
                close_reason: CloseReason::UserClosed,
            }));

            if !closed.bad_debt.is_zero() {
                tracing::warn!(%account_id, bad_debt = %closed.bad_debt, "loss exceeded collateral on close");
                engine.emit_event(EventPayload::BadDebt(BadDebtEvent {
                    account_id,
                    debt_amount: closed.bad_debt,
                }));
            }

            Ok(closed)
        })
    }

    /// Margin needed for `size` of `asset` at the current price. Unknown
    /// accounts are priced as empty ones (no collateral, no discount).
    pub fn calculate_required_margin(
        &self,
        account_id: AccountId,
        asset: AssetId,
        size: SignedSize,
    ) -> Result<Quote, EngineError> {
        let price = self.markets.price_of(asset)?;
        let empty;
        let account = match self.ledger.get(account_id) {
            Some(account) => account,
            None => {
                empty = Account::new(account_id, self.current_time);
                &empty
            }
        };
        Ok(calculate_required_margin(
            account,
            asset,
            size,
            price,
            &self.markets,
            self.correlation.as_ref(),
            &self.config.venue.margin,
        )?)
    }

    pub fn get_margin_ratio(&self, account_id: AccountId) -> Result<Bps, EngineError> {
        self.ledger
            .get(account_id)
            .map(margin_ratio)
            .ok_or(EngineError::AccountNotFound(account_id))
    }

    pub fn get_available_margin(&self, account_id: AccountId) -> Result<Quote, EngineError> {
        self.ledger
            .get(account_id)
            .map(available_margin)
            .ok_or(EngineError::AccountNotFound(account_id))
    }

    pub fn is_liquidation_eligible(&self, account_id: AccountId) -> Result<bool, EngineError> {
        let ratio = self.get_margin_ratio(account_id)?;
        Ok(ratio_is_eligible(ratio, &self.config.venue.liquidation))
    }
}
