/*!
Ledger rules for tracking one wallet on one token contract.

The tracker keeps a balance for the wallet, an allowance per spender the
wallet approved, and an append-only log of the transfers, approvals and
deposits that touched the wallet. Balances are signed because tracking
starts at a configured block rather than at the token's deployment.
*/

use alloy_primitives::{Address, B256, I256, U256};
use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::{
    error::EventHandlerError,
    store::{Store, Table},
    trace::{find_transfer_from_sender, CallTraceSource},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalletConfig {
    /// The wallet whose balance and allowances are tracked.
    pub wallet: Address,
    /// The token contract.
    pub contract: Address,
    pub initial_block_number: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub address: String,
    pub balance: I256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceRecord {
    pub owner_spender: String,
    pub allowance: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub from: Address,
    pub to: Address,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositRecord {
    pub to: Address,
    pub value: U256,
}

/// A transfer that spent an allowance, with the spender taken from the call trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFromRecord {
    pub owner: Address,
    pub spender: Address,
    pub value: U256,
}

pub const BALANCES: Table<BalanceRecord> = Table::new("balances");
pub const ALLOWANCES: Table<AllowanceRecord> = Table::new("allowances");
pub const TRANSFERS: Table<TransferRecord> = Table::new("transfers");
pub const TRANSFER_FROMS: Table<TransferFromRecord> = Table::new("transferFroms");
pub const APPROVALS: Table<ApprovalRecord> = Table::new("approvals");
pub const DEPOSITS: Table<DepositRecord> = Table::new("deposits");

/// Key of the balances table.
pub fn address_key(address: Address) -> String {
    address.to_string().to_lowercase()
}

/// Key of the allowances table.
pub fn owner_spender_key(owner: Address, spender: Address) -> String {
    format!("{}_{}", owner, spender).to_lowercase()
}

/// Key of the event log tables.
pub fn tx_key(tx_hash: B256) -> String {
    tx_hash.to_string()
}

fn store_error(error: anyhow::Error) -> EventHandlerError {
    EventHandlerError::UnrecoverableError(error)
}

pub struct WalletTracker {
    config: WalletConfig,
    store: Box<dyn Store>,
    tracer: Box<dyn CallTraceSource>,
}

impl WalletTracker {
    pub fn new(
        config: WalletConfig,
        store: Box<dyn Store>,
        tracer: Box<dyn CallTraceSource>,
    ) -> Self {
        Self {
            config,
            store,
            tracer,
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn Store {
        &*self.store
    }

    pub fn store_mut(&mut self) -> &mut dyn Store {
        &mut *self.store
    }

    pub async fn balance(&self) -> Result<Option<I256>, anyhow::Error> {
        Ok(BALANCES
            .get(&*self.store, &address_key(self.config.wallet))
            .await?
            .map(|record| record.balance))
    }

    pub async fn allowance(&self, spender: Address) -> Result<Option<U256>, anyhow::Error> {
        Ok(ALLOWANCES
            .get(&*self.store, &owner_spender_key(self.config.wallet, spender))
            .await?
            .map(|record| record.allowance))
    }

    pub async fn on_transfer(
        &mut self,
        tx_hash: B256,
        from: Address,
        to: Address,
        value: U256,
    ) -> Result<(), EventHandlerError> {
        let wallet = self.config.wallet;
        if from != wallet && to != wallet {
            return Ok(());
        }

        // Look up the spender before writing anything, so a failed
        // lookup can be retried without applying the transfer twice.
        let spender = if from == wallet {
            let calls = self
                .tracer
                .transaction_calls(tx_hash)
                .await
                .map_err(EventHandlerError::EventRetryError)?;
            find_transfer_from_sender(&calls, self.config.contract)
        } else {
            None
        };

        // A transfer from the wallet to itself is both credited and
        // debited, so the balance does not move.
        let amount = signed(value)?;
        let mut delta = I256::ZERO;
        if to == wallet {
            delta += amount;
        }
        if from == wallet {
            delta -= amount;
        }
        let balance = self.next_balance(delta).await?;

        TRANSFERS
            .set(&mut *self.store, &tx_key(tx_hash), &TransferRecord { from, to, value })
            .await
            .map_err(store_error)?;
        self.write_balance(balance).await?;

        if let Some(spender) = spender {
            self.spend_allowance(tx_hash, from, spender, value).await?;
        }
        Ok(())
    }

    pub async fn on_approval(
        &mut self,
        tx_hash: B256,
        owner: Address,
        spender: Address,
        value: U256,
    ) -> Result<(), EventHandlerError> {
        if owner != self.config.wallet {
            return Ok(());
        }
        APPROVALS
            .set(
                &mut *self.store,
                &tx_key(tx_hash),
                &ApprovalRecord {
                    owner,
                    spender,
                    value,
                },
            )
            .await
            .map_err(store_error)?;

        let key = owner_spender_key(owner, spender);
        ALLOWANCES
            .set(
                &mut *self.store,
                &key,
                &AllowanceRecord {
                    owner_spender: key.clone(),
                    allowance: value,
                },
            )
            .await
            .map_err(store_error)?;
        log::info!("allowance {} set to {}", key, value);
        Ok(())
    }

    pub async fn on_deposit(
        &mut self,
        tx_hash: B256,
        to: Address,
        value: U256,
    ) -> Result<(), EventHandlerError> {
        if to != self.config.wallet {
            return Ok(());
        }
        let balance = self.next_balance(signed(value)?).await?;
        DEPOSITS
            .set(&mut *self.store, &tx_key(tx_hash), &DepositRecord { to, value })
            .await
            .map_err(store_error)?;
        self.write_balance(balance).await
    }

    /// The wallet balance after adding `delta`. Nothing is written.
    async fn next_balance(&self, delta: I256) -> Result<I256, EventHandlerError> {
        let key = address_key(self.config.wallet);
        let current = BALANCES
            .get(&*self.store, &key)
            .await
            .map_err(store_error)?;
        Ok(match current {
            Some(record) => record.balance.checked_add(delta).ok_or_else(|| {
                EventHandlerError::UnrecoverableError(anyhow!(
                    "balance of {} overflows adding {}",
                    key,
                    delta
                ))
            })?,
            None => delta,
        })
    }

    async fn write_balance(&mut self, balance: I256) -> Result<(), EventHandlerError> {
        let key = address_key(self.config.wallet);
        BALANCES
            .set(
                &mut *self.store,
                &key,
                &BalanceRecord {
                    address: key.clone(),
                    balance,
                },
            )
            .await
            .map_err(store_error)?;
        log::info!("balance of {} is now {}", key, balance);
        Ok(())
    }

    /// Decrements the allowance `spender` used, unless it is unlimited.
    async fn spend_allowance(
        &mut self,
        tx_hash: B256,
        owner: Address,
        spender: Address,
        value: U256,
    ) -> Result<(), EventHandlerError> {
        let key = owner_spender_key(owner, spender);
        let Some(mut record) = ALLOWANCES
            .get(&*self.store, &key)
            .await
            .map_err(store_error)?
        else {
            return Ok(());
        };
        if record.allowance == U256::MAX {
            return Ok(());
        }
        record.allowance = record.allowance.saturating_sub(value);
        ALLOWANCES
            .set(&mut *self.store, &key, &record)
            .await
            .map_err(store_error)?;
        TRANSFER_FROMS
            .set(
                &mut *self.store,
                &tx_key(tx_hash),
                &TransferFromRecord {
                    owner,
                    spender,
                    value,
                },
            )
            .await
            .map_err(store_error)?;
        log::info!("allowance {} spent down to {}", key, record.allowance);
        Ok(())
    }
}

/// Token amounts above `I256::MAX` cannot be applied to a signed balance.
fn signed(value: U256) -> Result<I256, EventHandlerError> {
    I256::try_from(value).map_err(|_| {
        EventHandlerError::UnrecoverableError(anyhow!(
            "amount {} does not fit a signed balance",
            value
        ))
    })
}
