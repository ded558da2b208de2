//! # Capability Provider
//!
//! The seam between Sensorwatch and the chain. A provider grants account
//! access, a signer, block metadata and contract logs. `RpcProvider` (see
//! `rpc`) is the production implementation; tests use scripted in-memory
//! providers.

use crate::error::ProviderError;
use ethers::types::H256;
use sensorwatch_core::{BlockMeta, BlockNumber, ContractAddress, LogEntry};
use serde::Serialize;
use std::future::Future;

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// Capability handle to an Ethereum-compatible node or wallet.
pub trait CapabilityProvider: Send + Sync + 'static {
    /// Ask for account access. The first account is the active one.
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<String>, ProviderError>> + Send;

    /// Obtain a signer for `account`.
    fn get_signer(&self, account: &str)
    -> impl Future<Output = Result<Signer, ProviderError>> + Send;

    /// Metadata of block `number`.
    fn get_block(
        &self,
        number: BlockNumber,
    ) -> impl Future<Output = Result<BlockMeta, ProviderError>> + Send;

    /// Number of the most recent block.
    fn latest_block(&self) -> impl Future<Output = Result<BlockNumber, ProviderError>> + Send;

    /// Logs matching `filter`, in chain order.
    fn get_logs(
        &self,
        filter: &LogFilter,
    ) -> impl Future<Output = Result<Vec<LogEntry>, ProviderError>> + Send;
}

// =============================================================================
// SESSION VALUES
// =============================================================================

/// Signing capability for one account on one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signer {
    address: String,
    chain_id: u64,
}

impl Signer {
    #[must_use]
    pub fn new(address: impl Into<String>, chain_id: u64) -> Self {
        Self {
            address: address.into(),
            chain_id,
        }
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

/// Everything a live session holds from the provider.
///
/// Produced by `LifecycleManager::connect` and owned by the manager until
/// the session is torn down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionContext {
    account: String,
    signer: Signer,
}

impl SessionContext {
    #[must_use]
    pub fn new(account: impl Into<String>, signer: Signer) -> Self {
        Self {
            account: account.into(),
            signer,
        }
    }

    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    #[must_use]
    pub fn chain_id(&self) -> u64 {
        self.signer.chain_id()
    }
}

/// Log query for one contract and one event topic over a block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: ContractAddress,
    pub topic: H256,
    pub from_block: BlockNumber,
    pub to_block: BlockNumber,
}
