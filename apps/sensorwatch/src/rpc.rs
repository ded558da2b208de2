//! # JSON-RPC Provider
//!
//! `CapabilityProvider` over an `ethers` HTTP provider.
//!
//! | Capability         | Call(s)                                    |
//! |--------------------|--------------------------------------------|
//! | `request_accounts` | `eth_requestAccounts`, then `get_accounts` |
//! | `get_signer`       | `get_chainid`                              |
//! | `get_block`        | `get_block`                                |
//! | `latest_block`     | `get_block_number`                         |
//! | `get_logs`         | `get_logs` with a typed `Filter`           |

use crate::error::ProviderError;
use crate::provider::{CapabilityProvider, LogFilter, Signer};
use ethers::providers::{Http, Middleware, Provider, ProviderError as EthersError, RpcError};
use ethers::types::{Address, BlockId, BlockNumber as EthBlockNumber, Filter, Log, U64};
use reqwest::Url;
use sensorwatch_core::{BlockMeta, BlockNumber, LogEntry};
use std::time::Duration;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// =============================================================================
// PROVIDER
// =============================================================================

/// HTTP JSON-RPC provider.
#[derive(Debug, Clone)]
pub struct RpcProvider {
    inner: Provider<Http>,
}

impl RpcProvider {
    /// Create a provider for the endpoint at `url`.
    pub fn new(url: &str) -> Result<Self, ProviderError> {
        let url = Url::parse(url).map_err(|e| ProviderError::Transport(format!("{}: {}", url, e)))?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            inner: Provider::new(Http::new_with_client(url, client)),
        })
    }

    /// Chain id reported by the endpoint.
    pub async fn chain_id(&self) -> Result<u64, ProviderError> {
        let id = self.inner.get_chainid().await.map_err(map_error)?;
        u64::try_from(id).map_err(|_| invalid(format!("chain id {}", id)))
    }
}

impl CapabilityProvider for RpcProvider {
    async fn request_accounts(&self) -> Result<Vec<String>, ProviderError> {
        // Plain nodes do not implement the wallet method.
        let accounts = match self
            .inner
            .request::<_, Vec<Address>>("eth_requestAccounts", ())
            .await
            .map_err(map_error)
        {
            Ok(accounts) if !accounts.is_empty() => accounts,
            Ok(_) | Err(ProviderError::Rpc { .. }) => {
                self.inner.get_accounts().await.map_err(map_error)?
            }
            Err(e) => return Err(e),
        };

        if accounts.is_empty() {
            return Err(ProviderError::NoAccounts);
        }
        Ok(accounts.iter().map(|a| format!("{:#x}", a)).collect())
    }

    async fn get_signer(&self, account: &str) -> Result<Signer, ProviderError> {
        let chain_id = self.chain_id().await?;
        Ok(Signer::new(account, chain_id))
    }

    async fn get_block(&self, number: BlockNumber) -> Result<BlockMeta, ProviderError> {
        let id = BlockId::Number(EthBlockNumber::Number(U64::from(number.value())));
        let block = self
            .inner
            .get_block(id)
            .await
            .map_err(map_error)?
            .ok_or(ProviderError::BlockNotFound(number))?;

        let reported = block
            .number
            .map(|n| n.as_u64())
            .ok_or_else(|| invalid(format!("block {} without number", number)))?;
        let timestamp = u64::try_from(block.timestamp)
            .ok()
            .and_then(|t| i64::try_from(t).ok())
            .ok_or_else(|| invalid(format!("block timestamp {}", block.timestamp)))?;

        Ok(BlockMeta::new(BlockNumber(reported), timestamp))
    }

    async fn latest_block(&self) -> Result<BlockNumber, ProviderError> {
        let number = self.inner.get_block_number().await.map_err(map_error)?;
        Ok(BlockNumber(number.as_u64()))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<LogEntry>, ProviderError> {
        let logs = self
            .inner
            .get_logs(&to_filter(filter))
            .await
            .map_err(map_error)?;
        logs.into_iter().map(into_entry).collect()
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

fn to_filter(filter: &LogFilter) -> Filter {
    Filter::new()
        .address(filter.address.as_address())
        .topic0(filter.topic)
        .from_block(filter.from_block.value())
        .to_block(filter.to_block.value())
}

fn into_entry(log: Log) -> Result<LogEntry, ProviderError> {
    let block_number = log
        .block_number
        .ok_or_else(|| invalid("log without block number"))?;
    let log_index = log
        .log_index
        .and_then(|i| u64::try_from(i).ok())
        .ok_or_else(|| invalid("log without log index"))?;

    Ok(LogEntry {
        address: log.address,
        topics: log.topics,
        data: log.data,
        block_number: BlockNumber(block_number.as_u64()),
        log_index,
        removed: log.removed.unwrap_or(false),
    })
}

/// Keep JSON-RPC error objects distinct from transport failures.
fn map_error(err: EthersError) -> ProviderError {
    if let Some(response) = err.as_error_response() {
        return ProviderError::Rpc {
            code: response.code,
            message: response.message.clone(),
        };
    }
    ProviderError::Transport(err.to_string())
}

fn invalid(reason: impl Into<String>) -> ProviderError {
    ProviderError::InvalidResponse(reason.into())
}

// =============================================================================
// TESTS
// =============================================================================
