//! Scripted in-memory provider shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use sensorwatch::error::ProviderError;
use sensorwatch::manager::LifecycleManager;
use sensorwatch::provider::{CapabilityProvider, LogFilter, Signer};
use sensorwatch::source::SourceSettings;
use sensorwatch_core::{
    BlockMeta, BlockNumber, ContractAddress, DeviceId, DisplayClock, Lifecycle, LogEntry,
    Normalizer, data_recorded_topic, encode_data_recorded,
};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
pub const OTHER_CONTRACT: &str = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512";
pub const ACCOUNT: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
pub const CHAIN_ID: u64 = 31337;
pub const GENESIS_TIME: i64 = 1_700_000_000;

// =============================================================================
// MOCK PROVIDER
// =============================================================================

#[derive(Debug, Default)]
struct Script {
    accounts: Vec<String>,
    latest: u64,
    fail_latest: bool,
    logs: Vec<LogEntry>,
    block_delays: HashMap<u64, Duration>,
    missing_blocks: HashSet<u64>,
    failing_log_fetches: usize,
    log_fetches: usize,
    ranges: Vec<(u64, u64)>,
}

/// Provider whose chain is a list of logs and a latest block number.
///
/// Blocks are `GENESIS_TIME + 12 * n` seconds old.
#[derive(Debug, Default)]
pub struct MockProvider {
    script: Mutex<Script>,
}

impl MockProvider {
    pub fn new(latest: u64) -> Self {
        let provider = Self::default();
        {
            let mut script = provider.script.lock().unwrap();
            script.accounts = vec![ACCOUNT.to_string()];
            script.latest = latest;
        }
        provider
    }

    pub fn without_accounts(self) -> Self {
        self.script.lock().unwrap().accounts.clear();
        self
    }

    pub fn push_log(&self, log: LogEntry) {
        self.script.lock().unwrap().logs.push(log);
    }

    pub fn set_latest(&self, latest: u64) {
        self.script.lock().unwrap().latest = latest;
    }

    pub fn fail_latest(&self) {
        self.script.lock().unwrap().fail_latest = true;
    }

    pub fn restore_latest(&self) {
        self.script.lock().unwrap().fail_latest = false;
    }

    pub fn delay_block(&self, number: u64, delay: Duration) {
        self.script.lock().unwrap().block_delays.insert(number, delay);
    }

    pub fn drop_block(&self, number: u64) {
        self.script.lock().unwrap().missing_blocks.insert(number);
    }

    pub fn fail_next_log_fetches(&self, count: usize) {
        self.script.lock().unwrap().failing_log_fetches = count;
    }

    pub fn log_fetches(&self) -> usize {
        self.script.lock().unwrap().log_fetches
    }

    pub fn ranges(&self) -> Vec<(u64, u64)> {
        self.script.lock().unwrap().ranges.clone()
    }
}

pub fn block_time(number: u64) -> i64 {
    GENESIS_TIME + 12 * number as i64
}

impl CapabilityProvider for MockProvider {
    fn request_accounts(&self) -> impl Future<Output = Result<Vec<String>, ProviderError>> + Send {
        let accounts = self.script.lock().unwrap().accounts.clone();
        async move { Ok(accounts) }
    }

    fn get_signer(
        &self,
        account: &str,
    ) -> impl Future<Output = Result<Signer, ProviderError>> + Send {
        let signer = Signer::new(account, CHAIN_ID);
        async move { Ok(signer) }
    }

    fn get_block(
        &self,
        number: BlockNumber,
    ) -> impl Future<Output = Result<BlockMeta, ProviderError>> + Send {
        let (delay, missing) = {
            let script = self.script.lock().unwrap();
            (
                script.block_delays.get(&number.value()).copied(),
                script.missing_blocks.contains(&number.value()),
            )
        };
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if missing {
                return Err(ProviderError::BlockNotFound(number));
            }
            Ok(BlockMeta::new(number, block_time(number.value())))
        }
    }

    fn latest_block(&self) -> impl Future<Output = Result<BlockNumber, ProviderError>> + Send {
        let script = self.script.lock().unwrap();
        let result = if script.fail_latest {
            Err(ProviderError::Transport("connection refused".to_string()))
        } else {
            Ok(BlockNumber(script.latest))
        };
        async move { result }
    }

    fn get_logs(
        &self,
        filter: &LogFilter,
    ) -> impl Future<Output = Result<Vec<LogEntry>, ProviderError>> + Send {
        let mut script = self.script.lock().unwrap();
        script.log_fetches += 1;
        let result = if script.failing_log_fetches > 0 {
            script.failing_log_fetches -= 1;
            Err(ProviderError::Transport("HTTP status 503".to_string()))
        } else {
            let (from, to) = (filter.from_block, filter.to_block);
            script.ranges.push((from.value(), to.value()));
            Ok(script
                .logs
                .iter()
                .filter(|log| log.block_number >= from && log.block_number <= to)
                .cloned()
                .collect())
        };
        async move { result }
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

/// A well-formed `DataRecorded` log from `CONTRACT`.
pub fn data_log(device: &str, temperature: i64, humidity: i64, block: u64, index: u64) -> LogEntry {
    LogEntry {
        address: ContractAddress::parse(CONTRACT).unwrap().as_address(),
        topics: vec![data_recorded_topic()],
        data: encode_data_recorded(device, temperature, humidity),
        block_number: BlockNumber(block),
        log_index: index,
        removed: false,
    }
}

pub fn settings(start_block: Option<u64>) -> SourceSettings {
    SourceSettings {
        address: ContractAddress::parse(CONTRACT).unwrap(),
        poll_interval: Duration::from_millis(100),
        start_block: start_block.map(BlockNumber),
        max_block_range: 1000,
        channel_capacity: 64,
        max_poll_failures: 5,
    }
}

pub fn lifecycle(device: &str) -> Lifecycle {
    let normalizer = Normalizer::new(DeviceId::new(device).unwrap(), DisplayClock::utc());
    Lifecycle::new(normalizer, 128)
}

pub fn manager(provider: &Arc<MockProvider>, start_block: u64) -> Arc<LifecycleManager<MockProvider>> {
    Arc::new(LifecycleManager::new(
        Arc::clone(provider),
        settings(Some(start_block)),
        lifecycle("device-01"),
        4,
    ))
}

/// Poll `condition` until it holds, panicking after 30 (virtual or real) seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(30), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if waited.is_err() {
        panic!("condition not reached in time");
    }
}
