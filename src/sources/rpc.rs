//! A block stream that polls an Ethereum JSON-RPC node for logs.

use std::{collections::BTreeMap, fmt, time::Duration};

use alloy_provider::Provider;
use alloy_rpc_types_eth::{Filter, Log};
use anyhow::bail;
use async_trait::async_trait;
use chrono::DateTime;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::{
    filter::EventFilter,
    models::{Block, Event, StreamMessage},
    rpc::{http_provider, HttpProvider},
    stream::BlockStream,
};

const DEFAULT_CONFIRMATIONS: u64 = 3;
const DEFAULT_BLOCKS_PER_PAGE: u64 = 1_000;
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(12);
const DEFAULT_BUFFER_CAPACITY: u64 = 10_000;

/// The node calls the stream needs.
#[async_trait]
pub trait LogSource: Send + Sync + 'static {
    async fn chain_id(&self) -> Result<u64, anyhow::Error>;

    async fn block_number(&self) -> Result<u64, anyhow::Error>;

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, anyhow::Error>;
}

#[async_trait]
impl LogSource for HttpProvider {
    async fn chain_id(&self) -> Result<u64, anyhow::Error> {
        Ok(self.get_chain_id().await?)
    }

    async fn block_number(&self) -> Result<u64, anyhow::Error> {
        Ok(self.get_block_number().await?)
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, anyhow::Error> {
        Ok(self.get_logs(filter).await?)
    }
}

/// Groups logs into one [`Block`] per block number, ordered by
/// block number and log index. Removed and pending logs are skipped.
pub fn group_logs(logs: Vec<Log>) -> Vec<Block> {
    let mut blocks: BTreeMap<u64, Block> = BTreeMap::new();
    for log in logs.into_iter().filter(|log| !log.removed) {
        let Some(number) = log.block_number else {
            continue;
        };
        let block = blocks.entry(number).or_insert_with(|| Block {
            number,
            hash: log.block_hash.unwrap_or_default(),
            timestamp: log
                .block_timestamp
                .and_then(|timestamp| DateTime::from_timestamp(timestamp as i64, 0)),
            events: Vec::new(),
        });
        let mut event = Event::from_log_data(
            log.inner.address,
            log.transaction_hash.unwrap_or_default(),
            log.log_index.unwrap_or_default(),
            log.inner.data,
        );
        event.block_number = number;
        block.events.push(event);
    }
    blocks
        .into_values()
        .map(|mut block| {
            block.events.sort_by_key(|event| event.log_index);
            block
        })
        .collect()
}

/// Polls the chain head and fetches logs matching the filter
/// for every block that has at least `confirmations` blocks on top of it.
/// Only blocks containing matching logs are emitted.
pub struct RpcBlockStream<S: LogSource = HttpProvider> {
    source: Option<S>,
    chain_id: Option<u64>,
    confirmations: u64,
    blocks_per_page: u64,
    poll_interval: Duration,
    buffer_capacity: u64,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl RpcBlockStream<HttpProvider> {
    pub fn new(rpc_url: &str, api_key: Option<&str>) -> Result<Self, anyhow::Error> {
        Ok(Self::with_source(http_provider(rpc_url, api_key)?))
    }
}

impl<S: LogSource> RpcBlockStream<S> {
    pub fn with_source(source: S) -> Self {
        Self {
            source: Some(source),
            chain_id: None,
            confirmations: DEFAULT_CONFIRMATIONS,
            blocks_per_page: DEFAULT_BLOCKS_PER_PAGE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            handle: None,
        }
    }

    /// Refuse to start when the node serves another chain.
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = Some(chain_id);
        self
    }

    pub fn confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    /// The widest block range requested at once. Ranges the node
    /// rejects are halved, down to a single block.
    pub fn blocks_per_page(mut self, blocks_per_page: u64) -> Self {
        self.blocks_per_page = blocks_per_page.max(1);
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn buffer_capacity(mut self, buffer_capacity: u64) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }
}

impl<S: LogSource> fmt::Debug for RpcBlockStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcBlockStream")
            .field("chain_id", &self.chain_id)
            .field("confirmations", &self.confirmations)
            .field("blocks_per_page", &self.blocks_per_page)
            .field("poll_interval", &self.poll_interval)
            .field("started", &self.handle.is_some())
            .finish()
    }
}

/// Passed to the task spawned by the stream. It keeps track of the
/// next block to fetch and pushes blocks to the processor.
struct RpcFetcher<S> {
    source: S,
    filter: EventFilter,
    next_block: u64,
    confirmations: u64,
    page_size: u64,
    max_page_size: u64,
    poll_interval: Duration,
    tx: Sender<StreamMessage>,
}

impl<S: LogSource> RpcFetcher<S> {
    /// Fetches the next page of blocks. The flag is true
    /// when the fetcher has caught up with the confirmed head.
    async fn next_batch(&mut self) -> Result<(Vec<Block>, bool), anyhow::Error> {
        let head = self.source.block_number().await?;
        let Some(confirmed) = head.checked_sub(self.confirmations) else {
            return Ok((Vec::new(), true));
        };
        if confirmed < self.next_block {
            return Ok((Vec::new(), true));
        }
        let to_block = confirmed.min(self.next_block + self.page_size - 1);
        let filter = self.filter.to_log_filter(self.next_block, to_block);
        let logs = match self.source.logs(&filter).await {
            Ok(logs) => logs,
            Err(err) => {
                self.page_size = (self.page_size / 2).max(1);
                return Err(err.context(format!(
                    "eth_getLogs failed for blocks {}..={}",
                    self.next_block, to_block
                )));
            }
        };
        log::debug!(
            "fetched {} logs for blocks {}..={}",
            logs.len(),
            self.next_block,
            to_block
        );
        self.next_block = to_block + 1;
        self.page_size = self.page_size.saturating_mul(2).min(self.max_page_size);
        Ok((group_logs(logs), to_block == confirmed))
    }

    async fn run(&mut self) {
        loop {
            let (blocks, caught_up) = match self.next_batch().await {
                Ok(batch) => batch,
                Err(err) => {
                    log::error!("Error fetching blocks: {:?}\n Trying again...", err);
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
            };
            for block in blocks {
                // Stop fetching if the receiving end is closed
                if self.tx.send(block.into()).await.is_err() {
                    return;
                }
            }
            if caught_up {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }
}

#[async_trait]
impl<S: LogSource> BlockStream for RpcBlockStream<S> {
    async fn start(
        &mut self,
        from_block: u64,
        filter: EventFilter,
    ) -> Result<Receiver<StreamMessage>, anyhow::Error> {
        let Some(source) = self.source.take() else {
            bail!("The RPC block stream was already started");
        };
        if let Some(expected) = self.chain_id {
            let chain_id = source.chain_id().await?;
            if chain_id != expected {
                bail!("The node serves chain {}, expected {}", chain_id, expected);
            }
        }
        let (tx, rx) = tokio::sync::mpsc::channel(self.buffer_capacity as usize);
        let mut fetcher = RpcFetcher {
            source,
            filter,
            next_block: from_block,
            confirmations: self.confirmations,
            page_size: self.blocks_per_page,
            max_page_size: self.blocks_per_page,
            poll_interval: self.poll_interval,
            tx,
        };
        let handle = tokio::spawn(async move { fetcher.run().await });
        self.handle = Some(handle);
        Ok(rx)
    }

    async fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, LogData, B256};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn log(block: u64, index: u64, removed: bool) -> Log {
        Log {
            inner: alloy_primitives::Log {
                address: Address::with_last_byte(0x14),
                data: LogData::new_unchecked(
                    vec![B256::with_last_byte(0x9c), B256::with_last_byte(0x21)],
                    Bytes::from(vec![0u8; 32]),
                ),
            },
            block_hash: Some(B256::with_last_byte(block as u8)),
            block_number: Some(block),
            transaction_hash: Some(B256::with_last_byte(index as u8 + 100)),
            log_index: Some(index),
            removed,
            ..Log::default()
        }
    }

    /// A node whose head is fixed and which rejects log queries
    /// spanning more than `max_range` blocks.
    struct StubNode {
        head: u64,
        max_range: u64,
        logs: Vec<Log>,
        requests: Mutex<Vec<(u64, u64)>>,
    }

    impl StubNode {
        fn new(head: u64, max_range: u64, logs: Vec<Log>) -> Self {
            Self {
                head,
                max_range,
                logs,
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LogSource for StubNode {
        async fn chain_id(&self) -> Result<u64, anyhow::Error> {
            Ok(11_155_111)
        }

        async fn block_number(&self) -> Result<u64, anyhow::Error> {
            Ok(self.head)
        }

        async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, anyhow::Error> {
            let from = filter.get_from_block().unwrap_or_default();
            let to = filter.get_to_block().unwrap_or_default();
            self.requests.lock().unwrap().push((from, to));
            if to - from + 1 > self.max_range {
                bail!("query returned more than 10000 results");
            }
            Ok(self
                .logs
                .iter()
                .filter(|log| (from..=to).contains(&log.block_number.unwrap_or_default()))
                .cloned()
                .collect())
        }
    }

    fn fetcher(node: StubNode, next_block: u64, page_size: u64) -> RpcFetcher<StubNode> {
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        RpcFetcher {
            source: node,
            filter: EventFilter::default(),
            next_block,
            confirmations: 3,
            page_size,
            max_page_size: page_size,
            poll_interval: Duration::ZERO,
            tx,
        }
    }

    #[test]
    fn groups_logs_per_block_in_order() {
        let mut pending = log(13, 0, false);
        pending.block_number = None;
        let logs = vec![
            log(11, 4, false),
            log(10, 2, false),
            log(11, 1, false),
            log(12, 0, true),
            pending,
        ];

        let blocks = group_logs(logs);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].number, 10);
        assert_eq!(blocks[0].hash, B256::with_last_byte(10));
        assert_eq!(blocks[1].number, 11);
        let indices: Vec<u64> = blocks[1].events.iter().map(|e| e.log_index).collect();
        assert_eq!(indices, vec![1, 4]);
        assert!(blocks[1].events.iter().all(|e| e.block_number == 11));
        assert_eq!(blocks[0].events[0].topics().len(), 2);
        assert!(blocks[0].timestamp.is_none());
    }

    #[tokio::test]
    async fn pages_up_to_confirmed_head() {
        let node = StubNode::new(
            33,
            u64::MAX,
            vec![log(12, 0, false), log(25, 1, false), log(31, 0, false)],
        );
        let mut fetcher = fetcher(node, 10, 10);

        let (blocks, caught_up) = fetcher.next_batch().await.unwrap();
        assert_eq!(blocks.iter().map(|b| b.number).collect::<Vec<_>>(), vec![12]);
        assert!(!caught_up);

        let (blocks, caught_up) = fetcher.next_batch().await.unwrap();
        assert_eq!(blocks.iter().map(|b| b.number).collect::<Vec<_>>(), vec![25]);
        assert!(!caught_up);

        let (blocks, caught_up) = fetcher.next_batch().await.unwrap();
        assert!(blocks.is_empty());
        assert!(caught_up);

        let (_, caught_up) = fetcher.next_batch().await.unwrap();
        assert!(caught_up);

        // Block 31 waits for three confirmations on top of it.
        assert_eq!(
            *fetcher.source.requests.lock().unwrap(),
            vec![(10, 19), (20, 29), (30, 30)]
        );
        assert_eq!(fetcher.next_block, 31);
    }

    #[tokio::test]
    async fn nothing_is_fetched_before_enough_confirmations() {
        let mut fetcher = fetcher(StubNode::new(2, u64::MAX, vec![]), 0, 10);
        let (blocks, caught_up) = fetcher.next_batch().await.unwrap();
        assert!(blocks.is_empty());
        assert!(caught_up);
        assert!(fetcher.source.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_range_is_halved_until_it_passes() {
        let node = StubNode::new(1_003, 4, vec![log(5, 0, false)]);
        let mut fetcher = fetcher(node, 0, 16);

        let mut errors = 0;
        let mut blocks = Vec::new();
        while fetcher.next_block < 12 {
            match fetcher.next_batch().await {
                Ok((batch, _)) => blocks.extend(batch),
                Err(_) => errors += 1,
            }
        }

        assert_eq!(errors, 4);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].number, 5);
        assert_eq!(
            *fetcher.source.requests.lock().unwrap(),
            vec![(0, 15), (0, 7), (0, 3), (4, 11), (4, 7), (8, 15), (8, 11)]
        );
    }

    #[tokio::test]
    async fn start_checks_chain_id() {
        let mut stream = RpcBlockStream::with_source(StubNode::new(0, 1, vec![])).chain_id(1);
        assert!(stream.start(0, EventFilter::default()).await.is_err());

        let mut stream =
            RpcBlockStream::with_source(StubNode::new(0, 1, vec![])).chain_id(11_155_111);
        assert!(stream.start(0, EventFilter::default()).await.is_ok());
        stream.stop().await;
    }
}
