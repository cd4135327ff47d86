/*!
This module contains the [`Logger`] trait and the [`DefaultLogger`] implementation.

The [`Logger`] trait is an interface of hooks called by the [`BlockProcessor`][crate::processor::BlockProcessor]
at various points in the processing of blocks. This allows for custom logging
and metric collection. The default implementation is [`DefaultLogger`].
*/

use crate::models::{Block, DropBlock, Event};
use async_trait::async_trait;
use chrono::Utc;
use colored::Colorize;
use log::{error, info, warn};
use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

/// The interval at which the metrics are considered for the
/// `blocks_per_second` and `time_per_block` metrics.
const METRIC_CONSIDERATION_INTERVAL: Duration = Duration::from_secs(10);

/// A struct that holds metrics about the block stream in the [`DefaultLogger`]
pub struct StreamMetrics {
    pub blocks_seen: u64,
    pub blocks_handled: u64,
    pub blocks_dropped: u64,
    pub events_seen: u64,
    pub events_handled: u64,
    pub time_started: Instant,
    pub last_seen_block_number: Option<u64>,
    pub last_seen_timestamp: Option<chrono::DateTime<Utc>>,
    pub recent_blocks: VecDeque<(Instant, Duration)>,
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self {
            blocks_seen: 0,
            blocks_handled: 0,
            blocks_dropped: 0,
            events_seen: 0,
            events_handled: 0,
            time_started: Instant::now(),
            last_seen_block_number: None,
            last_seen_timestamp: None,
            recent_blocks: VecDeque::new(),
        }
    }
}

/// An interface of hooks for the `BlockProcessor` to call
/// at various points in the processing of blocks.
/// This allows for custom logging and metric collection.
/// The default implementation is `DefaultLogger`.
#[async_trait]
pub trait Logger: Send + Sync {
    /// Called when:
    /// - A block is received from the stream and is about to be processed, because one
    /// of its events has a handler associated with it.
    /// - The block is received from the stream and will not be processed because
    /// none of its events have a handler associated with them.
    /// - A retry error was returned from a handler and the block is being retried.
    ///
    /// `handling` indicates whether the block has any events that will be handled by an event handler or not.
    /// `is_retry` indicates whether the block is currently being retried or not.
    async fn receive_block(&mut self, block: &Block, handling: bool, is_retry: bool);
    /// Called when a block has been processed, whether or not any of its
    /// events were handled.
    async fn finish_block(&mut self, block: &Block, handling: bool);
    /// Called when an event with a handler is about to be processed,
    /// or is being retried.
    async fn receive_event(
        &mut self,
        block: &Block,
        event: &Event,
        handling: bool,
        is_retry: bool,
    );
    /// Called when an event has been processed.
    async fn finish_event(&mut self, block: &Block, event: &Event, handling: bool);
    /// Called when an `EventRetryError` is returned from a handler
    /// and the event is being retried. It could be called multiple times
    /// for the same event if it continues to fail.
    async fn event_retry_error(
        &mut self,
        block: &Block,
        event: &Event,
        error: &anyhow::Error,
        timeout: Duration,
    );
    /// Called when a `BlockRetryError` is returned from a handler
    /// and the block is being retried.
    async fn block_retry_error(
        &mut self,
        block: &Block,
        error: &anyhow::Error,
        timeout: Duration,
    );
    /// Called when the stream reports that a block is no longer canonical.
    async fn drop_block(&mut self, drop: &DropBlock);
    /// Called when an `UnrecoverableError` is returned from a handler
    /// and the processor should stop processing.
    async fn unrecoverable_error(&mut self, error: &anyhow::Error);
    /// Called periodically by an independent task.
    async fn periodic_report(&self);
    /// The interval at which `periodic_report` is called.
    fn periodic_report_interval(&self) -> Duration;
}

fn format_timestamp(timestamp: Option<chrono::DateTime<Utc>>) -> String {
    match timestamp {
        Some(timestamp) => timestamp.format("%a %d-%m-%Y %H:%M").to_string(),
        None => "no timestamp".to_string(),
    }
}

/// The default logger implementation for the `BlockProcessor`.
/// This logger collects some metrics about the block stream
/// and logs them periodically. It also logs information about blocks
/// and events as they are processed.
pub struct DefaultLogger {
    metrics: StreamMetrics,
    block_stopwatch: Instant,
    event_stopwatch: Instant,
    custom_report_interval: Option<Duration>,
}

impl Default for DefaultLogger {
    fn default() -> Self {
        Self {
            metrics: StreamMetrics::default(),
            block_stopwatch: Instant::now(),
            event_stopwatch: Instant::now(),
            custom_report_interval: None,
        }
    }
}

impl DefaultLogger {
    pub fn with_custom_report_interval(custom_report_interval: Duration) -> Self {
        Self {
            custom_report_interval: Some(custom_report_interval),
            ..Self::default()
        }
    }

    pub fn metrics(&self) -> &StreamMetrics {
        &self.metrics
    }
}

#[async_trait]
impl Logger for DefaultLogger {
    async fn receive_block(&mut self, block: &Block, handling: bool, retry: bool) {
        self.block_stopwatch = Instant::now();
        if handling {
            if !retry {
                let line = "--------------------------------------------------------"
                    .bright_blue();
                info!("{}", line);
            }
            let message = format!(
                "HANDLING BLOCK - {} - {}",
                block.number,
                format_timestamp(block.timestamp)
            )
            .bright_green();
            info!("{}", message);
        }
    }

    async fn finish_block(&mut self, block: &Block, handling: bool) {
        self.metrics.blocks_seen += 1;
        self.metrics.last_seen_block_number = Some(block.number);
        self.metrics.last_seen_timestamp = block.timestamp;
        let time_spent = self.block_stopwatch.elapsed();
        self.metrics
            .recent_blocks
            .push_back((Instant::now(), time_spent));
        while let Some(&(time, _)) = self.metrics.recent_blocks.front() {
            if time.elapsed() > METRIC_CONSIDERATION_INTERVAL {
                self.metrics.recent_blocks.pop_front();
            } else {
                break;
            }
        }
        if handling {
            self.metrics.blocks_handled += 1;
            let message = format!(
                "###### END BLOCK - HANDLED IN {}ms ######",
                time_spent.as_millis()
            )
            .bright_green();
            let line = "--------------------------------------------------------"
                .bright_blue();
            info!("{}", message);
            info!("{}", line);
        }
    }

    async fn receive_event(
        &mut self,
        _block: &Block,
        event: &Event,
        handling: bool,
        _retry: bool,
    ) {
        if handling {
            self.event_stopwatch = Instant::now();
            let message = format!(
                "HANDLING EVENT: {} #{} FROM {}",
                event.tx_hash, event.log_index, event.contract
            )
            .bright_yellow();
            info!("{}", message);
        }
    }

    async fn finish_event(&mut self, _block: &Block, _event: &Event, handling: bool) {
        self.metrics.events_seen += 1;
        if handling {
            self.metrics.events_handled += 1;
            log::debug!(
                "event handled in {}ms",
                self.event_stopwatch.elapsed().as_millis()
            );
        }
    }

    async fn event_retry_error(
        &mut self,
        _block: &Block,
        event: &Event,
        error: &anyhow::Error,
        timeout: Duration,
    ) {
        let message = format!(
            "ERROR HANDLING EVENT: {} #{} - {:?}",
            event.tx_hash, event.log_index, error
        )
        .bright_red();
        let retry_message =
            format!("RETRYING IN {:.1} SECONDS\n", timeout.as_secs_f32()).bright_yellow();

        error!("{}", message);
        info!("{}", retry_message);
    }

    async fn block_retry_error(
        &mut self,
        _block: &Block,
        error: &anyhow::Error,
        timeout: Duration,
    ) {
        let message = format!("FATAL ERROR HANDLING BLOCK: {:?}\n", error).bright_red();

        let retry_message =
            format!("RETRYING IN {:.1} SECONDS\n", timeout.as_secs_f32()).bright_yellow();

        error!("{}", message);
        info!("{}", retry_message);
    }

    async fn drop_block(&mut self, drop: &DropBlock) {
        self.metrics.blocks_dropped += 1;
        let message = format!("DROPPING BLOCK - {} - {}", drop.number, drop.hash).bright_magenta();
        warn!("{}", message);
    }

    async fn unrecoverable_error(&mut self, error: &anyhow::Error) {
        let message = format!("UNRECOVERABLE ERROR: {:?}", error).bright_red();
        error!("{}", message);
    }

    async fn periodic_report(&self) {
        match self.metrics.last_seen_block_number {
            Some(block_number) => {
                let state_message = format!(
                    "HANDLED UP TO: {} - {}",
                    block_number,
                    format_timestamp(self.metrics.last_seen_timestamp)
                )
                .bright_blue();

                let block_amount = self
                    .metrics
                    .recent_blocks
                    .iter()
                    .filter(|(time, _)| time.elapsed() <= METRIC_CONSIDERATION_INTERVAL)
                    .count();
                let considered_secs = METRIC_CONSIDERATION_INTERVAL
                    .as_secs()
                    .min(self.metrics.time_started.elapsed().as_secs().max(1));
                let blocks_per_second = block_amount as u64 / considered_secs;
                let blocks_per_second_message =
                    format!("PROCESSING ~{} BLOCKS PER SECOND", blocks_per_second).bright_blue();
                info!("{}", state_message);
                info!("{}", blocks_per_second_message);
                if block_amount > 0 {
                    let time_per_block = self
                        .metrics
                        .recent_blocks
                        .iter()
                        .fold(Duration::from_secs(0), |acc, (_, duration)| acc + *duration)
                        / block_amount as u32;
                    let time_per_block_message =
                        format!("AVERAGE TIME PER BLOCK: ~{:?}", time_per_block).bright_blue();
                    info!("{}", time_per_block_message);
                }
            }
            None => {
                info!("{}", "NO BLOCKS HANDLED YET".bright_blue());
            }
        }
    }

    fn periodic_report_interval(&self) -> Duration {
        self.custom_report_interval
            .unwrap_or(Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[tokio::test]
    async fn default_logger_counts_blocks_and_events() {
        let mut logger = DefaultLogger::default();
        let block = Block {
            number: 7,
            ..Block::default()
        };
        let event = Event::default();

        logger.receive_block(&block, true, false).await;
        logger.receive_event(&block, &event, true, false).await;
        logger.finish_event(&block, &event, true).await;
        logger.finish_block(&block, true).await;
        logger.finish_block(&Block { number: 8, ..Block::default() }, false).await;
        logger
            .drop_block(&DropBlock { number: 8, hash: B256::ZERO })
            .await;

        let metrics = logger.metrics();
        assert_eq!(metrics.blocks_seen, 2);
        assert_eq!(metrics.blocks_handled, 1);
        assert_eq!(metrics.blocks_dropped, 1);
        assert_eq!(metrics.events_seen, 1);
        assert_eq!(metrics.events_handled, 1);
        assert_eq!(metrics.last_seen_block_number, Some(8));
        logger.periodic_report().await;
    }
}
