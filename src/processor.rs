/*!
# Block Stream Processor - Ties everything together and does the heavy lifting

This module holds the main struct that processes blocks from a [`BlockStream`],
a default implementation of a [`BlockHandler`], and a struct that processes events in a [`BlockHandler`].
*/

use crate::{
    block_handler::{BlockHandler, BlockHandlerContext},
    datalake::Datalake,
    error::{BlockHandlerError, BlockProcessorError, EventHandlerError},
    event_handler::{EventHandlerContext, HandlerRegistry, State},
    filter::EventFilter,
    logger::{DefaultLogger, Logger},
    models::{Block, DropBlock, StreamMessage},
    stream::BlockStream,
};
use async_trait::async_trait;
use std::{sync::Arc, time::Duration};
use tokio::sync::RwLock;

/// The main struct that processes blocks from a [`BlockStream`].
/// It processes blocks by calling a [`BlockHandler`] for each block
/// that has at least one event with an [`EventHandler`][crate::event_handler::EventHandler] registered.
/// It can be created using a builder pattern, where you can set the [`BlockHandler`],
/// retry intervals, and logger.
///
/// If you don't set a block handler explicitly, the processor will use a default handler
/// that simply calls [`EventProcessor::process_events`] on the block, without any custom logic.
pub struct BlockStreamProcessor<STREAM, DATALAKE>
where
    STREAM: BlockStream,
    DATALAKE: Datalake,
{
    block_processor: BlockProcessor<DATALAKE>,
    block_stream: STREAM,
    periodic_logging_joinhandle: Option<tokio::task::JoinHandle<()>>,
}

impl<STREAM, DATALAKE> BlockStreamProcessor<STREAM, DATALAKE>
where
    STREAM: BlockStream,
    DATALAKE: Datalake,
{
    /// Creates a new [`BlockStreamProcessor`] with the given
    /// [`BlockStream`] and datalake. The handler registry is taken
    /// from [`Datalake::handler_registry`].
    ///
    /// - The [`BlockHandler`] is set to a default handler that
    /// simply calls [`EventProcessor::process_events`] on the block, without
    /// any custom logic.
    ///
    /// - The default retry intervals for blocks and events are
    /// set to 10 seconds.
    ///
    /// - The logger is set to a default logger that logs to stdout.
    pub fn new(block_stream: STREAM, datalake: DATALAKE) -> Self {
        Self {
            block_stream,
            block_processor: BlockProcessor::new(datalake),
            periodic_logging_joinhandle: None,
        }
    }

    /// Sets the [`BlockHandler`] for the processor.
    /// This handler is called for each block that has at least one event which
    /// has event handlers registered.
    pub fn block_handler(self, block_handler: impl BlockHandler<DATALAKE> + 'static) -> Self {
        Self {
            block_processor: self.block_processor.block_handler(block_handler),
            ..self
        }
    }

    /// Sets the retry delay for blocks that fail to process and return a `BlockRetryError`
    /// (see [`crate::error::BlockHandlerError`]).
    pub fn block_retry_delay(self, block_retry_delay: Duration) -> Self {
        Self {
            block_processor: self.block_processor.block_retry_delay(block_retry_delay),
            ..self
        }
    }

    /// Sets the retry delay for events that fail to process and return an `EventRetryError`.
    /// (see [`crate::error::EventHandlerError`]).
    pub fn event_retry_delay(self, event_retry_delay: Duration) -> Self {
        Self {
            block_processor: self.block_processor.event_retry_delay(event_retry_delay),
            ..self
        }
    }

    /// Sets the logger for the processor. It should implement the [`Logger`] trait.
    pub fn logger(self, logger: impl Logger + 'static) -> Self {
        Self {
            block_processor: self.block_processor.logger(logger),
            ..self
        }
    }

    /// Sets the logger for the processor to the default logger, but with
    /// a custom report interval given by `interval`.
    pub fn default_logger_with_report_interval(self, interval: Duration) -> Self {
        Self {
            block_processor: self
                .block_processor
                .logger(DefaultLogger::with_custom_report_interval(interval)),
            ..self
        }
    }

    /// Disables logging for the processor by setting the logger to `None`.
    pub fn disable_logging(self) -> Self {
        Self {
            block_processor: self.block_processor.disable_logging(),
            ..self
        }
    }

    pub fn datalake(&self) -> &DATALAKE {
        &self.block_processor.datalake
    }

    pub fn into_datalake(self) -> DATALAKE {
        self.block_processor.datalake
    }

    /// Starts processing blocks from the [`BlockStream`].
    ///
    /// Processing resumes after the datalake's checkpoint, if it has one,
    /// and the checkpoint is saved after every block.
    pub async fn run(&mut self) -> Result<(), BlockProcessorError> {
        let checkpoint = self
            .block_processor
            .datalake
            .load_checkpoint()
            .await
            .map_err(BlockProcessorError::UnrecoverableError)?;
        if let Some(last_block) = checkpoint {
            log::info!("resuming after block {}", last_block);
            self.block_processor.resume_after(last_block);
        }
        let from_block = self.block_processor.start_block();
        let filter = self
            .block_processor
            .datalake
            .filter_for_block(from_block, true);
        // Start the block stream and get a receiver.
        // This often involves starting a task that fetches blocks
        // from a remote source and sends them to the receiver.
        let mut receiver = self
            .block_stream
            .start(from_block, filter)
            .await
            .map_err(BlockProcessorError::UnrecoverableError)?;
        let logger = self.block_processor.logger.clone();
        self.periodic_logging_joinhandle = if let Some(logger) = logger {
            let interval = logger.read().await.periodic_report_interval();
            Some(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(interval).await;
                    logger.read().await.periodic_report().await;
                }
            }))
        } else {
            None
        };
        let mut result = Ok(());
        while let Some(message) = receiver.recv().await {
            if let Err(err) = self.block_processor.process_message(&message).await {
                result = Err(err);
                break;
            }
            if let Err(err) = self.block_processor.save_checkpoint().await {
                result = Err(err);
                break;
            }
        }
        // If the transmitting half of the channel is dropped,
        // the receiver will return None and we will exit the loop.
        // The processor will exit gracefully.
        drop(receiver);
        self.block_stream.stop().await;
        if let Some(handle) = self.periodic_logging_joinhandle.take() {
            handle.abort();
        }
        result
    }
}

/// A default block handler that simply calls [`EventProcessor::process_events`]
/// on the block, without any custom logic.
#[derive(Clone)]
struct DefaultBlockHandler;

#[async_trait]
impl<STATE> BlockHandler<STATE> for DefaultBlockHandler
where
    STATE: State,
{
    async fn handle(
        &self,
        input: BlockHandlerContext<'_, STATE>,
    ) -> Result<(), BlockHandlerError> {
        input
            .event_processor
            .process_events(input.state, input.handler_registry, &mut ())
            .await?;
        Ok(())
    }
}

/// The [`EventProcessor`]'s only purpose is to have a convenience method to process events in a block.
/// The user calls [`EventProcessor::process_events`] when implementing a custom [`BlockHandler`].
/// It will iterate over the events in the block that pass the datalake's filter and call
/// the appropriate event handlers. Events without a handler are skipped.
/// It handles retries for events that fail to process, and calls logging hooks.
pub struct EventProcessor<'a> {
    event_retry_interval: Duration,
    block: &'a Block,
    filter: &'a EventFilter,
    logger: &'a Option<Arc<RwLock<Box<dyn Logger>>>>,
}

#[allow(non_camel_case_types)]
impl<'a> EventProcessor<'a> {
    pub async fn process_events<STATE: State, BLOCK_CONTEXT: Send + 'static>(
        &self,
        state: &mut STATE,
        handler_registry: &mut HandlerRegistry,
        block_context: &mut BLOCK_CONTEXT,
    ) -> Result<(), EventHandlerError> {
        for (event_index, event) in self.block.events.iter().enumerate() {
            if !self.filter.matches(event) || !handler_registry.handler_exists(event) {
                continue;
            }
            let Some(topic_0) = event.topic_0 else {
                continue;
            };
            let Some(event_handler) = handler_registry
                .handler::<STATE, BLOCK_CONTEXT>(event.contract, topic_0)
                .cloned()
            else {
                continue;
            };
            if let Some(logger) = self.logger {
                logger
                    .write()
                    .await
                    .receive_event(self.block, event, true, false)
                    .await;
            }
            while let Err(err) = event_handler
                .handle(EventHandlerContext {
                    state: &mut *state,
                    block: self.block,
                    event,
                    event_index: event_index as u32,
                    block_context: &mut *block_context,
                    handler_registry: &mut *handler_registry,
                })
                .await
            {
                match err {
                    EventHandlerError::EventRetryError(e) => {
                        if let Some(logger) = self.logger {
                            logger
                                .write()
                                .await
                                .event_retry_error(
                                    self.block,
                                    event,
                                    &e,
                                    self.event_retry_interval,
                                )
                                .await;
                        }
                        tokio::time::sleep(self.event_retry_interval).await;
                        if let Some(logger) = self.logger {
                            logger
                                .write()
                                .await
                                .receive_event(self.block, event, true, true)
                                .await;
                        }
                        continue;
                    }
                    _ => {
                        return Err(err);
                    }
                }
            }
            if let Some(logger) = self.logger {
                logger
                    .write()
                    .await
                    .finish_event(self.block, event, true)
                    .await;
            }
        }
        Ok(())
    }
}

/// Processes blocks and drop notices for one datalake, without owning a stream.
/// Useful on its own for feeding blocks by hand, for example in tests.
pub struct BlockProcessor<DATALAKE: Datalake> {
    pub logger: Option<Arc<RwLock<Box<dyn Logger>>>>,
    pub handler_registry: HandlerRegistry,
    pub block_handler: Box<dyn BlockHandler<DATALAKE>>,
    pub datalake: DATALAKE,
    pub block_retry_delay: Duration,
    pub event_retry_delay: Duration,
    highest_block_number: Option<u64>,
    /// Blocks below this were finished by a previous run.
    resume_block: Option<u64>,
}

impl<DATALAKE: Datalake> BlockProcessor<DATALAKE> {
    pub fn new(datalake: DATALAKE) -> Self {
        Self {
            logger: Some(Arc::new(RwLock::new(Box::<DefaultLogger>::default()))),
            handler_registry: datalake.handler_registry(),
            block_handler: Box::new(DefaultBlockHandler),
            block_retry_delay: Duration::from_secs(10),
            event_retry_delay: Duration::from_secs(10),
            datalake,
            highest_block_number: None,
            resume_block: None,
        }
    }

    /// Treats every block up to `last_block` as already processed.
    pub fn resume_after(&mut self, last_block: u64) {
        self.resume_block = Some(last_block.saturating_add(1));
        self.highest_block_number = Some(
            self.highest_block_number
                .map_or(last_block, |highest| highest.max(last_block)),
        );
    }

    /// The first block that will be processed.
    pub fn start_block(&self) -> u64 {
        let initial_block_number = self.datalake.properties().initial_block_number;
        self.resume_block
            .map_or(initial_block_number, |resume| resume.max(initial_block_number))
    }

    /// Saves the highest processed block as the datalake's checkpoint.
    pub async fn save_checkpoint(&mut self) -> Result<(), BlockProcessorError> {
        let Some(highest) = self.highest_block_number else {
            return Ok(());
        };
        if let Err(e) = self.datalake.save_checkpoint(highest).await {
            return Err(self.unrecoverable(e).await);
        }
        Ok(())
    }

    pub fn block_retry_delay(self, block_retry_delay: Duration) -> Self {
        Self {
            block_retry_delay,
            ..self
        }
    }

    pub fn event_retry_delay(self, event_retry_delay: Duration) -> Self {
        Self {
            event_retry_delay,
            ..self
        }
    }

    pub fn block_handler(self, block_handler: impl BlockHandler<DATALAKE> + 'static) -> Self {
        Self {
            block_handler: Box::new(block_handler),
            ..self
        }
    }

    pub fn logger(self, logger: impl Logger + 'static) -> Self {
        Self {
            logger: Some(Arc::new(RwLock::new(Box::new(logger)))),
            ..self
        }
    }

    pub fn disable_logging(self) -> Self {
        Self {
            logger: None,
            ..self
        }
    }

    pub fn datalake(&self) -> &DATALAKE {
        &self.datalake
    }

    pub fn datalake_mut(&mut self) -> &mut DATALAKE {
        &mut self.datalake
    }

    pub fn into_datalake(self) -> DATALAKE {
        self.datalake
    }

    async fn unrecoverable(&self, error: anyhow::Error) -> BlockProcessorError {
        if let Some(logger) = &self.logger {
            logger.write().await.unrecoverable_error(&error).await;
        }
        BlockProcessorError::UnrecoverableError(error)
    }

    pub async fn process_message(
        &mut self,
        message: &StreamMessage,
    ) -> Result<(), BlockProcessorError> {
        match message {
            StreamMessage::Block(block) => self.process_block(block).await,
            StreamMessage::DropBlock(drop) => self.drop_block(drop).await,
        }
    }

    pub async fn process_block(&mut self, block: &Block) -> Result<(), BlockProcessorError> {
        if block.number < self.start_block() {
            return Ok(());
        }
        let is_new_block = self
            .highest_block_number
            .map_or(true, |highest| block.number > highest);
        let filter = self.datalake.filter_for_block(block.number, is_new_block);

        // Find out if there are any events inside this block
        // that pass the filter and have a handler registered.
        let handling = block
            .events
            .iter()
            .any(|event| filter.matches(event) && self.handler_registry.handler_exists(event));

        if let Some(logger) = &self.logger {
            logger
                .write()
                .await
                .receive_block(block, handling, false)
                .await;
        }

        if handling {
            // Keep trying to handle the block in case
            // the handler requests this through a BlockHandlerError.
            while let Err(err) = self
                .block_handler
                .handle(BlockHandlerContext {
                    state: &mut self.datalake,
                    block,
                    event_processor: &mut EventProcessor {
                        event_retry_interval: self.event_retry_delay,
                        block,
                        filter: &filter,
                        logger: &self.logger,
                    },
                    handler_registry: &mut self.handler_registry,
                })
                .await
            {
                match err {
                    BlockHandlerError::BlockRetryError(e) => {
                        if let Some(logger) = &self.logger {
                            logger
                                .write()
                                .await
                                .block_retry_error(block, &e, self.block_retry_delay)
                                .await;
                        }
                        tokio::time::sleep(self.block_retry_delay).await;
                        if let Some(logger) = &self.logger {
                            logger
                                .write()
                                .await
                                .receive_block(block, handling, true)
                                .await;
                        }
                        continue;
                    }
                    BlockHandlerError::UnrecoverableError(e) => {
                        return Err(self.unrecoverable(e).await);
                    }
                }
            }
        }

        if let Err(e) = self.datalake.process_end_of_block(block).await {
            return Err(self.unrecoverable(e).await);
        }
        self.highest_block_number = Some(
            self.highest_block_number
                .map_or(block.number, |highest| highest.max(block.number)),
        );

        if let Some(logger) = &self.logger {
            logger
                .write()
                .await
                .finish_block(block, handling)
                .await;
        }
        Ok(())
    }

    /// Runs the datalake's drop hooks for a block that is no longer canonical.
    /// Reverting stored records is left to the store backing the datalake.
    pub async fn drop_block(&mut self, drop: &DropBlock) -> Result<(), BlockProcessorError> {
        if let Some(logger) = &self.logger {
            logger.write().await.drop_block(drop).await;
        }
        // The replacement of a block from a previous run is processed again.
        if let Some(resume) = self.resume_block {
            self.resume_block = Some(resume.min(drop.number));
        }
        if let Err(e) = self.datalake.process_before_drop_block(drop).await {
            return Err(self.unrecoverable(e).await);
        }
        if let Err(e) = self.datalake.process_after_drop_block(drop).await {
            return Err(self.unrecoverable(e).await);
        }
        Ok(())
    }

    pub async fn process_blocks(&mut self, blocks: &[Block]) -> Result<(), BlockProcessorError> {
        for block in blocks {
            self.process_block(block).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macros::{block_handler, event_handler};
    use crate::models::Event;
    use alloy_primitives::{Address, B256, U256};
    use alloy_sol_types::{sol, SolEvent};
    use std::sync::Mutex;

    sol! {
        event Ping(uint256 indexed id);
        event Pong(uint256 indexed id);
    }

    const CONTRACT: Address = Address::with_last_byte(0x42);

    #[derive(Default)]
    struct PingDatalake {
        pings: Vec<U256>,
        attempts: u32,
        fail_times: u32,
        fail_hard: bool,
        ended_blocks: Vec<u64>,
        hooks: Vec<String>,
        filter_calls: Mutex<Vec<(u64, bool)>>,
        blocks_seen_by_handler: u32,
        checkpoint: Option<u64>,
    }

    #[async_trait]
    impl Datalake for PingDatalake {
        fn properties(&self) -> crate::datalake::DatalakeProperties {
            crate::datalake::DatalakeProperties {
                id: "ping".to_string(),
                initial_block_number: 10,
            }
        }

        fn filter_for_block(&self, block_number: u64, is_new_block: bool) -> EventFilter {
            self.filter_calls
                .lock()
                .unwrap()
                .push((block_number, is_new_block));
            EventFilter::new(vec![CONTRACT], vec![Ping::SIGNATURE_HASH, Pong::SIGNATURE_HASH])
        }

        fn handler_registry(&self) -> HandlerRegistry {
            let mut registry = HandlerRegistry::new();
            registry.add_handler(CONTRACT, Ping::SIGNATURE_HASH, handle_ping);
            registry
        }

        async fn load_checkpoint(&self) -> Result<Option<u64>, anyhow::Error> {
            Ok(self.checkpoint)
        }

        async fn save_checkpoint(&mut self, block_number: u64) -> Result<(), anyhow::Error> {
            self.checkpoint = Some(block_number);
            Ok(())
        }

        async fn process_end_of_block(&mut self, block: &Block) -> Result<(), anyhow::Error> {
            self.ended_blocks.push(block.number);
            Ok(())
        }

        async fn process_before_drop_block(&mut self, drop: &DropBlock) -> Result<(), anyhow::Error> {
            self.hooks.push(format!("before {}", drop.number));
            Ok(())
        }

        async fn process_after_drop_block(&mut self, drop: &DropBlock) -> Result<(), anyhow::Error> {
            self.hooks.push(format!("after {}", drop.number));
            Ok(())
        }
    }

    #[event_handler]
    async fn handle_ping(
        context: EventHandlerContext<PingDatalake>,
        event: Ping,
    ) -> Result<(), EventHandlerError> {
        context.state.attempts += 1;
        if context.state.fail_hard {
            return Err(EventHandlerError::UnrecoverableError(anyhow::anyhow!(
                "broken"
            )));
        }
        if context.state.fail_times > 0 {
            context.state.fail_times -= 1;
            return Err(EventHandlerError::EventRetryError(anyhow::anyhow!(
                "flaky"
            )));
        }
        context.state.pings.push(event.id);
        Ok(())
    }

    #[block_handler]
    async fn counting_block_handler(
        context: BlockHandlerContext<PingDatalake>,
    ) -> Result<(), BlockHandlerError> {
        context.state.blocks_seen_by_handler += 1;
        context
            .event_processor
            .process_events(context.state, context.handler_registry, &mut ())
            .await?;
        Ok(())
    }

    fn ping(contract: Address, id: u64) -> Event {
        Event::from_log_data(
            contract,
            B256::with_last_byte(id as u8),
            id,
            Ping { id: U256::from(id) }.encode_log_data(),
        )
    }

    fn pong(id: u64) -> Event {
        Event::from_log_data(
            CONTRACT,
            B256::ZERO,
            id,
            Pong { id: U256::from(id) }.encode_log_data(),
        )
    }

    fn block(number: u64, events: Vec<Event>) -> Block {
        Block {
            number,
            events,
            ..Block::default()
        }
    }

    fn processor(datalake: PingDatalake) -> BlockProcessor<PingDatalake> {
        BlockProcessor::new(datalake)
            .disable_logging()
            .event_retry_delay(Duration::ZERO)
            .block_retry_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn dispatches_registered_topics_only() {
        let mut processor = processor(PingDatalake::default());
        processor
            .process_block(&block(
                10,
                vec![ping(CONTRACT, 1), pong(2), ping(Address::ZERO, 3), ping(CONTRACT, 4)],
            ))
            .await
            .unwrap();

        let datalake = processor.datalake();
        assert_eq!(datalake.pings, vec![U256::from(1), U256::from(4)]);
        assert_eq!(datalake.ended_blocks, vec![10]);
    }

    #[tokio::test]
    async fn skips_blocks_before_initial_block() {
        let mut processor = processor(PingDatalake::default());
        processor
            .process_blocks(&[block(9, vec![ping(CONTRACT, 1)]), block(11, vec![])])
            .await
            .unwrap();

        let datalake = processor.datalake();
        assert!(datalake.pings.is_empty());
        assert_eq!(datalake.ended_blocks, vec![11]);
    }

    #[tokio::test]
    async fn retries_event_until_it_succeeds() {
        let mut processor = processor(PingDatalake {
            fail_times: 2,
            ..PingDatalake::default()
        });
        processor
            .process_block(&block(10, vec![ping(CONTRACT, 1)]))
            .await
            .unwrap();

        let datalake = processor.datalake();
        assert_eq!(datalake.attempts, 3);
        assert_eq!(datalake.pings, vec![U256::from(1)]);
    }

    #[tokio::test]
    async fn unrecoverable_error_stops_processing() {
        let mut processor = processor(PingDatalake {
            fail_hard: true,
            ..PingDatalake::default()
        });
        let result = processor
            .process_block(&block(10, vec![ping(CONTRACT, 1)]))
            .await;

        assert!(matches!(result, Err(BlockProcessorError::UnrecoverableError(_))));
        assert!(processor.datalake().ended_blocks.is_empty());
    }

    #[tokio::test]
    async fn drop_runs_hooks_and_replay_is_not_new() {
        let mut processor = processor(PingDatalake::default());
        processor.process_block(&block(10, vec![])).await.unwrap();
        processor.process_block(&block(11, vec![])).await.unwrap();
        processor
            .process_message(&StreamMessage::DropBlock(DropBlock {
                number: 11,
                hash: B256::ZERO,
            }))
            .await
            .unwrap();
        processor.process_block(&block(11, vec![])).await.unwrap();
        processor.process_block(&block(12, vec![])).await.unwrap();

        let datalake = processor.datalake();
        assert_eq!(datalake.hooks, vec!["before 11", "after 11"]);
        assert_eq!(
            *datalake.filter_calls.lock().unwrap(),
            vec![(10, true), (11, true), (11, false), (12, true)]
        );
    }

    #[tokio::test]
    async fn custom_block_handler_wraps_event_processing() {
        let mut processor = processor(PingDatalake::default()).block_handler(counting_block_handler);
        processor
            .process_blocks(&[block(10, vec![ping(CONTRACT, 1)]), block(11, vec![pong(2)])])
            .await
            .unwrap();

        let datalake = processor.datalake();
        // The second block has nothing to handle, so the block handler is not called.
        assert_eq!(datalake.blocks_seen_by_handler, 1);
        assert_eq!(datalake.pings, vec![U256::from(1)]);
        assert_eq!(datalake.ended_blocks, vec![10, 11]);
    }

    #[cfg(feature = "channel")]
    #[tokio::test]
    async fn stream_processor_runs_until_channel_closes() {
        use crate::sources::channel::ChannelBlockStream;

        let (stream, sender) = ChannelBlockStream::new(16);
        let mut stream_processor =
            BlockStreamProcessor::new(stream, PingDatalake::default())
                .disable_logging()
                .event_retry_delay(Duration::ZERO);

        sender
            .send(block(10, vec![ping(CONTRACT, 5)]).into())
            .await
            .unwrap();
        sender
            .send(DropBlock { number: 10, hash: B256::ZERO }.into())
            .await
            .unwrap();
        drop(sender);

        stream_processor.run().await.unwrap();
        let datalake = stream_processor.into_datalake();
        assert_eq!(datalake.pings, vec![U256::from(5)]);
        assert_eq!(datalake.hooks, vec!["before 10", "after 10"]);
    }

    #[tokio::test]
    async fn resumed_processor_skips_finished_blocks_until_dropped() {
        let mut processor = processor(PingDatalake::default());
        processor.resume_after(11);
        assert_eq!(processor.start_block(), 12);

        processor
            .process_blocks(&[block(11, vec![ping(CONTRACT, 1)]), block(12, vec![ping(CONTRACT, 2)])])
            .await
            .unwrap();
        processor
            .drop_block(&DropBlock { number: 11, hash: B256::ZERO })
            .await
            .unwrap();
        processor
            .process_block(&block(11, vec![ping(CONTRACT, 3)]))
            .await
            .unwrap();

        let datalake = processor.datalake();
        assert_eq!(datalake.pings, vec![U256::from(2), U256::from(3)]);
        assert_eq!(
            *datalake.filter_calls.lock().unwrap(),
            vec![(12, true), (11, false)]
        );
    }

    #[cfg(feature = "channel")]
    #[tokio::test]
    async fn stream_processor_resumes_from_checkpoint() {
        use crate::sources::channel::ChannelBlockStream;

        let (stream, sender) = ChannelBlockStream::new(16);
        let mut stream_processor = BlockStreamProcessor::new(
            stream,
            PingDatalake {
                checkpoint: Some(10),
                ..PingDatalake::default()
            },
        )
        .disable_logging();

        for (number, id) in [(10, 1), (11, 2), (12, 3)] {
            sender
                .send(block(number, vec![ping(CONTRACT, id)]).into())
                .await
                .unwrap();
        }
        drop(sender);

        stream_processor.run().await.unwrap();
        let datalake = stream_processor.into_datalake();
        assert_eq!(datalake.pings, vec![U256::from(2), U256::from(3)]);
        assert_eq!(datalake.checkpoint, Some(12));
        assert_eq!(datalake.filter_calls.lock().unwrap()[0], (11, true));
    }
}
