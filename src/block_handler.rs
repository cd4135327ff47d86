/*!
The interface for a [`BlockHandler`].

A block handler wraps the processing of all events of a block. The
default handler simply calls [`EventProcessor::process_events`], but a
custom one can open a database transaction, pass it down to the event
handlers as the block context, and commit it once all events are handled.
The `#[block_handler]` macro turns an async function into a handler:

```ignore
#[block_handler]
async fn block_handler(
    context: BlockHandlerContext<YOUR_STATE>,
) -> Result<(), BlockHandlerError> {
    context
        .event_processor
        .process_events(context.state, context.handler_registry, &mut ())
        .await?;
    Ok(())
}
```
*/

use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::{
    error::BlockHandlerError,
    event_handler::{HandlerRegistry, State},
    models::Block,
    processor::EventProcessor,
};

#[async_trait]
pub trait BlockHandler<STATE>: DynClone + Send + Sync
where
    STATE: State,
{
    async fn handle(
        &self,
        context: BlockHandlerContext<'_, STATE>,
    ) -> Result<(), BlockHandlerError>;
}

impl<STATE> Clone for Box<dyn BlockHandler<STATE>>
where
    STATE: State,
{
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

/// A struct that holds the context for a block handler,
/// which is passed to the handler when it is called.
pub struct BlockHandlerContext<'a, STATE>
where
    STATE: State,
{
    pub state: &'a mut STATE,
    pub block: &'a Block,
    pub event_processor: &'a mut EventProcessor<'a>,
    pub handler_registry: &'a mut HandlerRegistry,
}
