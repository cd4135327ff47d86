/*!
The interface for an [`EventHandler`]

Event handlers are responsible for processing single event types.
We don't generally have to create a separate struct
and implement this trait for it manually, because we can use
the `#[event_handler]` macro to generate the
struct and implementation for us. It allows us to write
the handler as an async function, which is a bit more
ergonomic.

To use this macro, the handler function must conform to a predefined
signature.
An event handler function must:
- Be an async function
- Take a `context` parameter of type [`EventHandlerContext<YOUR_STATE>`]
- Take an `event` parameter of a type generated by `alloy_sol_types::sol!`
- Return a `Result<(), EventHandlerError>`

You can use the following template to create an event handler:

```ignore
// A macro from the crate which transforms the handler function
// into a representation that is usable for the framework.
#[event_handler]
// The function name is the name of your handler
async fn event_handler_name(
    // Context the handler will get from the framework.
    // This includes the current block, the raw event,
    // the global state, and the block context.
    context: EventHandlerContext<YOUR_STATE>,
    // The decoded event as declared in a `sol!` block.
    event: EVENT_STRUCT,
) -> Result<(), EventHandlerError> {
    // Handle the event here.

    // Possible errors to return:
    // Retry handling the current event
    return Err(EventHandlerError::EventRetryError(
        anyhow!("Retry event because of...")
    ));
    // Retry handling the current block
    return Err(EventHandlerError::BlockRetryError(
        anyhow!("Retry block because of...")
    ));
    // Stop the stream
    return Err(EventHandlerError::UnrecoverableError(
        anyhow!("Stream failed because of...")
    ));
    // Everything's ok!
    Ok(())
}
```

*/

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use dyn_clone::DynClone;
use std::{
    any::{Any, TypeId},
    collections::HashMap,
};

use crate::{
    error::EventHandlerError,
    models::{Block, Event},
};

/// A shorthand trait for a state type that can be used in event handlers.
/// It's used to enforce that the state type is Send + Sync + 'static without having
/// to write it out every time.
pub trait State: Send + Sync + 'static {}

// Implement the State trait for all types that are Send + Sync + 'static.
impl<T> State for T where T: Send + Sync + 'static {}

/// A type-erased registry of event handlers, keyed by the emitting contract
/// and the event's topic-0. It is not parametrized by the state and block
/// context types, which keeps the types that hold it simple.
/// It can only contain event handlers of one specific type, which is
/// implicitly determined by the first handler that is added to the registry.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<(Address, B256), Box<dyn Any + Send + Sync>>,
    type_id: Option<TypeId>,
}

#[allow(non_camel_case_types)]
impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a handler is registered for the event's contract and topic-0.
    /// Events without a topic-0 (anonymous events) never have a handler.
    pub fn handler_exists(&self, event: &Event) -> bool {
        match event.topic_0 {
            Some(topic_0) => {
                self.handlers.contains_key(&(event.contract, topic_0))
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Add an event handler to the registry.
    /// It is only possible to add handlers with the same signature.
    /// The signature is determined by the first handler that is added to the registry.
    /// Adding a second handler for the same key replaces the first.
    ///
    /// # Panics
    ///
    /// Panics if the added handler has a different signature than the
    /// handlers already in the registry.
    pub fn add_handler<STATE: State, BLOCK_CONTEXT: 'static>(
        &mut self,
        contract: Address,
        topic_0: B256,
        handler: impl EventHandler<STATE, BLOCK_CONTEXT> + 'static,
    ) {
        let type_id =
            TypeId::of::<Box<dyn EventHandler<STATE, BLOCK_CONTEXT>>>();
        match self.type_id {
            Some(existing_type_id) => {
                if existing_type_id != type_id {
                    panic!("HandlerRegistry already contains a handler with a different signature");
                }
            }
            None => {
                self.type_id = Some(type_id);
            }
        }
        let boxed: Box<dyn EventHandler<STATE, BLOCK_CONTEXT> + 'static> =
            Box::new(handler);
        self.handlers.insert((contract, topic_0), Box::new(boxed));
    }

    /// Get an event handler from the registry.
    /// The handler is downcast to the correct type.
    ///
    /// # Panics
    ///
    /// This function panics if the type parameters used to call it
    /// don't match the ones used to add the handler to the registry.
    #[allow(clippy::borrowed_box)]
    pub fn handler<STATE: State, BLOCK_CONTEXT: 'static>(
        &self,
        contract: Address,
        topic_0: B256,
    ) -> Option<&Box<dyn EventHandler<STATE, BLOCK_CONTEXT>>> {
        let type_id =
            TypeId::of::<Box<dyn EventHandler<STATE, BLOCK_CONTEXT>>>();

        // An empty registry has no signature yet, and nothing to return.
        if self.type_id.is_none() {
            return None;
        }
        if self.type_id != Some(type_id) {
            panic!("Trying to get handler with different signature than the ones stored in the registry");
        }

        self.handlers.get(&(contract, topic_0)).map(|handler| {
            handler
                .downcast_ref::<Box<dyn EventHandler<STATE, BLOCK_CONTEXT>>>()
                .expect("Failed to downcast handler")
        })
    }
}

/// A trait that abstracts an event handler.
#[allow(non_camel_case_types)]
#[async_trait]
pub trait EventHandler<STATE, BLOCK_CONTEXT>: DynClone + Send + Sync {
    async fn handle(
        &self,
        context: EventHandlerContext<'_, STATE, BLOCK_CONTEXT>,
    ) -> Result<(), EventHandlerError>;
}

#[allow(non_camel_case_types)]
impl<STATE, BLOCK_CONTEXT> Clone for Box<dyn EventHandler<STATE, BLOCK_CONTEXT>> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

/// A struct that holds the context for an event handler,
/// which is passed to the handler when it is called.
///
/// STATE: The global state of the application, usually the datalake.
/// BLOCK_CONTEXT: A type containing context of the current block, like
/// a database transaction handle. This is optional and defaults to the unit type.
#[allow(non_camel_case_types)]
pub struct EventHandlerContext<'a, STATE, BLOCK_CONTEXT = ()> {
    /// The global state.
    pub state: &'a mut STATE,
    /// The block the event belongs to.
    pub block: &'a Block,
    /// Raw event data coming from the stream.
    pub event: &'a Event,
    /// Zero-based index of the event in the block.
    pub event_index: u32,
    /// Context of the current block, like a database transaction handle.
    pub block_context: &'a mut BLOCK_CONTEXT,
    /// Handler registry of event handlers.
    pub handler_registry: &'a mut HandlerRegistry,
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::{sol, SolEvent};

    use crate::macros::event_handler;

    use super::*;

    struct TestState;
    struct TestState2;

    sol! {
        event Ping(uint256 indexed id);
        event Pong(uint256 indexed id);
    }

    #[event_handler]
    async fn test_handler(
        context: EventHandlerContext<TestState>,
        event: Ping,
    ) -> Result<(), EventHandlerError> {
        Ok(())
    }

    #[event_handler]
    async fn test_handler2(
        context: EventHandlerContext<TestState2>,
        event: Pong,
    ) -> Result<(), EventHandlerError> {
        Ok(())
    }

    fn event(contract: Address, topic_0: B256) -> Event {
        Event {
            contract,
            topic_0: Some(topic_0),
            ..Event::default()
        }
    }

    #[test]
    fn add_and_retrieve_handler() {
        let mut registry = HandlerRegistry::new();
        registry.add_handler(Address::ZERO, Ping::SIGNATURE_HASH, test_handler);

        let handler = registry
            .handler::<TestState, ()>(Address::ZERO, Ping::SIGNATURE_HASH);
        assert!(handler.is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    #[should_panic]
    fn add_handler_of_different_type() {
        let mut registry = HandlerRegistry::new();
        registry.add_handler(Address::ZERO, Ping::SIGNATURE_HASH, test_handler);

        registry.add_handler(Address::ZERO, Pong::SIGNATURE_HASH, test_handler2);
    }

    #[test]
    #[should_panic]
    fn get_handler_as_different_type() {
        let mut registry = HandlerRegistry::new();
        registry.add_handler(Address::ZERO, Ping::SIGNATURE_HASH, test_handler);

        registry.handler::<TestState2, ()>(Address::ZERO, Ping::SIGNATURE_HASH);
    }

    #[test]
    fn empty_registry_has_no_handlers() {
        let registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry
            .handler::<TestState, ()>(Address::ZERO, Ping::SIGNATURE_HASH)
            .is_none());
    }

    #[test]
    fn test_handler_exists() {
        let mut registry = HandlerRegistry::new();
        registry.add_handler(Address::ZERO, Ping::SIGNATURE_HASH, test_handler);

        assert!(registry.handler_exists(&event(Address::ZERO, Ping::SIGNATURE_HASH)));
        assert!(!registry.handler_exists(&event(Address::ZERO, Pong::SIGNATURE_HASH)));
        assert!(!registry.handler_exists(&event(
            Address::with_last_byte(1),
            Ping::SIGNATURE_HASH
        )));
        assert!(!registry.handler_exists(&Event::default()));
    }
}
