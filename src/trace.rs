//! Call traces of transactions.
//!
//! A log only says which contract emitted it. To know who actually
//! called a token, the datalakes look at the internal calls of the
//! transaction that emitted the log.

use alloy_primitives::{fixed_bytes, Address, Selector, B256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Selector of `transferFrom(address,address,uint256)`.
pub const TRANSFER_FROM_SELECTOR: Selector = fixed_bytes!("23b872dd");

/// One call made during a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFrame {
    /// `CALL`, `STATICCALL`, `DELEGATECALL`, `CREATE`, ...
    pub op_code: String,
    /// The callee.
    pub contract: Address,
    /// First four bytes of the call input, if it has that many.
    pub sig_hash: Option<Selector>,
    /// The caller, i.e. `msg.sender` inside the callee.
    pub sender: Address,
}

/// Returns the calls of a transaction, depth-first in execution order.
#[async_trait]
pub trait CallTraceSource: Send + Sync {
    async fn transaction_calls(&self, tx_hash: B256) -> Result<Vec<CallFrame>, anyhow::Error>;
}

/// The caller of the first `transferFrom` made on `token`, if any.
pub fn find_transfer_from_sender(frames: &[CallFrame], token: Address) -> Option<Address> {
    frames
        .iter()
        .find(|frame| {
            frame.op_code == "CALL"
                && frame.contract == token
                && frame.sig_hash == Some(TRANSFER_FROM_SELECTOR)
        })
        .map(|frame| frame.sender)
}

#[cfg(feature = "rpc")]
pub use self::rpc::RpcCallTracer;

#[cfg(feature = "rpc")]
mod rpc {
    use super::*;
    use crate::rpc::{http_provider, HttpProvider};
    use alloy_provider::ext::DebugApi;
    use alloy_rpc_types_trace::geth::{
        CallFrame as GethCallFrame, GethDebugBuiltInTracerType, GethDebugTracerType,
        GethDebugTracingOptions, GethTrace,
    };
    use anyhow::bail;

    pub(super) fn flatten(frame: GethCallFrame, frames: &mut Vec<CallFrame>) {
        frames.push(CallFrame {
            op_code: frame.typ,
            contract: frame.to.unwrap_or_default(),
            sig_hash: frame.input.get(..4).map(Selector::from_slice),
            sender: frame.from,
        });
        for call in frame.calls {
            flatten(call, frames);
        }
    }

    /// Looks up call traces with `debug_traceTransaction` and geth's
    /// built-in `callTracer`. The node must expose the `debug` namespace.
    #[derive(Debug, Clone)]
    pub struct RpcCallTracer {
        provider: HttpProvider,
    }

    impl RpcCallTracer {
        pub fn new(provider: HttpProvider) -> Self {
            Self { provider }
        }

        pub fn connect(rpc_url: &str, api_key: Option<&str>) -> Result<Self, anyhow::Error> {
            Ok(Self::new(http_provider(rpc_url, api_key)?))
        }
    }

    #[async_trait]
    impl CallTraceSource for RpcCallTracer {
        async fn transaction_calls(
            &self,
            tx_hash: B256,
        ) -> Result<Vec<CallFrame>, anyhow::Error> {
            let options = GethDebugTracingOptions::default().with_tracer(
                GethDebugTracerType::BuiltInTracer(GethDebugBuiltInTracerType::CallTracer),
            );
            let root = match self.provider.debug_trace_transaction(tx_hash, options).await? {
                GethTrace::CallTracer(frame) => frame,
                other => bail!("Expected a call trace for {}, got {:?}", tx_hash, other),
            };
            let mut frames = Vec::new();
            flatten(root, &mut frames);
            Ok(frames)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, keccak256};

    const TOKEN: Address = address!("fFf9976782d46CC05630D1f6eBAb18b2324d6B14");
    const ROUTER: Address = address!("3fC91A3afd70395Cd496C647d5a6CC9D4B2b7FAD");

    fn frame(op_code: &str, contract: Address, sig_hash: Option<Selector>, sender: Address) -> CallFrame {
        CallFrame {
            op_code: op_code.to_string(),
            contract,
            sig_hash,
            sender,
        }
    }

    #[test]
    fn selector_matches_signature() {
        let hash = keccak256("transferFrom(address,address,uint256)");
        assert_eq!(&hash[..4], TRANSFER_FROM_SELECTOR.as_slice());
    }

    #[test]
    fn finds_first_matching_call() {
        let frames = vec![
            frame("CALL", ROUTER, Some(fixed_bytes!("12345678")), Address::with_last_byte(1)),
            frame("STATICCALL", TOKEN, Some(TRANSFER_FROM_SELECTOR), Address::with_last_byte(2)),
            frame("CALL", Address::ZERO, Some(TRANSFER_FROM_SELECTOR), Address::with_last_byte(3)),
            frame("CALL", TOKEN, Some(TRANSFER_FROM_SELECTOR), ROUTER),
            frame("CALL", TOKEN, Some(TRANSFER_FROM_SELECTOR), Address::with_last_byte(5)),
        ];
        assert_eq!(find_transfer_from_sender(&frames, TOKEN), Some(ROUTER));
    }

    #[test]
    fn no_matching_call() {
        let frames = vec![frame("CALL", TOKEN, None, ROUTER)];
        assert_eq!(find_transfer_from_sender(&frames, TOKEN), None);
        assert_eq!(find_transfer_from_sender(&[], TOKEN), None);
    }

    #[cfg(feature = "rpc")]
    #[test]
    fn flattens_tracer_output_depth_first() {
        use alloy_primitives::{bytes, Bytes};
        use alloy_rpc_types_trace::geth::CallFrame as GethCallFrame;

        fn geth_frame(
            typ: &str,
            from: Address,
            to: Option<Address>,
            input: Bytes,
            calls: Vec<GethCallFrame>,
        ) -> GethCallFrame {
            GethCallFrame {
                typ: typ.to_string(),
                from,
                to,
                input,
                calls,
                ..GethCallFrame::default()
            }
        }

        let root = geth_frame(
            "CALL",
            Address::with_last_byte(0xaa),
            Some(ROUTER),
            bytes!("3593564c"),
            vec![
                geth_frame(
                    "CALL",
                    ROUTER,
                    Some(TOKEN),
                    bytes!("23b872dd000000000000000000000000e67ddd0ef25bc9d6a2a55b4b5946140b9e570121"),
                    vec![geth_frame(
                        "STATICCALL",
                        TOKEN,
                        Some(Address::with_last_byte(1)),
                        Bytes::new(),
                        vec![],
                    )],
                ),
                geth_frame("CREATE", ROUTER, None, bytes!("6080"), vec![]),
            ],
        );

        let mut frames = Vec::new();
        rpc::flatten(root, &mut frames);

        let op_codes: Vec<&str> = frames.iter().map(|f| f.op_code.as_str()).collect();
        assert_eq!(op_codes, vec!["CALL", "CALL", "STATICCALL", "CREATE"]);
        assert_eq!(frames[2].sig_hash, None);
        assert_eq!(frames[3].sig_hash, None);
        assert_eq!(frames[3].contract, Address::ZERO);
        assert_eq!(find_transfer_from_sender(&frames, TOKEN), Some(ROUTER));
    }
}
