//! Decodes raw logs into typed `sol!` events.

use alloy_sol_types::{SolEvent, TopicList};
use anyhow::Context;

use crate::models::Event;

/// Decodes `event` as `E`, validating the signature hash.
///
/// Only the topics present on the log are handed to the decoder, so a log
/// whose indexed-topic arity differs from the event definition fails to
/// decode instead of silently reading a wrong slot.
pub fn decode_event<E: SolEvent>(event: &Event) -> Result<E, anyhow::Error> {
    let topics = event.topics();
    if topics.len() != <E::TopicList as TopicList>::COUNT {
        anyhow::bail!(
            "expected {} topics for {}, log {}#{} has {}",
            <E::TopicList as TopicList>::COUNT,
            E::SIGNATURE,
            event.tx_hash,
            event.log_index,
            topics.len()
        );
    }
    E::decode_raw_log(topics, &event.log_data, true).with_context(|| {
        format!(
            "failed to decode {} from log {}#{}",
            E::SIGNATURE,
            event.tx_hash,
            event.log_index
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Address, B256, U256};
    use alloy_sol_types::sol;

    sol! {
        #[derive(Debug, PartialEq)]
        event Transfer(address indexed src, address indexed dst, uint256 wad);
        #[derive(Debug, PartialEq)]
        event Deposit(address indexed dst, uint256 wad);
    }

    const CONTRACT: Address = address!("fFf9976782d46CC05630D1f6eBAb18b2324d6B14");

    #[test]
    fn decode_transfer() {
        let transfer = Transfer {
            src: address!("E67ddd0Ef25BC9d6A2A55b4b5946140B9e570121"),
            dst: Address::with_last_byte(2),
            wad: U256::from(1_000_000u64),
        };
        let event = Event::from_log_data(
            CONTRACT,
            B256::ZERO,
            0,
            transfer.encode_log_data(),
        );

        let decoded: Transfer = decode_event(&event).unwrap();
        assert_eq!(decoded, transfer);
    }

    #[test]
    fn decode_fails_on_wrong_signature() {
        let deposit = Deposit {
            dst: Address::with_last_byte(1),
            wad: U256::from(5),
        };
        let mut event = Event::from_log_data(
            CONTRACT,
            B256::ZERO,
            0,
            deposit.encode_log_data(),
        );
        event.topic_0 = Some(B256::with_last_byte(0xaa));

        assert!(decode_event::<Deposit>(&event).is_err());
    }

    #[test]
    fn decode_fails_on_topic_arity_mismatch() {
        let deposit = Deposit {
            dst: Address::with_last_byte(1),
            wad: U256::from(5),
        };
        let mut event = Event::from_log_data(
            CONTRACT,
            B256::ZERO,
            0,
            deposit.encode_log_data(),
        );
        event.topic_2 = Some(B256::with_last_byte(3));

        assert!(decode_event::<Deposit>(&event).is_err());
    }
}
