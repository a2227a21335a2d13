//! Property tests for the identifier codec and claim semantics.

use pagebridge::{compose, decode, CorrelationError, CorrelationService, LogicalId, Message};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9]{1,8}"
}

proptest! {
    #[test]
    fn decode_is_deterministic(raw in "[a-z0-9_]{0,24}") {
        let first = decode(&raw);
        let second = decode(&raw);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn decode_drops_first_and_last_segment(
        role in segment(),
        middle in prop::collection::vec(segment(), 1..5),
        seq in segment(),
    ) {
        let raw = format!("{}_{}_{}", role, middle.join("_"), seq);
        let id = decode(&raw).unwrap();
        prop_assert_eq!(id.as_str(), middle.join("_"));
    }

    #[test]
    fn decode_rejects_fewer_than_three_segments(parts in prop::collection::vec(segment(), 0..3)) {
        let raw = parts.join("_");
        let is_malformed = matches!(
            decode(&raw),
            Err(CorrelationError::MalformedIdentifier { .. })
        );
        prop_assert!(is_malformed);
    }

    #[test]
    fn compose_round_trips(role in segment(), id in "[a-z0-9]{1,6}(_[a-z0-9]{1,6}){0,3}", seq in any::<u64>()) {
        let id = LogicalId::new(id);
        prop_assert_eq!(decode(&compose(&role, &id, seq)).unwrap(), id);
    }

    #[test]
    fn last_ingest_wins(kinds in prop::collection::vec("[A-Z][a-z]{2,6}", 1..6)) {
        let service = CorrelationService::new();
        for (seq, kind) in kinds.iter().enumerate() {
            service
                .ingest(Message::new(kind.clone()).with_field("Identifier", format!("req_x_{seq}")))
                .unwrap();
        }
        let id = LogicalId::new("x");
        let last = kinds.last().unwrap();
        let claim = service.claim(&id, last).unwrap();
        prop_assert!(claim.is_some());
        prop_assert!(service.claim(&id, last).unwrap().is_none());
    }
}
