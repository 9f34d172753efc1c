//! Smoke screen unit tests for the cashflow consumer components
//!
//! Happy-path checks that span the public API: identifiers, inbound event
//! mapping, rule tables and error codes, each exercised in isolation from the
//! versioning scenarios.

use cashflow_consumer::cashflow::{
    CashflowDraft, InputBy, PayOrReceive, TradeEventAction, TradeEventType, TradeType,
    TransactionType,
};
use cashflow_consumer::error::{CashflowError, SubCategory};
use cashflow_consumer::event::InboundEvent;
use cashflow_consumer::utils::new_uuid_to_bech32;
use rust_decimal_macros::dec;

const EVENT_JSON: &str = r#"{
    "cashflowID": 42,
    "cashflowVersion": 1,
    "tradeID": 777,
    "tradeVersion": 1,
    "tradeType": "FX",
    "tradeEventType": "NEW_TRADE",
    "tradeEventAction": "ADD",
    "transactionType": "INTER_BOOK",
    "bookCode": "FXBOOK",
    "counterBookCode": "FXBOOK2",
    "rate": "1.08456789012345",
    "valueDate": "2024-09-30",
    "entityCode": "ENT1",
    "counterpartyCode": "CPTY9",
    "amount": "5000000.115",
    "payOrReceive": "PAY",
    "currCode": "eur"
}"#;

// UTILS MODULE TESTS
mod utils_tests {
    use super::*;

    #[test]
    fn generates_valid_bech32_with_hrp() {
        let encoded = new_uuid_to_bech32("rej_").unwrap();
        assert!(encoded.starts_with("rej_1"));
        assert!(encoded.len() > 10);
    }

    #[test]
    fn handles_empty_hrp() {
        assert!(new_uuid_to_bech32("").is_err());
    }

    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("rcpt_").unwrap();
        let id2 = new_uuid_to_bech32("rcpt_").unwrap();
        assert_ne!(id1, id2);
    }
}

// EVENT MAPPING TESTS
mod event_tests {
    use super::*;

    #[test]
    fn decodes_wire_event() {
        let event: InboundEvent = serde_json::from_str(EVENT_JSON).unwrap();

        assert_eq!(event.fo_cashflow_id, 42);
        assert_eq!(event.trade_type, TradeType::Fx);
        assert_eq!(event.trade_event_type, TradeEventType::NewTrade);
        assert_eq!(event.trade_event_action, TradeEventAction::Add);
        assert_eq!(event.transaction_type, TransactionType::InterBook);
        assert_eq!(event.pay_or_receive, PayOrReceive::Pay);
        assert_eq!(event.secondary_ledger_account, None);
    }

    #[test]
    fn maps_inter_book_pay_event() {
        let event: InboundEvent = serde_json::from_str(EVENT_JSON).unwrap();

        let draft = CashflowDraft::from_event(&event).unwrap();
        assert_eq!(draft.curr_code(), Some("EUR"));
        assert_eq!(draft.revision_type(), None);

        // identity and revision type are assigned later
        let record = draft
            .set_revision_type(cashflow_consumer::RevisionType::New)
            .set_cashflow_id(1)
            .set_cashflow_version(1)
            .set_latest(true)
            .build()
            .unwrap();

        assert_eq!(record.amount.0, dec!(-5000000.11));
        assert_eq!(record.rate.0, dec!(1.0845678901));
        assert_eq!(record.counter_book_code.as_deref(), Some("FXBOOK2"));
        assert_eq!(record.input_by, InputBy::System);
    }

    #[test]
    fn counter_book_is_dropped_outside_inter_book() {
        let mut event: InboundEvent = serde_json::from_str(EVENT_JSON).unwrap();
        event.transaction_type = TransactionType::Client;

        let record = CashflowDraft::from_event(&event)
            .unwrap()
            .set_revision_type(cashflow_consumer::RevisionType::New)
            .set_cashflow_id(1)
            .set_cashflow_version(1)
            .set_latest(true)
            .build()
            .unwrap();

        assert_eq!(record.counter_book_code, None);
    }

    #[test]
    fn rejects_bad_events() {
        let mut event: InboundEvent = serde_json::from_str(EVENT_JSON).unwrap();
        event.counter_book_code = None;
        let err = CashflowDraft::from_event(&event).unwrap_err();
        assert_eq!(err.sub_category(), SubCategory::InvalidMessage);

        let mut event: InboundEvent = serde_json::from_str(EVENT_JSON).unwrap();
        event.fo_cashflow_version = -1;
        assert!(matches!(
            CashflowDraft::from_event(&event),
            Err(CashflowError::InvalidFoVersion(-1))
        ));

        let mut event: InboundEvent = serde_json::from_str(EVENT_JSON).unwrap();
        event.curr_code = "  ".into();
        assert!(matches!(
            CashflowDraft::from_event(&event),
            Err(CashflowError::InvalidMessage { field: "currCode", .. })
        ));
    }

    #[test]
    fn digest_is_stable() {
        let a: InboundEvent = serde_json::from_str(EVENT_JSON).unwrap();
        let mut b = a.clone();

        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert_eq!(a.digest().unwrap().len(), 64);

        b.trade_version = 2;
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }
}

// ERROR CODE TESTS
mod error_tests {
    use super::*;

    #[test]
    fn sub_category_codes() {
        assert_eq!(SubCategory::TradeIdMismatch.code(), "TRADEID_MISMATCH");
        assert_eq!(
            SubCategory::IncorrectRevisionType.code(),
            "INCORRECT_CF_REVISION_TYPE"
        );
        assert_eq!(
            SubCategory::InactiveCounterparty.code(),
            "INACTIVE_COUNTERPARTY_CODE"
        );
        assert_eq!(SubCategory::NotFirstVersion.code(), "NOT_FIRST_VERSION");
    }
}
