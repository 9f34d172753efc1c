//! Property-based tests for revision type resolution
//!
//! The resolver is checked against an independently written decision table
//! covering every (trade type, first cashflow, event, action) combination.
//! Anything the table does not list must fail with the inputs echoed back.

use cashflow_consumer::cashflow::{RevisionType, TradeEventAction, TradeEventType, TradeType};
use cashflow_consumer::resolve_revision_type;
use cashflow_consumer::resolver::RevisionTypeResolver;
use proptest::prelude::*;

fn trade_type_strategy() -> impl Strategy<Value = TradeType> {
    prop_oneof![
        Just(TradeType::Payment),
        Just(TradeType::Fx),
        Just(TradeType::FxNdf),
        Just(TradeType::Bond),
        Just(TradeType::Repo),
        Just(TradeType::Option),
    ]
}

fn event_type_strategy() -> impl Strategy<Value = TradeEventType> {
    use TradeEventType::*;
    prop_oneof![
        Just(NewTrade),
        Just(Rebook),
        Just(Amend),
        Just(Correction),
        Just(BookMove),
        Just(Cancel),
        Just(Roll),
        Just(Terminate),
        Just(Fix),
        Just(UnFix),
        Just(Exercise),
        Just(KnockOut),
        Just(Expire),
        Just(InterestAction),
        Just(Mature),
    ]
}

fn event_action_strategy() -> impl Strategy<Value = TradeEventAction> {
    prop_oneof![
        Just(TradeEventAction::Add),
        Just(TradeEventAction::Modify),
        Just(TradeEventAction::Remove),
    ]
}

/// Expected outcome, written out case by case.
fn expected(
    first: bool,
    trade_type: TradeType,
    event: TradeEventType,
    action: TradeEventAction,
) -> Option<RevisionType> {
    use RevisionType::*;
    use TradeEventAction::*;
    use TradeEventType::*;

    // trade-type rules that ignore the cashflow order
    match (trade_type, event, action) {
        (TradeType::Bond, InterestAction | Mature, Add) => return Some(New),
        (TradeType::FxNdf, Fix, Add) => return Some(New),
        (TradeType::Option, Exercise, Add) => return Some(New),
        _ => {}
    }

    if first {
        return match (event, action) {
            (NewTrade | Rebook, Add) => Some(New),
            (Amend | Correction, Add | Modify) => Some(New),
            _ => None,
        };
    }

    match (trade_type, event, action) {
        (TradeType::Repo, Roll | Terminate, Add) => return Some(Cor),
        (TradeType::FxNdf, UnFix, Add) => return Some(Can),
        (TradeType::Option, KnockOut | Expire, Add) => return Some(Can),
        _ => {}
    }

    match (event, action) {
        (Amend | Correction | BookMove, Add | Modify) => Some(Cor),
        (Cancel, Add) => Some(Can),
        (Amend | Correction, Remove) => Some(Can),
        _ => None,
    }
}

proptest! {
    #[test]
    fn resolves_exactly_the_decision_table(
        first in any::<bool>(),
        trade_type in trade_type_strategy(),
        event in event_type_strategy(),
        action in event_action_strategy(),
    ) {
        let result = resolve_revision_type(first, trade_type, event, action);

        match expected(first, trade_type, event, action) {
            Some(revision_type) => prop_assert_eq!(result, Ok(revision_type)),
            None => {
                let failure = result.unwrap_err();
                prop_assert_eq!(failure.first_cashflow, first);
                prop_assert_eq!(failure.trade_type, trade_type);
                prop_assert_eq!(failure.event_type, event);
                prop_assert_eq!(failure.event_action, action);
            }
        }
    }

    #[test]
    fn shared_and_fresh_resolvers_agree(
        first in any::<bool>(),
        trade_type in trade_type_strategy(),
        event in event_type_strategy(),
        action in event_action_strategy(),
    ) {
        let fresh = RevisionTypeResolver::new();
        prop_assert_eq!(
            fresh.resolve(first, trade_type, event, action),
            resolve_revision_type(first, trade_type, event, action)
        );
    }

    #[test]
    fn new_is_never_resolved_for_common_events_on_later_versions(
        trade_type in trade_type_strategy(),
        event in event_type_strategy(),
        action in event_action_strategy(),
    ) {
        let both_rule = matches!(
            (trade_type, event, action),
            (TradeType::Bond, TradeEventType::InterestAction | TradeEventType::Mature, TradeEventAction::Add)
                | (TradeType::FxNdf, TradeEventType::Fix, TradeEventAction::Add)
                | (TradeType::Option, TradeEventType::Exercise, TradeEventAction::Add)
        );
        prop_assume!(!both_rule);

        let result = resolve_revision_type(false, trade_type, event, action);
        prop_assert_ne!(result, Ok(RevisionType::New));
    }
}

#[test]
fn every_combination_is_covered() {
    let trade_types = [
        TradeType::Payment,
        TradeType::Fx,
        TradeType::FxNdf,
        TradeType::Bond,
        TradeType::Repo,
        TradeType::Option,
    ];
    let mut resolved = 0;
    let mut failed = 0;

    for trade_type in trade_types {
        for first in [true, false] {
            for event in all_events() {
                for action in [
                    TradeEventAction::Add,
                    TradeEventAction::Modify,
                    TradeEventAction::Remove,
                ] {
                    let result = resolve_revision_type(first, trade_type, event, action);
                    assert_eq!(
                        result.as_ref().ok().copied(),
                        expected(first, trade_type, event, action),
                        "{trade_type:?} first={first} {event:?}/{action:?}"
                    );
                    if result.is_ok() {
                        resolved += 1;
                    } else {
                        failed += 1;
                    }
                }
            }
        }
    }

    assert_eq!(resolved + failed, 6 * 2 * 15 * 3);
    assert!(resolved > 0 && failed > 0);
}

fn all_events() -> [TradeEventType; 15] {
    use TradeEventType::*;
    [
        NewTrade,
        Rebook,
        Amend,
        Correction,
        BookMove,
        Cancel,
        Roll,
        Terminate,
        Fix,
        UnFix,
        Exercise,
        KnockOut,
        Expire,
        InterestAction,
        Mature,
    ]
}
