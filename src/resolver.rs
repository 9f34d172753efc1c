//! Resolves the revision type of an inbound event from the static rule tables
use super::cashflow::{RevisionType, TradeEventAction, TradeEventType, TradeType};
use super::error::ResolutionFailure;
use super::rules::{COMMON_RULES, CashflowOrder, Rule, trade_type_rules};
use std::sync::LazyLock;
use tracing::trace;

static RESOLVER: LazyLock<RevisionTypeResolver> = LazyLock::new(RevisionTypeResolver::new);

/// Resolves against the process-wide rule sets.
pub fn resolve_revision_type(
    first_cashflow: bool,
    trade_type: TradeType,
    event_type: TradeEventType,
    event_action: TradeEventAction,
) -> Result<RevisionType, ResolutionFailure> {
    RESOLVER.resolve(first_cashflow, trade_type, event_type, event_action)
}

/// Rules of one trade type grouped by the cashflow order they apply to, in declaration order.
#[derive(Debug, Default)]
struct RuleSet {
    both: Vec<&'static Rule>,
    first: Vec<&'static Rule>,
    non_first: Vec<&'static Rule>,
}

impl RuleSet {
    fn grouped(rules: impl IntoIterator<Item = &'static Rule>) -> Self {
        let mut set = RuleSet::default();
        for rule in rules {
            match rule.order {
                CashflowOrder::Both => set.both.push(rule),
                CashflowOrder::First => set.first.push(rule),
                CashflowOrder::NonFirst => set.non_first.push(rule),
            }
        }
        set
    }

    /// Trade-type rules first, then the common rules.
    fn combined_with_common(trade_type: TradeType) -> Self {
        Self::grouped(trade_type_rules(trade_type).iter().chain(COMMON_RULES.iter()))
    }

    fn find(
        &self,
        first_cashflow: bool,
        event: TradeEventType,
        action: TradeEventAction,
    ) -> Option<&'static Rule> {
        first_match(&self.both, event, action).or_else(|| {
            let scoped = if first_cashflow {
                &self.first
            } else {
                &self.non_first
            };
            first_match(scoped, event, action)
        })
    }
}

fn first_match(
    rules: &[&'static Rule],
    event: TradeEventType,
    action: TradeEventAction,
) -> Option<&'static Rule> {
    rules.iter().copied().find(|rule| rule.matches(event, action))
}

/// Immutable rule sets for every trade type, built once.
#[derive(Debug)]
pub struct RevisionTypeResolver {
    common: RuleSet,
    fx_ndf: RuleSet,
    bond: RuleSet,
    repo: RuleSet,
    option: RuleSet,
}

impl RevisionTypeResolver {
    pub fn new() -> Self {
        Self {
            common: RuleSet::grouped(COMMON_RULES.iter()),
            fx_ndf: RuleSet::combined_with_common(TradeType::FxNdf),
            bond: RuleSet::combined_with_common(TradeType::Bond),
            repo: RuleSet::combined_with_common(TradeType::Repo),
            option: RuleSet::combined_with_common(TradeType::Option),
        }
    }

    pub fn resolve(
        &self,
        first_cashflow: bool,
        trade_type: TradeType,
        event_type: TradeEventType,
        event_action: TradeEventAction,
    ) -> Result<RevisionType, ResolutionFailure> {
        trace!(
            "Resolving revisionType. firstCashflow: {}, tradeType: {:?}, tradeEventType: {:?}, tradeEventAction: {:?}",
            first_cashflow, trade_type, event_type, event_action
        );

        self.rules_for(trade_type)
            .find(first_cashflow, event_type, event_action)
            .map(|rule| rule.result)
            .ok_or(ResolutionFailure {
                first_cashflow,
                trade_type,
                event_type,
                event_action,
            })
    }

    fn rules_for(&self, trade_type: TradeType) -> &RuleSet {
        match trade_type {
            TradeType::Payment | TradeType::Fx => &self.common,
            TradeType::FxNdf => &self.fx_ndf,
            TradeType::Bond => &self.bond,
            TradeType::Repo => &self.repo,
            TradeType::Option => &self.option,
        }
    }
}

impl Default for RevisionTypeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TradeEventAction::*;
    use TradeEventType::*;

    #[test]
    fn new_trade_on_first_version_is_new() {
        let result = resolve_revision_type(true, TradeType::Fx, NewTrade, Add);
        assert_eq!(result, Ok(RevisionType::New));
    }

    #[test]
    fn amend_depends_on_cashflow_order() {
        assert_eq!(
            resolve_revision_type(true, TradeType::Payment, Amend, Modify),
            Ok(RevisionType::New)
        );
        assert_eq!(
            resolve_revision_type(false, TradeType::Payment, Amend, Modify),
            Ok(RevisionType::Cor)
        );
        assert_eq!(
            resolve_revision_type(false, TradeType::Payment, Amend, Remove),
            Ok(RevisionType::Can)
        );
    }

    #[test]
    fn both_rules_apply_to_any_version() {
        for first in [true, false] {
            assert_eq!(
                resolve_revision_type(first, TradeType::Bond, Mature, Add),
                Ok(RevisionType::New)
            );
            assert_eq!(
                resolve_revision_type(first, TradeType::Option, Exercise, Add),
                Ok(RevisionType::New)
            );
        }
    }

    #[test]
    fn trade_type_rules_do_not_leak() {
        assert!(resolve_revision_type(false, TradeType::Fx, Roll, Add).is_err());
        assert_eq!(
            resolve_revision_type(false, TradeType::Repo, Roll, Add),
            Ok(RevisionType::Cor)
        );
        // REPO still sees the common rules
        assert_eq!(
            resolve_revision_type(false, TradeType::Repo, Cancel, Add),
            Ok(RevisionType::Can)
        );
    }

    #[test]
    fn cancel_on_first_version_fails() {
        let err = resolve_revision_type(true, TradeType::Fx, Cancel, Add).unwrap_err();

        assert_eq!(
            err,
            ResolutionFailure {
                first_cashflow: true,
                trade_type: TradeType::Fx,
                event_type: Cancel,
                event_action: Add,
            }
        );
    }
}
