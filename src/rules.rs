//! Static revision-type rule tables.
//!
//! Declaration order matters: within a rule set the first rule with a matching
//! `(event, action)` pair wins, and trade-type rules are scanned before the common ones.
use super::cashflow::{RevisionType, TradeEventAction, TradeEventType, TradeType};
use RevisionType::{Can, Cor, New};
use TradeEventAction::{Add, Modify, Remove};

/// Which FO cashflow versions a rule applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CashflowOrder {
    First,
    NonFirst,
    Both,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventMatcher {
    pub event: TradeEventType,
    pub action: TradeEventAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rule {
    /// `None` applies to every trade type.
    pub trade_type: Option<TradeType>,
    pub result: RevisionType,
    pub order: CashflowOrder,
    pub matchers: &'static [EventMatcher],
}

impl Rule {
    pub fn matches(&self, event: TradeEventType, action: TradeEventAction) -> bool {
        self.matchers
            .iter()
            .any(|m| m.event == event && m.action == action)
    }
}

const fn on(event: TradeEventType, action: TradeEventAction) -> EventMatcher {
    EventMatcher { event, action }
}

pub const COMMON_RULES: &[Rule] = &[
    Rule {
        trade_type: None,
        result: New,
        order: CashflowOrder::First,
        matchers: &[
            on(TradeEventType::NewTrade, Add),
            on(TradeEventType::Rebook, Add),
            on(TradeEventType::Amend, Add),
            on(TradeEventType::Amend, Modify),
            on(TradeEventType::Correction, Add),
            on(TradeEventType::Correction, Modify),
        ],
    },
    Rule {
        trade_type: None,
        result: Cor,
        order: CashflowOrder::NonFirst,
        matchers: &[
            on(TradeEventType::Amend, Add),
            on(TradeEventType::Amend, Modify),
            on(TradeEventType::BookMove, Add),
            on(TradeEventType::BookMove, Modify),
            on(TradeEventType::Correction, Add),
            on(TradeEventType::Correction, Modify),
        ],
    },
    Rule {
        trade_type: None,
        result: Can,
        order: CashflowOrder::NonFirst,
        matchers: &[
            on(TradeEventType::Cancel, Add),
            on(TradeEventType::Amend, Remove),
            on(TradeEventType::Correction, Remove),
        ],
    },
];

pub const BOND_RULES: &[Rule] = &[Rule {
    trade_type: Some(TradeType::Bond),
    result: New,
    order: CashflowOrder::Both,
    matchers: &[
        on(TradeEventType::InterestAction, Add),
        on(TradeEventType::Mature, Add),
    ],
}];

pub const REPO_RULES: &[Rule] = &[Rule {
    trade_type: Some(TradeType::Repo),
    result: Cor,
    order: CashflowOrder::NonFirst,
    matchers: &[
        on(TradeEventType::Roll, Add),
        on(TradeEventType::Terminate, Add),
    ],
}];

pub const FX_NDF_RULES: &[Rule] = &[
    Rule {
        trade_type: Some(TradeType::FxNdf),
        result: New,
        order: CashflowOrder::Both,
        matchers: &[on(TradeEventType::Fix, Add)],
    },
    Rule {
        trade_type: Some(TradeType::FxNdf),
        result: Can,
        order: CashflowOrder::NonFirst,
        matchers: &[on(TradeEventType::UnFix, Add)],
    },
];

pub const OPTION_RULES: &[Rule] = &[
    Rule {
        trade_type: Some(TradeType::Option),
        result: New,
        order: CashflowOrder::Both,
        matchers: &[on(TradeEventType::Exercise, Add)],
    },
    Rule {
        trade_type: Some(TradeType::Option),
        result: Can,
        order: CashflowOrder::NonFirst,
        matchers: &[
            on(TradeEventType::KnockOut, Add),
            on(TradeEventType::Expire, Add),
        ],
    },
];

/// Rules dedicated to a trade type, scanned ahead of [`COMMON_RULES`].
pub fn trade_type_rules(trade_type: TradeType) -> &'static [Rule] {
    match trade_type {
        TradeType::Payment | TradeType::Fx => &[],
        TradeType::FxNdf => FX_NDF_RULES,
        TradeType::Bond => BOND_RULES,
        TradeType::Repo => REPO_RULES,
        TradeType::Option => OPTION_RULES,
    }
}
