//! Funnel states and qualification slots.

use serde::{Deserialize, Serialize};

/// The states of the qualification funnel.
///
/// Progresses linearly: LanguageSelect → GoalSelect → ContactCapture →
/// Budget → PropertyKind → Transaction → ValueProposition → ContactGate →
/// Scheduling → Complete. `Unreachable` is the explicit "cannot proceed"
/// branch taken when the contact gate finds no way to reach the lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelState {
    #[default]
    LanguageSelect,
    GoalSelect,
    ContactCapture,
    Budget,
    PropertyKind,
    Transaction,
    ValueProposition,
    ContactGate,
    Scheduling,
    Complete,
    Unreachable,
}

impl FunnelState {
    /// The slot this state is waiting on, if any.
    pub fn expected_slot(&self) -> Option<Slot> {
        match self {
            Self::LanguageSelect => Some(Slot::Language),
            Self::GoalSelect => Some(Slot::Goal),
            Self::ContactCapture => Some(Slot::Name),
            Self::Budget => Some(Slot::Budget),
            Self::PropertyKind => Some(Slot::PropertyKind),
            Self::Transaction => Some(Slot::Transaction),
            Self::ValueProposition => Some(Slot::Interest),
            Self::ContactGate => Some(Slot::Contact),
            Self::Scheduling => Some(Slot::Schedule),
            Self::Complete | Self::Unreachable => None,
        }
    }

    /// Next state in the linear progression, if any.
    pub fn next(&self) -> Option<FunnelState> {
        match self {
            Self::LanguageSelect => Some(Self::GoalSelect),
            Self::GoalSelect => Some(Self::ContactCapture),
            Self::ContactCapture => Some(Self::Budget),
            Self::Budget => Some(Self::PropertyKind),
            Self::PropertyKind => Some(Self::Transaction),
            Self::Transaction => Some(Self::ValueProposition),
            Self::ValueProposition => Some(Self::ContactGate),
            Self::ContactGate => Some(Self::Scheduling),
            Self::Scheduling => Some(Self::Complete),
            Self::Complete | Self::Unreachable => None,
        }
    }

    /// Whether the funnel has ended for this lead.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Unreachable)
    }
}

impl std::fmt::Display for FunnelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::LanguageSelect => "language_select",
            Self::GoalSelect => "goal_select",
            Self::ContactCapture => "contact_capture",
            Self::Budget => "budget",
            Self::PropertyKind => "property_kind",
            Self::Transaction => "transaction",
            Self::ValueProposition => "value_proposition",
            Self::ContactGate => "contact_gate",
            Self::Scheduling => "scheduling",
            Self::Complete => "complete",
            Self::Unreachable => "unreachable",
        };
        write!(f, "{s}")
    }
}

/// One qualification attribute collected by the funnel, tracked as
/// filled/unfilled on the lead.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Language,
    Goal,
    Name,
    Budget,
    PropertyKind,
    Transaction,
    Interest,
    Contact,
    Schedule,
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Language => "language",
            Self::Goal => "goal",
            Self::Name => "name",
            Self::Budget => "budget",
            Self::PropertyKind => "property_kind",
            Self::Transaction => "transaction",
            Self::Interest => "interest",
            Self::Contact => "contact",
            Self::Schedule => "schedule",
        };
        write!(f, "{s}")
    }
}
