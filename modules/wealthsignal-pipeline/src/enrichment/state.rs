//! Enrichment state machine.
//!
//! ```text
//! Start ──ContentExtracted──▶ Fetched ──Assessed──▶ Done
//!   │                            ▲
//!   └─FetchFailed─┬─(score ≥ high signal)─▶ Verifying ─VerificationSucceeded─┘
//!                 │                             │
//!                 └─(below)─▶ Dropped           └─VerificationExhausted─▶ Salvaging
//!                                                                          │
//!                                              Done ◀──SalvageSucceeded────┤
//!                                              Dropped ◀──SalvageFailed────┘
//! ```

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentState {
    Start,
    Fetched,
    Verifying,
    Salvaging,
    Done,
    Dropped,
}

impl EnrichmentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EnrichmentState::Done | EnrichmentState::Dropped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichmentEvent {
    /// Body extracted with enough text, from the original or an alternate outlet.
    ContentExtracted,
    FetchFailed,
    VerificationSucceeded,
    VerificationExhausted,
    SalvageSucceeded,
    SalvageFailed,
    Assessed,
}

/// Next state. Pairs with no defined transition end in `Dropped`.
pub fn transition(
    state: EnrichmentState,
    event: EnrichmentEvent,
    headline_score: i32,
    high_signal: i32,
) -> EnrichmentState {
    use EnrichmentEvent as E;
    use EnrichmentState as S;

    match (state, event) {
        (S::Start, E::ContentExtracted) => S::Fetched,
        (S::Start, E::FetchFailed) if headline_score >= high_signal => S::Verifying,
        (S::Start, E::FetchFailed) => S::Dropped,
        (S::Verifying, E::VerificationSucceeded) => S::Fetched,
        (S::Verifying, E::VerificationExhausted) => S::Salvaging,
        (S::Salvaging, E::SalvageSucceeded) => S::Done,
        (S::Salvaging, E::SalvageFailed) => S::Dropped,
        (S::Fetched, E::Assessed) => S::Done,
        _ => S::Dropped,
    }
}
