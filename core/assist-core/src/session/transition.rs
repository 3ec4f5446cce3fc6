//! Maps session events to state transitions.
//! OS teardown always wins; anything reaching a Finished session is a violation.

use super::{SessionEvent, SessionState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Move(SessionState),
    Stay,
    Violation,
}

pub fn next_state(current: SessionState, event: SessionEvent) -> Transition {
    use SessionEvent as E;
    use SessionState as S;

    match (current, event) {
        // Teardown callbacks trail a finish; acknowledging them is not a violation.
        (S::Finished, E::OsHide | E::OsDestroy) => Transition::Stay,
        (S::Finished, _) => Transition::Violation,
        (_, E::OsHide | E::OsDestroy) => Transition::Move(S::Finished),

        (S::Created, E::Show) => Transition::Move(S::Showing),
        (S::Created | S::Showing, E::HandleAssist) => Transition::Move(S::HandlingAssist),
        (S::Created | S::Showing | S::HandlingAssist, E::BeginFinish) => {
            Transition::Move(S::Finishing)
        }
        (S::Finishing, E::Complete) => Transition::Move(S::Finished),

        (S::Showing, E::Show)
        | (S::HandlingAssist, E::Show | E::HandleAssist)
        | (S::Finishing, E::Show | E::HandleAssist | E::BeginFinish)
        | (S::Created | S::Showing | S::HandlingAssist, E::Complete) => Transition::Stay,
    }
}
