//! Pure state transitions for locally patched lists.

/// `(State, Intent) -> State` with no side effects.
pub trait Reducer {
    type State;
    type Intent;

    fn reduce(state: Self::State, intent: Self::Intent) -> Self::State;
}
