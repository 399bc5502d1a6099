//! Driver-side transition rules.
//!
//! Same tag-keyed adjacency discipline as the rider machine, but
//! [`transition`] hard-fails: an illegal pair yields `None` and the caller
//! must check before acting. Server-authority driver logic never gets a
//! silently-applied state, and never a decorative error state either.

use crate::state::driver_state::DriverState;

pub fn can_transition(from: &DriverState, to: &DriverState) -> bool {
    use DriverState::*;

    matches!(
        (from, to),
        (Offline, LoggingIn)
            | (LoggingIn, Online { .. })
            | (LoggingIn, Error { .. })
            | (Online { .. }, RideOffered { .. })
            | (Online { .. }, Offline)
            | (Online { .. }, Error { .. })
            | (RideOffered { .. }, HeadingToPickup { .. })
            | (RideOffered { .. }, Online { .. })
            | (RideOffered { .. }, Error { .. })
            | (HeadingToPickup { .. }, ArrivedAtPickup { .. })
            | (HeadingToPickup { .. }, Online { .. })
            | (HeadingToPickup { .. }, Error { .. })
            | (ArrivedAtPickup { .. }, RideInProgress { .. })
            | (ArrivedAtPickup { .. }, Online { .. })
            | (ArrivedAtPickup { .. }, Error { .. })
            | (RideInProgress { .. }, ApproachingDestination { .. })
            | (RideInProgress { .. }, RideCompleted { .. })
            | (RideInProgress { .. }, Error { .. })
            | (ApproachingDestination { .. }, RideCompleted { .. })
            | (ApproachingDestination { .. }, Error { .. })
            | (RideCompleted { .. }, Online { .. })
            | (RideCompleted { .. }, Offline)
            | (Error { .. }, Offline)
            | (Error { .. }, Online { .. })
    )
}

/// Apply a transition, returning `None` if the pair is illegal.
pub fn transition(from: &DriverState, to: DriverState) -> Option<DriverState> {
    if can_transition(from, &to) {
        Some(to)
    } else {
        None
    }
}
