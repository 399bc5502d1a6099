//! Rider-side transition rules.
//!
//! Legality is keyed on the *variant* of each side, never the payload, with
//! two deliberate exceptions: `selectingLocations` may transition to itself
//! (edit in place), and recovery out of `error` depends on the phase the
//! error wrapped.
//!
//! An illegal pair soft-fails: [`transition`] hands back an `Error` state
//! wrapping the rejected attempt so callers always have something
//! displayable. The driver-side machine hard-fails instead; the asymmetry
//! is intentional.

use crate::errors::RideHailError;
use crate::state::ride_state::RideState;

/// Whether `to` recovers out of an error state. Recovery always permits
/// `idle`; `selectingLocations` is only reachable again when the error
/// wrapped a pre-submit phase (or nothing at all).
fn can_recover(previous: Option<&RideState>, to: &RideState) -> bool {
    match to {
        RideState::Idle => true,
        RideState::SelectingLocations { .. } => matches!(
            previous,
            None | Some(
                RideState::Idle
                    | RideState::SelectingLocations { .. }
                    | RideState::RouteReady { .. }
            )
        ),
        _ => false,
    }
}

pub fn can_transition(from: &RideState, to: &RideState) -> bool {
    use RideState::*;

    if let Error { previous, .. } = from {
        return can_recover(previous.as_deref(), to);
    }

    // Any live phase may degrade to an error state.
    if matches!(to, Error { .. }) {
        return true;
    }

    matches!(
        (from, to),
        (Idle, SelectingLocations { .. })
            | (SelectingLocations { .. }, SelectingLocations { .. })
            | (SelectingLocations { .. }, RouteReady { .. })
            | (SelectingLocations { .. }, Idle)
            | (RouteReady { .. }, SubmittingRequest { .. })
            | (RouteReady { .. }, SelectingLocations { .. })
            | (SubmittingRequest { .. }, SearchingForDriver { .. })
            | (SearchingForDriver { .. }, DriverAssigned { .. })
            | (SearchingForDriver { .. }, Idle)
            | (DriverAssigned { .. }, DriverEnRoute { .. })
            | (DriverAssigned { .. }, Idle)
            | (DriverEnRoute { .. }, DriverArriving { .. })
            | (DriverEnRoute { .. }, Idle)
            | (DriverArriving { .. }, RideInProgress { .. })
            | (DriverArriving { .. }, Idle)
            | (RideInProgress { .. }, ApproachingDestination { .. })
            | (RideInProgress { .. }, RideCompleted { .. })
            | (ApproachingDestination { .. }, RideCompleted { .. })
            | (ApproachingDestination { .. }, Idle)
            | (RideCompleted { .. }, Idle)
    )
}

/// Apply a transition, soft-failing on illegal pairs.
///
/// The returned `Error` state retains the rejected `from` so recovery is
/// deterministic and the UI keeps something to show.
pub fn transition(from: &RideState, to: RideState) -> RideState {
    if can_transition(from, &to) {
        to
    } else {
        RideState::Error {
            kind: RideHailError::illegal_transition(from.phase(), to.phase()),
            previous: Some(Box::new(from.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{Location, RouteSummary};
    use crate::models::DriverInfo;
    use crate::Coordinate;

    fn pickup() -> Location {
        Location::with_address(37.7749, -122.4194, "Market St")
    }

    fn destination() -> Location {
        Location::new(37.8049, -122.3994)
    }

    fn driver() -> DriverInfo {
        DriverInfo {
            id: "drv-1".into(),
            name: "Sam".into(),
            vehicle: "Toyota Prius".into(),
            rating: 4.8,
            location: Coordinate::new(37.78, -122.41),
        }
    }

    fn route() -> RouteSummary {
        RouteSummary {
            distance_km: 3.9,
            duration_secs: 600,
            polyline: vec![],
        }
    }

    /// Builds a representative instance of every phase, in lifecycle order.
    fn all_states() -> Vec<RideState> {
        let id = "ride-1".to_string();
        vec![
            RideState::Idle,
            RideState::SelectingLocations {
                pickup: Some(pickup()),
                destination: None,
            },
            RideState::RouteReady {
                pickup: pickup(),
                destination: destination(),
                route: route(),
            },
            RideState::SubmittingRequest {
                pickup: pickup(),
                destination: destination(),
            },
            RideState::SearchingForDriver {
                ride_id: id.clone(),
                pickup: pickup(),
                destination: destination(),
            },
            RideState::DriverAssigned {
                ride_id: id.clone(),
                driver: driver(),
                pickup: pickup(),
                destination: destination(),
            },
            RideState::DriverEnRoute {
                ride_id: id.clone(),
                driver: driver(),
                eta_secs: 300,
                pickup: pickup(),
                destination: destination(),
            },
            RideState::DriverArriving {
                ride_id: id.clone(),
                driver: driver(),
                pickup: pickup(),
                destination: destination(),
            },
            RideState::RideInProgress {
                ride_id: id.clone(),
                driver: driver(),
                eta_secs: 600,
                pickup: pickup(),
                destination: destination(),
            },
            RideState::ApproachingDestination {
                ride_id: id.clone(),
                driver: driver(),
                pickup: pickup(),
                destination: destination(),
            },
            RideState::RideCompleted {
                ride_id: id,
                driver: driver(),
                pickup: pickup(),
                destination: destination(),
            },
        ]
    }

    /// The full adjacency table (error targets excluded; those are checked
    /// separately). Every pair listed here must be legal and every pair of
    /// non-error phases not listed must be illegal.
    const ADJACENCY: &[(&str, &[&str])] = &[
        ("idle", &["selectingLocations"]),
        (
            "selectingLocations",
            &["selectingLocations", "routeReady", "idle"],
        ),
        ("routeReady", &["submittingRequest", "selectingLocations"]),
        ("submittingRequest", &["searchingForDriver"]),
        ("searchingForDriver", &["driverAssigned", "idle"]),
        ("driverAssigned", &["driverEnRoute", "idle"]),
        ("driverEnRoute", &["driverArriving", "idle"]),
        ("driverArriving", &["rideInProgress", "idle"]),
        (
            "rideInProgress",
            &["approachingDestination", "rideCompleted"],
        ),
        ("approachingDestination", &["rideCompleted", "idle"]),
        ("rideCompleted", &["idle"]),
    ];

    #[test]
    fn adjacency_table_matches_exactly() {
        let states = all_states();
        for from in &states {
            let allowed: &[&str] = ADJACENCY
                .iter()
                .find(|(phase, _)| *phase == from.phase())
                .map(|(_, targets)| *targets)
                .unwrap();
            for to in &states {
                let expected = allowed.contains(&to.phase());
                assert_eq!(
                    can_transition(from, to),
                    expected,
                    "{} -> {} expected {}",
                    from.phase(),
                    to.phase(),
                    expected
                );
            }
        }
    }

    #[test]
    fn every_live_phase_can_degrade_to_error() {
        let error = RideState::Error {
            kind: RideHailError::NoDriverAvailable,
            previous: None,
        };
        for from in all_states() {
            assert!(can_transition(&from, &error), "{} -> error", from.phase());
        }
    }

    #[test]
    fn selecting_locations_self_transition_is_legal() {
        let a = RideState::SelectingLocations {
            pickup: Some(pickup()),
            destination: None,
        };
        let b = RideState::SelectingLocations {
            pickup: Some(pickup()),
            destination: Some(destination()),
        };
        assert!(can_transition(&a, &b));
    }

    #[test]
    fn no_other_phase_self_transitions() {
        for state in all_states() {
            if matches!(state, RideState::SelectingLocations { .. } | RideState::Idle) {
                continue;
            }
            assert!(
                !can_transition(&state, &state),
                "{} -> itself should be illegal",
                state.phase()
            );
        }
    }

    #[test]
    fn route_ready_cannot_skip_back_to_idle() {
        let from = RideState::RouteReady {
            pickup: pickup(),
            destination: destination(),
            route: route(),
        };
        assert!(!can_transition(&from, &RideState::Idle));
    }

    #[test]
    fn no_going_back_after_submit() {
        let from = RideState::SubmittingRequest {
            pickup: pickup(),
            destination: destination(),
        };
        let to = RideState::RouteReady {
            pickup: pickup(),
            destination: destination(),
            route: route(),
        };
        assert!(!can_transition(&from, &to));
    }

    #[test]
    fn completed_must_reset_through_idle() {
        let from = RideState::RideCompleted {
            ride_id: "ride-1".into(),
            driver: driver(),
            pickup: pickup(),
            destination: destination(),
        };
        let to = RideState::SelectingLocations {
            pickup: None,
            destination: None,
        };
        assert!(!can_transition(&from, &to));
    }

    #[test]
    fn illegal_transition_soft_fails_with_previous_state() {
        let from = RideState::Idle;
        let to = RideState::RideCompleted {
            ride_id: "ride-1".into(),
            driver: driver(),
            pickup: pickup(),
            destination: destination(),
        };
        let result = transition(&from, to);
        match result {
            RideState::Error { kind, previous } => {
                assert!(matches!(kind, RideHailError::IllegalTransition { .. }));
                assert_eq!(previous.as_deref(), Some(&RideState::Idle));
            }
            other => panic!("expected error state, got {}", other.phase()),
        }
    }

    #[test]
    fn legal_transition_passes_payload_through() {
        let from = RideState::Idle;
        let to = RideState::SelectingLocations {
            pickup: Some(pickup()),
            destination: None,
        };
        assert_eq!(transition(&from, to.clone()), to);
    }

    #[test]
    fn error_recovers_to_idle_from_any_wrapped_phase() {
        for wrapped in all_states() {
            let error = RideState::Error {
                kind: RideHailError::NoDriverAvailable,
                previous: Some(Box::new(wrapped)),
            };
            assert!(can_transition(&error, &RideState::Idle));
        }
    }

    #[test]
    fn error_recovery_to_selecting_locations_is_phase_dependent() {
        let selecting = RideState::SelectingLocations {
            pickup: None,
            destination: None,
        };
        let pre_submit = RideState::Error {
            kind: RideHailError::geocoding_failed("no match"),
            previous: Some(Box::new(RideState::RouteReady {
                pickup: pickup(),
                destination: destination(),
                route: route(),
            })),
        };
        assert!(can_transition(&pre_submit, &selecting));

        let mid_ride = RideState::Error {
            kind: RideHailError::network_unavailable("poll failed"),
            previous: Some(Box::new(RideState::RideInProgress {
                ride_id: "ride-1".into(),
                driver: driver(),
                eta_secs: 120,
                pickup: pickup(),
                destination: destination(),
            })),
        };
        assert!(!can_transition(&mid_ride, &selecting));
        assert!(can_transition(&mid_ride, &RideState::Idle));
    }
}
