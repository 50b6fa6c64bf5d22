//! Device lifecycle state mapping

use crds::Condition;

pub const STATE_ACTIVE: &str = "active";
pub const STATE_PROVISIONING: &str = "provisioning";
pub const STATE_QUEUED: &str = "queued";

/// Normalized state and the Ready condition it implies
#[derive(Debug, Clone)]
pub struct MappedState {
    pub state: String,
    pub condition: Condition,
}

/// Maps a provider lifecycle state to the Ready condition
///
/// Unknown states pass through unchanged and report `Unavailable`.
pub fn map_state(state: &str) -> MappedState {
    let condition = match state {
        STATE_ACTIVE => Condition::available(),
        STATE_PROVISIONING => Condition::creating(),
        _ => Condition::unavailable(),
    };
    MappedState {
        state: state.to_string(),
        condition,
    }
}

/// True while the device is still being brought up
pub fn is_provisioning(state: &str) -> bool {
    matches!(state, STATE_PROVISIONING | STATE_QUEUED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crds::{ConditionReason, ConditionStatus, ConditionType};

    #[test]
    fn test_state_table() {
        let cases = [
            ("active", ConditionReason::Available, ConditionStatus::True),
            ("provisioning", ConditionReason::Creating, ConditionStatus::False),
            ("queued", ConditionReason::Unavailable, ConditionStatus::False),
            ("powering_off", ConditionReason::Unavailable, ConditionStatus::False),
        ];

        for (input, reason, status) in cases {
            let mapped = map_state(input);
            assert_eq!(mapped.state, input, "state {} should pass through", input);
            assert_eq!(mapped.condition.type_, ConditionType::Ready);
            assert_eq!(mapped.condition.reason, reason, "reason for {}", input);
            assert_eq!(mapped.condition.status, status, "status for {}", input);
        }
    }

    #[test]
    fn test_is_provisioning() {
        assert!(is_provisioning("queued"));
        assert!(is_provisioning("provisioning"));
        assert!(!is_provisioning("active"));
        assert!(!is_provisioning("failed"));
    }
}
