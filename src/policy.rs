//! Access tiering and actor attribution for the mutating resources.
//!
//! Every handler for irrigation events, device readings and pump-control
//! commands asks this module two questions before touching the store:
//!
//! 1. [`authorize`]: may this caller perform this operation here at all?
//! 2. [`attribute`]: which account, if any, is recorded as the actor?
//!
//! Authentication is the only gate. Any authenticated identity may modify or
//! delete any record, so there is no "forbidden" outcome.

use thiserror::Error;
use uuid::Uuid;

use crate::auth::Identity;

/// Record kinds that carry an access or attribution rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    IrrigationEvent,
    DeviceReading,
    PumpControl,
}

/// The route tier a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// General-purpose web / management API (`/api/devices/...`).
    Web,
    /// Field-device API (`/api/iot/...`). Callers are typically credential-less.
    Iot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    List,
    Retrieve,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Anonymous,
    Authenticated,
}

/// What gets written into a record's actor column on create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    /// The resource has no actor column.
    NotTracked,
    /// The resource has an actor column; `None` persists as SQL `NULL`.
    Actor(Option<Uuid>),
}

impl Attribution {
    /// The actor to persist. `NotTracked` yields `None`.
    pub fn actor(self) -> Option<Uuid> {
        match self {
            Attribution::NotTracked => None,
            Attribution::Actor(actor) => actor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("authentication credentials were not provided")]
    Unauthorized,
}

/// Access table for each resource, route tier and operation.
pub fn requirement(resource: Resource, channel: Channel, operation: Operation) -> Requirement {
    use Operation::*;
    use Requirement::*;

    match (resource, channel, operation) {
        (_, _, Update | Delete) => Authenticated,
        (Resource::IrrigationEvent, _, _) => Authenticated,
        (Resource::DeviceReading, _, Create | List | Retrieve) => Anonymous,
        (Resource::PumpControl, _, Create) => Anonymous,
        (Resource::PumpControl, Channel::Web, List | Retrieve) => Authenticated,
        (Resource::PumpControl, Channel::Iot, List | Retrieve) => Anonymous,
    }
}

/// Accept or reject `operation` for `caller`.
pub fn authorize(
    resource: Resource,
    channel: Channel,
    operation: Operation,
    caller: Option<&Identity>,
) -> Result<(), PolicyError> {
    match (requirement(resource, channel, operation), caller) {
        (Requirement::Authenticated, None) => Err(PolicyError::Unauthorized),
        _ => Ok(()),
    }
}

/// Decide the actor recorded by a create.
///
/// The actor always comes from the resolved caller. Request payloads carry no
/// actor field, so a caller cannot credit a write to somebody else.
pub fn attribute(
    resource: Resource,
    channel: Channel,
    caller: Option<&Identity>,
) -> Result<Attribution, PolicyError> {
    match (resource, channel) {
        (Resource::IrrigationEvent, _) => caller
            .map(|identity| Attribution::Actor(Some(identity.id)))
            .ok_or(PolicyError::Unauthorized),
        (Resource::DeviceReading, _) => Ok(Attribution::NotTracked),
        (Resource::PumpControl, Channel::Web) => {
            Ok(Attribution::Actor(caller.map(|identity| identity.id)))
        }
        // Field devices hold no account; commands relayed through them are unattributed.
        (Resource::PumpControl, Channel::Iot) => Ok(Attribution::Actor(None)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::UserRole;

    const ALL_OPERATIONS: [Operation; 5] = [
        Operation::Create,
        Operation::List,
        Operation::Retrieve,
        Operation::Update,
        Operation::Delete,
    ];

    fn alice() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            username: "alice".to_owned(),
            role: UserRole::Default,
        }
    }

    #[test]
    fn irrigation_events_require_authentication_everywhere() {
        for channel in [Channel::Web, Channel::Iot] {
            for op in ALL_OPERATIONS {
                assert_eq!(
                    requirement(Resource::IrrigationEvent, channel, op),
                    Requirement::Authenticated,
                    "{channel:?} {op:?}"
                );
                assert_eq!(
                    authorize(Resource::IrrigationEvent, channel, op, None),
                    Err(PolicyError::Unauthorized)
                );
            }
        }
    }

    #[test]
    fn device_readings_are_anonymous_for_create_and_read_only() {
        for channel in [Channel::Web, Channel::Iot] {
            for op in [Operation::Create, Operation::List, Operation::Retrieve] {
                assert!(authorize(Resource::DeviceReading, channel, op, None).is_ok());
            }
            for op in [Operation::Update, Operation::Delete] {
                assert_eq!(
                    authorize(Resource::DeviceReading, channel, op, None),
                    Err(PolicyError::Unauthorized)
                );
            }
        }
    }

    #[test]
    fn web_pump_control_allows_anonymous_create_only() {
        assert!(authorize(Resource::PumpControl, Channel::Web, Operation::Create, None).is_ok());
        for op in [Operation::List, Operation::Retrieve, Operation::Update, Operation::Delete] {
            assert_eq!(
                authorize(Resource::PumpControl, Channel::Web, op, None),
                Err(PolicyError::Unauthorized),
                "{op:?}"
            );
        }
    }

    #[test]
    fn iot_pump_control_reads_are_anonymous_but_mutations_are_not() {
        for op in [Operation::Create, Operation::List, Operation::Retrieve] {
            assert!(authorize(Resource::PumpControl, Channel::Iot, op, None).is_ok());
        }
        for op in [Operation::Update, Operation::Delete] {
            assert_eq!(
                authorize(Resource::PumpControl, Channel::Iot, op, None),
                Err(PolicyError::Unauthorized)
            );
        }
    }

    #[test]
    fn any_authenticated_identity_passes_every_gate() {
        let caller = alice();
        for resource in [
            Resource::IrrigationEvent,
            Resource::DeviceReading,
            Resource::PumpControl,
        ] {
            for channel in [Channel::Web, Channel::Iot] {
                for op in ALL_OPERATIONS {
                    assert!(authorize(resource, channel, op, Some(&caller)).is_ok());
                }
            }
        }
    }

    #[test]
    fn irrigation_event_actor_is_the_caller() {
        let caller = alice();
        let got = attribute(Resource::IrrigationEvent, Channel::Web, Some(&caller)).unwrap();
        assert_eq!(got, Attribution::Actor(Some(caller.id)));
        assert_eq!(got.actor(), Some(caller.id));
    }

    #[test]
    fn irrigation_event_without_caller_is_unauthorized() {
        assert_eq!(
            attribute(Resource::IrrigationEvent, Channel::Web, None),
            Err(PolicyError::Unauthorized)
        );
    }

    #[test]
    fn web_pump_control_actor_follows_authentication() {
        let caller = alice();
        assert_eq!(
            attribute(Resource::PumpControl, Channel::Web, Some(&caller)),
            Ok(Attribution::Actor(Some(caller.id)))
        );
        assert_eq!(
            attribute(Resource::PumpControl, Channel::Web, None),
            Ok(Attribution::Actor(None))
        );
    }

    #[test]
    fn iot_pump_control_is_never_attributed() {
        let caller = alice();
        assert_eq!(
            attribute(Resource::PumpControl, Channel::Iot, Some(&caller)),
            Ok(Attribution::Actor(None))
        );
        assert_eq!(
            attribute(Resource::PumpControl, Channel::Iot, None),
            Ok(Attribution::Actor(None))
        );
    }

    #[test]
    fn device_readings_have_no_actor() {
        let caller = alice();
        for caller in [None, Some(&caller)] {
            let got = attribute(Resource::DeviceReading, Channel::Iot, caller).unwrap();
            assert_eq!(got, Attribution::NotTracked);
            assert_eq!(got.actor(), None);
        }
    }
}
