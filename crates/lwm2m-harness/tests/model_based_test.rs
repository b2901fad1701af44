//! Model-based property tests.
//!
//! These tests generate random action sequences and verify that the real
//! client behaves identically to the reference model.
//!
//! # Architecture
//!
//! ```text
//! proptest generates: Vec<Action>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelWorld    ClientWorld      Compare
//!      (reference)   (loopback)       Results
//! ```

use lwm2m_client::RegistrationState;
use lwm2m_harness::{
    Action, ActionError, ActionResult, ClientWorld, FIXTURE_OBJECT, ModelEnabler, ModelWorld,
    RequestKind,
};
use lwm2m_proto::ResponseCode;
use proptest::prelude::*;

/// Index of the fixture object in the model's object choices.
const FIXTURE: u8 = 4;

fn enabler_strategy() -> impl Strategy<Value = ModelEnabler> {
    prop_oneof![Just(ModelEnabler::Missing), Just(ModelEnabler::Null), Just(ModelEnabler::Recording)]
}

fn request_kind_strategy() -> impl Strategy<Value = RequestKind> {
    prop_oneof![
        4 => Just(RequestKind::Read),
        3 => Just(RequestKind::Write),
        2 => Just(RequestKind::Execute),
        1 => Just(RequestKind::Create),
        1 => Just(RequestKind::Delete),
    ]
}

/// Strategy for generating actions.
fn action_strategy() -> impl Strategy<Value = Action> {
    let object = any::<u8>();

    prop_oneof![
        // Weight towards inbound requests
        2 => (object.clone(), enabler_strategy())
            .prop_map(|(object, enabler)| Action::Enable { object, enabler }),
        1 => object.clone().prop_map(|object| Action::SetEnabler { object }),
        1 => (object.clone(), any::<u8>())
            .prop_map(|(object, instance)| Action::AddInstance { object, instance }),
        8 => (request_kind_strategy(), object, any::<u8>(), any::<Option<u8>>()).prop_map(
            |(kind, object, instance, resource)| Action::Request { kind, object, instance, resource }
        ),
        1 => any::<bool>().prop_map(|long_name| Action::Register { long_name }),
        1 => Just(Action::Update),
        1 => Just(Action::Deregister),
    ]
}

proptest! {
    /// Every action yields the same result on the model and the client.
    #[test]
    fn prop_model_matches_real(actions in prop::collection::vec(action_strategy(), 0..60)) {
        let mut model = ModelWorld::new();
        let mut real = ClientWorld::new();

        for (i, action) in actions.iter().enumerate() {
            let model_result = model.apply(action);
            let real_result = real.apply(action);

            prop_assert_eq!(
                &model_result,
                &real_result,
                "Divergence at action {}: {:?}",
                i, action
            );
        }

        prop_assert_eq!(model.observable_state(), real.observable_state());
    }

    /// A refused request never reaches the recording enabler.
    #[test]
    fn prop_refusals_skip_enabler(actions in prop::collection::vec(action_strategy(), 0..60)) {
        let mut real = ClientWorld::new();

        for action in &actions {
            let before = real.recorder().call_count();
            let result = real.apply(action);
            let after = real.recorder().call_count();

            if let (Action::Request { .. }, ActionResult::Code(code)) = (action, &result) {
                if matches!(code, ResponseCode::NotFound | ResponseCode::BadRequest) {
                    prop_assert_eq!(before, after, "{:?} answered {} but called enabler", action, code);
                }
            } else {
                prop_assert_eq!(before, after, "{:?} is not a request", action);
            }
        }
    }

    /// Enabling the same type twice always fails the second time.
    #[test]
    fn prop_enable_is_exclusive(
        object in any::<u8>(),
        first in enabler_strategy(),
        second in enabler_strategy()
    ) {
        let mut real = ClientWorld::new();
        let _ = real.apply(&Action::Enable { object, enabler: first });

        let second = real.apply(&Action::Enable { object, enabler: second });
        prop_assert!(!second.is_ok());
    }

    /// Registration never leaves the documented state graph.
    #[test]
    fn prop_registration_states(actions in prop::collection::vec(action_strategy(), 0..40)) {
        let mut real = ClientWorld::new();
        let mut deregistered = false;

        for action in &actions {
            let _ = real.apply(action);
            let state = real.client().state();

            prop_assert!(matches!(
                state,
                RegistrationState::Unregistered
                    | RegistrationState::Registered
                    | RegistrationState::Deregistered
            ));
            if deregistered {
                prop_assert_eq!(state, RegistrationState::Deregistered);
            }
            deregistered = state == RegistrationState::Deregistered;
        }
    }
}

#[cfg(test)]
mod smoke_tests {
    use super::*;

    fn request(kind: RequestKind, resource: Option<u8>) -> Action {
        Action::Request { kind, object: FIXTURE, instance: 0, resource }
    }

    #[test]
    fn fixture_index_matches_choices() {
        assert_eq!(lwm2m_harness::model::object_type(FIXTURE), FIXTURE_OBJECT);
    }

    #[test]
    fn model_and_client_agree_on_fixture_lifecycle() {
        let script = [
            request(RequestKind::Read, Some(0)),
            Action::Enable { object: FIXTURE, enabler: ModelEnabler::Missing },
            request(RequestKind::Read, Some(0)),
            Action::SetEnabler { object: FIXTURE },
            request(RequestKind::Read, Some(0)),
            request(RequestKind::Read, Some(1)),
            request(RequestKind::Read, Some(7)),
            request(RequestKind::Write, Some(3)),
            request(RequestKind::Execute, Some(2)),
            request(RequestKind::Read, None),
            request(RequestKind::Create, None),
            request(RequestKind::Delete, None),
            Action::Register { long_name: true },
            Action::Register { long_name: false },
            Action::Update,
            Action::Deregister,
            Action::Update,
        ];

        let mut model = ModelWorld::new();
        let mut real = ClientWorld::new();
        for action in &script {
            assert_eq!(model.apply(action), real.apply(action), "{action:?}");
        }
        assert_eq!(model.observable_state(), real.observable_state());
    }

    #[test]
    fn client_codes_for_fixture() {
        let mut real = ClientWorld::new();
        real.apply(&Action::Enable { object: FIXTURE, enabler: ModelEnabler::Recording });

        let code = |real: &mut ClientWorld, action: Action| real.apply(&action);
        assert_eq!(
            code(&mut real, request(RequestKind::Read, Some(1))),
            ActionResult::Code(ResponseCode::MethodNotAllowed)
        );
        assert_eq!(
            code(&mut real, request(RequestKind::Read, Some(6))),
            ActionResult::Code(ResponseCode::NotFound)
        );
        assert_eq!(
            code(&mut real, request(RequestKind::Write, Some(1))),
            ActionResult::Code(ResponseCode::Changed)
        );
        assert_eq!(real.recorder().call_count(), 1);
        assert_eq!(
            code(&mut real, Action::Register { long_name: true }),
            ActionResult::Error(ActionError::NameTooLong)
        );
    }
}
