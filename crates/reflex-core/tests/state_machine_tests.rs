//! State machine behaviour through the public API

use pretty_assertions::assert_eq;
use reflex_core::domain::events::{RuleTriggered, StateTransitioned};
use reflex_core::{
    Comparator, Condition, CoreError, Rule, State, StateId, StateMachine, StateMachineStatus,
    Transition, INITIAL_STATE_NAME,
};
use std::collections::HashMap;

fn lookup(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn add_state(machine: &mut StateMachine, name: &str) -> StateId {
    let state = State::new(name, None).unwrap();
    let id = state.id().clone();
    machine.add_state(state).unwrap();
    id
}

fn add_edge(machine: &mut StateMachine, from: &StateId, to: &StateId) {
    machine
        .add_transition(Transition::between(from.clone(), to.clone()).unwrap())
        .unwrap();
}

#[test]
fn new_machine_starts_in_initial_state() {
    for (name, description) in [
        ("farm", None),
        ("dungeon runner", Some("clears floor 3".to_string())),
        ("x", Some(String::new())),
    ] {
        let machine = StateMachine::new(name, description.clone()).unwrap();

        assert_eq!(machine.status(), StateMachineStatus::Draft);
        assert_eq!(machine.version(), 1);
        assert_eq!(machine.description(), description.as_deref());

        let states = machine.states();
        assert_eq!(states.len(), 1);
        assert_eq!(states[0].name(), INITIAL_STATE_NAME);
        assert_eq!(machine.current_state(), Some(&states[0]));
    }
}

#[test]
fn duplicate_state_name_is_business_rule_violation() {
    let mut machine = StateMachine::new("m", None).unwrap();
    add_state(&mut machine, "Fight");
    add_state(&mut machine, "fight");

    for name in ["Fight", INITIAL_STATE_NAME] {
        let result = machine.add_state(State::new(name, None).unwrap());
        assert!(result.unwrap_err().is_business_rule_violation());
    }
}

#[test]
fn activation_scenario() {
    let mut machine = StateMachine::new("M", None).unwrap();
    let initial = machine.initial_state().unwrap().id().clone();

    let s1 = add_state(&mut machine, "S1");
    let s2 = add_state(&mut machine, "S2");
    add_edge(&mut machine, &initial, &s1);
    add_edge(&mut machine, &s1, &s2);

    machine.activate().unwrap();
    assert_eq!(machine.status(), StateMachineStatus::Active);

    let version = machine.version();
    machine.transition_to(&s1, None).unwrap();
    assert_eq!(machine.current_state().unwrap().id(), &s1);
    assert_eq!(machine.version(), version + 1);

    let available = machine.get_available_transitions();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].from_state_id(), &s1);
    assert_eq!(available[0].to_state_id(), &s2);
}

#[test]
fn active_machine_rejects_structural_changes() {
    let mut machine = StateMachine::new("M", None).unwrap();
    let initial = machine.initial_state().unwrap().id().clone();
    let s1 = add_state(&mut machine, "S1");
    add_edge(&mut machine, &initial, &s1);
    machine.activate().unwrap();

    let state_result = machine.add_state(State::new("S2", None).unwrap());
    let transition_result =
        machine.add_transition(Transition::between(s1.clone(), initial.clone()).unwrap());
    let rule_result =
        machine.add_rule(Rule::new("r", Condition::equals("v", "1").unwrap(), 1, None).unwrap());

    for result in [state_result, transition_result, rule_result] {
        match result {
            Err(CoreError::BusinessRuleViolation(msg)) => assert!(msg.contains("status")),
            other => panic!("Expected BusinessRuleViolation, got {:?}", other),
        }
    }
}

#[test]
fn transition_to_current_state_is_idempotent() {
    let mut machine = StateMachine::new("M", None).unwrap();
    let initial = machine.initial_state().unwrap().id().clone();
    machine.take_events();
    let version = machine.version();

    machine.transition_to(&initial, Some("again".to_string())).unwrap();
    machine.transition_to(&initial, None).unwrap();

    assert_eq!(machine.version(), version);
    assert_eq!(machine.current_state().unwrap().id(), &initial);
    assert!(machine.take_events().is_empty());
}

#[test]
fn transition_event_carries_reason() {
    let mut machine = StateMachine::new("M", None).unwrap();
    let initial = machine.initial_state().unwrap().id().clone();
    let s1 = add_state(&mut machine, "S1");
    machine.take_events();

    machine
        .transition_to(&s1, Some("boss spotted".to_string()))
        .unwrap();

    let events = machine.take_events();
    let event = events[0]
        .as_any()
        .downcast_ref::<StateTransitioned>()
        .expect("transition event");
    assert_eq!(event.from_state_id, initial);
    assert_eq!(event.to_state_id, s1);
    assert_eq!(event.reason.as_deref(), Some("boss spotted"));
}

// Deterministic walk over additions and transitions; the available set
// must always be exactly the edges leaving the current state.
#[test]
fn available_transitions_match_current_state_across_walk() {
    let mut machine = StateMachine::new("walk", None).unwrap();
    let mut ids = vec![machine.initial_state().unwrap().id().clone()];
    for i in 0..5 {
        ids.push(add_state(&mut machine, &format!("S{}", i)));
    }

    let mut seed: u64 = 0x5eed;
    let mut next = |bound: usize| {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        ((seed >> 33) as usize) % bound
    };

    for step in 0..60 {
        let from = ids[next(ids.len())].clone();
        let to = ids[next(ids.len())].clone();

        if step % 3 == 0 && machine.status() == StateMachineStatus::Draft {
            add_edge(&mut machine, &from, &to);
        } else {
            machine.transition_to(&to, None).unwrap();
        }

        let current = machine.current_state().unwrap().id().clone();
        let expected: Vec<Transition> = machine
            .transitions()
            .into_iter()
            .filter(|t| t.from_state_id() == &current)
            .collect();
        assert_eq!(machine.get_available_transitions(), expected);

        for target in &ids {
            assert_eq!(
                machine.can_transition_to(target),
                expected.iter().any(|t| t.to_state_id() == target)
            );
        }

        if step == 40 {
            machine.activate().unwrap();
        }
    }
}

#[test]
fn evaluate_rules_on_draft_emits_nothing() {
    let mut machine = StateMachine::new("M", None).unwrap();
    machine
        .add_rule(Rule::new("r", Condition::equals("var", "x").unwrap(), 1, None).unwrap())
        .unwrap();
    machine.take_events();

    let fired = machine.evaluate_rules(&lookup(&[("var", "x")]));

    assert!(fired.is_empty());
    assert!(machine.take_events().is_empty());
}

#[test]
fn matching_rule_fires_on_every_call() {
    let mut machine = StateMachine::new("M", None).unwrap();
    let initial = machine.initial_state().unwrap().id().clone();
    let s1 = add_state(&mut machine, "S1");
    add_edge(&mut machine, &initial, &s1);
    let rule = Rule::new("r", Condition::equals("var", "x").unwrap(), 1, None).unwrap();
    let rule_id = rule.id().clone();
    machine.add_rule(rule).unwrap();
    machine.activate().unwrap();
    machine.take_events();

    let vars = lookup(&[("var", "x")]);
    for _ in 0..2 {
        let version = machine.version();
        machine.evaluate_rules(&vars);

        let events = machine.take_events();
        assert_eq!(events.len(), 1);
        let triggered = events[0]
            .as_any()
            .downcast_ref::<RuleTriggered>()
            .expect("rule triggered event");
        assert_eq!(triggered.rule_id, rule_id);
        assert_eq!(triggered.rule_name, "r");
        assert_eq!(machine.version(), version + 1);
    }

    // Non-matching lookup fires nothing
    machine.evaluate_rules(&lookup(&[("var", "y")]));
    assert!(machine.take_events().is_empty());
}

#[test]
fn rule_updates_follow_draft_lifecycle() {
    let mut machine = StateMachine::new("M", None).unwrap();
    let initial = machine.initial_state().unwrap().id().clone();
    let s1 = add_state(&mut machine, "S1");
    add_edge(&mut machine, &initial, &s1);
    let rule = Rule::new("slow", Condition::equals("hp", "1").unwrap(), 9, None).unwrap();
    let rule_id = rule.id().clone();
    machine.add_rule(rule).unwrap();

    machine
        .update_rule(
            &rule_id,
            "low_hp",
            Condition::new("hp", Comparator::LessThan, "20").unwrap(),
            0,
            Some("retreat".to_string()),
        )
        .unwrap();
    machine.activate().unwrap();

    let fired = machine.evaluate_rules(&lookup(&[("hp", "5")]));
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].rule_name, "low_hp");

    assert!(machine
        .set_rule_active(&rule_id, false)
        .unwrap_err()
        .is_business_rule_violation());
}

#[test]
fn lifecycle_is_one_way() {
    let mut machine = StateMachine::new("M", None).unwrap();
    let initial = machine.initial_state().unwrap().id().clone();
    let s1 = add_state(&mut machine, "S1");
    add_edge(&mut machine, &initial, &s1);

    assert!(machine.deactivate().is_err());
    machine.activate().unwrap();
    machine.deactivate().unwrap();

    let version = machine.version();
    assert!(machine.activate().is_err());
    assert!(machine.deactivate().is_err());
    assert_eq!(machine.status(), StateMachineStatus::Paused);
    assert_eq!(machine.version(), version);

    // Moving between states is still possible while paused
    machine.transition_to(&s1, None).unwrap();
    machine.reset();
    assert_eq!(machine.current_state().unwrap().id(), &initial);
}

#[test]
fn unresolved_target_reports_not_found() {
    let mut machine = StateMachine::new("M", None).unwrap();
    let missing = StateId::from("missing");

    assert!(!machine.can_transition_to(&missing));
    assert!(machine.transition_to(&missing, None).unwrap_err().is_not_found());
}
