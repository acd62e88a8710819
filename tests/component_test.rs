mod common;

use std::{sync::Arc, time::Duration};

use common::{wait_until, TIMEOUT};
use pretty_assertions::assert_eq;
use robo::{
    devices::{relay_actuator, DigitalMode, Relay},
    Agent, AgentBehavior, AgentContext, AgentError, AgentResult, AgentState, Component, Event,
    EventPayload, EventRecorder, EventType, NamePolicy, RuntimeAgent, SimpleRule,
};

#[derive(Default)]
struct Log(Vec<String>);

impl AgentBehavior for Log {}

/// Answers every `Ping` with a `Pong`.
fn ponger(name: &str) -> Arc<Agent<()>> {
    let agent = Agent::new(name, ());
    agent
        .add_rule(
            SimpleRule::<()>::on(EventType::custom("Ping"))
                .then(|_| Ok(vec![Event::custom("Pong")])),
        )
        .unwrap();
    Arc::new(agent)
}

/// A parent that logs the source of every `Pong` it receives.
fn pong_collector(name: &str) -> Component<Log> {
    let parent = Component::new(name, Log::default());
    parent
        .add_rule(SimpleRule::<Log>::on(EventType::custom("Pong")).always(|cx| {
            let source = cx.event.source().map(|s| s.name.clone()).unwrap_or_default();
            cx.agent.0.push(source);
            Ok(Vec::new())
        }))
        .unwrap();
    parent
}

fn logged(component: &Component<Log>) -> Vec<String> {
    component.inspect(|log| log.0.clone()).unwrap()
}

#[tokio::test]
async fn test_start_and_stop_cascade() {
    let parent = Component::new("parent", ());
    let c1 = Arc::new(Agent::new("c1", ()));
    let c2 = Arc::new(Agent::new("c2", ()));
    let c1_events = EventRecorder::new();
    let c2_events = EventRecorder::new();
    c1.add_listener(c1_events.clone());
    c2.add_listener(c2_events.clone());
    parent.add_component(c1.clone(), true);
    parent.add_component(c2.clone(), true);

    parent.start().unwrap();
    assert!(
        wait_until(TIMEOUT, || {
            c1.state() == AgentState::Running && c2.state() == AgentState::Running
        })
        .await
    );
    assert!(wait_until(TIMEOUT, || c2_events.count(&EventType::Started) == 1).await);

    parent.shutdown().await.unwrap();
    for agent in [parent.context().clone(), c1.context().clone(), c2.context().clone()] {
        assert_eq!(agent.state(), AgentState::Stopped, "{}", agent.name());
    }

    let seen = (c1_events.len(), c2_events.len());
    assert_eq!(c1_events.count(&EventType::Stopped), 1);
    assert!(!c1.on(Event::custom("Ping")));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!((c1_events.len(), c2_events.len()), seen);
}

#[tokio::test]
async fn test_nested_components_cascade() {
    let root = Component::new("root", ());
    let middle = Arc::new(Component::new("middle", ()));
    let leaf = Arc::new(Agent::new("leaf", ()));
    middle.add_component(leaf.clone(), true);
    root.add_component(middle.clone(), true);

    root.start().unwrap();
    assert!(wait_until(TIMEOUT, || leaf.state() == AgentState::Running).await);

    root.stop();
    assert!(wait_until(TIMEOUT, || leaf.state() == AgentState::Stopped).await);
    root.join().await.unwrap();
    middle.join().await.unwrap();
}

#[tokio::test]
async fn test_auto_listen_forwards_child_events() {
    let parent = pong_collector("parent");
    let child = ponger("child");
    parent.add_component(child.clone(), true);
    parent.start().unwrap();
    assert!(wait_until(TIMEOUT, || child.state() == AgentState::Running).await);

    assert!(child.on(Event::custom("Ping")));
    assert!(wait_until(TIMEOUT, || !logged(&parent).is_empty()).await);
    assert_eq!(logged(&parent), vec!["child"]);
    parent.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_without_auto_listen_parent_hears_nothing() {
    let parent = pong_collector("parent");
    let child = ponger("child");
    let child_events = EventRecorder::new();
    child.add_listener(child_events.clone());
    parent.add_component(child.clone(), false);
    parent.start().unwrap();
    assert!(wait_until(TIMEOUT, || child.state() == AgentState::Running).await);

    child.on(Event::custom("Ping"));
    assert!(wait_until(TIMEOUT, || child_events.count(&EventType::custom("Pong")) == 1).await);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(logged(&parent).is_empty());
    parent.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_lookup_is_one_level_deep() {
    let root = Component::new("root", ());
    let middle = Arc::new(Component::new("middle", ()));
    middle.add_component(Arc::new(Agent::new("leaf", ())), false);
    root.add_component(middle.clone(), false);
    root.add_component(Arc::new(Agent::new("sibling", ())), false);

    assert_eq!(root.component_names(), vec!["middle", "sibling"]);
    assert!(root.get_component_by_name("leaf").is_none());
    let middle = root.get_component::<Component<()>>("middle").unwrap();
    assert!(middle.get_component_by_name("leaf").is_some());
}

struct Prefixed(&'static str);

impl NamePolicy for Prefixed {
    fn next_name(&self, kind: &str) -> String {
        format!("{}-{}", self.0, kind.to_lowercase())
    }
}

#[test]
fn test_custom_name_policy() {
    let parent = Component::new("rig", ()).with_name_policy(Prefixed("rig"));
    let relay = relay_actuator("", DigitalMode::PullDown).unwrap();
    let name = parent.add_component(Arc::new(relay), true);
    assert_eq!(name, "rig-relay");
    assert!(parent.get_component::<Agent<Relay>>("rig-relay").is_some());
}

#[tokio::test]
async fn test_relay_commands_reach_only_their_relay() {
    let controller = pong_collector("controller");
    controller
        .add_rule(
            SimpleRule::<Log>::on(EventType::custom("Flip")).always(|_| {
                Ok(vec![Event::new(EventPayload::EnableRelay {
                    relay: "pump".into(),
                })])
            }),
        )
        .unwrap();
    let confirmations = EventRecorder::new();
    controller.add_listener_for_event_type(EventType::RelayEnabled, confirmations.clone());

    for name in ["pump", "fan"] {
        let relay = Arc::new(relay_actuator(name, DigitalMode::PullUp).unwrap());
        controller.add_listener(relay.listener());
        relay.add_listener(controller.listener());
        controller.add_component(relay, false);
    }
    // Confirmations come back through the controller's own ingress, so the
    // controller re-broadcasts nothing unless a rule says so.
    controller
        .add_rule(SimpleRule::<Log>::on(EventType::RelayEnabled).always(|cx| {
            Ok(vec![cx.event.clone()])
        }))
        .unwrap();

    controller.start().unwrap();
    assert!(
        wait_until(TIMEOUT, || {
            controller
                .children()
                .iter()
                .all(|child| child.state() == AgentState::Running)
        })
        .await
    );
    controller.on(Event::custom("Flip"));

    let pump = controller.get_component::<Agent<Relay>>("pump").unwrap();
    let fan = controller.get_component::<Agent<Relay>>("fan").unwrap();
    assert!(wait_until(TIMEOUT, || pump.inspect(|r| r.is_enabled()).unwrap()).await);
    assert!(wait_until(TIMEOUT, || confirmations.len() == 1).await);
    assert_eq!(
        confirmations.events()[0].payload(),
        &EventPayload::RelayEnabled {
            relay: "pump".into()
        }
    );
    assert!(!fan.inspect(|r| r.is_enabled()).unwrap());
    controller.shutdown().await.unwrap();
}

struct NoHardware;

impl AgentBehavior for NoHardware {
    fn initialize(&mut self, _ctx: &AgentContext) -> AgentResult<()> {
        Err(AgentError::behavior("no hardware"))
    }
}

#[tokio::test]
async fn test_shutdown_reports_failed_child() {
    let parent = Component::new("parent", ());
    let healthy = Arc::new(Agent::new("healthy", ()));
    let broken = Arc::new(Agent::new("broken", NoHardware));
    parent.add_component(healthy.clone(), true);
    parent.add_component(broken.clone(), true);

    parent.start().unwrap();
    assert!(wait_until(TIMEOUT, || broken.state().is_terminal()).await);
    assert_eq!(parent.state(), AgentState::Running);
    assert_eq!(healthy.state(), AgentState::Running);

    let err = parent.shutdown().await.unwrap_err();
    assert!(matches!(err, AgentError::Terminated { ref reason } if reason == "no hardware"));
    assert_eq!(healthy.state(), AgentState::Stopped);
}
