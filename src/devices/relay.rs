use crate::{
    agent::{Agent, AgentBehavior},
    event::{Event, EventPayload, EventType},
    rule::SimpleRule,
};

use super::{DeviceError, DeviceResult, DigitalMode};

/// Two-state switch. `enable_mode` is the pin state that closes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Relay {
    enable_mode: DigitalMode,
    enabled: bool,
}

impl Relay {
    pub fn new(enable_mode: DigitalMode) -> DeviceResult<Self> {
        match enable_mode {
            DigitalMode::PullUp | DigitalMode::PullDown => Ok(Self {
                enable_mode,
                enabled: false,
            }),
            DigitalMode::Floating => Err(DeviceError::InvalidMode {
                device: "Relay".to_string(),
                mode: enable_mode,
            }),
        }
    }

    pub fn enable_mode(&self) -> DigitalMode {
        self.enable_mode
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Pin level to drive: high for an enabled pull-up relay or a disabled
    /// pull-down one.
    pub fn output_high(&self) -> bool {
        self.enabled == (self.enable_mode == DigitalMode::PullUp)
    }
}

impl AgentBehavior for Relay {
    fn kind(&self) -> &str {
        "Relay"
    }
}

/// Builds a relay agent. Its ingress only accepts relay commands addressed to
/// its own name; it answers them with `RelayEnabled` or `RelayDisabled` when
/// the state actually changes.
pub fn relay_actuator(name: &str, enable_mode: DigitalMode) -> DeviceResult<Agent<Relay>> {
    let relay = Relay::new(enable_mode)?;
    let agent = Agent::new(name, relay)
        .with_ingress_filter(|own_name, event| event.payload().command_target() == Some(own_name));

    let enable = SimpleRule::<Relay>::on(EventType::EnableRelay)
        .named("enable_relay")
        .when(|cx| !cx.agent.enabled)
        .then(|cx| {
            cx.agent.enabled = true;
            Ok(vec![Event::new(EventPayload::RelayEnabled {
                relay: cx.ctx.name(),
            })])
        });
    let disable = SimpleRule::<Relay>::on(EventType::DisableRelay)
        .named("disable_relay")
        .when(|cx| cx.agent.enabled)
        .then(|cx| {
            cx.agent.enabled = false;
            Ok(vec![Event::new(EventPayload::RelayDisabled {
                relay: cx.ctx.name(),
            })])
        });

    agent
        .add_rule(enable)
        .and_then(|_| agent.add_rule(disable))
        .map_err(|e| DeviceError::Hardware {
            device: name.to_string(),
            message: e.to_string(),
        })?;
    Ok(agent)
}
