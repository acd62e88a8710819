//! Human interface devices: a tactile button for input and an alphanumeric
//! display for output.

use crate::{
    agent::{Agent, AgentBehavior, RuntimeAgent},
    event::{Event, EventPayload, EventType},
    rule::SimpleRule,
};

use super::{DeviceError, DeviceResult};

/// Normally open push button. Closed only while held down.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TactileButton {
    pressed: bool,
    presses: u64,
}

impl TactileButton {
    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn presses(&self) -> u64 {
        self.presses
    }
}

impl AgentBehavior for TactileButton {
    fn kind(&self) -> &str {
        "TactileButton"
    }
}

fn button_edge<'a>(payload: &'a EventPayload) -> Option<&'a str> {
    match payload {
        EventPayload::ButtonPressed { button } | EventPayload::ButtonReleased { button } => {
            Some(button)
        }
        _ => None,
    }
}

/// Builds a button agent. Its ingress takes the raw edges reported for its
/// own name; repeated edges are dropped, the rest are re-emitted to listeners.
pub fn tactile_button(name: &str) -> DeviceResult<Agent<TactileButton>> {
    let agent = Agent::new(name, TactileButton::default())
        .with_ingress_filter(|own_name, event| button_edge(event.payload()) == Some(own_name));

    let press = SimpleRule::<TactileButton>::on(EventType::ButtonPressed)
        .named("press")
        .when(|cx| !cx.agent.pressed)
        .then(|cx| {
            cx.agent.pressed = true;
            cx.agent.presses += 1;
            Ok(vec![Event::new(EventPayload::ButtonPressed {
                button: cx.ctx.name(),
            })])
        });
    let release = SimpleRule::<TactileButton>::on(EventType::ButtonReleased)
        .named("release")
        .when(|cx| cx.agent.pressed)
        .then(|cx| {
            cx.agent.pressed = false;
            Ok(vec![Event::new(EventPayload::ButtonReleased {
                button: cx.ctx.name(),
            })])
        });

    agent
        .add_rule(press)
        .and_then(|_| agent.add_rule(release))
        .map_err(|e| DeviceError::Hardware {
            device: name.to_string(),
            message: e.to_string(),
        })?;
    Ok(agent)
}

/// Reports a press edge to a button agent, as its input pin driver would.
pub fn press_button(button: &impl RuntimeAgent) -> bool {
    button.on(Event::new(EventPayload::ButtonPressed {
        button: button.name(),
    }))
}

pub fn release_button(button: &impl RuntimeAgent) -> bool {
    button.on(Event::new(EventPayload::ButtonReleased {
        button: button.name(),
    }))
}

/// Character grid of a generic alphanumeric display.
#[derive(Debug, Clone, PartialEq)]
pub struct AlphanumericDisplay {
    rows: Vec<Vec<char>>,
    columns: usize,
}

impl AlphanumericDisplay {
    pub fn new(rows: usize, columns: usize) -> DeviceResult<Self> {
        if rows == 0 || columns == 0 {
            return Err(DeviceError::InvalidSetting {
                message: format!("display size {rows}x{columns} is empty"),
            });
        }
        Ok(Self {
            rows: vec![vec![' '; columns]; rows],
            columns,
        })
    }

    pub fn size(&self) -> (usize, usize) {
        (self.rows.len(), self.columns)
    }

    /// Writes `text` from `column` on. Characters left of column 0 or past
    /// the last column are cut; a row outside the display is ignored.
    pub fn update_text(&mut self, row: usize, column: i64, text: &str, clear: bool) -> bool {
        let Some(line) = self.rows.get_mut(row) else {
            return false;
        };
        let skip = usize::try_from(column.min(0).unsigned_abs()).unwrap_or(usize::MAX);
        let start = usize::try_from(column.max(0)).unwrap_or(usize::MAX);
        if start >= self.columns {
            return false;
        }
        let mut end = start;
        for (cell, ch) in line[start..].iter_mut().zip(text.chars().skip(skip)) {
            *cell = ch;
            end += 1;
        }
        if clear {
            line[end..].fill(' ');
        }
        true
    }

    pub fn clear_row(&mut self, row: usize) -> bool {
        match self.rows.get_mut(row) {
            Some(line) => {
                line.fill(' ');
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) {
        for line in &mut self.rows {
            line.fill(' ');
        }
    }

    pub fn line(&self, row: usize) -> Option<String> {
        self.rows.get(row).map(|line| line.iter().collect())
    }

    pub fn lines(&self) -> Vec<String> {
        self.rows.iter().map(|line| line.iter().collect()).collect()
    }
}

impl AgentBehavior for AlphanumericDisplay {
    fn kind(&self) -> &str {
        "AlphanumericDisplay"
    }
}

/// Builds a display agent that executes `DisplayText` and `ClearDisplay`
/// commands addressed to its name.
pub fn alphanumeric_display(
    name: &str,
    rows: usize,
    columns: usize,
) -> DeviceResult<Agent<AlphanumericDisplay>> {
    let display = AlphanumericDisplay::new(rows, columns)?;
    let agent = Agent::new(name, display)
        .with_ingress_filter(|own_name, event| event.payload().command_target() == Some(own_name));

    let write = SimpleRule::<AlphanumericDisplay>::on(EventType::DisplayText)
        .named("write_text")
        .always(|cx| {
            if let EventPayload::DisplayText {
                row,
                column,
                text,
                clear,
                ..
            } = cx.event.payload()
            {
                cx.agent.update_text(*row, *column, text, *clear);
            }
            Ok(Vec::new())
        });
    let clear = SimpleRule::<AlphanumericDisplay>::on(EventType::ClearDisplay)
        .named("clear")
        .always(|cx| {
            match cx.event.payload() {
                EventPayload::ClearDisplay { row: Some(row), .. } => {
                    cx.agent.clear_row(*row);
                }
                EventPayload::ClearDisplay { row: None, .. } => cx.agent.clear(),
                _ => {}
            }
            Ok(Vec::new())
        });

    agent
        .add_rule(write)
        .and_then(|_| agent.add_rule(clear))
        .map_err(|e| DeviceError::Hardware {
            device: name.to_string(),
            message: e.to_string(),
        })?;
    Ok(agent)
}
