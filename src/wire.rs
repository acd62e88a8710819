//! Key-value wire form of events.
//!
//! ```json
//! {"type":"EnableRelay","id":"…","name":"cmd","occurrenceTime":1700000000000,
//!  "priority":"MEDIUM","sourceId":"…","sourceName":"controller","relay":"pump"}
//! ```
//!
//! Custom events carry their custom name as `type` and their fields nested
//! under `fields`, which is always present for them:
//!
//! ```json
//! {"type":"Started","id":"…","occurrenceTime":1700000000000,"priority":"MEDIUM",
//!  "fields":{"name":"sensor-7"}}
//! ```
//!
//! The `fields` object marks the message as custom, so a custom name that
//! matches a built-in kind decodes back to the custom event. Messages from
//! peers that do not nest (an unknown `type` without `fields`) decode as
//! custom events whose fields are the non-envelope keys.

use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    event::{Event, EventPayload, EventPriority, EventType, SourceRef},
    id::{AgentId, EventId},
    timestamp::Timestamp,
};

const TYPE: &str = "type";
const ID: &str = "id";
const NAME: &str = "name";
const OCCURRENCE_TIME: &str = "occurrenceTime";
const PRIORITY: &str = "priority";
const SOURCE_ID: &str = "sourceId";
const SOURCE_NAME: &str = "sourceName";
const FIELDS: &str = "fields";

const ENVELOPE: [&str; 8] = [
    TYPE,
    ID,
    NAME,
    OCCURRENCE_TIME,
    PRIORITY,
    SOURCE_ID,
    SOURCE_NAME,
    FIELDS,
];

#[derive(Error, Debug)]
pub enum WireError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not an object")]
    NotAnObject,
    #[error("missing or invalid field {field}")]
    InvalidField { field: &'static str },
    #[error("event {event_type} cannot be encoded: {message}")]
    Unencodable { event_type: String, message: String },
}

pub type WireResult<T> = Result<T, WireError>;

pub fn encode(event: &Event) -> WireResult<Value> {
    let mut object = match event.payload() {
        EventPayload::Custom { name, fields } => {
            let mut object = Map::new();
            object.insert(TYPE.to_string(), Value::String(name.clone()));
            object.insert(FIELDS.to_string(), Value::Object(fields.clone()));
            object
        }
        payload => match serde_json::to_value(payload) {
            Ok(Value::Object(object)) => object,
            Ok(_) => return Err(WireError::NotAnObject),
            Err(e) => {
                return Err(WireError::Unencodable {
                    event_type: event.event_type().to_string(),
                    message: e.to_string(),
                })
            }
        },
    };

    object.insert(ID.to_string(), Value::String(event.id().to_string()));
    if let Some(name) = event.name() {
        object.insert(NAME.to_string(), Value::String(name.to_string()));
    }
    object.insert(
        OCCURRENCE_TIME.to_string(),
        Value::from(event.occurred_at().as_millis()),
    );
    object.insert(
        PRIORITY.to_string(),
        Value::String(event.priority().to_string()),
    );
    if let Some(source) = event.source() {
        object.insert(SOURCE_ID.to_string(), Value::String(source.id.to_string()));
        object.insert(SOURCE_NAME.to_string(), Value::String(source.name.clone()));
    }
    Ok(Value::Object(object))
}

pub fn encode_string(event: &Event) -> WireResult<String> {
    Ok(serde_json::to_string(&encode(event)?)?)
}

pub fn decode(value: Value) -> WireResult<Event> {
    let Value::Object(object) = value else {
        return Err(WireError::NotAnObject);
    };
    let type_name = object
        .get(TYPE)
        .and_then(Value::as_str)
        .ok_or(WireError::InvalidField { field: TYPE })?
        .to_string();

    let payload = match (object.get(FIELDS), EventType::from_str(&type_name)) {
        (Some(Value::Object(fields)), _) => EventPayload::custom_with(type_name, fields.clone()),
        (Some(_), _) => return Err(WireError::InvalidField { field: FIELDS }),
        (None, Ok(event_type)) if !event_type.is_custom() => {
            serde_json::from_value(Value::Object(object.clone()))?
        }
        (None, _) => {
            let fields: Map<String, Value> = object
                .iter()
                .filter(|(key, _)| !ENVELOPE.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            EventPayload::custom_with(type_name, fields)
        }
    };

    let mut event = Event::new(payload);
    if let Some(id) = object.get(ID).and_then(Value::as_str) {
        let id = EventId::from_str(id).map_err(|_| WireError::InvalidField { field: ID })?;
        event = event.with_id(id);
    }
    if let Some(name) = object.get(NAME).and_then(Value::as_str) {
        event = event.with_name(name);
    }
    if let Some(time) = object.get(OCCURRENCE_TIME) {
        let millis = time.as_u64().ok_or(WireError::InvalidField {
            field: OCCURRENCE_TIME,
        })?;
        event = event.with_occurred_at(Timestamp::from_millis(millis));
    }
    if let Some(priority) = object.get(PRIORITY) {
        let priority = priority
            .as_str()
            .and_then(|p| EventPriority::from_str(p).ok())
            .ok_or(WireError::InvalidField { field: PRIORITY })?;
        event = event.with_priority(priority);
    }
    if let Some(source_id) = object.get(SOURCE_ID).and_then(Value::as_str) {
        let id = AgentId::from_str(source_id).map_err(|_| WireError::InvalidField {
            field: SOURCE_ID,
        })?;
        let name = object
            .get(SOURCE_NAME)
            .and_then(Value::as_str)
            .unwrap_or_default();
        event = event.with_source(SourceRef::new(id, name));
    }
    Ok(event)
}

pub fn decode_str(message: &str) -> WireResult<Event> {
    decode(serde_json::from_str(message)?)
}
