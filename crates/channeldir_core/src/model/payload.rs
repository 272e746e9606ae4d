//! Client payload shapes and decoding.
//!
//! Payload fields are all optional so that a structurally valid document with
//! a missing field is reported by validation, while unparseable text is
//! reported as `Malformed` before validation runs.

use crate::model::entity::{Channel, Entity, Property, Tag};
use crate::model::validation::{self, ValidationError, ValidationResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Payload that validates into one entity kind.
pub trait Payload: DeserializeOwned + Clone {
    type Entity: Entity;

    /// Key of the payload, if present and non-blank.
    fn key(&self) -> Option<&str>;

    /// Runs entity-level validation and converts into the document shape.
    fn into_entity(self) -> ValidationResult<Self::Entity>;
}

/// Channel as sent by clients, either standalone or embedded in a property
/// or tag payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelPayload {
    pub name: Option<String>,
    pub owner: Option<String>,
    /// Edge value when embedded in a property payload.
    pub value: Option<String>,
    pub properties: Vec<PropertyPayload>,
    pub tags: Vec<TagPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyPayload {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub value: Option<String>,
    pub channels: Vec<ChannelPayload>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagPayload {
    pub name: Option<String>,
    pub owner: Option<String>,
    pub channels: Vec<ChannelPayload>,
}

impl ChannelPayload {
    pub fn named(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    /// Edge reference used inside property payloads.
    pub fn edge(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }
}

impl PropertyPayload {
    pub fn named(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_channel(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.channels.push(ChannelPayload::edge(name, value));
        self
    }
}

impl TagPayload {
    pub fn named(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            owner: Some(owner.into()),
            ..Self::default()
        }
    }

    pub fn with_channel(mut self, name: impl Into<String>) -> Self {
        self.channels.push(ChannelPayload {
            name: Some(name.into()),
            ..ChannelPayload::default()
        });
        self
    }
}

impl From<&Channel> for ChannelPayload {
    fn from(value: &Channel) -> Self {
        Self {
            name: Some(value.name.clone()),
            owner: Some(value.owner.clone()),
            value: None,
            properties: value
                .properties
                .iter()
                .map(|property| PropertyPayload {
                    name: Some(property.name.clone()),
                    owner: Some(property.owner.clone()),
                    value: Some(property.value.clone()),
                    channels: Vec::new(),
                })
                .collect(),
            tags: value
                .tags
                .iter()
                .map(|tag| TagPayload::named(tag.name.clone(), tag.owner.clone()))
                .collect(),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}

impl Payload for ChannelPayload {
    type Entity = Channel;

    fn key(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    fn into_entity(self) -> ValidationResult<Channel> {
        validation::validate_channel(self)
    }
}

impl Payload for PropertyPayload {
    type Entity = Property;

    fn key(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    fn into_entity(self) -> ValidationResult<Property> {
        validation::validate_property(self)
    }
}

impl Payload for TagPayload {
    type Entity = Tag;

    fn key(&self) -> Option<&str> {
        non_blank(&self.name)
    }

    fn into_entity(self) -> ValidationResult<Tag> {
        validation::validate_tag(self)
    }
}

/// Decodes one payload document from its serialized text.
pub fn decode_one<P: Payload>(raw: &str) -> ValidationResult<P> {
    serde_json::from_str(raw).map_err(|err| ValidationError::Malformed(err.to_string()))
}

/// Decodes an array of payload documents; any malformed item fails the whole
/// array.
pub fn decode_many<P: Payload>(raw: &str) -> ValidationResult<Vec<P>> {
    serde_json::from_str(raw).map_err(|err| ValidationError::Malformed(err.to_string()))
}
