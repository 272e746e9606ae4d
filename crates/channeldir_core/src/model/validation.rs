//! Pure payload validation.
//!
//! # Responsibility
//! - Reject payloads with missing identity or ownership.
//! - Reject embedded references that would smuggle unrelated graph edits.
//! - Check whole batches before any document is read or written.
//!
//! # Invariants
//! - No function here touches storage.
//! - Validated documents carry de-duplicated, name-sorted edge lists.

use crate::model::entity::{
    upsert_ref, Attribute, Channel, ChannelRef, EntityKind, Property, PropertyRef, Tag, TagRef,
};
use crate::model::payload::{ChannelPayload, Payload, PropertyPayload, TagPayload};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Payload rejection reasons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Serialized input could not be decoded at all.
    Malformed(String),
    MissingName {
        kind: EntityKind,
    },
    MissingOwner {
        kind: EntityKind,
        name: String,
    },
    /// An embedded reference has no name.
    MissingReferenceName {
        kind: EntityKind,
        name: String,
        reference_kind: EntityKind,
    },
    /// An embedded reference carries its own edge list.
    NestedEdges {
        kind: EntityKind,
        name: String,
        nested: String,
    },
    /// A property edge has no value.
    MissingEdgeValue {
        property: String,
        channel: String,
    },
    /// Body name differs from the addressed path name.
    NameMismatch {
        kind: EntityKind,
        path: String,
        body: String,
    },
    /// A batch item has no name and cannot be keyed.
    UnkeyedItem {
        kind: EntityKind,
        index: usize,
    },
    InvalidQuery(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(message) => write!(f, "malformed payload: {message}"),
            Self::MissingName { kind } => write!(f, "{kind} name must not be empty"),
            Self::MissingOwner { kind, name } => {
                write!(f, "{kind} `{name}` owner must not be empty")
            }
            Self::MissingReferenceName {
                kind,
                name,
                reference_kind,
            } => write!(
                f,
                "{kind} `{name}` embeds a {reference_kind} reference without a name"
            ),
            Self::NestedEdges { kind, name, nested } => write!(
                f,
                "{kind} `{name}` embeds `{nested}` with its own edge list"
            ),
            Self::MissingEdgeValue { property, channel } => write!(
                f,
                "property `{property}` on channel `{channel}` must carry a value"
            ),
            Self::NameMismatch { kind, path, body } => write!(
                f,
                "{kind} payload name `{body}` does not match addressed name `{path}`"
            ),
            Self::UnkeyedItem { kind, index } => {
                write!(f, "{kind} batch item {index} has no name")
            }
            Self::InvalidQuery(message) => write!(f, "invalid channel query: {message}"),
        }
    }
}

impl Error for ValidationError {}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn identity(
    kind: EntityKind,
    name: Option<String>,
    owner: Option<String>,
) -> ValidationResult<(String, String)> {
    let name = required(name).ok_or(ValidationError::MissingName { kind })?;
    let owner = required(owner).ok_or_else(|| ValidationError::MissingOwner {
        kind,
        name: name.clone(),
    })?;
    Ok((name, owner))
}

/// Validates a channel payload.
///
/// Embedded property references must be named and valued; embedded tag
/// references must be named. Owners of references are filled from the peer
/// documents during resolution, so they may be omitted here.
pub fn validate_channel(payload: ChannelPayload) -> ValidationResult<Channel> {
    let (name, owner) = identity(EntityKind::Channel, payload.name, payload.owner)?;
    let mut channel = Channel::new(name, owner);

    for property in payload.properties {
        let property_name =
            required(property.name).ok_or_else(|| ValidationError::MissingReferenceName {
                kind: EntityKind::Channel,
                name: channel.name.clone(),
                reference_kind: EntityKind::Property,
            })?;
        if !property.channels.is_empty() {
            return Err(ValidationError::NestedEdges {
                kind: EntityKind::Channel,
                name: channel.name.clone(),
                nested: property_name,
            });
        }
        let value = required(property.value).ok_or_else(|| ValidationError::MissingEdgeValue {
            property: property_name.clone(),
            channel: channel.name.clone(),
        })?;
        upsert_ref(
            &mut channel.properties,
            PropertyRef {
                name: property_name,
                owner: property.owner.unwrap_or_default(),
                value,
            },
        );
    }

    for tag in payload.tags {
        let tag_name = required(tag.name).ok_or_else(|| ValidationError::MissingReferenceName {
            kind: EntityKind::Channel,
            name: channel.name.clone(),
            reference_kind: EntityKind::Tag,
        })?;
        if !tag.channels.is_empty() {
            return Err(ValidationError::NestedEdges {
                kind: EntityKind::Channel,
                name: channel.name.clone(),
                nested: tag_name,
            });
        }
        upsert_ref(
            &mut channel.tags,
            TagRef {
                name: tag_name,
                owner: tag.owner.unwrap_or_default(),
            },
        );
    }

    Ok(channel)
}

pub fn validate_property(payload: PropertyPayload) -> ValidationResult<Property> {
    let (name, owner) = identity(EntityKind::Property, payload.name, payload.owner)?;
    let mut property = Property::new(name, owner);
    property.value = payload.value;
    embed_channels(&mut property, payload.channels)?;
    Ok(property)
}

pub fn validate_tag(payload: TagPayload) -> ValidationResult<Tag> {
    let (name, owner) = identity(EntityKind::Tag, payload.name, payload.owner)?;
    let mut tag = Tag::new(name, owner);
    embed_channels(&mut tag, payload.channels)?;
    Ok(tag)
}

/// Converts embedded channel references of a property or tag payload.
///
/// Later duplicates replace earlier ones.
fn embed_channels<A: Attribute>(
    target: &mut A,
    channels: Vec<ChannelPayload>,
) -> ValidationResult<()> {
    for channel in channels {
        let channel_name =
            required(channel.name).ok_or_else(|| ValidationError::MissingReferenceName {
                kind: A::KIND,
                name: target.name().to_string(),
                reference_kind: EntityKind::Channel,
            })?;
        if !channel.properties.is_empty() || !channel.tags.is_empty() {
            return Err(ValidationError::NestedEdges {
                kind: A::KIND,
                name: target.name().to_string(),
                nested: channel_name,
            });
        }
        let value = if A::VALUED {
            Some(
                required(channel.value).ok_or_else(|| ValidationError::MissingEdgeValue {
                    property: target.name().to_string(),
                    channel: channel_name.clone(),
                })?,
            )
        } else {
            None
        };
        target.link_channel(ChannelRef::new(
            channel_name,
            channel.owner.unwrap_or_default(),
            value,
        ));
    }
    Ok(())
}

/// Validates a single-channel attach payload addressed as `/{path_name}/{channel}`.
pub fn validate_attach<A: Attribute>(
    payload: A::Payload,
    path_name: &str,
    channel: &str,
) -> ValidationResult<A> {
    let attribute = payload.into_entity()?;
    if attribute.name() != path_name {
        return Err(ValidationError::NameMismatch {
            kind: A::KIND,
            path: path_name.to_string(),
            body: attribute.name().to_string(),
        });
    }
    if A::VALUED && attribute.edge_value().map_or(true, |value| value.trim().is_empty()) {
        return Err(ValidationError::MissingEdgeValue {
            property: path_name.to_string(),
            channel: channel.to_string(),
        });
    }
    Ok(attribute)
}

/// Validates every batch item before any of them is resolved.
///
/// The first failing item decides the error; a nameless item is reported as
/// `UnkeyedItem`.
pub fn validate_batch<P: Payload>(
    payloads: Vec<P>,
) -> ValidationResult<Vec<P::Entity>> {
    let kind = <P::Entity as crate::model::entity::Entity>::KIND;
    let mut entities = Vec::with_capacity(payloads.len());
    for (index, payload) in payloads.into_iter().enumerate() {
        if payload.key().is_none() {
            return Err(ValidationError::UnkeyedItem { kind, index });
        }
        entities.push(payload.into_entity()?);
    }
    Ok(entities)
}
