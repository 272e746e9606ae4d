//! Channel, property and tag documents.
//!
//! # Responsibility
//! - Define the persisted document shape of every entity kind.
//! - Provide set-semantics helpers for the denormalized edge lists.
//!
//! # Invariants
//! - A channel lists property `p` with value `v` iff `p` lists the channel
//!   with value `v`; tags follow the same rule without a value.
//! - Edge lists hold at most one entry per peer name, sorted by name.

use crate::model::payload::{ChannelPayload, Payload, PropertyPayload, TagPayload};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Entity kind descriptor shared by store, resolver and service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Channel,
    Property,
    Tag,
}

impl EntityKind {
    /// Singular label used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Property => "property",
            Self::Tag => "tag",
        }
    }

    /// Document collection (table) holding this kind.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Channel => "channels",
            Self::Property => "properties",
            Self::Tag => "tags",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common contract of every stored document.
pub trait Entity:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const KIND: EntityKind;

    /// Client-facing payload that validates into this entity.
    type Payload: Payload<Entity = Self>;

    fn name(&self) -> &str;
    fn owner(&self) -> &str;

    /// Representation used by list endpoints.
    fn into_listing(self) -> Self;
}

/// Entry of an edge list that can be kept as a sorted set.
pub trait NamedRef {
    fn ref_name(&self) -> &str;
}

/// Inserts or replaces `item` keeping `list` sorted by name.
///
/// Returns `false` when an identical entry was already present.
pub fn upsert_ref<T: NamedRef + PartialEq>(list: &mut Vec<T>, item: T) -> bool {
    match list.binary_search_by(|probe| probe.ref_name().cmp(item.ref_name())) {
        Ok(index) if list[index] == item => false,
        Ok(index) => {
            list[index] = item;
            true
        }
        Err(index) => {
            list.insert(index, item);
            true
        }
    }
}

/// Removes the entry named `name`; returns whether one was present.
pub fn remove_ref<T: NamedRef>(list: &mut Vec<T>, name: &str) -> bool {
    match list.binary_search_by(|probe| probe.ref_name().cmp(name)) {
        Ok(index) => {
            list.remove(index);
            true
        }
        Err(_) => false,
    }
}

fn find_ref<'a, T: NamedRef>(list: &'a [T], name: &str) -> Option<&'a T> {
    list.binary_search_by(|probe| probe.ref_name().cmp(name))
        .ok()
        .map(|index| &list[index])
}

/// Property edge as held by a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRef {
    pub name: String,
    pub owner: String,
    pub value: String,
}

/// Tag edge as held by a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
    pub name: String,
    pub owner: String,
}

/// Channel edge as held by a property or tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRef {
    pub name: String,
    pub owner: String,
    /// Property value on this channel; always `None` for tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ChannelRef {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            value,
        }
    }
}

impl NamedRef for PropertyRef {
    fn ref_name(&self) -> &str {
        &self.name
    }
}

impl NamedRef for TagRef {
    fn ref_name(&self) -> &str {
        &self.name
    }
}

impl NamedRef for ChannelRef {
    fn ref_name(&self) -> &str {
        &self.name
    }
}

/// Channel document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub properties: Vec<PropertyRef>,
    #[serde(default)]
    pub tags: Vec<TagRef>,
}

impl Channel {
    /// Creates a channel without edges.
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            properties: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn property(&self, name: &str) -> Option<&PropertyRef> {
        find_ref(&self.properties, name)
    }

    pub fn tag(&self, name: &str) -> Option<&TagRef> {
        find_ref(&self.tags, name)
    }

    /// Builder used by callers assembling channel payloads in code.
    pub fn with_property(
        mut self,
        name: impl Into<String>,
        owner: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        upsert_ref(
            &mut self.properties,
            PropertyRef {
                name: name.into(),
                owner: owner.into(),
                value: value.into(),
            },
        );
        self
    }

    pub fn with_tag(mut self, name: impl Into<String>, owner: impl Into<String>) -> Self {
        upsert_ref(
            &mut self.tags,
            TagRef {
                name: name.into(),
                owner: owner.into(),
            },
        );
        self
    }
}

impl Entity for Channel {
    const KIND: EntityKind = EntityKind::Channel;
    type Payload = ChannelPayload;

    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn into_listing(self) -> Self {
        self
    }
}

/// Property document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub owner: String,
    /// Only meaningful in attach payloads; channel values live on edges.
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelRef>,
}

impl Property {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            value: None,
            channels: Vec::new(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_channel(
        mut self,
        name: impl Into<String>,
        owner: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        upsert_ref(
            &mut self.channels,
            ChannelRef::new(name, owner, Some(value.into())),
        );
        self
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelRef> {
        find_ref(&self.channels, name)
    }
}

impl Entity for Property {
    const KIND: EntityKind = EntityKind::Property;
    type Payload = PropertyPayload;

    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn into_listing(mut self) -> Self {
        self.channels.clear();
        self
    }
}

/// Tag document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub channels: Vec<ChannelRef>,
}

impl Tag {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            channels: Vec::new(),
        }
    }

    pub fn with_channel(mut self, name: impl Into<String>, owner: impl Into<String>) -> Self {
        upsert_ref(&mut self.channels, ChannelRef::new(name, owner, None));
        self
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelRef> {
        find_ref(&self.channels, name)
    }
}

impl Entity for Tag {
    const KIND: EntityKind = EntityKind::Tag;
    type Payload = TagPayload;

    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn into_listing(mut self) -> Self {
        self.channels.clear();
        self
    }
}

/// One edge read from the channel side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub name: String,
    pub value: Option<String>,
}

/// Entity kinds that attach to channels (properties and tags).
///
/// Each kind knows how its edge is represented on both documents so the
/// resolver can stay generic over the peer kind.
pub trait Attribute: Entity {
    /// Whether edges of this kind carry a per-channel value.
    const VALUED: bool;

    /// Creates a document with identity only.
    fn bare(name: &str, owner: &str) -> Self;

    fn channels(&self) -> &[ChannelRef];
    fn channels_mut(&mut self) -> &mut Vec<ChannelRef>;

    /// Value carried by an attach payload.
    fn edge_value(&self) -> Option<&str>;

    /// Edges of this kind listed on `channel`.
    fn edges_on(channel: &Channel) -> Vec<Edge>;

    /// Upserts this kind's edge `name` on `channel`; returns whether it changed.
    fn attach_to(channel: &mut Channel, name: &str, owner: &str, value: Option<&str>) -> bool;

    /// Removes this kind's edge `name` from `channel`; returns whether it existed.
    fn detach_from(channel: &mut Channel, name: &str) -> bool;

    /// Upserts a channel edge on this document; returns whether it changed.
    fn link_channel(&mut self, reference: ChannelRef) -> bool {
        upsert_ref(self.channels_mut(), reference)
    }

    fn unlink_channel(&mut self, channel: &str) -> bool {
        remove_ref(self.channels_mut(), channel)
    }
}

impl Attribute for Property {
    const VALUED: bool = true;

    fn bare(name: &str, owner: &str) -> Self {
        Self::new(name, owner)
    }

    fn channels(&self) -> &[ChannelRef] {
        &self.channels
    }

    fn channels_mut(&mut self) -> &mut Vec<ChannelRef> {
        &mut self.channels
    }

    fn edge_value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    fn edges_on(channel: &Channel) -> Vec<Edge> {
        channel
            .properties
            .iter()
            .map(|property| Edge {
                name: property.name.clone(),
                value: Some(property.value.clone()),
            })
            .collect()
    }

    fn attach_to(channel: &mut Channel, name: &str, owner: &str, value: Option<&str>) -> bool {
        upsert_ref(
            &mut channel.properties,
            PropertyRef {
                name: name.to_string(),
                owner: owner.to_string(),
                value: value.unwrap_or_default().to_string(),
            },
        )
    }

    fn detach_from(channel: &mut Channel, name: &str) -> bool {
        remove_ref(&mut channel.properties, name)
    }
}

impl Attribute for Tag {
    const VALUED: bool = false;

    fn bare(name: &str, owner: &str) -> Self {
        Self::new(name, owner)
    }

    fn channels(&self) -> &[ChannelRef] {
        &self.channels
    }

    fn channels_mut(&mut self) -> &mut Vec<ChannelRef> {
        &mut self.channels
    }

    fn edge_value(&self) -> Option<&str> {
        None
    }

    fn edges_on(channel: &Channel) -> Vec<Edge> {
        channel
            .tags
            .iter()
            .map(|tag| Edge {
                name: tag.name.clone(),
                value: None,
            })
            .collect()
    }

    fn attach_to(channel: &mut Channel, name: &str, owner: &str, _value: Option<&str>) -> bool {
        upsert_ref(
            &mut channel.tags,
            TagRef {
                name: name.to_string(),
                owner: owner.to_string(),
            },
        )
    }

    fn detach_from(channel: &mut Channel, name: &str) -> bool {
        remove_ref(&mut channel.tags, name)
    }

    fn link_channel(&mut self, mut reference: ChannelRef) -> bool {
        reference.value = None;
        upsert_ref(&mut self.channels, reference)
    }
}

#[cfg(test)]
mod tests {
    use super::{Attribute, Channel, ChannelRef, Entity, Property, Tag};

    #[test]
    fn readding_a_property_edge_replaces_the_value() {
        let mut channel = Channel::new("c1", "o1");
        assert!(Property::attach_to(&mut channel, "p1", "o1", Some("a")));
        assert!(Property::attach_to(&mut channel, "p1", "o1", Some("b")));
        assert!(!Property::attach_to(&mut channel, "p1", "o1", Some("b")));

        assert_eq!(channel.properties.len(), 1);
        assert_eq!(channel.property("p1").map(|p| p.value.as_str()), Some("b"));
    }

    #[test]
    fn edge_lists_stay_sorted_by_name() {
        let mut property = Property::new("p1", "o1");
        for name in ["c3", "c1", "c2"] {
            property.link_channel(ChannelRef::new(name, "o1", Some("v".to_string())));
        }
        let names: Vec<&str> = property.channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["c1", "c2", "c3"]);
    }

    #[test]
    fn tag_edges_never_carry_values() {
        let mut tag = Tag::new("t1", "o1");
        tag.link_channel(ChannelRef::new("c1", "o1", Some("ignored".to_string())));
        assert_eq!(tag.channel("c1").and_then(|c| c.value.clone()), None);
    }

    #[test]
    fn detach_reports_missing_edges() {
        let mut channel = Channel::new("c1", "o1").with_tag("t1", "o1");
        assert!(Tag::detach_from(&mut channel, "t1"));
        assert!(!Tag::detach_from(&mut channel, "t1"));
    }

    #[test]
    fn listing_strips_attribute_channels_only() {
        let property = Property::new("p1", "o1").with_channel("c1", "o1", "v");
        assert!(property.into_listing().channels.is_empty());

        let channel = Channel::new("c1", "o1").with_property("p1", "o1", "v");
        assert_eq!(channel.clone().into_listing(), channel);
    }
}
