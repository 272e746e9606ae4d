//! Association resolution.
//!
//! # Responsibility
//! - Turn one requested mutation into the full set of document writes that
//!   keeps both sides of every channel edge in agreement.
//! - Read affected documents once per draft, in bulk where possible.
//!
//! # Invariants
//! - Every staged write carries the version its document was read at, so a
//!   concurrent change surfaces as a store conflict instead of a lost update.
//! - No edge is staged toward a document that is absent from the draft.
//! - Resolution never writes; only `WritePlan` application does.

use crate::model::entity::{Attribute, Channel, ChannelRef, Entity, EntityKind, Property, Tag};
use crate::repo::{
    DocumentStore, DocumentVersion, DocumentWrite, ExpectedVersion, StoreResult, Versioned,
};
use crate::service::error::{DirectoryError, DirectoryResult, Outcome, ReferentialError};
use std::collections::{BTreeMap, BTreeSet};

/// Working copy of one document inside a draft.
#[derive(Debug, Clone)]
pub struct Slot<E> {
    read_version: Option<DocumentVersion>,
    current: Option<E>,
    dirty: bool,
}

impl<E> Slot<E> {
    fn from_read(read: Option<Versioned<E>>) -> Self {
        match read {
            Some(versioned) => Self {
                read_version: Some(versioned.version),
                current: Some(versioned.entity),
                dirty: false,
            },
            None => Self {
                read_version: None,
                current: None,
                dirty: false,
            },
        }
    }
}

pub type Slots<E> = BTreeMap<String, Slot<E>>;

/// Documents loaded for one resolution cycle plus their pending changes.
pub struct Draft<'s, S: DocumentStore> {
    store: &'s S,
    channels: Slots<Channel>,
    properties: Slots<Property>,
    tags: Slots<Tag>,
}

/// Entity kinds that can live in a draft and a write plan.
pub trait Stageable: Entity {
    fn slots<'d, S: DocumentStore>(draft: &'d mut Draft<'_, S>) -> &'d mut Slots<Self>;
    fn staged(plan: &mut WritePlan) -> &mut Vec<DocumentWrite<Self>>;
}

impl Stageable for Channel {
    fn slots<'d, S: DocumentStore>(draft: &'d mut Draft<'_, S>) -> &'d mut Slots<Self> {
        &mut draft.channels
    }

    fn staged(plan: &mut WritePlan) -> &mut Vec<DocumentWrite<Self>> {
        &mut plan.channels
    }
}

impl Stageable for Property {
    fn slots<'d, S: DocumentStore>(draft: &'d mut Draft<'_, S>) -> &'d mut Slots<Self> {
        &mut draft.properties
    }

    fn staged(plan: &mut WritePlan) -> &mut Vec<DocumentWrite<Self>> {
        &mut plan.properties
    }
}

impl Stageable for Tag {
    fn slots<'d, S: DocumentStore>(draft: &'d mut Draft<'_, S>) -> &'d mut Slots<Self> {
        &mut draft.tags
    }

    fn staged(plan: &mut WritePlan) -> &mut Vec<DocumentWrite<Self>> {
        &mut plan.tags
    }
}

impl<'s, S: DocumentStore> Draft<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            channels: BTreeMap::new(),
            properties: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    /// Loads every not yet loaded name with one bulk read.
    pub fn preload<E: Stageable>(&mut self, names: &[String]) -> StoreResult<()> {
        let pending: Vec<String> = {
            let slots = E::slots(self);
            names
                .iter()
                .filter(|name| !slots.contains_key(name.as_str()))
                .cloned()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };
        if pending.is_empty() {
            return Ok(());
        }

        let mut found = self.store.bulk_get::<E>(&pending)?;
        let slots = E::slots(self);
        for name in pending {
            let read = found.remove(&name);
            slots.insert(name, Slot::from_read(read));
        }
        Ok(())
    }

    fn ensure_loaded<E: Stageable>(&mut self, name: &str) -> StoreResult<()> {
        if E::slots(self).contains_key(name) {
            return Ok(());
        }
        let read = self.store.get::<E>(name)?;
        E::slots(self).insert(name.to_string(), Slot::from_read(read));
        Ok(())
    }

    /// Current draft state of `name`.
    pub fn get<E: Stageable>(&mut self, name: &str) -> StoreResult<Option<E>> {
        self.ensure_loaded::<E>(name)?;
        Ok(E::slots(self)
            .get(name)
            .and_then(|slot| slot.current.clone()))
    }

    pub fn contains<E: Stageable>(&mut self, name: &str) -> StoreResult<bool> {
        self.ensure_loaded::<E>(name)?;
        Ok(E::slots(self)
            .get(name)
            .map_or(false, |slot| slot.current.is_some()))
    }

    /// Replaces the draft state of `entity`'s document.
    pub fn stage<E: Stageable>(&mut self, entity: E) -> StoreResult<()> {
        let name = entity.name().to_string();
        self.ensure_loaded::<E>(&name)?;
        if let Some(slot) = E::slots(self).get_mut(&name) {
            if slot.current.as_ref() != Some(&entity) {
                slot.current = Some(entity);
                slot.dirty = true;
            }
        }
        Ok(())
    }

    /// Applies `change` to an existing document.
    ///
    /// `change` reports whether it altered the document. Returns `false`
    /// when the document is absent, in which case `change` is not called.
    pub fn modify<E, F>(&mut self, name: &str, change: F) -> StoreResult<bool>
    where
        E: Stageable,
        F: FnOnce(&mut E) -> bool,
    {
        self.ensure_loaded::<E>(name)?;
        let Some(slot) = E::slots(self).get_mut(name) else {
            return Ok(false);
        };
        let Some(entity) = slot.current.as_mut() else {
            return Ok(false);
        };
        if change(entity) {
            slot.dirty = true;
        }
        Ok(true)
    }

    /// Marks `name` for removal.
    pub fn discard<E: Stageable>(&mut self, name: &str) -> StoreResult<()> {
        self.ensure_loaded::<E>(name)?;
        if let Some(slot) = E::slots(self).get_mut(name) {
            if slot.current.take().is_some() {
                slot.dirty = true;
            }
        }
        Ok(())
    }

    /// Collects dirty slots into a plan that writes `anchor` documents after
    /// their peers.
    pub fn into_plan(self, anchor: EntityKind) -> WritePlan {
        let mut plan = WritePlan::new(anchor);
        collect_slots(self.properties, &mut plan);
        collect_slots(self.tags, &mut plan);
        collect_slots(self.channels, &mut plan);
        plan
    }
}

fn collect_slots<E: Stageable>(slots: Slots<E>, plan: &mut WritePlan) {
    for (name, slot) in slots {
        if !slot.dirty {
            continue;
        }
        match (slot.current, slot.read_version) {
            (Some(entity), Some(version)) => E::staged(plan).push(DocumentWrite::new(
                entity,
                ExpectedVersion::Exactly(version),
            )),
            (Some(entity), None) => {
                E::staged(plan).push(DocumentWrite::new(entity, ExpectedVersion::Absent))
            }
            (None, Some(version)) => plan.removals.push(Removal {
                kind: E::KIND,
                name,
                expected: ExpectedVersion::Exactly(version),
            }),
            (None, None) => {}
        }
    }
}

/// Pending document deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub kind: EntityKind,
    pub name: String,
    pub expected: ExpectedVersion,
}

/// Complete set of writes produced by one resolution.
///
/// Peer collections are written before the `anchor` collection, and removals
/// come last. A re-run after a partial application then still sees the
/// anchor's previous edge list and finishes the peer side.
#[derive(Debug, Clone, PartialEq)]
pub struct WritePlan {
    /// Kind of the document the request addressed.
    pub anchor: EntityKind,
    pub properties: Vec<DocumentWrite<Property>>,
    pub tags: Vec<DocumentWrite<Tag>>,
    pub channels: Vec<DocumentWrite<Channel>>,
    pub removals: Vec<Removal>,
}

impl WritePlan {
    pub fn new(anchor: EntityKind) -> Self {
        Self {
            anchor,
            properties: Vec::new(),
            tags: Vec::new(),
            channels: Vec::new(),
            removals: Vec::new(),
        }
    }

    /// Collections in application order, `anchor` last.
    pub fn write_order(&self) -> [EntityKind; 3] {
        let mut order = [EntityKind::Property, EntityKind::Tag, EntityKind::Channel];
        if let Some(index) = order.iter().position(|kind| *kind == self.anchor) {
            order[index..].rotate_left(1);
        }
        order
    }

    pub fn is_empty(&self) -> bool {
        self.write_count() == 0
    }

    pub fn write_count(&self) -> usize {
        self.properties.len() + self.tags.len() + self.channels.len() + self.removals.len()
    }
}

/// Resolved document of a create-or-replace.
#[derive(Debug, Clone, PartialEq)]
pub struct Written<E> {
    pub entity: E,
    /// No document existed under this name before the write.
    pub created: bool,
}

impl<E> Written<E> {
    pub fn outcome(&self) -> Outcome {
        if self.created {
            Outcome::Created
        } else {
            Outcome::Ok
        }
    }
}

/// Kind-specific resolution of whole-document writes.
pub trait Resolvable: Stageable {
    /// Create-or-replace addressed at `path_name`.
    fn resolve_replace<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        path_name: &str,
        incoming: Self,
    ) -> DirectoryResult<Written<Self>>;

    /// Additive update addressed at `path_name`.
    fn resolve_merge<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        path_name: &str,
        incoming: Self,
    ) -> DirectoryResult<Self>;

    /// Deletion with edge cascade; absent documents are `NotFound`.
    fn resolve_remove<S: DocumentStore>(draft: &mut Draft<'_, S>, name: &str)
        -> DirectoryResult<()>;
}

impl Resolvable for Property {
    fn resolve_replace<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        path_name: &str,
        incoming: Self,
    ) -> DirectoryResult<Written<Self>> {
        replace_attribute(draft, path_name, incoming)
    }

    fn resolve_merge<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        path_name: &str,
        incoming: Self,
    ) -> DirectoryResult<Self> {
        merge_attribute(draft, path_name, incoming)
    }

    fn resolve_remove<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        name: &str,
    ) -> DirectoryResult<()> {
        remove_attribute::<Self, S>(draft, name)
    }
}

impl Resolvable for Tag {
    fn resolve_replace<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        path_name: &str,
        incoming: Self,
    ) -> DirectoryResult<Written<Self>> {
        replace_attribute(draft, path_name, incoming)
    }

    fn resolve_merge<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        path_name: &str,
        incoming: Self,
    ) -> DirectoryResult<Self> {
        merge_attribute(draft, path_name, incoming)
    }

    fn resolve_remove<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        name: &str,
    ) -> DirectoryResult<()> {
        remove_attribute::<Self, S>(draft, name)
    }
}

impl Resolvable for Channel {
    fn resolve_replace<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        path_name: &str,
        incoming: Self,
    ) -> DirectoryResult<Written<Self>> {
        replace_channel(draft, path_name, incoming)
    }

    fn resolve_merge<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        path_name: &str,
        incoming: Self,
    ) -> DirectoryResult<Self> {
        merge_channel(draft, path_name, incoming)
    }

    fn resolve_remove<S: DocumentStore>(
        draft: &mut Draft<'_, S>,
        name: &str,
    ) -> DirectoryResult<()> {
        if remove_channel_if_present(draft, name)? {
            Ok(())
        } else {
            Err(DirectoryError::not_found(EntityKind::Channel, name))
        }
    }
}

fn ref_names(references: &[ChannelRef]) -> Vec<String> {
    references
        .iter()
        .map(|reference| reference.name.clone())
        .collect()
}

/// Fails with `MissingPeers` unless every name in `peers` exists.
fn require_peers<E: Stageable, S: DocumentStore>(
    draft: &mut Draft<'_, S>,
    kind: EntityKind,
    name: &str,
    peers: &[String],
) -> DirectoryResult<()> {
    draft.preload::<E>(peers)?;
    let mut missing = Vec::new();
    for peer in peers {
        if !draft.contains::<E>(peer)? && !missing.contains(peer) {
            missing.push(peer.clone());
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    Err(ReferentialError::MissingPeers {
        kind,
        name: name.to_string(),
        peer_kind: E::KIND,
        missing,
    }
    .into())
}

fn replace_attribute<A, S>(
    draft: &mut Draft<'_, S>,
    path_name: &str,
    incoming: A,
) -> DirectoryResult<Written<A>>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    let name = incoming.name().to_string();
    if path_name != name {
        remove_attribute_if_present::<A, S>(draft, path_name)?;
    }

    let existing = draft.get::<A>(&name)?;
    let wanted = ref_names(incoming.channels());
    require_peers::<Channel, S>(draft, A::KIND, &name, &wanted)?;

    let mut document = A::bare(&name, incoming.owner());
    for reference in incoming.channels() {
        if let Some(channel) = draft.get::<Channel>(&reference.name)? {
            document.link_channel(ChannelRef::new(
                &channel.name,
                &channel.owner,
                reference.value.clone(),
            ));
        }
    }

    if let Some(previous) = &existing {
        let kept: BTreeSet<&String> = wanted.iter().collect();
        let stale: Vec<String> = ref_names(previous.channels())
            .into_iter()
            .filter(|channel| !kept.contains(channel))
            .collect();
        draft.preload::<Channel>(&stale)?;
        for channel in &stale {
            draft.modify::<Channel, _>(channel, |doc| A::detach_from(doc, &name))?;
        }
    }

    let owner = document.owner().to_string();
    for reference in document.channels().to_vec() {
        draft.modify::<Channel, _>(&reference.name, |doc| {
            A::attach_to(doc, &name, &owner, reference.value.as_deref())
        })?;
    }

    draft.stage(document.clone())?;
    Ok(Written {
        entity: document,
        created: existing.is_none(),
    })
}

fn merge_attribute<A, S>(draft: &mut Draft<'_, S>, path_name: &str, incoming: A) -> DirectoryResult<A>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    let name = incoming.name().to_string();
    let existing = draft.get::<A>(&name)?;

    let mut document = A::bare(&name, incoming.owner());
    let mut relink_all = false;
    if let Some(previous) = &existing {
        *document.channels_mut() = previous.channels().to_vec();
        relink_all = previous.owner() != incoming.owner();
    }

    if path_name != name {
        if let Some(previous) = draft.get::<A>(path_name)? {
            remove_attribute_if_present::<A, S>(draft, path_name)?;
            for reference in previous.channels() {
                let held = document
                    .channels()
                    .iter()
                    .any(|channel| channel.name == reference.name);
                if !held && draft.contains::<Channel>(&reference.name)? {
                    document.link_channel(reference.clone());
                }
            }
            relink_all = true;
        }
    }

    let wanted = ref_names(incoming.channels());
    require_peers::<Channel, S>(draft, A::KIND, &name, &wanted)?;
    for reference in incoming.channels() {
        if let Some(channel) = draft.get::<Channel>(&reference.name)? {
            document.link_channel(ChannelRef::new(
                &channel.name,
                &channel.owner,
                reference.value.clone(),
            ));
        }
    }

    let touched: Vec<ChannelRef> = if relink_all {
        document.channels().to_vec()
    } else {
        document
            .channels()
            .iter()
            .filter(|channel| wanted.contains(&channel.name))
            .cloned()
            .collect()
    };
    draft.preload::<Channel>(&ref_names(&touched))?;
    let owner = document.owner().to_string();
    for reference in touched {
        draft.modify::<Channel, _>(&reference.name, |doc| {
            A::attach_to(doc, &name, &owner, reference.value.as_deref())
        })?;
    }

    draft.stage(document.clone())?;
    Ok(document)
}

/// Adds one edge between `incoming` and `channel`.
///
/// A missing attribute is created from the payload identity; a missing
/// channel is `NotFound`.
pub fn attach<A, S>(draft: &mut Draft<'_, S>, incoming: A, channel: &str) -> DirectoryResult<A>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    let Some(target) = draft.get::<Channel>(channel)? else {
        return Err(DirectoryError::not_found(EntityKind::Channel, channel));
    };
    let name = incoming.name().to_string();
    let mut document = draft
        .get::<A>(&name)?
        .unwrap_or_else(|| A::bare(&name, incoming.owner()));

    let value = incoming.edge_value().map(str::to_string);
    document.link_channel(ChannelRef::new(&target.name, &target.owner, value.clone()));
    let owner = document.owner().to_string();
    draft.modify::<Channel, _>(channel, |doc| {
        A::attach_to(doc, &name, &owner, value.as_deref())
    })?;

    draft.stage(document.clone())?;
    Ok(document)
}

/// Removes one edge between attribute `name` and `channel`.
///
/// A missing channel or edge is a no-op; a missing attribute is `NotFound`.
pub fn detach<A, S>(draft: &mut Draft<'_, S>, name: &str, channel: &str) -> DirectoryResult<()>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    let Some(mut document) = draft.get::<A>(name)? else {
        return Err(DirectoryError::not_found(A::KIND, name));
    };
    if document.unlink_channel(channel) {
        draft.stage(document)?;
    }
    draft.modify::<Channel, _>(channel, |doc| A::detach_from(doc, name))?;
    Ok(())
}

fn remove_attribute<A, S>(draft: &mut Draft<'_, S>, name: &str) -> DirectoryResult<()>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    if remove_attribute_if_present::<A, S>(draft, name)? {
        Ok(())
    } else {
        Err(DirectoryError::not_found(A::KIND, name))
    }
}

fn remove_attribute_if_present<A, S>(draft: &mut Draft<'_, S>, name: &str) -> StoreResult<bool>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    let Some(document) = draft.get::<A>(name)? else {
        return Ok(false);
    };
    let channels = ref_names(document.channels());
    draft.preload::<Channel>(&channels)?;
    for channel in &channels {
        draft.modify::<Channel, _>(channel, |doc| A::detach_from(doc, name))?;
    }
    draft.discard::<A>(name)?;
    Ok(true)
}

fn replace_channel<S: DocumentStore>(
    draft: &mut Draft<'_, S>,
    path_name: &str,
    incoming: Channel,
) -> DirectoryResult<Written<Channel>> {
    let name = incoming.name.clone();
    if path_name != name {
        remove_channel_if_present(draft, path_name)?;
    }

    let existing = draft.get::<Channel>(&name)?;
    let mut document = Channel::new(&name, &incoming.owner);
    adopt_edges::<Property, S>(draft, &mut document, &incoming)?;
    adopt_edges::<Tag, S>(draft, &mut document, &incoming)?;

    if let Some(previous) = &existing {
        drop_stale_peers::<Property, S>(draft, previous, &document)?;
        drop_stale_peers::<Tag, S>(draft, previous, &document)?;
    }
    link_peers::<Property, S>(draft, &document, None)?;
    link_peers::<Tag, S>(draft, &document, None)?;

    draft.stage(document.clone())?;
    Ok(Written {
        entity: document,
        created: existing.is_none(),
    })
}

fn merge_channel<S: DocumentStore>(
    draft: &mut Draft<'_, S>,
    path_name: &str,
    incoming: Channel,
) -> DirectoryResult<Channel> {
    let name = incoming.name.clone();
    let existing = draft.get::<Channel>(&name)?;

    let mut inherited = None;
    if path_name != name {
        if let Some(previous) = draft.get::<Channel>(path_name)? {
            remove_channel_if_present(draft, path_name)?;
            inherited = Some(previous);
        }
    }

    let mut document = match (&existing, &inherited) {
        (Some(current), _) => current.clone(),
        (None, Some(_)) => Channel::new(&name, &incoming.owner),
        (None, None) => return Err(DirectoryError::not_found(EntityKind::Channel, &name)),
    };
    let relink_all = inherited.is_some() || document.owner != incoming.owner;
    document.owner = incoming.owner.clone();

    if let Some(previous) = &inherited {
        inherit_edges::<Property, S>(draft, &mut document, previous)?;
        inherit_edges::<Tag, S>(draft, &mut document, previous)?;
    }
    adopt_edges::<Property, S>(draft, &mut document, &incoming)?;
    adopt_edges::<Tag, S>(draft, &mut document, &incoming)?;

    let touched_properties = edge_names::<Property>(&incoming);
    let touched_tags = edge_names::<Tag>(&incoming);
    link_peers::<Property, S>(draft, &document, (!relink_all).then_some(&touched_properties))?;
    link_peers::<Tag, S>(draft, &document, (!relink_all).then_some(&touched_tags))?;

    draft.stage(document.clone())?;
    Ok(document)
}

fn remove_channel_if_present<S: DocumentStore>(
    draft: &mut Draft<'_, S>,
    name: &str,
) -> StoreResult<bool> {
    let Some(channel) = draft.get::<Channel>(name)? else {
        return Ok(false);
    };
    unlink_peers::<Property, S>(draft, &channel)?;
    unlink_peers::<Tag, S>(draft, &channel)?;
    draft.discard::<Channel>(name)?;
    Ok(true)
}

fn edge_names<A: Attribute>(channel: &Channel) -> BTreeSet<String> {
    A::edges_on(channel)
        .into_iter()
        .map(|edge| edge.name)
        .collect()
}

/// Copies the `A` edges of `incoming` onto `document`, taking reference
/// owners from the peer documents.
fn adopt_edges<A, S>(
    draft: &mut Draft<'_, S>,
    document: &mut Channel,
    incoming: &Channel,
) -> DirectoryResult<()>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    let edges = A::edges_on(incoming);
    let names: Vec<String> = edges.iter().map(|edge| edge.name.clone()).collect();
    require_peers::<A, S>(draft, EntityKind::Channel, &incoming.name, &names)?;
    for edge in edges {
        if let Some(peer) = draft.get::<A>(&edge.name)? {
            A::attach_to(document, &edge.name, peer.owner(), edge.value.as_deref());
        }
    }
    Ok(())
}

/// Carries `A` edges of a renamed channel over to `document`.
fn inherit_edges<A, S>(
    draft: &mut Draft<'_, S>,
    document: &mut Channel,
    previous: &Channel,
) -> StoreResult<()>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    let held = edge_names::<A>(document);
    for edge in A::edges_on(previous) {
        if held.contains(&edge.name) {
            continue;
        }
        if let Some(peer) = draft.get::<A>(&edge.name)? {
            A::attach_to(document, &edge.name, peer.owner(), edge.value.as_deref());
        }
    }
    Ok(())
}

/// Unlinks `document` from `A` peers that `previous` had but `document` lost.
fn drop_stale_peers<A, S>(
    draft: &mut Draft<'_, S>,
    previous: &Channel,
    document: &Channel,
) -> StoreResult<()>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    let kept = edge_names::<A>(document);
    let stale: Vec<String> = edge_names::<A>(previous)
        .into_iter()
        .filter(|peer| !kept.contains(peer))
        .collect();
    draft.preload::<A>(&stale)?;
    for peer in &stale {
        draft.modify::<A, _>(peer, |doc| doc.unlink_channel(&document.name))?;
    }
    Ok(())
}

/// Upserts `document`'s edge on its `A` peers, limited to `only` when given.
fn link_peers<A, S>(
    draft: &mut Draft<'_, S>,
    document: &Channel,
    only: Option<&BTreeSet<String>>,
) -> StoreResult<()>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    let edges: Vec<_> = A::edges_on(document)
        .into_iter()
        .filter(|edge| only.map_or(true, |names| names.contains(&edge.name)))
        .collect();
    let names: Vec<String> = edges.iter().map(|edge| edge.name.clone()).collect();
    draft.preload::<A>(&names)?;
    for edge in edges {
        draft.modify::<A, _>(&edge.name, |doc| {
            doc.link_channel(ChannelRef::new(&document.name, &document.owner, edge.value))
        })?;
    }
    Ok(())
}

fn unlink_peers<A, S>(draft: &mut Draft<'_, S>, channel: &Channel) -> StoreResult<()>
where
    A: Attribute + Stageable,
    S: DocumentStore,
{
    let names: Vec<String> = edge_names::<A>(channel).into_iter().collect();
    draft.preload::<A>(&names)?;
    for peer in &names {
        draft.modify::<A, _>(peer, |doc| doc.unlink_channel(&channel.name))?;
    }
    Ok(())
}
