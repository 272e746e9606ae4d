//! Directory use-case service.
//!
//! # Responsibility
//! - Expose list/retrieve/replace/update/attach/detach/remove for channels,
//!   properties and tags.
//! - Run every mutation as authorize, validate, resolve, apply.
//! - Re-run the whole read-merge-write cycle after a version conflict.
//!
//! # Invariants
//! - Authorization is checked before the payload is decoded or any document
//!   is read.
//! - Batches are fully validated before the first store access.
//! - Store writes happen only through a resolved `WritePlan`.

use crate::config::{DirectoryConfig, DEFAULT_CONFLICT_RETRIES};
use crate::model::entity::{Attribute, Channel, Entity, EntityKind};
use crate::model::payload::{decode_many, decode_one, Payload};
use crate::model::validation::{validate_attach, validate_batch, ValidationError};
use crate::repo::{DocumentStore, DocumentWrite};
use crate::search::ChannelQuery;
use crate::service::access::Access;
use crate::service::error::{DirectoryError, DirectoryResult};
use crate::service::resolver::{self, Draft, Resolvable, WritePlan, Written};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::time::Instant;
use uuid::Uuid;

/// Directory facade over a document store implementation.
pub struct DirectoryService<S: DocumentStore> {
    store: S,
    conflict_retries: u32,
}

impl<S: DocumentStore> DirectoryService<S> {
    /// Creates a service with the default conflict retry budget.
    pub fn new(store: S) -> Self {
        Self {
            store,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    pub fn with_config(store: S, config: &DirectoryConfig) -> Self {
        Self::new(store).with_conflict_retries(config.conflict_retries)
    }

    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn conflict_retries(&self) -> u32 {
        self.conflict_retries
    }

    /// Lists one collection sorted by name, without channel expansion.
    pub fn list<E: Entity>(&self) -> DirectoryResult<Vec<E>> {
        let documents = self.store.list::<E>()?;
        debug!(
            "event=directory_list module=service status=ok kind={} count={}",
            E::KIND,
            documents.len()
        );
        Ok(documents
            .into_iter()
            .map(|versioned| versioned.entity.into_listing())
            .collect())
    }

    /// Lists channels matching `query`, sorted by name.
    pub fn list_channels(&self, query: &ChannelQuery) -> DirectoryResult<Vec<Channel>> {
        let channels = self
            .store
            .list::<Channel>()?
            .into_iter()
            .map(|versioned| versioned.entity);
        Ok(query.apply(channels))
    }

    /// Parses transport query pairs and lists matching channels.
    ///
    /// # Errors
    /// - `Validation(InvalidQuery)` for unparseable filters.
    pub fn search_channels<I, K, V>(&self, pairs: I) -> DirectoryResult<Vec<Channel>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let query = ChannelQuery::from_pairs(pairs)
            .map_err(|err| ValidationError::InvalidQuery(err.to_string()))?;
        self.list_channels(&query)
    }

    /// Reads one document; property and tag channel lists are cleared
    /// unless `include_channels` is set.
    pub fn retrieve<E: Entity>(&self, name: &str, include_channels: bool) -> DirectoryResult<E> {
        let Some(versioned) = self.store.get::<E>(name)? else {
            return Err(DirectoryError::not_found(E::KIND, name));
        };
        if include_channels {
            Ok(versioned.entity)
        } else {
            Ok(versioned.entity.into_listing())
        }
    }

    pub fn retrieve_channel(&self, name: &str) -> DirectoryResult<Channel> {
        self.retrieve::<Channel>(name, true)
    }

    /// Creates or fully replaces the document addressed as `name`.
    ///
    /// # Contract
    /// - Edges are taken verbatim from the payload; dropped edges are removed
    ///   from their peers.
    /// - A payload name different from `name` supersedes the `name` document.
    pub fn create_or_replace<E: Resolvable>(
        &self,
        access: Access,
        name: &str,
        payload: E::Payload,
    ) -> DirectoryResult<Written<E>> {
        access.require_mutation("replace")?;
        let entity = payload.into_entity()?;
        self.run_write("replace", E::KIND, name, |draft| {
            E::resolve_replace(draft, name, entity.clone())
        })
    }

    pub fn create_or_replace_json<E: Resolvable>(
        &self,
        access: Access,
        name: &str,
        raw: &str,
    ) -> DirectoryResult<Written<E>> {
        access.require_mutation("replace")?;
        self.create_or_replace(access, name, decode_one::<E::Payload>(raw)?)
    }

    /// Creates or replaces every payload, in request order.
    ///
    /// Returns the resolved documents sorted by name; a name repeated in the
    /// batch is reported once with its last state.
    pub fn create_or_replace_many<E: Resolvable>(
        &self,
        access: Access,
        payloads: Vec<E::Payload>,
    ) -> DirectoryResult<Vec<E>> {
        access.require_mutation("replace_many")?;
        let entities = validate_batch(payloads)?;
        self.run_write("replace_many", E::KIND, &batch_target(&entities), |draft| {
            let mut resolved = BTreeMap::new();
            for entity in &entities {
                let written = E::resolve_replace(draft, entity.name(), entity.clone())?;
                resolved.insert(written.entity.name().to_string(), written.entity);
            }
            Ok(resolved.into_values().collect())
        })
    }

    pub fn create_or_replace_many_json<E: Resolvable>(
        &self,
        access: Access,
        raw: &str,
    ) -> DirectoryResult<Vec<E>> {
        access.require_mutation("replace_many")?;
        self.create_or_replace_many(access, decode_many::<E::Payload>(raw)?)
    }

    /// Merges the payload into the document addressed as `name`.
    ///
    /// Unmentioned edges are kept. Missing properties and tags are created;
    /// a missing channel is `NotFound`.
    pub fn update<E: Resolvable>(
        &self,
        access: Access,
        name: &str,
        payload: E::Payload,
    ) -> DirectoryResult<E> {
        access.require_mutation("update")?;
        let entity = payload.into_entity()?;
        self.run_write("update", E::KIND, name, |draft| {
            E::resolve_merge(draft, name, entity.clone())
        })
    }

    pub fn update_json<E: Resolvable>(
        &self,
        access: Access,
        name: &str,
        raw: &str,
    ) -> DirectoryResult<E> {
        access.require_mutation("update")?;
        self.update(access, name, decode_one::<E::Payload>(raw)?)
    }

    pub fn update_many<E: Resolvable>(
        &self,
        access: Access,
        payloads: Vec<E::Payload>,
    ) -> DirectoryResult<Vec<E>> {
        access.require_mutation("update_many")?;
        let entities = validate_batch(payloads)?;
        self.run_write("update_many", E::KIND, &batch_target(&entities), |draft| {
            let mut resolved = BTreeMap::new();
            for entity in &entities {
                let merged = E::resolve_merge(draft, entity.name(), entity.clone())?;
                resolved.insert(merged.name().to_string(), merged);
            }
            Ok(resolved.into_values().collect())
        })
    }

    pub fn update_many_json<E: Resolvable>(
        &self,
        access: Access,
        raw: &str,
    ) -> DirectoryResult<Vec<E>> {
        access.require_mutation("update_many")?;
        self.update_many(access, decode_many::<E::Payload>(raw)?)
    }

    /// Adds or revalues the edge between `name` and `channel`.
    pub fn attach_to_channel<A: Attribute + Resolvable>(
        &self,
        access: Access,
        name: &str,
        channel: &str,
        payload: A::Payload,
    ) -> DirectoryResult<A> {
        access.require_mutation("attach")?;
        let attribute = validate_attach::<A>(payload, name, channel)?;
        self.run_write("attach", A::KIND, name, |draft| {
            resolver::attach(draft, attribute.clone(), channel)
        })
    }

    pub fn attach_to_channel_json<A: Attribute + Resolvable>(
        &self,
        access: Access,
        name: &str,
        channel: &str,
        raw: &str,
    ) -> DirectoryResult<A> {
        access.require_mutation("attach")?;
        self.attach_to_channel(access, name, channel, decode_one::<A::Payload>(raw)?)
    }

    /// Removes the edge between `name` and `channel`; a missing edge or
    /// channel is not an error.
    pub fn detach_from_channel<A: Attribute + Resolvable>(
        &self,
        access: Access,
        name: &str,
        channel: &str,
    ) -> DirectoryResult<()> {
        access.require_mutation("detach")?;
        self.run_write("detach", A::KIND, name, |draft| {
            resolver::detach::<A, S>(draft, name, channel)
        })
    }

    /// Deletes `name` after removing every edge held by its peers.
    pub fn remove<E: Resolvable>(&self, access: Access, name: &str) -> DirectoryResult<()> {
        access.require_mutation("remove")?;
        self.run_write("remove", E::KIND, name, |draft| E::resolve_remove(draft, name))
    }

    fn run_write<T, F>(
        &self,
        op: &'static str,
        kind: EntityKind,
        target: &str,
        mut resolve: F,
    ) -> DirectoryResult<T>
    where
        F: FnMut(&mut Draft<'_, S>) -> DirectoryResult<T>,
    {
        let request_id = Uuid::new_v4();
        let started_at = Instant::now();
        info!(
            "event=directory_write module=service status=start request_id={request_id} op={op} kind={kind} target={target}"
        );

        let mut attempt = 0;
        let result = loop {
            match self.resolve_and_apply(kind, &mut resolve) {
                Err(DirectoryError::Conflict { kind: lost, name }) if attempt < self.conflict_retries => {
                    attempt += 1;
                    warn!(
                        "event=directory_write module=service status=retry request_id={request_id} op={op} attempt={attempt} conflict_kind={lost} conflict_name={name}"
                    );
                }
                other => break other,
            }
        };

        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => info!(
                "event=directory_write module=service status=ok request_id={request_id} op={op} kind={kind} target={target} retries={attempt} duration_ms={duration_ms}"
            ),
            Err(err) => warn!(
                "event=directory_write module=service status=error request_id={request_id} op={op} kind={kind} target={target} retries={attempt} duration_ms={duration_ms} error_code={} error={err}",
                err.code()
            ),
        }
        result
    }

    fn resolve_and_apply<T, F>(&self, anchor: EntityKind, resolve: &mut F) -> DirectoryResult<T>
    where
        F: FnMut(&mut Draft<'_, S>) -> DirectoryResult<T>,
    {
        let mut draft = Draft::new(&self.store);
        let value = resolve(&mut draft)?;
        self.apply_plan(draft.into_plan(anchor))?;
        Ok(value)
    }

    /// Writes peer collections, the anchor collection, then removals.
    ///
    /// Stops at the first failed write; earlier writes stay applied.
    fn apply_plan(&self, plan: WritePlan) -> DirectoryResult<()> {
        if plan.is_empty() {
            return Ok(());
        }
        debug!(
            "event=directory_plan module=service status=start anchor={} writes={}",
            plan.anchor,
            plan.write_count()
        );
        for kind in plan.write_order() {
            match kind {
                EntityKind::Property => apply_puts(&self.store, &plan.properties)?,
                EntityKind::Tag => apply_puts(&self.store, &plan.tags)?,
                EntityKind::Channel => apply_puts(&self.store, &plan.channels)?,
            }
        }
        for removal in &plan.removals {
            self.store
                .delete(removal.kind, &removal.name, removal.expected)?;
        }
        Ok(())
    }
}

fn apply_puts<E: Entity, S: DocumentStore>(
    store: &S,
    writes: &[DocumentWrite<E>],
) -> DirectoryResult<()> {
    if writes.is_empty() {
        return Ok(());
    }
    for outcome in store.bulk_put(writes)? {
        outcome?;
    }
    Ok(())
}

fn batch_target<E: Entity>(entities: &[E]) -> String {
    match entities {
        [single] => single.name().to_string(),
        many => format!("batch:{}", many.len()),
    }
}
