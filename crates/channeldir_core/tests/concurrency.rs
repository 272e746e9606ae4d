use channeldir_core::repo::{
    DocumentStore, DocumentVersion, DocumentWrite, ExpectedVersion, StoreResult, Versioned,
};
use channeldir_core::{
    Access, Channel, ChannelPayload, ChannelQuery, DirectoryError, DirectoryService, Entity,
    EntityKind, Outcome, Property, PropertyPayload, SqliteDocumentStore, Tag, TagPayload,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

const ADMIN: Access = Access::Modifier;

/// Store that rewrites each target document right before the next
/// `injections` writes to the `target` collection (any collection when
/// unset), so the caller's expected versions go stale.
struct RacingStore {
    inner: SqliteDocumentStore,
    target: Option<EntityKind>,
    injections: AtomicUsize,
}

impl RacingStore {
    fn new(injections: usize) -> Self {
        Self {
            inner: SqliteDocumentStore::open_in_memory().unwrap(),
            target: None,
            injections: AtomicUsize::new(injections),
        }
    }

    /// Races only writes to `kind`; armed later through `injections`.
    fn targeting(kind: EntityKind) -> Self {
        Self {
            target: Some(kind),
            ..Self::new(0)
        }
    }

    fn pending_injections(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }

    fn should_inject(&self, kind: EntityKind) -> bool {
        self.target.map_or(true, |target| target == kind)
            && self
                .injections
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
    }

    fn touch<E: Entity>(&self, name: &str) -> StoreResult<()> {
        if let Some(current) = self.inner.get::<E>(name)? {
            self.inner
                .put(&DocumentWrite::new(current.entity, ExpectedVersion::Any))?;
        }
        Ok(())
    }
}

impl DocumentStore for RacingStore {
    fn get<E: Entity>(&self, name: &str) -> StoreResult<Option<Versioned<E>>> {
        self.inner.get(name)
    }

    fn bulk_get<E: Entity>(
        &self,
        names: &[String],
    ) -> StoreResult<BTreeMap<String, Versioned<E>>> {
        self.inner.bulk_get(names)
    }

    fn list<E: Entity>(&self) -> StoreResult<Vec<Versioned<E>>> {
        self.inner.list()
    }

    fn put<E: Entity>(&self, write: &DocumentWrite<E>) -> StoreResult<DocumentVersion> {
        self.inner.put(write)
    }

    fn bulk_put<E: Entity>(
        &self,
        writes: &[DocumentWrite<E>],
    ) -> StoreResult<Vec<StoreResult<DocumentVersion>>> {
        if self.should_inject(E::KIND) {
            for write in writes {
                self.touch::<E>(write.entity.name())?;
            }
        }
        self.inner.bulk_put(writes)
    }

    fn delete(&self, kind: EntityKind, name: &str, expected: ExpectedVersion) -> StoreResult<()> {
        if self.should_inject(kind) {
            match kind {
                EntityKind::Channel => self.touch::<Channel>(name)?,
                EntityKind::Property => self.touch::<Property>(name)?,
                EntityKind::Tag => self.touch::<Tag>(name)?,
            }
        }
        self.inner.delete(kind, name, expected)
    }
}

/// Checks that every edge is listed on both documents with the same value
/// and with each side's current owner.
fn assert_symmetric<S: DocumentStore>(service: &DirectoryService<S>) {
    let channels = service.list_channels(&ChannelQuery::new()).unwrap();
    let properties: Vec<Property> = service
        .list::<Property>()
        .unwrap()
        .iter()
        .map(|property| service.retrieve::<Property>(&property.name, true).unwrap())
        .collect();
    let tags: Vec<Tag> = service
        .list::<Tag>()
        .unwrap()
        .iter()
        .map(|tag| service.retrieve::<Tag>(&tag.name, true).unwrap())
        .collect();
    let find_channel = |name: &str| channels.iter().find(|channel| channel.name == name);

    for channel in &channels {
        for edge in &channel.properties {
            let property = properties
                .iter()
                .find(|property| property.name == edge.name)
                .unwrap_or_else(|| panic!("{} lists missing property {}", channel.name, edge.name));
            let back = property
                .channel(&channel.name)
                .unwrap_or_else(|| panic!("{} lists {} one-sidedly", channel.name, edge.name));
            assert_eq!(back.value.as_deref(), Some(edge.value.as_str()));
            assert_eq!(back.owner, channel.owner);
            assert_eq!(edge.owner, property.owner);
        }
        for edge in &channel.tags {
            let tag = tags
                .iter()
                .find(|tag| tag.name == edge.name)
                .unwrap_or_else(|| panic!("{} lists missing tag {}", channel.name, edge.name));
            let back = tag
                .channel(&channel.name)
                .unwrap_or_else(|| panic!("{} lists {} one-sidedly", channel.name, edge.name));
            assert_eq!(back.owner, channel.owner);
            assert_eq!(edge.owner, tag.owner);
        }
    }
    for property in &properties {
        for edge in &property.channels {
            let channel = find_channel(&edge.name)
                .unwrap_or_else(|| panic!("{} lists missing channel {}", property.name, edge.name));
            assert!(
                channel.property(&property.name).is_some(),
                "{} lists {} one-sidedly",
                property.name,
                edge.name
            );
        }
    }
    for tag in &tags {
        for edge in &tag.channels {
            let channel = find_channel(&edge.name)
                .unwrap_or_else(|| panic!("{} lists missing channel {}", tag.name, edge.name));
            assert!(
                channel.tag(&tag.name).is_some(),
                "{} lists {} one-sidedly",
                tag.name,
                edge.name
            );
        }
    }
}

fn seed<S: DocumentStore>(service: &DirectoryService<S>, channels: &[String]) {
    for name in channels {
        service
            .create_or_replace::<Channel>(ADMIN, name, ChannelPayload::named(name.as_str(), "o1"))
            .unwrap();
    }
    service
        .create_or_replace::<Property>(ADMIN, "p1", PropertyPayload::named("p1", "o1"))
        .unwrap();
}

#[test]
fn concurrent_attaches_to_one_property_all_land() {
    let channels: Vec<String> = (0..8).map(|index| format!("c{index}")).collect();
    let service = Arc::new(
        DirectoryService::new(SqliteDocumentStore::open_in_memory().unwrap())
            .with_conflict_retries(4),
    );
    seed(&service, &channels);

    let handles: Vec<_> = channels
        .iter()
        .cloned()
        .map(|channel| {
            let service = Arc::clone(&service);
            thread::spawn(move || loop {
                let payload = PropertyPayload::named("p1", "o1").with_value(format!("v-{channel}"));
                match service.attach_to_channel::<Property>(ADMIN, "p1", &channel, payload) {
                    Ok(_) => break,
                    Err(DirectoryError::Conflict { .. }) => continue,
                    Err(other) => panic!("unexpected error: {other}"),
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let property = service.retrieve::<Property>("p1", true).unwrap();
    assert_eq!(property.channels.len(), channels.len());
    for channel in &channels {
        let expected = format!("v-{channel}");
        assert_eq!(
            property.channel(channel).unwrap().value.as_deref(),
            Some(expected.as_str())
        );
        assert_eq!(
            service.retrieve_channel(channel).unwrap().property("p1").unwrap().value,
            expected
        );
    }
    assert_symmetric(&service);
}

#[test]
fn one_lost_race_is_retried_transparently() {
    let service = DirectoryService::new(RacingStore::new(0));
    seed(&service, &["c1".to_string()]);
    service.store().injections.store(1, Ordering::SeqCst);

    service
        .attach_to_channel::<Property>(
            ADMIN,
            "p1",
            "c1",
            PropertyPayload::named("p1", "o1").with_value("asdf"),
        )
        .unwrap();

    assert_eq!(service.store().pending_injections(), 0);
    assert_eq!(
        service.retrieve::<Property>("p1", true).unwrap(),
        Property::new("p1", "o1").with_channel("c1", "o1", "asdf")
    );
    assert_eq!(
        service.retrieve_channel("c1").unwrap(),
        Channel::new("c1", "o1").with_property("p1", "o1", "asdf")
    );
}

#[test]
fn conflict_surfaces_once_retries_are_exhausted() {
    let service = DirectoryService::new(RacingStore::new(0)).with_conflict_retries(0);
    seed(&service, &["c1".to_string()]);
    service.store().injections.store(1, Ordering::SeqCst);

    let err = service
        .attach_to_channel::<Property>(
            ADMIN,
            "p1",
            "c1",
            PropertyPayload::named("p1", "o1").with_value("asdf"),
        )
        .unwrap_err();
    assert_eq!(err.outcome(), Outcome::Conflict);
    assert_eq!(err.outcome().status_code(), 409);

    let retrying = DirectoryService::new(RacingStore::new(0));
    seed(&retrying, &["c1".to_string()]);
    retrying
        .attach_to_channel::<Property>(
            ADMIN,
            "p1",
            "c1",
            PropertyPayload::named("p1", "o1").with_value("asdf"),
        )
        .unwrap();
    retrying.store().injections.store(2, Ordering::SeqCst);
    let err = retrying
        .remove::<Channel>(ADMIN, "c1")
        .unwrap_err();
    assert_eq!(err.outcome(), Outcome::Conflict);
    assert!(retrying.retrieve_channel("c1").is_ok());
}

fn racing_service(target: EntityKind) -> DirectoryService<RacingStore> {
    let service = DirectoryService::new(RacingStore::targeting(target));
    let channels: Vec<String> = ["c1", "c2", "c3"].iter().map(|name| name.to_string()).collect();
    seed(&service, &channels);
    service
        .create_or_replace::<Tag>(ADMIN, "t1", TagPayload::named("t1", "o1"))
        .unwrap();
    service
        .create_or_replace::<Property>(
            ADMIN,
            "p1",
            PropertyPayload::named("p1", "o1")
                .with_channel("c1", "a")
                .with_channel("c2", "b"),
        )
        .unwrap();
    service
}

#[test]
fn property_replace_survives_a_lost_race_on_either_collection() {
    for target in [EntityKind::Channel, EntityKind::Property] {
        let service = racing_service(target);
        service.store().injections.store(1, Ordering::SeqCst);

        let written = service
            .create_or_replace::<Property>(
                ADMIN,
                "p1",
                PropertyPayload::named("p1", "o1").with_channel("c3", "v"),
            )
            .unwrap();

        assert_eq!(service.store().pending_injections(), 0, "target {target}");
        assert_eq!(
            written.entity,
            Property::new("p1", "o1").with_channel("c3", "o1", "v")
        );
        for stale in ["c1", "c2"] {
            assert!(
                service.retrieve_channel(stale).unwrap().property("p1").is_none(),
                "{stale} still lists p1 after a race on {target}"
            );
        }
        assert_symmetric(&service);
    }
}

#[test]
fn property_merge_with_owner_change_survives_a_late_lost_race() {
    let service = racing_service(EntityKind::Property);
    service.store().injections.store(1, Ordering::SeqCst);

    let merged = service
        .update::<Property>(
            ADMIN,
            "p1",
            PropertyPayload::named("p1", "o2").with_channel("c3", "c"),
        )
        .unwrap();

    assert_eq!(service.store().pending_injections(), 0);
    assert_eq!(merged.owner, "o2");
    assert_eq!(merged.channels.len(), 3);
    for channel in ["c1", "c2", "c3"] {
        assert_eq!(
            service.retrieve_channel(channel).unwrap().property("p1").unwrap().owner,
            "o2"
        );
    }
    assert_symmetric(&service);
}

#[test]
fn channel_replace_survives_a_late_lost_race() {
    let service = racing_service(EntityKind::Channel);
    service.store().injections.store(1, Ordering::SeqCst);

    let mut payload = ChannelPayload::named("c1", "o1");
    payload.tags.push(TagPayload {
        name: Some("t1".to_string()),
        ..TagPayload::default()
    });
    service
        .create_or_replace::<Channel>(ADMIN, "c1", payload)
        .unwrap();

    assert_eq!(service.store().pending_injections(), 0);
    assert!(service
        .retrieve::<Property>("p1", true)
        .unwrap()
        .channel("c1")
        .is_none());
    assert_eq!(
        service.retrieve::<Tag>("t1", true).unwrap(),
        Tag::new("t1", "o1").with_channel("c1", "o1")
    );
    assert_symmetric(&service);
}

#[test]
fn removals_survive_a_lost_race_on_the_delete() {
    let service = racing_service(EntityKind::Property);
    service.store().injections.store(1, Ordering::SeqCst);
    service.remove::<Property>(ADMIN, "p1").unwrap();
    assert_eq!(service.store().pending_injections(), 0);
    assert!(service.list::<Property>().unwrap().is_empty());
    assert_symmetric(&service);

    let service = racing_service(EntityKind::Channel);
    service.store().injections.store(1, Ordering::SeqCst);
    service.remove::<Channel>(ADMIN, "c1").unwrap();
    assert_eq!(service.store().pending_injections(), 0);
    assert_eq!(
        service.retrieve::<Property>("p1", true).unwrap(),
        Property::new("p1", "o1").with_channel("c2", "o1", "b")
    );
    assert_symmetric(&service);
}
