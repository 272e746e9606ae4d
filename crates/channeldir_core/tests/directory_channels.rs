use channeldir_core::{
    Access, Channel, ChannelPayload, ChannelQuery, DirectoryService, Outcome, Property,
    PropertyPayload, SqliteDocumentStore, Tag, TagPayload,
};

const ADMIN: Access = Access::Modifier;

fn service() -> DirectoryService<SqliteDocumentStore> {
    let service = DirectoryService::new(SqliteDocumentStore::open_in_memory().unwrap());
    for name in ["p1", "p2"] {
        service
            .create_or_replace::<Property>(ADMIN, name, PropertyPayload::named(name, "po"))
            .unwrap();
    }
    service
        .create_or_replace::<Tag>(ADMIN, "t1", TagPayload::named("t1", "to"))
        .unwrap();
    service
}

fn channel_payload(name: &str, properties: &[(&str, &str)], tags: &[&str]) -> ChannelPayload {
    let mut payload = ChannelPayload::named(name, "o1");
    for (property, value) in properties {
        payload
            .properties
            .push(PropertyPayload::named(*property, "").with_value(*value));
    }
    for tag in tags {
        payload.tags.push(TagPayload {
            name: Some(tag.to_string()),
            ..TagPayload::default()
        });
    }
    payload
}

#[test]
fn channel_edges_take_owners_from_peers_and_are_mirrored() {
    let service = service();

    let written = service
        .create_or_replace::<Channel>(ADMIN, "c1", channel_payload("c1", &[("p1", "v1")], &["t1"]))
        .unwrap();
    assert_eq!(written.outcome(), Outcome::Created);
    assert_eq!(
        written.entity,
        Channel::new("c1", "o1")
            .with_property("p1", "po", "v1")
            .with_tag("t1", "to")
    );

    assert_eq!(
        service.retrieve::<Property>("p1", true).unwrap(),
        Property::new("p1", "po").with_channel("c1", "o1", "v1")
    );
    assert_eq!(
        service.retrieve::<Tag>("t1", true).unwrap(),
        Tag::new("t1", "to").with_channel("c1", "o1")
    );
}

#[test]
fn channel_referencing_missing_peers_is_rejected() {
    let service = service();

    let err = service
        .create_or_replace::<Channel>(ADMIN, "c1", channel_payload("c1", &[("p404", "v")], &[]))
        .unwrap_err();
    assert_eq!(err.outcome(), Outcome::InternalError);

    let err = service
        .create_or_replace::<Channel>(ADMIN, "c1", channel_payload("c1", &[], &["t404"]))
        .unwrap_err();
    assert_eq!(err.outcome(), Outcome::InternalError);

    let err = service
        .create_or_replace::<Channel>(ADMIN, "c1", channel_payload("c1", &[("p1", "")], &[]))
        .unwrap_err();
    assert_eq!(err.outcome(), Outcome::BadRequest);

    assert!(service.list_channels(&ChannelQuery::new()).unwrap().is_empty());
}

#[test]
fn replacing_a_channel_strips_superseded_edges_from_peers() {
    let service = service();
    service
        .create_or_replace::<Channel>(
            ADMIN,
            "c1",
            channel_payload("c1", &[("p1", "a"), ("p2", "b")], &["t1"]),
        )
        .unwrap();

    service
        .create_or_replace::<Channel>(ADMIN, "c1", channel_payload("c1", &[("p2", "c")], &[]))
        .unwrap();

    assert!(service.retrieve::<Property>("p1", true).unwrap().channels.is_empty());
    assert!(service.retrieve::<Tag>("t1", true).unwrap().channels.is_empty());
    assert_eq!(
        service.retrieve::<Property>("p2", true).unwrap(),
        Property::new("p2", "po").with_channel("c1", "o1", "c")
    );
}

#[test]
fn channel_update_merges_and_missing_channel_is_not_found() {
    let service = service();
    let err = service
        .update::<Channel>(ADMIN, "c1", ChannelPayload::named("c1", "o1"))
        .unwrap_err();
    assert_eq!(err.outcome(), Outcome::NotFound);

    service
        .create_or_replace::<Channel>(ADMIN, "c1", channel_payload("c1", &[("p1", "a")], &[]))
        .unwrap();
    let mut payload = channel_payload("c1", &[("p2", "b")], &["t1"]);
    payload.owner = Some("o2".to_string());
    let merged = service.update::<Channel>(ADMIN, "c1", payload).unwrap();

    assert_eq!(
        merged,
        Channel::new("c1", "o2")
            .with_property("p1", "po", "a")
            .with_property("p2", "po", "b")
            .with_tag("t1", "to")
    );
    assert_eq!(
        service.retrieve::<Property>("p1", true).unwrap(),
        Property::new("p1", "po").with_channel("c1", "o2", "a")
    );
}

#[test]
fn removing_a_channel_cascades_to_properties_and_tags() {
    let service = service();
    service
        .create_or_replace::<Channel>(
            ADMIN,
            "c1",
            channel_payload("c1", &[("p1", "a"), ("p2", "b")], &["t1"]),
        )
        .unwrap();

    let err = service.remove::<Channel>(Access::Reader, "c1").unwrap_err();
    assert_eq!(err.outcome(), Outcome::Unauthorized);

    service.remove::<Channel>(ADMIN, "c1").unwrap();
    assert_eq!(
        service.retrieve_channel("c1").unwrap_err().outcome(),
        Outcome::NotFound
    );
    for property in ["p1", "p2"] {
        assert!(service
            .retrieve::<Property>(property, true)
            .unwrap()
            .channels
            .is_empty());
    }
    assert!(service.retrieve::<Tag>("t1", true).unwrap().channels.is_empty());

    let err = service.remove::<Channel>(ADMIN, "c1").unwrap_err();
    assert_eq!(err.outcome(), Outcome::NotFound);
}

#[test]
fn channel_rename_by_update_keeps_edges() {
    let service = service();
    service
        .create_or_replace::<Channel>(ADMIN, "old", channel_payload("old", &[("p1", "a")], &["t1"]))
        .unwrap();

    let renamed = service
        .update::<Channel>(ADMIN, "old", ChannelPayload::named("new", "o1"))
        .unwrap();

    assert_eq!(
        renamed,
        Channel::new("new", "o1")
            .with_property("p1", "po", "a")
            .with_tag("t1", "to")
    );
    assert_eq!(
        service.retrieve::<Property>("p1", true).unwrap(),
        Property::new("p1", "po").with_channel("new", "o1", "a")
    );
    assert_eq!(
        service.retrieve::<Tag>("t1", true).unwrap(),
        Tag::new("t1", "to").with_channel("new", "o1")
    );
    assert_eq!(
        service.retrieve_channel("old").unwrap_err().outcome(),
        Outcome::NotFound
    );
}

#[test]
fn bulk_channel_load_and_query() {
    let service = service();
    let written = service
        .create_or_replace_many_json::<Channel>(
            ADMIN,
            r#"[
                {"name":"SR:C01-BI:1","owner":"o1","properties":[{"name":"p1","value":"01"}],"tags":[{"name":"t1"}]},
                {"name":"SR:C02-BI:1","owner":"o1","properties":[{"name":"p1","value":"02"}]},
                {"name":"BR:C01-PS:1","owner":"o1"}
            ]"#,
        )
        .unwrap();
    assert_eq!(written.len(), 3);
    assert_eq!(written[0].name, "BR:C01-PS:1");

    let all = service.list_channels(&ChannelQuery::new()).unwrap();
    let names: Vec<&str> = all.iter().map(|channel| channel.name.as_str()).collect();
    assert_eq!(names, vec!["BR:C01-PS:1", "SR:C01-BI:1", "SR:C02-BI:1"]);

    let tagged = service.search_channels([("~tag", "t*")]).unwrap();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].name, "SR:C01-BI:1");

    let by_value = service
        .search_channels([("~name", "SR:*"), ("p1", "0?"), ("~size", "1"), ("~from", "1")])
        .unwrap();
    assert_eq!(by_value.len(), 1);
    assert_eq!(by_value[0].name, "SR:C02-BI:1");

    let err = service.search_channels([("~size", "ten")]).unwrap_err();
    assert_eq!(err.outcome(), Outcome::BadRequest);
}
