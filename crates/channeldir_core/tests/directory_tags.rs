use channeldir_core::{
    Access, Channel, ChannelPayload, DirectoryService, Outcome, SqliteDocumentStore, Tag,
    TagPayload,
};

const ADMIN: Access = Access::Modifier;

fn service_with_channels(names: &[&str]) -> DirectoryService<SqliteDocumentStore> {
    let service = DirectoryService::new(SqliteDocumentStore::open_in_memory().unwrap());
    for name in names {
        service
            .create_or_replace::<Channel>(ADMIN, name, ChannelPayload::named(*name, "o1"))
            .unwrap();
    }
    service
}

#[test]
fn tag_edges_are_symmetric_and_carry_no_value() {
    let service = service_with_channels(&["c1", "c2"]);

    let mut payload = TagPayload::named("t1", "o1").with_channel("c1");
    payload.channels.push(ChannelPayload::edge("c2", "ignored"));
    let written = service
        .create_or_replace::<Tag>(ADMIN, "t1", payload)
        .unwrap();

    let expected = Tag::new("t1", "o1")
        .with_channel("c1", "o1")
        .with_channel("c2", "o1");
    assert_eq!(written.entity, expected);
    assert!(written.entity.channels.iter().all(|channel| channel.value.is_none()));
    for channel in ["c1", "c2"] {
        assert_eq!(
            service.retrieve_channel(channel).unwrap(),
            Channel::new(channel, "o1").with_tag("t1", "o1")
        );
    }

    assert_eq!(service.list::<Tag>().unwrap(), vec![Tag::new("t1", "o1")]);
    assert_eq!(service.retrieve::<Tag>("t1", false).unwrap(), Tag::new("t1", "o1"));
    assert_eq!(service.retrieve::<Tag>("t1", true).unwrap(), expected);
}

#[test]
fn attach_creates_missing_tag_and_detach_removes_one_edge() {
    let service = service_with_channels(&["c1", "c2"]);

    service
        .attach_to_channel::<Tag>(ADMIN, "t1", "c1", TagPayload::named("t1", "o1"))
        .unwrap();
    service
        .attach_to_channel_json::<Tag>(ADMIN, "t1", "c2", "{\"name\":\"t1\",\"owner\":\"o1\"}")
        .unwrap();
    assert_eq!(
        service.retrieve::<Tag>("t1", true).unwrap(),
        Tag::new("t1", "o1")
            .with_channel("c1", "o1")
            .with_channel("c2", "o1")
    );

    service.detach_from_channel::<Tag>(ADMIN, "t1", "c1").unwrap();
    assert_eq!(service.retrieve_channel("c1").unwrap(), Channel::new("c1", "o1"));
    assert_eq!(
        service.retrieve_channel("c2").unwrap(),
        Channel::new("c2", "o1").with_tag("t1", "o1")
    );
    assert_eq!(
        service.retrieve::<Tag>("t1", true).unwrap(),
        Tag::new("t1", "o1").with_channel("c2", "o1")
    );
}

#[test]
fn update_is_additive_and_replace_is_not() {
    let service = service_with_channels(&["c1", "c2"]);
    service
        .update::<Tag>(ADMIN, "t1", TagPayload::named("t1", "o1").with_channel("c1"))
        .unwrap();
    service
        .update::<Tag>(ADMIN, "t1", TagPayload::named("t1", "o1").with_channel("c2"))
        .unwrap();
    assert_eq!(service.retrieve::<Tag>("t1", true).unwrap().channels.len(), 2);

    service
        .create_or_replace::<Tag>(ADMIN, "t1", TagPayload::named("t1", "o1").with_channel("c2"))
        .unwrap();
    assert_eq!(service.retrieve_channel("c1").unwrap(), Channel::new("c1", "o1"));
    assert_eq!(
        service.retrieve::<Tag>("t1", true).unwrap(),
        Tag::new("t1", "o1").with_channel("c2", "o1")
    );
}

#[test]
fn removing_a_tag_cascades_and_unauthorized_callers_are_refused() {
    let service = service_with_channels(&["c1"]);
    service
        .create_or_replace::<Tag>(ADMIN, "t1", TagPayload::named("t1", "o1").with_channel("c1"))
        .unwrap();

    let err = service
        .update::<Tag>(Access::Anonymous, "t1", TagPayload::named("t1", "o2"))
        .unwrap_err();
    assert_eq!(err.outcome(), Outcome::Unauthorized);
    let err = service
        .detach_from_channel::<Tag>(Access::Reader, "t1", "c1")
        .unwrap_err();
    assert_eq!(err.outcome(), Outcome::Unauthorized);

    service.remove::<Tag>(ADMIN, "t1").unwrap();
    assert!(service.list::<Tag>().unwrap().is_empty());
    assert_eq!(service.retrieve_channel("c1").unwrap(), Channel::new("c1", "o1"));
}

#[test]
fn bulk_tag_writes_reject_unknown_channels_before_writing() {
    let service = service_with_channels(&["c1"]);

    let err = service
        .update_many_json::<Tag>(
            ADMIN,
            "[{\"name\":\"t1\",\"owner\":\"o1\",\"channels\":[{\"name\":\"c1\"}]},
              {\"name\":\"t2\",\"owner\":\"o1\",\"channels\":[{\"name\":\"c9\"}]}]",
        )
        .unwrap_err();
    assert_eq!(err.outcome(), Outcome::InternalError);
    assert!(service.list::<Tag>().unwrap().is_empty());

    let written = service
        .create_or_replace_many::<Tag>(
            ADMIN,
            vec![
                TagPayload::named("t2", "o1").with_channel("c1"),
                TagPayload::named("t1", "o1").with_channel("c1"),
            ],
        )
        .unwrap();
    let names: Vec<&str> = written.iter().map(|tag| tag.name.as_str()).collect();
    assert_eq!(names, vec!["t1", "t2"]);
    assert_eq!(
        service.retrieve_channel("c1").unwrap(),
        Channel::new("c1", "o1").with_tag("t1", "o1").with_tag("t2", "o1")
    );
}
