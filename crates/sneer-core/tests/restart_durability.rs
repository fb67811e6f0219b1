//! Restart durability tests
//!
//! A restart closes the store and rebuilds the runtime by replaying the tuple
//! log. Every derived view must come back in the same logical state.

use std::sync::Arc;

use sneer_core::{
    NetworkSimulator, PrivateKey, PublicKey, SneerAdmin, SneerConfig, Transport, Value,
};
use tempfile::tempdir;

fn peer_key() -> PublicKey {
    PrivateKey::generate().public_key()
}

fn nicknames(admin: &SneerAdmin) -> Vec<String> {
    admin
        .sneer()
        .contacts()
        .try_next()
        .unwrap()
        .iter()
        .map(|c| c.current_nickname())
        .collect()
}

/// Contacts and conversations must be the same parties in the same order
fn assert_aligned(admin: &SneerAdmin) {
    let contacts = admin.sneer().contacts().current();
    let conversations = admin.sneer().conversations().current();
    assert_eq!(contacts.len(), conversations.len());
    for (contact, conversation) in contacts.iter().zip(&conversations) {
        assert!(Arc::ptr_eq(contact.party(), conversation.party()));
    }
}

#[test]
fn test_restart_restores_contacts_in_order() {
    let dir = tempdir().unwrap();
    let (b, c) = (peer_key(), peer_key());

    let mut admin = SneerAdmin::initialize(
        PrivateKey::generate(),
        SneerConfig::durable(dir.path()),
        None,
    )
    .unwrap();
    let sneer = admin.sneer();
    sneer.add_contact("B", &sneer.produce_party(b)).unwrap();
    sneer.add_contact("C", &sneer.produce_party(c)).unwrap();
    assert_eq!(nicknames(&admin), vec!["B", "C"]);

    admin.restart().unwrap();
    assert_eq!(nicknames(&admin), vec!["B", "C"]);

    let contacts = admin.sneer().contacts().current();
    assert_eq!(contacts[0].party().public_key(), &b);
    assert_eq!(contacts[1].party().public_key(), &c);
    assert!(Arc::ptr_eq(contacts[0].party(), &admin.sneer().produce_party(b)));
    assert_aligned(&admin);
}

#[test]
fn test_process_restart_from_same_directory() {
    let dir = tempdir().unwrap();
    let key = PrivateKey::generate();
    let friend = peer_key();

    {
        let admin =
            SneerAdmin::initialize(key.clone(), SneerConfig::durable(dir.path()), None).unwrap();
        let sneer = admin.sneer();
        let party = sneer.produce_party(friend);
        sneer.add_contact("friend", &party).unwrap();
        sneer.set_nickname(&sneer.find_contact(&party).unwrap(), "buddy").unwrap();
        sneer
            .conversation_with(&party)
            .unwrap()
            .send_message("see you after the reboot")
            .unwrap();
        sneer
            .profile_for(sneer.self_party())
            .set_preferred_nickname("me")
            .unwrap();
        admin.shutdown().unwrap();
    }

    let admin = SneerAdmin::initialize(key, SneerConfig::durable(dir.path()), None).unwrap();
    let sneer = admin.sneer();
    let party = sneer.produce_party(friend);

    assert_eq!(nicknames(&admin), vec!["buddy"]);
    assert!(sneer.find_contact_by_nickname("friend").is_none());

    let messages = sneer.conversation_with(&party).unwrap().messages().current();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].text(), Some("see you after the reboot"));
    assert!(messages[0].is_own());

    assert_eq!(
        sneer
            .profile_for(sneer.self_party())
            .current_preferred_nickname()
            .as_deref(),
        Some("me")
    );
}

#[test]
fn test_restart_keeps_nickname_uniqueness() {
    let dir = tempdir().unwrap();
    let mut admin = SneerAdmin::initialize(
        PrivateKey::generate(),
        SneerConfig::durable(dir.path()),
        None,
    )
    .unwrap();
    let b = admin.sneer().produce_party(peer_key());
    admin.sneer().add_contact("taken", &b).unwrap();

    admin.restart().unwrap();
    let c = admin.sneer().produce_party(peer_key());
    let err = admin.sneer().add_contact("taken", &c).unwrap_err();
    assert!(err.is_friendly());
    assert_eq!(nicknames(&admin), vec!["taken"]);
}

#[test]
fn test_publishing_continues_after_restart() {
    let dir = tempdir().unwrap();
    let mut admin = SneerAdmin::initialize(
        PrivateKey::generate(),
        SneerConfig::durable(dir.path()),
        None,
    )
    .unwrap();
    let tweets = admin.sneer().tuple_space().publisher().tuple_type("tweet");
    tweets.publish("same").unwrap();

    admin.restart().unwrap();
    let tweets = admin.sneer().tuple_space().publisher().tuple_type("tweet");
    let second = tweets.publish("same").unwrap();
    assert_eq!(second.author_seq(), 1);

    let all = admin.sneer().tuple_space().filter().tuple_type("tweet").collect();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|t| t.payload() == Some(&Value::from("same"))));
}

#[tokio::test]
async fn test_old_runtime_handles_end_after_restart() {
    let mut admin =
        SneerAdmin::initialize(PrivateKey::generate(), SneerConfig::in_memory(), None).unwrap();
    let old = admin.sneer().clone();
    old.tuple_space()
        .publisher()
        .tuple_type("tweet")
        .publish("before")
        .unwrap();
    let mut subscription = old.tuple_space().filter().tuples();

    admin.restart().unwrap();
    assert!(old.is_stopped());
    assert!(!admin.sneer().is_stopped());

    assert!(subscription.next().await.is_some());
    assert!(subscription.next().await.is_none());

    let err = old
        .tuple_space()
        .publisher()
        .tuple_type("tweet")
        .publish("after")
        .unwrap_err();
    assert!(err.is_storage());
}

#[test]
fn test_in_memory_restart_and_rejoin_network() {
    let network = NetworkSimulator::new();
    let transport: Arc<dyn Transport> = network.clone();
    let b = SneerAdmin::initialize(
        PrivateKey::generate(),
        SneerConfig::in_memory(),
        Some(transport.clone()),
    )
    .unwrap();
    let mut a = SneerAdmin::initialize(
        PrivateKey::generate(),
        SneerConfig::in_memory(),
        Some(transport),
    )
    .unwrap();

    let b_party = a.sneer().produce_party(b.private_key().public_key());
    a.sneer().add_contact("B", &b_party).unwrap();
    a.restart().unwrap();
    assert_eq!(network.peer_count(), 2);

    // Published while `a` is attached again; must reach the new runtime
    let b_self = b.sneer().self_party().clone();
    b.sneer().profile_for(&b_self).set_preferred_nickname("bee").unwrap();

    let b_party = a.sneer().produce_party(b.private_key().public_key());
    assert_eq!(nicknames(&a), vec!["B"]);
    assert_eq!(
        a.sneer().profile_for(&b_party).current_preferred_nickname().as_deref(),
        Some("bee")
    );
    assert_aligned(&a);
}

#[test]
fn test_group_membership_survives_restart() {
    let dir = tempdir().unwrap();
    let group = PrivateKey::generate();
    let mut admin = SneerAdmin::initialize(
        PrivateKey::generate(),
        SneerConfig::durable(dir.path()),
        None,
    )
    .unwrap();
    admin.sneer().join_group(&group).unwrap();

    admin.restart().unwrap();
    assert_eq!(admin.sneer().groups(), vec![group.public_key()]);
}

#[test]
fn test_failed_restart_can_be_retried() {
    let dir = tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let moved = dir.path().join("moved");
    let mut admin = SneerAdmin::initialize(
        PrivateKey::generate(),
        SneerConfig::durable(&data_dir),
        None,
    )
    .unwrap();
    let b = admin.sneer().produce_party(peer_key());
    admin.sneer().add_contact("B", &b).unwrap();

    // A regular file where the data directory should be
    std::fs::rename(&data_dir, &moved).unwrap();
    std::fs::write(&data_dir, b"not a directory").unwrap();
    assert!(admin.restart().is_err());
    assert!(admin.sneer().is_stopped());

    std::fs::remove_file(&data_dir).unwrap();
    std::fs::rename(&moved, &data_dir).unwrap();
    admin.restart().unwrap();
    assert!(!admin.sneer().is_stopped());
    assert_eq!(nicknames(&admin), vec!["B"]);
}

#[test]
fn test_identities_share_directory_without_mixing() {
    let dir = tempdir().unwrap();
    let key = PrivateKey::generate();
    let admin = SneerAdmin::initialize(key.clone(), SneerConfig::durable(dir.path()), None).unwrap();
    let friend = admin.sneer().produce_party(peer_key());
    admin.sneer().add_contact("friend", &friend).unwrap();
    admin.shutdown().unwrap();

    // A different identity gets its own file in the same directory
    let other = SneerAdmin::initialize(
        PrivateKey::generate(),
        SneerConfig::durable(dir.path()),
        None,
    )
    .unwrap();
    assert!(other.sneer().contacts().current().is_empty());
    other.shutdown().unwrap();

    let again = SneerAdmin::initialize(key, SneerConfig::durable(dir.path()), None).unwrap();
    assert_eq!(nicknames(&again), vec!["friend"]);
}
