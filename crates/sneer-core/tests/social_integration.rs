//! Integration tests for contacts, profiles and conversations
//!
//! Several runtimes share one in-process `NetworkSimulator`, which delivers
//! synchronously: once a publish returns, every peer allowed to see the tuple
//! already has it in its store.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use sneer_core::{
    Message, NetworkSimulator, PrivateKey, SneerAdmin, SneerConfig, SneerError, Transport, Value,
};

// ============================================================================
// Test Utilities
// ============================================================================

fn node(network: &Arc<NetworkSimulator>) -> SneerAdmin {
    let transport: Arc<dyn Transport> = network.clone();
    SneerAdmin::initialize(PrivateKey::generate(), SneerConfig::in_memory(), Some(transport))
        .unwrap()
}

fn public_key(admin: &SneerAdmin) -> sneer_core::PublicKey {
    admin.private_key().public_key()
}

fn texts(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| m.text().map(str::to_string))
        .collect()
}

/// Make `a` and `b` contacts of each other
fn befriend(a: &SneerAdmin, a_nick: &str, b: &SneerAdmin, b_nick: &str) {
    let b_party = a.sneer().produce_party(public_key(b));
    a.sneer().add_contact(b_nick, &b_party).unwrap();
    let a_party = b.sneer().produce_party(public_key(a));
    b.sneer().add_contact(a_nick, &a_party).unwrap();
}

// ============================================================================
// Conversation Tests
// ============================================================================

#[test]
fn test_ping_pong_ordering() {
    let network = NetworkSimulator::new();
    let (a, b) = (node(&network), node(&network));
    befriend(&a, "a", &b, "b");

    let b_party = a.sneer().produce_party(public_key(&b));
    let a_party = b.sneer().produce_party(public_key(&a));
    let a_conversation = a.sneer().conversation_with(&b_party).unwrap();
    let b_conversation = b.sneer().conversation_with(&a_party).unwrap();

    let mut a_view = a_conversation.messages();
    let mut b_view = b_conversation.messages();
    assert_eq!(texts(&a_view.try_next().unwrap()), Vec::<String>::new());
    assert_eq!(texts(&b_view.try_next().unwrap()), Vec::<String>::new());

    a_conversation.send_message("ping").unwrap();
    assert_eq!(texts(&a_view.try_next().unwrap()), vec!["ping"]);
    assert_eq!(texts(&b_view.try_next().unwrap()), vec!["ping"]);

    b_conversation.send_message("pong").unwrap();
    assert_eq!(texts(&a_view.try_next().unwrap()), vec!["ping", "pong"]);
    assert_eq!(texts(&b_view.try_next().unwrap()), vec!["ping", "pong"]);

    assert!(a_view.try_next().is_none());
    let last = b_view.current();
    assert!(!last[0].is_own() && last[1].is_own());
    assert_eq!(last[0].sender(), &public_key(&a));
}

#[tokio::test]
async fn test_conversation_stream_is_push_based() {
    let network = NetworkSimulator::new();
    let (a, b) = (node(&network), node(&network));
    befriend(&a, "a", &b, "b");

    let a_party = b.sneer().produce_party(public_key(&a));
    let conversation = b.sneer().conversation_with(&a_party).unwrap();
    let mut stream = Box::pin(conversation.messages().into_stream());
    assert!(stream.next().await.unwrap().is_empty());

    let sender = {
        let b_party = a.sneer().produce_party(public_key(&b));
        let conversation = a.sneer().conversation_with(&b_party).unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            conversation.send_message("hello from a").unwrap();
        })
    };

    let snapshot = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("message never arrived")
        .unwrap();
    assert_eq!(texts(&snapshot), vec!["hello from a"]);
    sender.await.unwrap();
}

#[test]
fn test_third_party_cannot_read_conversation() {
    let network = NetworkSimulator::new();
    let (a, b, eve) = (node(&network), node(&network), node(&network));
    befriend(&a, "a", &b, "b");

    let b_party = a.sneer().produce_party(public_key(&b));
    a.sneer()
        .conversation_with(&b_party)
        .unwrap()
        .send_message("secret")
        .unwrap();

    let eve_party_for_a = eve.sneer().produce_party(public_key(&a));
    eve.sneer().add_contact("a", &eve_party_for_a).unwrap();
    let eve_view = eve.sneer().conversation_with(&eve_party_for_a).unwrap();
    assert!(eve_view.messages().current().is_empty());
    assert!(eve
        .sneer()
        .tuple_space()
        .filter()
        .tuple_type(sneer_core::types::CHAT_MESSAGE)
        .collect()
        .is_empty());
}

#[test]
fn test_conversations_follow_contacts() {
    let network = NetworkSimulator::new();
    let (a, b, c) = (node(&network), node(&network), node(&network));
    let sneer = a.sneer();

    let mut conversations = sneer.conversations();
    let mut contacts = sneer.contacts();
    assert!(conversations.try_next().unwrap().is_empty());
    assert!(contacts.try_next().unwrap().is_empty());

    let b_party = sneer.produce_party(public_key(&b));
    let c_party = sneer.produce_party(public_key(&c));
    let b_contact = sneer.add_contact("b", &b_party).unwrap();
    sneer.add_contact("c", &c_party).unwrap();
    sneer.set_nickname(&b_contact, "bee").unwrap();

    let contact_snapshots = contacts.drain();
    let conversation_snapshots = conversations.drain();

    // Renames change the contact list but not the conversation list
    assert_eq!(contact_snapshots.len(), 3);
    assert_eq!(conversation_snapshots.len(), 2);

    let latest_contacts = contact_snapshots.last().unwrap();
    let latest_conversations = conversation_snapshots.last().unwrap();
    assert_eq!(latest_contacts.len(), latest_conversations.len());
    for (contact, conversation) in latest_contacts.iter().zip(latest_conversations) {
        assert!(Arc::ptr_eq(contact.party(), conversation.party()));
    }
    assert_eq!(latest_contacts[0].current_nickname(), "bee");
}

#[test]
fn test_no_conversation_without_contact() {
    let network = NetworkSimulator::new();
    let (a, b) = (node(&network), node(&network));
    let b_party = a.sneer().produce_party(public_key(&b));

    assert!(a.sneer().find_contact(&b_party).is_none());
    assert!(a.sneer().conversation_with(&b_party).is_none());

    a.sneer().add_contact("b", &b_party).unwrap();
    let first = a.sneer().conversation_with(&b_party).unwrap();
    let second = a.sneer().conversation_with(&b_party).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

// ============================================================================
// Contact Tests
// ============================================================================

#[tokio::test]
async fn test_contact_nickname_observed_in_change_order() {
    let network = NetworkSimulator::new();
    let (a, b) = (node(&network), node(&network));
    let b_party = a.sneer().produce_party(public_key(&b));
    let contact = a.sneer().add_contact("bob", &b_party).unwrap();

    let mut nickname = contact.nickname();
    a.sneer().set_nickname(&contact, "robert").unwrap();
    a.sneer().set_nickname(&contact, "bobby").unwrap();

    assert_eq!(nickname.next().await.as_deref(), Some("bob"));
    assert_eq!(nickname.next().await.as_deref(), Some("robert"));
    assert_eq!(nickname.next().await.as_deref(), Some("bobby"));
    assert_eq!(contact.current_nickname(), "bobby");
}

#[test]
fn test_contact_bindings_stay_private() {
    let network = NetworkSimulator::new();
    let (a, b) = (node(&network), node(&network));
    let b_party = a.sneer().produce_party(public_key(&b));
    a.sneer().add_contact("b", &b_party).unwrap();

    assert!(b.sneer().contacts().current().is_empty());
    assert!(b
        .sneer()
        .tuple_space()
        .filter()
        .tuple_type(sneer_core::types::CONTACT)
        .collect()
        .is_empty());
}

#[test]
fn test_party_name_fallbacks() {
    let network = NetworkSimulator::new();
    let (a, b) = (node(&network), node(&network));
    let b_party = a.sneer().produce_party(public_key(&b));

    assert_eq!(a.sneer().party_name(&b_party), public_key(&b).short());

    let b_self = b.sneer().self_party().clone();
    b.sneer().profile_for(&b_self).set_preferred_nickname("Bobo").unwrap();
    assert_eq!(a.sneer().party_name(&b_party), "Bobo");

    a.sneer().add_contact("my friend", &b_party).unwrap();
    assert_eq!(a.sneer().party_name(&b_party), "my friend");
}

// ============================================================================
// Profile Tests
// ============================================================================

#[tokio::test]
async fn test_remote_nickname_converges_in_order() {
    let network = NetworkSimulator::new();
    let (a, b) = (node(&network), node(&network));
    befriend(&a, "a", &b, "b");

    let b_party = a.sneer().produce_party(public_key(&b));
    let mut observed = a.sneer().profile_for(&b_party).preferred_nickname();
    assert_eq!(observed.try_next(), None);

    let b_self = b.sneer().self_party().clone();
    let b_profile = b.sneer().profile_for(&b_self);
    b_profile.set_preferred_nickname("X").unwrap();
    b_profile.set_preferred_nickname("Y").unwrap();

    let first = tokio::time::timeout(Duration::from_secs(5), observed.next()).await.unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), observed.next()).await.unwrap();
    assert_eq!(first.as_deref(), Some("X"));
    assert_eq!(second.as_deref(), Some("Y"));
    assert_eq!(
        a.sneer().profile_for(&b_party).current_preferred_nickname().as_deref(),
        Some("Y")
    );
}

#[test]
fn test_profiles_are_interned_per_party() {
    let network = NetworkSimulator::new();
    let a = node(&network);
    let me = a.sneer().self_party().clone();

    let first = a.sneer().profile_for(&me);
    let second = a.sneer().profile_for(&me);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.is_self());
}

#[test]
fn test_cannot_write_another_profile() {
    let network = NetworkSimulator::new();
    let (a, b) = (node(&network), node(&network));
    let b_party = a.sneer().produce_party(public_key(&b));

    let err = a
        .sneer()
        .profile_for(&b_party)
        .set_attribute("country", "nowhere")
        .unwrap_err();
    assert!(matches!(err, SneerError::InvalidOperation(_)));
    assert!(!err.is_friendly());
}

// ============================================================================
// Tuple Space Tests
// ============================================================================

#[test]
fn test_late_join_sees_earlier_tweets() {
    let network = NetworkSimulator::new();
    let b = node(&network);
    b.sneer()
        .tuple_space()
        .publisher()
        .tuple_type("tweet")
        .publish("first!")
        .unwrap();

    // `a` comes online only after the tweet was published
    let a = node(&network);
    let b_party = a.sneer().produce_party(public_key(&b));
    a.sneer().add_contact("b", &b_party).unwrap();

    let tweets = a
        .sneer()
        .tuple_space()
        .filter()
        .tuple_type("tweet")
        .author(public_key(&b))
        .collect();
    assert_eq!(tweets.len(), 1);
    assert_eq!(tweets[0].payload(), Some(&Value::from("first!")));
}

#[tokio::test]
async fn test_subscription_replays_then_follows() {
    let network = NetworkSimulator::new();
    let (a, b) = (node(&network), node(&network));
    let tweets = b.sneer().tuple_space().publisher().tuple_type("tweet");
    tweets.publish("one").unwrap();

    let mut subscription = a.sneer().tuple_space().filter().tuple_type("tweet").tuples();
    let replayed = subscription.next().await.unwrap();
    assert_eq!(replayed.payload(), Some(&Value::from("one")));

    tweets.publish("two").unwrap();
    let live = subscription.next().await.unwrap();
    assert_eq!(live.payload(), Some(&Value::from("two")));

    // A second subscription starts over from the beginning
    let again = a.sneer().tuple_space().filter().tuple_type("tweet").collect();
    assert_eq!(again.len(), 2);
}

#[test]
fn test_group_membership_is_a_capability() {
    let network = NetworkSimulator::new();
    let (a, b, c) = (node(&network), node(&network), node(&network));
    let group = PrivateKey::generate();
    a.sneer().join_group(&group).unwrap();

    a.sneer()
        .tuple_space()
        .publisher()
        .tuple_type("tweet")
        .audience(group.public_key())
        .publish("members only")
        .unwrap();

    let visible = |admin: &SneerAdmin| {
        admin
            .sneer()
            .tuple_space()
            .filter()
            .tuple_type("tweet")
            .collect()
            .len()
    };
    assert_eq!(visible(&a), 1);
    assert_eq!(visible(&b), 0);

    // Joining later still reveals what the group published before
    b.sneer().join_group(&group).unwrap();
    assert_eq!(visible(&b), 1);
    assert_eq!(visible(&c), 0);
    assert_eq!(b.sneer().groups(), vec![group.public_key()]);
}

#[test]
fn test_open_sequence_shows_no_hidden_tuples() {
    let network = NetworkSimulator::new();
    let (author, outsider) = (node(&network), node(&network));
    let group = PrivateKey::generate();
    author.sneer().join_group(&group).unwrap();
    let friend = author.sneer().produce_party(PrivateKey::generate().public_key());
    author.sneer().add_contact("friend", &friend).unwrap();

    let tweets = author.sneer().tuple_space().publisher().tuple_type("tweet");
    tweets.publish("open").unwrap();
    tweets.clone().audience(group.public_key()).publish("hidden").unwrap();
    tweets.clone().audience(group.public_key()).publish("hidden").unwrap();
    tweets.publish("open").unwrap();

    let seqs: Vec<u64> = outsider
        .sneer()
        .tuple_space()
        .filter()
        .author(public_key(&author))
        .collect()
        .iter()
        .map(|t| t.author_seq())
        .collect();
    assert_eq!(seqs, vec![0, 1]);

    let group_seqs: Vec<u64> = author
        .sneer()
        .tuple_space()
        .filter()
        .audience(group.public_key())
        .collect()
        .iter()
        .map(|t| t.author_seq())
        .collect();
    assert_eq!(group_seqs, vec![0, 1]);
}

#[test]
fn test_group_key_never_reaches_transport() {
    let network = NetworkSimulator::new();
    let mut a = node(&network);
    let before = network.retained_count();

    let group = PrivateKey::generate();
    a.sneer().join_group(&group).unwrap();
    assert_eq!(network.retained_count(), before);
    assert_eq!(a.sneer().groups(), vec![group.public_key()]);

    // Still persisted locally
    a.restart().unwrap();
    assert_eq!(a.sneer().groups(), vec![group.public_key()]);
    assert_eq!(network.retained_count(), before);
}

#[test]
fn test_next_session_id_from_local_tuples() {
    let network = NetworkSimulator::new();
    let a = node(&network);
    assert_eq!(a.sneer().next_session_id(), 0);

    let sessions = a.sneer().tuple_space().publisher().tuple_type("game/move");
    sessions
        .clone()
        .field(sneer_core::SESSION_FIELD, 3i64)
        .publish_empty()
        .unwrap();
    sessions
        .field(sneer_core::SESSION_FIELD, 1i64)
        .publish_empty()
        .unwrap();

    assert_eq!(a.sneer().next_session_id(), 4);
}
