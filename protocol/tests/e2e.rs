//! End-to-end integration tests for the Tally engine.
//!
//! These tests drive the public engine surface against a real (temporary)
//! sled store: register users, open payment profiles, issue cards, draft
//! and walk transactions through their lifecycle, and check that every
//! outward-facing read comes back sealed and decrypts to what we expect.
//!
//! Each test stands alone with its own temporary database. No shared
//! state, no test ordering dependencies.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use tally_protocol::allocation::CardType;
use tally_protocol::config::AES_KEY_LENGTH;
use tally_protocol::crypto::{salted_hash, ContentHash, EncryptedPayload, SymmetricKey};
use tally_protocol::records::{
    Card, CardStatus, CardView, NewProfile, NewUser, PartySignatures, PaymentProfile, ProfileView,
    User, UserView,
};
use tally_protocol::storage::{LedgerDb, RecordStore};
use tally_protocol::transaction::{NewTransaction, Transaction, TransactionStatus, TransactionView};
use tally_protocol::validation::{Changes, FieldValue};
use tally_protocol::{Engine, EngineConfig, EngineError, EngineResult};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const GLOBAL_SALT: &str = "e2e-global-salt";

fn setup() -> Engine<LedgerDb> {
    let config = EngineConfig::new(
        GLOBAL_SALT,
        SymmetricKey::from_bytes([0x42; AES_KEY_LENGTH]),
        16,
        3,
    )
    .expect("config");
    let db = LedgerDb::open_temporary().expect("temp db");
    Engine::new(Arc::new(config), db)
}

fn new_user(email: &str, first_name: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        password: "correct-horse-battery".to_string(),
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        mobile_number: Some("+44 7700 900123".to_string()),
        country: Some("gb".to_string()),
        language: None,
    }
}

fn changes(pairs: &[(&str, FieldValue)]) -> Changes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// A user with one EUR profile. Returns the profile identifier.
fn open_profile(engine: &Engine<LedgerDb>, email: &str) -> ContentHash {
    let user = engine.create_user(&new_user(email, "Party")).expect("user");
    engine
        .create_profile(&NewProfile {
            user,
            card_type: CardType::Debit,
            currency: "eur".to_string(),
            alias: None,
        })
        .expect("profile")
}

/// Two funded parties and a Draft transaction between them.
fn drafted(engine: &Engine<LedgerDb>) -> (uuid::Uuid, PartySignatures) {
    let sender = open_profile(engine, "sender@example.com");
    let receiver = open_profile(engine, "receiver@example.com");
    let identifier = engine
        .create_transaction(&NewTransaction {
            sender,
            receiver,
            amount: 10_000,
            currency: "EUR".to_string(),
            description: Some("invoice 42".to_string()),
        })
        .expect("transaction");

    let view: TransactionView = engine
        .open_payload(&engine.get_transaction(&identifier).unwrap())
        .unwrap();
    let signatures = PartySignatures {
        initiator: view.sender_signature,
        counterparty: view.receiver_signature,
    };
    let id = engine.locate::<Transaction>(&identifier).unwrap();
    (id, signatures)
}

fn status_of(engine: &Engine<LedgerDb>, id: uuid::Uuid) -> TransactionStatus {
    let tx: Transaction = engine.store().fetch(id).unwrap().unwrap();
    tx.current_status()
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[test]
fn user_roundtrip_through_the_envelope() {
    let engine = setup();
    let identifier = engine
        .create_user(&new_user("Ada@Example.com", "Ada"))
        .unwrap();

    // Email is normalized before hashing.
    let expected = salted_hash("ada@example.comcorrect-horse-battery", GLOBAL_SALT).unwrap();
    assert_eq!(identifier, expected);

    let payload = engine.get_user(&identifier).unwrap();
    let view: UserView = engine.open_payload(&payload).unwrap();
    assert_eq!(view.identifier, expected);
    assert_eq!(view.email, "ada@example.com");
    assert_eq!(view.country.as_deref(), Some("GB"));
    assert_eq!(view.mobile_number.as_deref(), Some("+447700900123"));
}

#[test]
fn same_credentials_cannot_register_twice() {
    let engine = setup();
    engine.create_user(&new_user("dup@example.com", "One")).unwrap();
    let err = engine
        .create_user(&new_user("dup@example.com", "Two"))
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists { .. }));
}

#[test]
fn invalid_registration_is_a_type_mismatch() {
    let engine = setup();
    let mut input = new_user("not-an-email", "Ada");
    let err = engine.create_user(&input).unwrap_err();
    assert!(matches!(err, EngineError::TypeMismatch { ref field, .. } if field == "email"));

    input.email = "ada@example.com".into();
    input.password = "short".into();
    assert!(matches!(
        engine.create_user(&input),
        Err(EngineError::TypeMismatch { .. })
    ));
}

#[test]
fn user_update_respects_the_allow_list() {
    let engine = setup();
    let identifier = engine.create_user(&new_user("grace@example.com", "Grace")).unwrap();
    let id = engine.locate::<User>(&identifier).unwrap();

    engine
        .update_user(id, changes(&[("last_name", "Hopper".into()), ("language", "EN".into())]))
        .unwrap();
    let user: User = engine.store().fetch(id).unwrap().unwrap();
    assert_eq!(user.last_name, "Hopper");
    assert_eq!(user.language.as_deref(), Some("en"));

    // A valid value for an off-list field still fails, and nothing changes.
    let err = engine
        .update_user(id, changes(&[("email", "new@example.com".into()), ("first_name", "G".into())]))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAttribute { .. }));
    let after: User = engine.store().fetch(id).unwrap().unwrap();
    assert_eq!(after.first_name, "Grace");
}

#[test]
fn get_unknown_identifier_is_not_found() {
    let engine = setup();
    let ghost = salted_hash("nobody", "nowhere").unwrap();
    assert!(matches!(engine.get_user(&ghost), Err(EngineError::NotFound { .. })));
    assert!(matches!(engine.locate::<User>(&ghost), Err(EngineError::NotFound { .. })));
}

#[test]
fn delete_user_then_lookup_fails() {
    let engine = setup();
    let identifier = engine.create_user(&new_user("bye@example.com", "Bye")).unwrap();
    let id = engine.locate::<User>(&identifier).unwrap();

    let deletion = engine.delete_user(id).unwrap();
    assert_eq!(deletion.id, id);
    assert_eq!(deletion.identifier, identifier);
    assert!(matches!(engine.get_user(&identifier), Err(EngineError::NotFound { .. })));
    assert!(matches!(engine.delete_user(id), Err(EngineError::NotFound { .. })));
}

// ---------------------------------------------------------------------------
// Cards & profiles
// ---------------------------------------------------------------------------

#[test]
fn issued_card_is_sealed_without_secrets() {
    let engine = setup();
    let mut rng = StdRng::seed_from_u64(2026);
    let identifier = engine.issue_card_with(CardType::Credit, &mut rng).unwrap();

    let card: Card = engine
        .store()
        .fetch_by_identifier(&identifier)
        .unwrap()
        .unwrap();
    assert!(card.number.starts_with('5'));
    assert_eq!(card.number.len(), 16);
    assert_eq!(card.cvv.len(), 3);
    assert_eq!(card.status, CardStatus::Active);

    let payload = engine.get_card(&identifier).unwrap();
    let plaintext = engine.envelope().open(&payload).unwrap();
    let json = String::from_utf8(plaintext).unwrap();
    assert!(!json.contains(&card.number));
    assert!(!json.contains(&card.salt));

    let view: CardView = engine.open_payload(&payload).unwrap();
    assert_eq!(view.last_four, card.number[12..]);
    assert_eq!(view.expiry, card.expiry.short_date());
}

#[test]
fn card_pin_update_stores_only_the_hash() {
    let engine = setup();
    let identifier = engine.issue_card(CardType::Debit).unwrap();
    let id = engine.locate::<Card>(&identifier).unwrap();

    engine.update_card(id, changes(&[("pin", "2468".into())])).unwrap();
    let card: Card = engine.store().fetch(id).unwrap().unwrap();
    assert_eq!(card.pin_hash, salted_hash("2468", &card.salt).unwrap());

    let err = engine.update_card(id, changes(&[("pin", "24680".into())])).unwrap_err();
    assert!(matches!(err, EngineError::TypeMismatch { .. }));
    let err = engine.update_card(id, changes(&[("number", "4000".into())])).unwrap_err();
    assert!(matches!(err, EngineError::InvalidAttribute { .. }));
}

#[test]
fn profile_issues_a_card_and_deactivates_it_on_delete() {
    let engine = setup();
    let identifier = open_profile(&engine, "owner@example.com");
    let view: ProfileView = engine
        .open_payload(&engine.get_profile(&identifier).unwrap())
        .unwrap();
    assert_eq!(view.currency, "EUR");

    let card: Card = engine.store().fetch_by_identifier(&view.card).unwrap().unwrap();
    assert!(card.is_active());

    let id = engine.locate::<PaymentProfile>(&identifier).unwrap();
    engine.delete_profile(id).unwrap();

    let card: Card = engine.store().fetch(card.id).unwrap().unwrap();
    assert_eq!(card.status, CardStatus::Inactive);
}

fn issue_seeded(engine: &Engine<LedgerDb>, seed: u64) -> EngineResult<Card> {
    let identifier =
        engine.issue_card_with(CardType::Debit, &mut StdRng::seed_from_u64(seed))?;
    Ok(engine
        .store()
        .fetch_by_identifier(&identifier)?
        .expect("issued card is stored"))
}

#[test]
fn colliding_candidate_is_redrawn_against_the_store() {
    let engine = setup();
    let first = issue_seeded(&engine, 77).unwrap();
    let second = issue_seeded(&engine, 77).unwrap();

    assert_ne!(first.number, second.number);
    assert_eq!(engine.store().count::<Card>(), 2);
}

#[test]
fn inactive_cards_free_their_number() {
    let engine = setup();
    let first = issue_seeded(&engine, 78).unwrap();

    // Blocked is still live.
    engine
        .update_card(first.id, changes(&[("status", "blocked".into())]))
        .unwrap();
    let redrawn = issue_seeded(&engine, 78).unwrap();
    assert_ne!(redrawn.number, first.number);

    engine
        .update_card(first.id, changes(&[("status", "inactive".into())]))
        .unwrap();
    let reused = issue_seeded(&engine, 78).unwrap();
    assert_eq!(reused.number, first.number);
    assert_eq!(reused.cvv, first.cvv);
    assert_ne!(reused.identifier, first.identifier);
}

#[test]
fn allocation_gives_up_after_three_live_collisions() {
    let engine = setup();
    for _ in 0..3 {
        issue_seeded(&engine, 79).unwrap();
    }

    let err = issue_seeded(&engine, 79).unwrap_err();
    assert!(matches!(err, EngineError::Allocation { attempts: 3 }));
    assert_eq!(engine.store().count::<Card>(), 3);
}

#[test]
fn profile_for_unknown_user_is_not_found() {
    let engine = setup();
    let err = engine
        .create_profile(&NewProfile {
            user: salted_hash("ghost", "x").unwrap(),
            card_type: CardType::Prepaid,
            currency: "USD".into(),
            alias: Some("Travel".into()),
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound { .. }));
    assert_eq!(engine.store().count::<Card>(), 0);
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

#[test]
fn transaction_lifecycle_happy_path() {
    let engine = setup();
    let (id, sigs) = drafted(&engine);
    assert_eq!(status_of(&engine, id), TransactionStatus::Draft);

    engine
        .update_transaction(id, &sigs, changes(&[("status", "Approved".into())]))
        .unwrap();
    engine
        .update_transaction(id, &sigs, changes(&[("status", "transferred".into())]))
        .unwrap();
    engine
        .update_transaction(id, &sigs, changes(&[("status", "Reversed".into())]))
        .unwrap();
    assert_eq!(status_of(&engine, id), TransactionStatus::Reversed);

    // Reversed is terminal but idempotent.
    engine
        .update_transaction(id, &sigs, changes(&[("status", "Reversed".into())]))
        .unwrap();
    let err = engine
        .update_transaction(id, &sigs, changes(&[("status", "Approved".into())]))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransaction(_)));
}

#[test]
fn draft_cannot_jump_to_transferred() {
    let engine = setup();
    let (id, sigs) = drafted(&engine);
    let err = engine
        .update_transaction(id, &sigs, changes(&[("status", "Transferred".into())]))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransaction(_)));
    assert_eq!(status_of(&engine, id), TransactionStatus::Draft);
}

#[test]
fn amount_only_changes_while_draft() {
    let engine = setup();
    let (id, sigs) = drafted(&engine);

    engine
        .update_transaction(id, &sigs, changes(&[("amount", FieldValue::Unsigned(12_500))]))
        .unwrap();
    engine
        .update_transaction(id, &sigs, changes(&[("status", "Approved".into())]))
        .unwrap();

    let err = engine
        .update_transaction(id, &sigs, changes(&[("amount", FieldValue::Unsigned(1))]))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidTransaction(_)));

    let tx: Transaction = engine.store().fetch(id).unwrap().unwrap();
    assert_eq!(tx.amount, 12_500);
}

#[test]
fn forged_signatures_are_rejected_before_any_write() {
    let engine = setup();
    let (id, sigs) = drafted(&engine);
    let forged = PartySignatures {
        initiator: sigs.counterparty.clone(),
        counterparty: sigs.initiator.clone(),
    };
    let err = engine
        .update_transaction(id, &forged, changes(&[("description", "hijacked".into())]))
        .unwrap_err();
    assert!(matches!(err, EngineError::Authorization));

    let tx: Transaction = engine.store().fetch(id).unwrap().unwrap();
    assert_eq!(tx.description.as_deref(), Some("invoice 42"));
}

#[test]
fn off_list_field_fails_even_with_bad_signatures() {
    let engine = setup();
    let (id, sigs) = drafted(&engine);
    let forged = PartySignatures {
        initiator: sigs.counterparty.clone(),
        counterparty: sigs.counterparty,
    };
    let err = engine
        .update_transaction(id, &forged, changes(&[("sender", "someone".into())]))
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAttribute { .. }));
}

#[test]
fn transaction_needs_two_distinct_active_parties() {
    let engine = setup();
    let alice = open_profile(&engine, "alice@example.com");
    let bob = open_profile(&engine, "bob@example.com");

    let same = engine.create_transaction(&NewTransaction {
        sender: alice.clone(),
        receiver: alice.clone(),
        amount: 1,
        currency: "EUR".into(),
        description: None,
    });
    assert!(matches!(same, Err(EngineError::InvalidTransaction(_))));

    // Block Bob's card.
    let bob_view: ProfileView = engine.open_payload(&engine.get_profile(&bob).unwrap()).unwrap();
    let bob_card = engine.locate::<Card>(&bob_view.card).unwrap();
    engine
        .update_card(bob_card, changes(&[("status", "BLOCKED".into())]))
        .unwrap();

    let blocked = engine.create_transaction(&NewTransaction {
        sender: alice,
        receiver: bob,
        amount: 1,
        currency: "EUR".into(),
        description: None,
    });
    assert!(matches!(blocked, Err(EngineError::InvalidTransaction(_))));
}

#[test]
fn zero_amount_is_rejected_at_creation() {
    let engine = setup();
    let sender = open_profile(&engine, "s@example.com");
    let receiver = open_profile(&engine, "r@example.com");
    let err = engine
        .create_transaction(&NewTransaction {
            sender,
            receiver,
            amount: 0,
            currency: "EUR".into(),
            description: None,
        })
        .unwrap_err();
    assert!(matches!(err, EngineError::TypeMismatch { .. }));
}

// ---------------------------------------------------------------------------
// Envelope at the engine boundary
// ---------------------------------------------------------------------------

#[test]
fn tampered_payload_fails_closed() {
    let engine = setup();
    let identifier = engine.create_user(&new_user("seal@example.com", "Seal")).unwrap();
    let payload = engine.get_user(&identifier).unwrap();

    let mut raw = hex::decode(payload.as_str()).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    let tampered: EncryptedPayload = hex::encode(raw).parse().unwrap();

    let result: Result<UserView, _> = engine.open_payload(&tampered);
    assert!(matches!(result, Err(EngineError::Crypto)));
}

#[test]
fn other_deployment_cannot_open_payloads() {
    let engine = setup();
    let identifier = engine.create_user(&new_user("key@example.com", "Key")).unwrap();
    let payload = engine.get_user(&identifier).unwrap();

    let other = Engine::new(
        Arc::new(EngineConfig::generate()),
        LedgerDb::open_temporary().unwrap(),
    );
    let result: Result<UserView, _> = other.open_payload(&payload);
    assert!(matches!(result, Err(EngineError::Crypto)));
}
