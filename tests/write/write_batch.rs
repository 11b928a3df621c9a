//! Batch insert tests.
//!
//! Tests batch retry logic including:
//! - Identifiers assigned to every document before the first attempt
//! - continueOnError forced on for retries only
//! - The caller's option restored on every exit path
//! - Duplicate keys retried after the first attempt

use super::{ID_CONFLICT, OTHER_CONFLICT, Script, document, transient};
use docstore_resilience_core::{DriverFailure, NoopSleeper};
use docstore_resilience_write::identity::ID_FIELD;
use docstore_resilience_write::options::CONTINUE_ON_ERROR;
use docstore_resilience_write::{BatchInsertOptions, DocumentIdentity, WriteOutcome, WriteRetry};
use serde_json::{Map, Value, json};
use std::sync::Mutex;

fn writer(retries: i64) -> WriteRetry {
    WriteRetry::builder()
        .name("batches")
        .write_retries(retries)
        .sleeper(NoopSleeper)
        .build()
}

fn batch() -> Vec<Map<String, Value>> {
    vec![
        document(json!({ "n": 1 })),
        document(json!({ "n": 2 })),
        document(json!({ "_id": "fixed", "n": 3 })),
    ]
}

#[test]
fn every_document_gets_an_identifier() {
    let mut docs = batch();
    let mut options = BatchInsertOptions::new();

    let result = writer(1).execute_batch_insert(&mut docs, &mut options, |sent, _| {
        assert!(sent.iter().all(DocumentIdentity::has_identifier));
        Ok::<_, DriverFailure>(sent.len())
    });

    assert_eq!(result, Ok(WriteOutcome::Acknowledged(3)));
    assert!(docs.iter().all(DocumentIdentity::has_identifier));
    assert_eq!(docs[2][ID_FIELD], json!("fixed"));
    assert_ne!(docs[0][ID_FIELD], docs[1][ID_FIELD]);
}

#[test]
fn first_attempt_sees_callers_options() {
    let mut docs = batch();
    let mut options = BatchInsertOptions::new();
    options.insert("w", 1);

    let result = writer(2).execute_batch_insert(&mut docs, &mut options, |_, opts| {
        assert_eq!(opts.continue_on_error(), None);
        assert_eq!(opts.get("w"), Some(&json!(1)));
        Ok::<_, DriverFailure>(())
    });

    assert!(result.is_ok());
    assert_eq!(options.continue_on_error(), None);
}

#[test]
fn retries_run_with_continue_on_error() {
    let script = Script::new(vec![transient(), transient()]);
    let observed = Mutex::new(Vec::new());
    let mut docs = batch();
    let mut options = BatchInsertOptions::new();
    options.insert(CONTINUE_ON_ERROR, "test");

    let result = writer(2).execute_batch_insert(&mut docs, &mut options, |_, opts| {
        observed.lock().unwrap().push(opts.continue_on_error().cloned());
        script.next()
    });

    assert_eq!(result, Ok(WriteOutcome::Acknowledged(2)));
    assert_eq!(
        observed.into_inner().unwrap(),
        vec![Some(json!("test")), Some(json!(true)), Some(json!(true))]
    );
    assert_eq!(options.continue_on_error(), Some(&json!("test")));
}

#[test]
fn option_restored_after_exhaustion() {
    let script = Script::always(transient());
    let mut docs = batch();
    let mut options = BatchInsertOptions::new();
    options.set_continue_on_error(false);

    let result = writer(3).execute_batch_insert(&mut docs, &mut options, |_, _| script.next());

    assert_eq!(result, Err(transient()));
    assert_eq!(script.calls(), 4);
    assert_eq!(options.continue_on_error(), Some(&json!(false)));
}

#[test]
fn absent_option_removed_after_fatal_failure() {
    let failure = DriverFailure::other("bad batch");
    let script = Script::new(vec![transient(), failure.clone()]);
    let mut docs = batch();
    let mut options = BatchInsertOptions::new();

    let result = writer(3).execute_batch_insert(&mut docs, &mut options, |_, _| script.next());

    assert_eq!(result, Err(failure));
    assert_eq!(options.continue_on_error(), None);
    assert!(options.as_map().is_empty());
}

#[test]
fn duplicate_keys_after_first_attempt_are_retried() {
    for conflict in [ID_CONFLICT, OTHER_CONFLICT] {
        let script = Script::new(vec![
            transient(),
            DriverFailure::duplicate_key(conflict),
        ]);
        let mut docs = batch();
        let mut options = BatchInsertOptions::new();

        let result =
            writer(2).execute_batch_insert(&mut docs, &mut options, |_, _| script.next());

        assert_eq!(result, Ok(WriteOutcome::Acknowledged(2)));
        assert_eq!(script.calls(), 3);
    }
}

#[test]
fn duplicate_key_on_last_attempt_is_returned() {
    let conflict = DriverFailure::duplicate_key(ID_CONFLICT);
    let script = Script::new(vec![transient(), conflict.clone()]);
    let mut docs = batch();
    let mut options = BatchInsertOptions::new();

    let result = writer(1).execute_batch_insert(&mut docs, &mut options, |_, _| script.next());

    assert_eq!(result, Err(conflict));
    assert_eq!(script.calls(), 2);
}

#[test]
fn duplicate_key_on_first_attempt_is_returned() {
    let conflict = DriverFailure::duplicate_key(OTHER_CONFLICT);
    let script = Script::new(vec![conflict.clone()]);
    let mut docs = batch();
    let mut options = BatchInsertOptions::new();

    let result = writer(5).execute_batch_insert(&mut docs, &mut options, |_, _| script.next());

    assert_eq!(result, Err(conflict));
    assert_eq!(script.calls(), 1);
}

#[test]
fn same_identifiers_sent_on_every_attempt() {
    let script = Script::new(vec![transient()]);
    let sent = Mutex::new(Vec::new());
    let mut docs = batch();
    let mut options = BatchInsertOptions::new();

    let _ = writer(1).execute_batch_insert(&mut docs, &mut options, |batch, _| {
        let ids: Vec<Value> = batch.iter().map(|d| d[ID_FIELD].clone()).collect();
        sent.lock().unwrap().push(ids);
        script.next()
    });

    let sent = sent.into_inner().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0], sent[1]);
}

#[test]
fn no_retries_leaves_options_alone() {
    let script = Script::always(transient());
    let mut docs = batch();
    let mut options = BatchInsertOptions::new();

    let result = writer(0).execute_batch_insert(&mut docs, &mut options, |_, opts| {
        assert!(!opts.continues_on_error());
        script.next()
    });

    assert_eq!(result, Err(transient()));
    assert_eq!(script.calls(), 1);
    assert!(options.as_map().is_empty());
}

#[test]
fn empty_batch_is_passed_through() {
    let mut docs: Vec<Map<String, Value>> = Vec::new();
    let mut options = BatchInsertOptions::new();

    let result = writer(2).execute_batch_insert(&mut docs, &mut options, |sent, _| {
        Ok::<_, DriverFailure>(sent.len())
    });

    assert_eq!(result, Ok(WriteOutcome::Acknowledged(0)));
}
