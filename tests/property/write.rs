//! Property tests for write retries.
//!
//! Invariants tested:
//! - Never exceeds 1 + write_retries attempts, and never fewer than one
//! - Stops on the first success
//! - Non-idempotent updates make exactly one attempt
//! - continueOnError is restored whatever the outcome

use docstore_resilience_core::{DriverFailure, NoopSleeper};
use docstore_resilience_write::options::CONTINUE_ON_ERROR;
use docstore_resilience_write::{BatchInsertOptions, WriteOutcome, WriteRetry};
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use std::cell::Cell;

fn writer(retries: i64) -> WriteRetry {
    WriteRetry::builder()
        .write_retries(retries)
        .sleeper(NoopSleeper)
        .build()
}

fn failure() -> impl Strategy<Value = DriverFailure> {
    prop_oneof![
        Just(DriverFailure::connection("reset")),
        Just(DriverFailure::duplicate_key("E11000 index: db.c.$_id_ dup key: { : 1 }")),
        Just(DriverFailure::duplicate_key("E11000 index: db.c.$email_1 dup key: { : 1 }")),
        Just(DriverFailure::other("not master")),
    ]
}

fn original_option() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        Just(Some(json!(false))),
        Just(Some(json!(true))),
        Just(Some(json!("test"))),
        Just(Some(json!(0))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: attempts are bounded by the policy
    #[test]
    fn insert_respects_attempt_limit(retries in -5i64..=10) {
        let calls = Cell::new(0usize);
        let mut doc = Map::new();

        let result = writer(retries).execute_insert(&mut doc, |_| {
            calls.set(calls.get() + 1);
            Err::<(), _>(DriverFailure::connection("reset"))
        });

        prop_assert!(result.is_err());
        prop_assert_eq!(calls.get(), retries.max(0) as usize + 1);
    }

    /// Property: success on the Nth attempt stops retrying
    #[test]
    fn update_stops_on_success(retries in 1i64..=8, succeed_on in 1usize..=9) {
        prop_assume!(succeed_on <= retries as usize + 1);

        let calls = Cell::new(0usize);
        let update = json!({ "$set": { "a": 1 } }).as_object().cloned().unwrap();

        let result = writer(retries).execute_idempotent_update(&update, |_| {
            calls.set(calls.get() + 1);
            if calls.get() >= succeed_on {
                Ok(calls.get())
            } else {
                Err(DriverFailure::connection("reset"))
            }
        });

        prop_assert_eq!(result, Ok(WriteOutcome::Acknowledged(succeed_on)));
        prop_assert_eq!(calls.get(), succeed_on);
    }

    /// Property: any failure sequence ends within the limit
    #[test]
    fn arbitrary_failures_stay_bounded(
        retries in 0i64..=6,
        failures in prop::collection::vec(failure(), 0..10),
    ) {
        let calls = Cell::new(0usize);
        let mut doc = Map::new();

        let _ = writer(retries).execute_insert(&mut doc, |_| {
            let n = calls.get();
            calls.set(n + 1);
            failures.get(n).cloned().map_or(Ok(()), Err)
        });

        prop_assert!(calls.get() >= 1);
        prop_assert!(calls.get() <= retries as usize + 1);
    }

    /// Property: unsafe modifiers disable retries
    #[test]
    fn unsafe_updates_attempt_once(
        retries in 0i64..=10,
        operator in prop::sample::select(vec![
            "$inc", "$mul", "$currentDate", "$pop", "$push", "$pushAll", "$bit", "$addToSet",
        ]),
    ) {
        let calls = Cell::new(0usize);
        let mut update = Map::new();
        update.insert("$set".to_string(), json!({ "a": 1 }));
        update.insert(operator.to_string(), json!({ "n": 1 }));

        let result = writer(retries).execute_idempotent_update(&update, |_| {
            calls.set(calls.get() + 1);
            Err::<(), _>(DriverFailure::connection("reset"))
        });

        prop_assert!(result.is_err());
        prop_assert_eq!(calls.get(), 1);
    }

    /// Property: the caller's continueOnError survives every outcome
    #[test]
    fn batch_restores_continue_on_error(
        retries in 0i64..=5,
        original in original_option(),
        failures in prop::collection::vec(failure(), 0..8),
    ) {
        let mut options = BatchInsertOptions::new();
        if let Some(value) = original.clone() {
            options.insert(CONTINUE_ON_ERROR, value);
        }
        let mut docs = vec![Map::new(), Map::new()];
        let calls = Cell::new(0usize);

        let _ = writer(retries).execute_batch_insert(&mut docs, &mut options, |_, opts| {
            let n = calls.get();
            calls.set(n + 1);
            if n > 0 {
                assert!(opts.continues_on_error());
            }
            failures.get(n).cloned().map_or(Ok(()), Err)
        });

        prop_assert_eq!(options.continue_on_error().cloned(), original);
    }
}
