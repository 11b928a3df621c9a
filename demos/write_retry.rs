//! Simple example for docstore-resilience-write
//! Run with: RUST_LOG=debug cargo run --example write_retry

use docstore_resilience_core::DriverFailure;
use docstore_resilience_write::{BatchInsertOptions, WriteRetry};
use serde_json::{Map, Value, json};
use std::cell::Cell;
use std::time::Duration;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Two retries, 100ms apart
    let writer = WriteRetry::builder()
        .name("demo")
        .write_retries(2)
        .write_delay(Duration::from_millis(100))
        .on_retry(|n, delay| println!("retry #{} after {:?}", n, delay))
        .on_presumed_applied(|attempts| println!("presumed applied after {} attempts", attempts))
        .build();

    // The first attempt reaches the server but the reply is lost; the retry
    // then collides with the stored copy on the identifier index.
    let mut order: Map<String, Value> = Map::new();
    order.insert("sku".to_string(), json!("A-1"));
    let calls = Cell::new(0);
    let result = writer.execute_insert(&mut order, |doc| {
        calls.set(calls.get() + 1);
        println!("insert attempt {} with _id {}", calls.get(), doc["_id"]);
        match calls.get() {
            1 => Err(DriverFailure::connection("connection reset by peer")),
            _ => Err::<(), _>(DriverFailure::duplicate_key(
                "E11000 duplicate key error index: shop.orders.$_id_ dup key: { : 1 }",
            )),
        }
    });
    println!("insert result: {:?}", result);

    // Batch retries run with continueOnError forced on
    let mut batch: Vec<Map<String, Value>> = vec![Map::new(), Map::new()];
    let mut options = BatchInsertOptions::new();
    options.set_continue_on_error(false);
    let calls = Cell::new(0);
    let result = writer.execute_batch_insert(&mut batch, &mut options, |docs, opts| {
        calls.set(calls.get() + 1);
        println!(
            "batch attempt {} with continueOnError={:?}",
            calls.get(),
            opts.continue_on_error()
        );
        if calls.get() == 1 {
            Err(DriverFailure::connection("timed out"))
        } else {
            Ok(docs.len())
        }
    });
    println!("batch result: {:?}, options after: {:?}", result, options);

    // Counters are never resent
    let update = json!({ "$inc": { "stock": -1 } });
    let result = writer.execute_idempotent_update(update.as_object().unwrap_or(&Map::new()), |_| {
        Err::<(), _>(DriverFailure::connection("connection reset by peer"))
    });
    println!("update result: {:?}", result);
}
