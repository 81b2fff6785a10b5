//! End-to-end exercises of the command dispatcher and stats snapshot,
//! driven directly against `Engine` rather than over a live socket.

use kvnode::dispatch::{Command, Engine};
use serde_json::Value;

fn status(reply: &[u8]) -> String {
    let v: Value = serde_json::from_slice(reply).unwrap();
    v["status"].as_str().unwrap().to_string()
}

fn message(reply: &[u8]) -> String {
    let v: Value = serde_json::from_slice(reply).unwrap();
    v["message"].as_str().unwrap().to_string()
}

fn count(reply: &[u8], index: &str) -> u64 {
    let v: Value = serde_json::from_slice(reply).unwrap();
    v["data"][index]["count"].as_u64().unwrap()
}

#[test]
fn set_then_get_on_array_index() {
    let engine = Engine::new(4, 8, 4);

    let set = engine.handle(Command { cmd: "SET", key: "a", value: Some("1") });
    assert_eq!(status(&set), "OK");
    assert_eq!(message(&set), "Set successfully");
    assert_eq!(count(&set, "array"), 1);

    let get = engine.handle(Command { cmd: "GET", key: "a", value: None });
    assert_eq!(status(&get), "OK");
    assert_eq!(message(&get), "1");
}

#[test]
fn duplicate_set_reports_exist() {
    let engine = Engine::new(4, 8, 4);
    engine.handle(Command { cmd: "SET", key: "a", value: Some("1") });

    let dup = engine.handle(Command { cmd: "SET", key: "a", value: Some("2") });
    assert_eq!(status(&dup), "EXIST");
    assert_eq!(message(&dup), "Key already exists");
}

#[test]
fn hash_set_then_get_reports_count() {
    let engine = Engine::new(4, 8, 4);
    engine.handle(Command { cmd: "HSET", key: "x", value: Some("y") });

    let get = engine.handle(Command { cmd: "HGET", key: "x", value: None });
    assert_eq!(message(&get), "y");
    assert_eq!(count(&get, "hash"), 1);
}

#[test]
fn unknown_command_is_rejected() {
    let engine = Engine::new(4, 8, 4);
    let reply = engine.handle(Command { cmd: "BOGUS", key: "k", value: None });
    assert_eq!(status(&reply), "ERROR");
    assert_eq!(message(&reply), "Unknown command");
}

#[test]
fn array_full_after_capacity_reached() {
    let engine = Engine::new(1, 8, 4);
    engine.handle(Command { cmd: "SET", key: "a", value: Some("1") });

    let full = engine.handle(Command { cmd: "SET", key: "b", value: Some("1") });
    assert_eq!(status(&full), "FULL");
    assert_eq!(message(&full), "Array storage full");
}

#[test]
fn delete_then_get_reports_no_exist() {
    let engine = Engine::new(4, 8, 4);
    engine.handle(Command { cmd: "SET", key: "a", value: Some("1") });
    engine.handle(Command { cmd: "DEL", key: "a", value: None });

    let get = engine.handle(Command { cmd: "GET", key: "a", value: None });
    assert_eq!(status(&get), "NO_EXIST");
    assert_eq!(message(&get), "Key not found");
}

#[test]
fn tree_and_array_and_hash_stay_independent() {
    let engine = Engine::new(4, 8, 4);
    engine.handle(Command { cmd: "RSET", key: "a", value: Some("1") });

    let array_get = engine.handle(Command { cmd: "GET", key: "a", value: None });
    assert_eq!(status(&array_get), "NO_EXIST");

    let tree_get = engine.handle(Command { cmd: "RGET", key: "a", value: None });
    assert_eq!(message(&tree_get), "1");
}

#[test]
fn raw_json_body_round_trips_through_handle_request_body() {
    let engine = Engine::new(4, 8, 4);
    let body = br#"{"cmd":"SET","key":"a","value":"1"}"#;
    let reply = engine.handle_request_body(body);
    assert_eq!(status(&reply), "OK");

    let malformed = engine.handle_request_body(b"{not json");
    assert_eq!(status(&malformed), "ERROR");
    assert_eq!(message(&malformed), "Invalid parameters");
}
