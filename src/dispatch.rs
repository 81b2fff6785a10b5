//! Command dispatcher (C6): parses `{cmd,key,value}`, routes to the array,
//! tree or hash index, and formats the JSON reply.

use serde::Serialize;
use serde_json::{json, Value};

use crate::store::{ArrayIndex, HashIndex, IndexStats, Status, TreeIndex};

/// A decoded `POST /api/kv` body.
#[derive(Debug, Clone)]
pub struct Command<'a> {
    pub cmd: &'a str,
    pub key: &'a str,
    pub value: Option<&'a str>,
}

/// Occupancy of all three indexes, as returned by `GET /api/stats` and
/// embedded in every index-operation reply under `data`.
#[derive(Serialize)]
pub struct StatsSnapshot {
    pub array: IndexStats,
    pub hash: IndexStats,
    pub rbtree: IndexStats,
}

/// Holds the three backend indexes the dispatcher routes commands to.
pub struct Engine {
    pub array: ArrayIndex,
    pub hash: HashIndex,
    pub tree: TreeIndex,
}

impl Engine {
    pub fn new(array_capacity: usize, hash_buckets: usize, tree_capacity: usize) -> Self {
        Self {
            array: ArrayIndex::new(array_capacity),
            hash: HashIndex::new(hash_buckets),
            tree: TreeIndex::new(tree_capacity),
        }
    }

    /// Shared-lock occupancy read across all three indexes. Each read is
    /// independent; no cross-index consistency is implied.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            array: self.array.stats(),
            hash: self.hash.stats(),
            rbtree: self.tree.stats(),
        }
    }

    /// Formats the `GET /api/stats` reply: the snapshot wrapped in the same
    /// `{"status":"OK","data":{...}}` envelope the source's
    /// `kvs_get_stats` produces.
    pub fn stats_response(&self) -> Vec<u8> {
        serialize(&json!({
            "status": "OK",
            "data": self.stats(),
        }))
    }

    /// Parses and executes a raw `POST /api/kv` JSON body, returning the
    /// response body bytes. Never panics on malformed input: every error
    /// path produces a JSON error object instead.
    pub fn handle_request_body(&self, body: &[u8]) -> Vec<u8> {
        let parsed: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(_) => return error_reply("Invalid parameters"),
        };

        let cmd = match parsed.get("cmd").and_then(Value::as_str) {
            Some(c) => c,
            None => return error_reply("Invalid parameters"),
        };
        let key = match parsed.get("key").and_then(Value::as_str) {
            Some(k) => k,
            None => return error_reply("Invalid parameters"),
        };
        let value = parsed.get("value").and_then(Value::as_str);

        self.handle(Command { cmd, key, value })
    }

    /// Executes an already-decoded command and formats its JSON reply.
    pub fn handle(&self, command: Command<'_>) -> Vec<u8> {
        let needs_value = matches!(
            command.cmd,
            "SET" | "MOD" | "RSET" | "RMOD" | "HSET" | "HMOD"
        );
        if needs_value && command.value.is_none() {
            return error_reply("Value required");
        }

        let key = command.key.as_bytes();
        let value = command.value.unwrap_or("").as_bytes();

        match command.cmd {
            "SET" => self.reply_op(self.array.set(key, value), "Set successfully"),
            "GET" => self.reply_get(self.array.get(key)),
            "DEL" => self.reply_op(self.array.del(key), "Deleted successfully"),
            "MOD" => self.reply_op(self.array.modify(key, value), "Modified successfully"),
            "EXIST" => self.reply_op(self.array.exist(key), "Key exists"),

            "RSET" => self.reply_op(self.tree.set(key, value), "Set successfully"),
            "RGET" => self.reply_get(self.tree.get(key)),
            "RDEL" => self.reply_op(self.tree.del(key), "Deleted successfully"),
            "RMOD" => self.reply_op(self.tree.modify(key, value), "Modified successfully"),
            "REXIST" => self.reply_op(self.tree.exist(key), "Key exists"),

            "HSET" => self.reply_op(self.hash.set(key, value), "Set successfully"),
            "HGET" => self.reply_get(self.hash.get(key)),
            "HDEL" => self.reply_op(self.hash.del(key), "Deleted successfully"),
            "HMOD" => self.reply_op(self.hash.modify(key, value), "Modified successfully"),
            "HEXIST" => self.reply_op(self.hash.exist(key), "Key exists"),

            _ => error_reply("Unknown command"),
        }
    }

    /// Formats the reply for a non-`GET` index operation: every branch of
    /// `Status` gets its own message, and a fresh stats snapshot always
    /// rides along under `data`.
    fn reply_op(&self, status: Status, ok_message: &str) -> Vec<u8> {
        let (status_str, message) = match status {
            Status::Ok => ("OK", ok_message),
            Status::Exist => ("EXIST", exist_message(ok_message)),
            Status::NoExist => ("NO_EXIST", "Key not found"),
            Status::Full => ("FULL", "Array storage full"),
            Status::Error => ("ERROR", failure_message(ok_message)),
        };

        serialize(&json!({
            "status": status_str,
            "message": message,
            "data": self.stats(),
        }))
    }

    /// Formats a GET-family reply: on hit, `message` carries the stored
    /// value verbatim (not escaped beyond what `serde_json` does for us).
    fn reply_get(&self, found: Option<Vec<u8>>) -> Vec<u8> {
        match found {
            Some(bytes) => {
                let value = String::from_utf8_lossy(&bytes).into_owned();
                serialize(&json!({
                    "status": "OK",
                    "message": value,
                    "data": self.stats(),
                }))
            }
            None => serialize(&json!({
                "status": "NO_EXIST",
                "message": "Key not found",
                "data": self.stats(),
            })),
        }
    }
}

/// `Exist` only occurs from `set` (duplicate key) and `exist` (found); the
/// two call sites pass their own ok-message, which doubles as the correct
/// "already exists"/"exists" wording since both read the same way.
fn exist_message(ok_message: &str) -> &'static str {
    if ok_message == "Key exists" {
        "Key exists"
    } else {
        "Key already exists"
    }
}

fn failure_message(ok_message: &str) -> &'static str {
    match ok_message {
        "Set successfully" => "Failed to set",
        "Deleted successfully" => "Failed to delete",
        "Modified successfully" => "Failed to modify",
        "Key exists" => "Failed to check",
        _ => "Invalid parameters",
    }
}

/// A bare `{status:"ERROR", message:"..."}` reply with no `data` field,
/// used for validation failures that never reached an index.
fn error_reply(message: &'static str) -> Vec<u8> {
    serialize(&json!({
        "status": "ERROR",
        "message": message,
    }))
}

fn serialize(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).expect("Value serialization is infallible")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        Engine::new(4, 8, 4)
    }

    fn status_of(body: &[u8]) -> String {
        let v: Value = serde_json::from_slice(body).unwrap();
        v["status"].as_str().unwrap().to_string()
    }

    fn message_of(body: &[u8]) -> String {
        let v: Value = serde_json::from_slice(body).unwrap();
        v["message"].as_str().unwrap().to_string()
    }

    #[test]
    fn set_then_get_array() {
        let engine = engine();
        let set = engine.handle(Command { cmd: "SET", key: "a", value: Some("1") });
        assert_eq!(status_of(&set), "OK");
        assert_eq!(message_of(&set), "Set successfully");

        let get = engine.handle(Command { cmd: "GET", key: "a", value: None });
        assert_eq!(status_of(&get), "OK");
        assert_eq!(message_of(&get), "1");
    }

    #[test]
    fn hash_round_trip_reports_count() {
        let engine = engine();
        engine.handle(Command { cmd: "HSET", key: "x", value: Some("y") });
        let get = engine.handle(Command { cmd: "HGET", key: "x", value: None });
        assert_eq!(message_of(&get), "y");

        let v: Value = serde_json::from_slice(&get).unwrap();
        assert_eq!(v["data"]["hash"]["count"], 1);
    }

    #[test]
    fn unknown_command_is_error() {
        let engine = engine();
        let reply = engine.handle(Command { cmd: "BOGUS", key: "k", value: None });
        assert_eq!(status_of(&reply), "ERROR");
        assert_eq!(message_of(&reply), "Unknown command");
    }

    #[test]
    fn set_missing_value_is_value_required() {
        let engine = engine();
        let reply = engine.handle(Command { cmd: "SET", key: "a", value: None });
        assert_eq!(status_of(&reply), "ERROR");
        assert_eq!(message_of(&reply), "Value required");
    }

    #[test]
    fn malformed_body_is_invalid_parameters() {
        let engine = engine();
        let reply = engine.handle_request_body(b"not json");
        assert_eq!(status_of(&reply), "ERROR");
        assert_eq!(message_of(&reply), "Invalid parameters");
    }

    #[test]
    fn duplicate_set_is_exist() {
        let engine = engine();
        engine.handle(Command { cmd: "SET", key: "a", value: Some("1") });
        let reply = engine.handle(Command { cmd: "SET", key: "a", value: Some("2") });
        assert_eq!(status_of(&reply), "EXIST");
        assert_eq!(message_of(&reply), "Key already exists");
    }

    #[test]
    fn array_full_after_capacity_reached() {
        let engine = Engine::new(1, 8, 4);
        engine.handle(Command { cmd: "SET", key: "a", value: Some("1") });
        let reply = engine.handle(Command { cmd: "SET", key: "b", value: Some("1") });
        assert_eq!(status_of(&reply), "FULL");
        assert_eq!(message_of(&reply), "Array storage full");
    }

    #[test]
    fn stats_response_wraps_snapshot_in_status_envelope() {
        let engine = engine();
        engine.handle(Command { cmd: "SET", key: "a", value: Some("1") });

        let reply = engine.stats_response();
        let v: Value = serde_json::from_slice(&reply).unwrap();
        assert_eq!(v["status"], "OK");
        assert_eq!(v["data"]["array"]["count"], 1);
    }

    #[test]
    fn request_body_roundtrip() {
        let engine = engine();
        let body = br#"{"cmd":"SET","key":"a","value":"1"}"#;
        let reply = engine.handle_request_body(body);
        assert_eq!(status_of(&reply), "OK");
    }
}
