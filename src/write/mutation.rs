//! Mutation model for the write path.
//!
//! A mutation targets one table, carries one operation, and optionally
//! requests its own durability level. It is consumed exactly once by the
//! write gate and discarded after its completion handle fires.

use std::io::{self, Cursor, Read};

use serde_json::Value;

use crate::durability::DurabilityLevel;
use crate::wal::errors::{WalError, WalResult};

/// A single operation inside a batch mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or replace the value under `key`.
    Put {
        /// Row key.
        key: String,
        /// Full post-operation value.
        value: Value,
    },
    /// Remove `key` (tombstone).
    Delete {
        /// Row key.
        key: String,
    },
}

/// The operation a mutation performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOp {
    /// Insert or replace one key.
    Put {
        /// Row key.
        key: String,
        /// Full post-operation value.
        value: Value,
    },
    /// Remove one key.
    Delete {
        /// Row key.
        key: String,
    },
    /// Several operations applied as one log record. The batch shares a
    /// single completion handle and appends all-or-nothing.
    Batch(Vec<BatchOp>),
}

const OP_PUT: u8 = 0;
const OP_DELETE: u8 = 1;
const OP_BATCH: u8 = 2;

/// One write request: target table, operation, and requested durability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    table: String,
    op: MutationOp,
    durability: DurabilityLevel,
}

impl Mutation {
    /// A put of `value` under `key` in `table`, deferring durability to
    /// the table default.
    pub fn put(table: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        Self {
            table: table.into(),
            op: MutationOp::Put {
                key: key.into(),
                value,
            },
            durability: DurabilityLevel::UseDefault,
        }
    }

    /// A delete of `key` in `table`, deferring durability to the table
    /// default.
    pub fn delete(table: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            op: MutationOp::Delete { key: key.into() },
            durability: DurabilityLevel::UseDefault,
        }
    }

    /// A batch of operations in `table`, applied as one log record.
    pub fn batch(table: impl Into<String>, ops: Vec<BatchOp>) -> Self {
        Self {
            table: table.into(),
            op: MutationOp::Batch(ops),
            durability: DurabilityLevel::UseDefault,
        }
    }

    /// Request a specific durability level instead of the table default.
    pub fn with_durability(mut self, level: DurabilityLevel) -> Self {
        self.durability = level;
        self
    }

    /// Target table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The operation carried by this mutation.
    pub fn op(&self) -> &MutationOp {
        &self.op
    }

    /// The requested durability level, `UseDefault` unless overridden.
    pub fn durability(&self) -> DurabilityLevel {
        self.durability
    }

    /// Encode into log-payload bytes.
    ///
    /// Format: op tag (u8), table, then per-op fields; strings and value
    /// bodies are length-prefixed (u32 LE), values as JSON.
    ///
    /// # Errors
    ///
    /// `Serialization` for mutations that cannot become a valid record:
    /// empty key, empty batch, or a value that fails to encode. Nothing
    /// reaches the log in that case.
    pub fn encode(&self) -> WalResult<Vec<u8>> {
        let mut buf = Vec::new();
        let result = match &self.op {
            MutationOp::Put { key, value } => {
                buf.push(OP_PUT);
                write_string(&mut buf, &self.table);
                encode_put(&mut buf, key, value)
            }
            MutationOp::Delete { key } => {
                buf.push(OP_DELETE);
                write_string(&mut buf, &self.table);
                encode_delete(&mut buf, key)
            }
            MutationOp::Batch(ops) => {
                if ops.is_empty() {
                    return Err(WalError::Serialization("empty batch mutation".into()));
                }
                buf.push(OP_BATCH);
                write_string(&mut buf, &self.table);
                buf.extend_from_slice(&(ops.len() as u32).to_le_bytes());
                ops.iter().try_for_each(|op| match op {
                    BatchOp::Put { key, value } => {
                        buf.push(OP_PUT);
                        encode_put(&mut buf, key, value)
                    }
                    BatchOp::Delete { key } => {
                        buf.push(OP_DELETE);
                        encode_delete(&mut buf, key)
                    }
                })
            }
        };
        result.map(|()| buf)
    }

    /// Decode a mutation from log-payload bytes. The requested durability
    /// is not part of the record (replay does not need it), so the
    /// decoded mutation reports `UseDefault`.
    pub fn decode(data: &[u8]) -> WalResult<Self> {
        let mut cursor = Cursor::new(data);
        let tag = read_u8(&mut cursor)?;
        let table = read_string(&mut cursor)?;

        let op = match tag {
            OP_PUT => decode_put(&mut cursor).map(|(key, value)| MutationOp::Put { key, value })?,
            OP_DELETE => MutationOp::Delete {
                key: read_string(&mut cursor)?,
            },
            OP_BATCH => {
                let count = read_u32(&mut cursor)? as usize;
                let mut ops = Vec::with_capacity(count);
                for _ in 0..count {
                    let op_tag = read_u8(&mut cursor)?;
                    match op_tag {
                        OP_PUT => {
                            let (key, value) = decode_put(&mut cursor)?;
                            ops.push(BatchOp::Put { key, value });
                        }
                        OP_DELETE => ops.push(BatchOp::Delete {
                            key: read_string(&mut cursor)?,
                        }),
                        other => {
                            return Err(WalError::Serialization(format!(
                                "unknown batch op tag {}",
                                other
                            )))
                        }
                    }
                }
                MutationOp::Batch(ops)
            }
            other => {
                return Err(WalError::Serialization(format!(
                    "unknown mutation tag {}",
                    other
                )))
            }
        };

        Ok(Self {
            table,
            op,
            durability: DurabilityLevel::UseDefault,
        })
    }
}

fn encode_put(buf: &mut Vec<u8>, key: &str, value: &Value) -> WalResult<()> {
    if key.is_empty() {
        return Err(WalError::Serialization("empty mutation key".into()));
    }
    let body = serde_json::to_vec(value)
        .map_err(|e| WalError::Serialization(format!("value not encodable: {}", e)))?;
    write_string(buf, key);
    buf.extend_from_slice(&(body.len() as u32).to_le_bytes());
    buf.extend_from_slice(&body);
    Ok(())
}

fn encode_delete(buf: &mut Vec<u8>, key: &str) -> WalResult<()> {
    if key.is_empty() {
        return Err(WalError::Serialization("empty mutation key".into()));
    }
    write_string(buf, key);
    Ok(())
}

fn decode_put(cursor: &mut Cursor<&[u8]>) -> WalResult<(String, Value)> {
    let key = read_string(cursor)?;
    let body = read_bytes(cursor)?;
    let value = serde_json::from_slice(&body)
        .map_err(|e| WalError::Serialization(format!("value not decodable: {}", e)))?;
    Ok((key, value))
}

fn write_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> WalResult<u8> {
    let mut byte = [0u8; 1];
    read_exact(cursor, &mut byte)?;
    Ok(byte[0])
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> WalResult<u32> {
    let mut word = [0u8; 4];
    read_exact(cursor, &mut word)?;
    Ok(u32::from_le_bytes(word))
}

fn read_bytes(cursor: &mut Cursor<&[u8]>) -> WalResult<Vec<u8>> {
    let len = read_u32(cursor)? as usize;
    let mut buf = vec![0u8; len];
    read_exact(cursor, &mut buf)?;
    Ok(buf)
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> WalResult<String> {
    let bytes = read_bytes(cursor)?;
    String::from_utf8(bytes)
        .map_err(|e| WalError::Serialization(format!("invalid UTF-8 in record: {}", e)))
}

fn read_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8]) -> WalResult<()> {
    Read::read_exact(cursor, buf)
        .map_err(|e: io::Error| WalError::Serialization(format!("record truncated: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_round_trip() {
        let mutation = Mutation::put("users", "alice", json!({"age": 30}));
        let bytes = mutation.encode().unwrap();
        let decoded = Mutation::decode(&bytes).unwrap();

        assert_eq!(decoded.table(), "users");
        assert_eq!(
            decoded.op(),
            &MutationOp::Put {
                key: "alice".into(),
                value: json!({"age": 30}),
            }
        );
    }

    #[test]
    fn test_delete_round_trip() {
        let mutation = Mutation::delete("users", "bob");
        let decoded = Mutation::decode(&mutation.encode().unwrap()).unwrap();
        assert_eq!(decoded.op(), &MutationOp::Delete { key: "bob".into() });
    }

    #[test]
    fn test_batch_round_trip() {
        let mutation = Mutation::batch(
            "users",
            vec![
                BatchOp::Put {
                    key: "alice".into(),
                    value: json!(1),
                },
                BatchOp::Delete { key: "bob".into() },
            ],
        );
        let decoded = Mutation::decode(&mutation.encode().unwrap()).unwrap();

        match decoded.op() {
            MutationOp::Batch(ops) => assert_eq!(ops.len(), 2),
            other => panic!("expected batch, got {:?}", other),
        }
    }

    #[test]
    fn test_requested_durability_defaults_to_use_default() {
        let mutation = Mutation::put("t", "k", json!(null));
        assert_eq!(mutation.durability(), DurabilityLevel::UseDefault);

        let pinned = mutation.with_durability(DurabilityLevel::FsyncWal);
        assert_eq!(pinned.durability(), DurabilityLevel::FsyncWal);
    }

    #[test]
    fn test_empty_key_fails_serialization() {
        let err = Mutation::put("t", "", json!(1)).encode().unwrap_err();
        assert!(matches!(err, WalError::Serialization(_)));

        let err = Mutation::delete("t", "").encode().unwrap_err();
        assert!(matches!(err, WalError::Serialization(_)));
    }

    #[test]
    fn test_empty_batch_fails_serialization() {
        let err = Mutation::batch("t", vec![]).encode().unwrap_err();
        assert!(matches!(err, WalError::Serialization(_)));
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let mut bytes = Mutation::delete("t", "k").encode().unwrap();
        bytes[0] = 9;
        assert!(matches!(
            Mutation::decode(&bytes),
            Err(WalError::Serialization(_))
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        let bytes = Mutation::put("t", "k", json!("v")).encode().unwrap();
        assert!(matches!(
            Mutation::decode(&bytes[..bytes.len() - 2]),
            Err(WalError::Serialization(_))
        ));
    }
}
