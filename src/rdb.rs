//! Snapshot payload sent to replicas on full resynchronization.
//!
//! The keyspace is never persisted, so every resync ships the same empty
//! RDB (version 11) regardless of what the master currently holds.

/// An empty RDB file: header, auxiliary fields, EOF opcode and checksum.
pub const EMPTY_RDB: &[u8] = b"REDIS0011\
\xfa\x09redis-ver\x057.2.0\
\xfa\x0aredis-bits\xc0@\
\xfa\x05ctime\xc2m\x08\xbce\
\xfa\x08used-mem\xc2\xb0\xc4\x10\x00\
\xfa\x08aof-base\xc0\x00\
\xff\xf0n;\xfe\xc0\xffZ\xa2";
