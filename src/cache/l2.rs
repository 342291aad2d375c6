//! L2 Cache: cluster-shared, SHA-keyed store (spec §4.5).
//!
//! The spec's wire protocol — text command lines (`GET`, `SET ... EX N`,
//! `DEL`, `PING`, `DBSIZE`) with bulk-string payloads, null reply for miss
//! — is the Redis RESP protocol, so this rides on the real `redis` crate
//! rather than a hand-rolled socket client.
use std::sync::Mutex;

use log::debug;
use redis::Commands;

use crate::error::Error;
use crate::model::parse_result::PARSE_RESULT_SIZE;
use crate::model::ParseResult;

/// Fixed 69-byte key: `"ddac:"` (5 bytes) + 64 hex digits.
pub fn cache_key(sha256_hex: &str) -> String {
    format!("ddac:{sha256_hex}")
}

pub struct L2Cache {
    client: redis::Client,
    conn: Mutex<Option<redis::Connection>>,
    ttl_secs: Option<u64>,
}

impl L2Cache {
    pub fn connect(url: &str, ttl_secs: Option<u64>) -> Result<L2Cache, Error> {
        let client = redis::Client::open(url)
            .map_err(|e| Error::Subsystem(format!("L2 cache: bad redis url {url:?}: {e}")))?;
        Ok(L2Cache {
            client,
            conn: Mutex::new(None),
            ttl_secs,
        })
    }

    /// Lazily (re)establish the single connection this worker owns.
    /// Returns false, without raising, if the server is unreachable.
    fn ensure_conn(&self, guard: &mut Option<redis::Connection>) -> bool {
        if guard.is_some() {
            return true;
        }
        match self.client.get_connection() {
            Ok(c) => {
                *guard = Some(c);
                true
            }
            Err(e) => {
                debug!("L2 cache connect failed, treating as unavailable: {e}");
                false
            }
        }
    }

    /// Any network or protocol error is a miss — never raised to the
    /// caller (spec §4.5 failure model).
    pub fn lookup(&self, sha256_hex: &str) -> Option<ParseResult> {
        let key = cache_key(sha256_hex);
        let mut guard = self.conn.lock().expect("L2 connection mutex poisoned");
        if !self.ensure_conn(&mut guard) {
            return None;
        }
        let conn = guard.as_mut().expect("just ensured Some");
        match conn.get::<_, Option<Vec<u8>>>(&key) {
            Ok(Some(bytes)) if bytes.len() == PARSE_RESULT_SIZE => {
                let mut buf = [0u8; PARSE_RESULT_SIZE];
                buf.copy_from_slice(&bytes);
                Some(ParseResult::from_bytes(&buf))
            }
            Ok(_) => None,
            Err(e) => {
                debug!("L2 cache GET failed, treating as miss: {e}");
                *guard = None;
                None
            }
        }
    }

    pub fn store(&self, sha256_hex: &str, result: &ParseResult) {
        let key = cache_key(sha256_hex);
        let mut guard = self.conn.lock().expect("L2 connection mutex poisoned");
        if !self.ensure_conn(&mut guard) {
            return;
        }
        let conn = guard.as_mut().expect("just ensured Some");
        let bytes: &[u8] = result.as_bytes();
        let outcome: redis::RedisResult<()> = match self.ttl_secs {
            Some(ttl) => conn.set_ex(&key, bytes, ttl),
            None => conn.set(&key, bytes),
        };
        if let Err(e) = outcome {
            debug!("L2 cache SET failed, dropping connection: {e}");
            *guard = None;
        }
    }

    pub fn delete(&self, sha256_hex: &str) {
        let key = cache_key(sha256_hex);
        let mut guard = self.conn.lock().expect("L2 connection mutex poisoned");
        if !self.ensure_conn(&mut guard) {
            return;
        }
        let conn = guard.as_mut().expect("just ensured Some");
        let _: redis::RedisResult<()> = conn.del(&key);
    }

    pub fn ping(&self) -> bool {
        let mut guard = self.conn.lock().expect("L2 connection mutex poisoned");
        if !self.ensure_conn(&mut guard) {
            return false;
        }
        let conn = guard.as_mut().expect("just ensured Some");
        match redis::cmd("PING").query::<String>(conn) {
            Ok(_) => true,
            Err(e) => {
                debug!("L2 cache PING failed: {e}");
                *guard = None;
                false
            }
        }
    }

    pub fn dbsize(&self) -> Option<i64> {
        let mut guard = self.conn.lock().expect("L2 connection mutex poisoned");
        if !self.ensure_conn(&mut guard) {
            return None;
        }
        let conn = guard.as_mut().expect("just ensured Some");
        redis::cmd("DBSIZE").query(conn).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_is_69_bytes() {
        let key = cache_key(&"a".repeat(64));
        assert_eq!(key.len(), 69);
        assert!(key.starts_with("ddac:"));
    }

    #[test]
    fn bad_url_is_rejected_at_connect_time() {
        assert!(L2Cache::connect("not-a-redis-url", None).is_err());
    }

    #[test]
    fn unreachable_server_is_a_miss_not_a_panic() {
        // Port 1 is privileged/unassigned; connection should fail fast.
        let cache = L2Cache::connect("redis://127.0.0.1:1/", None).unwrap();
        assert!(cache.lookup(&"0".repeat(64)).is_none());
        assert!(!cache.ping());
    }
}
