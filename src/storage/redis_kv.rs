//! Redis-backed [`KvStore`].
//!
//! Uses one multiplexed connection, cloned per call. Compare-and-delete runs
//! as a Lua script so the read and the delete cannot interleave with another
//! client.

use super::{KvStore, StoreError};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

const COMPARE_AND_DELETE: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

#[derive(Clone)]
pub struct RedisKv {
    con: MultiplexedConnection,
}

impl RedisKv {
    /// Open a client and verify the connection.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let con = client.get_multiplexed_async_connection().await?;
        Ok(Self { con })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut con = self.con.clone();
        Ok(con.get(key).await?)
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: Option<u64>) -> Result<(), StoreError> {
        let mut con = self.con.clone();
        match ttl_secs {
            Some(ttl) => con.set_ex::<_, _, ()>(key, value, ttl).await?,
            None => con.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl_secs: Option<u64>,
    ) -> Result<bool, StoreError> {
        let mut con = self.con.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl_secs {
            cmd.arg("EX").arg(ttl);
        }
        // SET NX replies OK when written and nil when the key exists
        let reply: Option<String> = cmd.query_async(&mut con).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut con = self.con.clone();
        let deleted: i64 = con.del(key).await?;
        Ok(deleted > 0)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut con = self.con.clone();
        let script = redis::Script::new(COMPARE_AND_DELETE);
        let deleted: i64 = script.key(key).arg(expected).invoke_async(&mut con).await?;
        Ok(deleted > 0)
    }

    async fn incr_window(&self, key: &str, window_secs: u64) -> Result<u64, StoreError> {
        let mut con = self.con.clone();
        let count: u64 = con.incr(key, 1).await?;

        // Start the window on the first hit
        if count == 1 {
            con.expire::<_, ()>(key, window_secs as i64).await?;
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Requires a running Redis instance; skipped when REDIS_URL is unreachable.
    async fn connect_or_skip() -> Option<RedisKv> {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        match RedisKv::connect(&redis_url).await {
            Ok(kv) => Some(kv),
            Err(_) => {
                eprintln!("Skipping test: Redis not available");
                None
            }
        }
    }

    #[tokio::test]
    async fn test_compare_and_delete() {
        let Some(kv) = connect_or_skip().await else {
            return;
        };
        let key = "test:kv:cad";

        kv.set(key, "one", Some(60)).await.unwrap();
        assert!(!kv.compare_and_delete(key, "two").await.unwrap());
        assert_eq!(kv.get(key).await.unwrap().as_deref(), Some("one"));
        assert!(kv.compare_and_delete(key, "one").await.unwrap());
        assert!(kv.get(key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_nx_and_window() {
        let Some(kv) = connect_or_skip().await else {
            return;
        };
        let nx_key = "test:kv:nx";
        let window_key = "test:kv:window";
        let _ = kv.delete(nx_key).await;
        let _ = kv.delete(window_key).await;

        assert!(kv.set_nx(nx_key, "1", Some(60)).await.unwrap());
        assert!(!kv.set_nx(nx_key, "1", Some(60)).await.unwrap());

        assert_eq!(kv.incr_window(window_key, 60).await.unwrap(), 1);
        assert_eq!(kv.incr_window(window_key, 60).await.unwrap(), 2);

        let _ = kv.delete(nx_key).await;
        let _ = kv.delete(window_key).await;
    }
}
