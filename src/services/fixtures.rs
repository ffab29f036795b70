use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Generated account identity used by the account scenarios.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FakeAccount {
    pub account_name: String,
    pub user: String,
    pub email: String,
    pub password: String,
}

/// Unique names for throwaway test data, plus rotation over configured lists.
#[derive(Debug, Default)]
pub struct Fixtures {
    counter: AtomicUsize,
    rotation: AtomicUsize,
}

impl Fixtures {
    pub fn new() -> Self {
        Self::default()
    }

    fn token(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(std::process::id().to_le_bytes());
        hasher.update(nanos.to_le_bytes());
        hasher.update(n.to_le_bytes());
        hex::encode(hasher.finalize())
    }

    /// `prefix-` followed by 12 hex chars.
    pub fn unique(&self, prefix: &str) -> String {
        let token = self.token();
        format!("{}-{}", prefix, &token[..12])
    }

    pub fn account(&self) -> FakeAccount {
        let token = self.token();
        let user = format!("user{}", &token[..10]);
        FakeAccount {
            account_name: format!("acct{}", &token[10..20]),
            email: format!("{}@example.com", user),
            password: token[20..44].to_string(),
            user,
        }
    }

    /// Next entry in round-robin order; `None` for an empty list.
    pub fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let n = self.rotation.fetch_add(1, Ordering::Relaxed);
        items.get(n % items.len())
    }
}
