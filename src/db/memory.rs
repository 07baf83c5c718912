// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Process-local document store with the same shape as Firestore.
//!
//! Documents are stored as JSON values per collection behind one async
//! mutex. [`MemoryDocs::transact`] reads and writes under a single hold of
//! that lock, so read-modify-write sequences cannot interleave.
//!
//! Read and write failures can be simulated to exercise error handling.

use crate::error::AppError;
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::Mutex;

/// A single write in an atomic batch.
#[derive(Debug, Clone)]
pub enum DocWrite {
    Put {
        collection: &'static str,
        id: String,
        doc: Value,
    },
    Delete {
        collection: &'static str,
        id: String,
    },
}

#[derive(Debug, Clone)]
struct StoredDoc {
    value: Value,
    /// Insertion sequence, used to break ordering ties.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    collections: HashMap<String, HashMap<String, StoredDoc>>,
    next_seq: u64,
}

impl Inner {
    fn get(&self, collection: &str, id: &str) -> Option<&Value> {
        self.collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|doc| &doc.value)
    }

    fn put(&mut self, collection: &str, id: String, value: Value) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, StoredDoc { value, seq });
    }

    fn delete(&mut self, collection: &str, id: &str) {
        if let Some(docs) = self.collections.get_mut(collection) {
            docs.remove(id);
        }
    }

    fn apply(&mut self, writes: Vec<DocWrite>) {
        for write in writes {
            match write {
                DocWrite::Put {
                    collection,
                    id,
                    doc,
                } => self.put(collection, id, doc),
                DocWrite::Delete { collection, id } => self.delete(collection, &id),
            }
        }
    }
}

/// Read-only view of the store inside [`MemoryDocs::transact`].
pub struct DocsView<'a> {
    inner: &'a Inner,
}

impl DocsView<'_> {
    pub fn get(&self, collection: &str, id: &str) -> Option<&Value> {
        self.inner.get(collection, id)
    }
}

/// Simulated failures.
struct Faults {
    fail_reads: AtomicBool,
    /// Writes left before every write fails; negative means unlimited.
    write_budget: AtomicI64,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            fail_reads: AtomicBool::new(false),
            write_budget: AtomicI64::new(-1),
        }
    }
}

/// In-memory document store.
#[derive(Default)]
pub struct MemoryDocs {
    inner: Mutex<Inner>,
    faults: Faults,
}

impl MemoryDocs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make single-document reads and transactions fail.
    pub fn fail_reads(&self, on: bool) {
        self.faults.fail_reads.store(on, Ordering::SeqCst);
    }

    /// Let `writes` more writes succeed, then fail every write. `None`
    /// removes the limit. A transaction counts as one write.
    pub fn fail_writes_after(&self, writes: Option<u32>) {
        let budget = writes.map(i64::from).unwrap_or(-1);
        self.faults.write_budget.store(budget, Ordering::SeqCst);
    }

    fn check_read(&self) -> Result<(), AppError> {
        if self.faults.fail_reads.load(Ordering::SeqCst) {
            return Err(AppError::Database("simulated read failure".to_string()));
        }
        Ok(())
    }

    fn check_write(&self) -> Result<(), AppError> {
        self.faults
            .write_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                n if n < 0 => Some(n),
                n => Some(n - 1),
            })
            .map(|_| ())
            .map_err(|_| AppError::Database("simulated write failure".to_string()))
    }

    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, AppError> {
        self.check_read()?;
        let inner = self.inner.lock().await;
        Ok(inner.get(collection, id).cloned())
    }

    pub async fn put(&self, collection: &str, id: &str, value: Value) -> Result<(), AppError> {
        self.check_write()?;
        self.inner.lock().await.put(collection, id.to_string(), value);
        Ok(())
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), AppError> {
        self.check_write()?;
        self.inner.lock().await.delete(collection, id);
        Ok(())
    }

    /// Read, decide and write under one lock.
    ///
    /// `f` sees the current documents and returns the writes to apply with
    /// its result. An error from `f` writes nothing.
    pub async fn transact<R, F>(&self, f: F) -> Result<R, AppError>
    where
        F: FnOnce(&DocsView<'_>) -> Result<(Vec<DocWrite>, R), AppError>,
    {
        self.check_read()?;
        let mut inner = self.inner.lock().await;
        let (writes, out) = f(&DocsView { inner: &inner })?;
        if !writes.is_empty() {
            self.check_write()?;
            inner.apply(writes);
        }
        Ok(out)
    }

    /// Documents whose `field` equals `value`, newest `order_field` first.
    pub async fn query_eq_desc(
        &self,
        collection: &str,
        field: &str,
        value: &str,
        order_field: &str,
        limit: Option<usize>,
    ) -> Vec<Value> {
        let inner = self.inner.lock().await;
        let Some(docs) = inner.collections.get(collection) else {
            return Vec::new();
        };

        let mut matches: Vec<&StoredDoc> = docs
            .values()
            .filter(|doc| doc.value.get(field).and_then(Value::as_str) == Some(value))
            .collect();

        matches.sort_by(|a, b| {
            compare_field(&b.value, &a.value, order_field).then_with(|| b.seq.cmp(&a.seq))
        });

        matches
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|doc| doc.value.clone())
            .collect()
    }

    /// One page of a collection ordered ascending by `order_field`.
    pub async fn scan_page(
        &self,
        collection: &str,
        order_field: &str,
        limit: usize,
        offset: usize,
    ) -> Vec<Value> {
        let inner = self.inner.lock().await;
        let Some(docs) = inner.collections.get(collection) else {
            return Vec::new();
        };

        let mut all: Vec<&StoredDoc> = docs.values().collect();
        all.sort_by(|a, b| {
            compare_field(&a.value, &b.value, order_field).then_with(|| a.seq.cmp(&b.seq))
        });

        all.into_iter()
            .skip(offset)
            .take(limit)
            .map(|doc| doc.value.clone())
            .collect()
    }
}

fn compare_field(a: &Value, b: &Value, field: &str) -> CmpOrdering {
    let a = a.get(field).and_then(Value::as_str).unwrap_or_default();
    let b = b.get(field).and_then(Value::as_str).unwrap_or_default();
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_query_orders_newest_first_with_seq_tiebreak() {
        let docs = MemoryDocs::new();
        docs.put("c", "a", json!({"id": "a", "owner": "u", "at": "2024-01-01"}))
            .await
            .unwrap();
        docs.put("c", "b", json!({"id": "b", "owner": "u", "at": "2024-01-01"}))
            .await
            .unwrap();
        docs.put("c", "c", json!({"id": "c", "owner": "u", "at": "2023-12-31"}))
            .await
            .unwrap();
        docs.put("c", "d", json!({"id": "d", "owner": "other", "at": "2025-01-01"}))
            .await
            .unwrap();

        let found = docs.query_eq_desc("c", "owner", "u", "at", None).await;
        let ids: Vec<_> = found.iter().map(|v| v["id"].as_str().unwrap()).collect();

        // Same timestamp: later insert first.
        assert_eq!(ids, vec!["b", "a", "c"]);

        let limited = docs.query_eq_desc("c", "owner", "u", "at", Some(1)).await;
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_transact_applies_writes_together() {
        let docs = MemoryDocs::new();
        docs.put("c", "gone", json!({"x": 1})).await.unwrap();

        let seen = docs
            .transact(|view| {
                let x = view.get("c", "gone").and_then(|v| v["x"].as_i64());
                Ok((
                    vec![
                        DocWrite::Put {
                            collection: "c",
                            id: "new".to_string(),
                            doc: json!({"x": 2}),
                        },
                        DocWrite::Delete {
                            collection: "c",
                            id: "gone".to_string(),
                        },
                    ],
                    x,
                ))
            })
            .await
            .unwrap();

        assert_eq!(seen, Some(1));
        assert!(docs.get("c", "gone").await.unwrap().is_none());
        assert_eq!(docs.get("c", "new").await.unwrap(), Some(json!({"x": 2})));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_transacts_do_not_lose_updates() {
        let docs = std::sync::Arc::new(MemoryDocs::new());

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let docs = docs.clone();
                tokio::spawn(async move {
                    docs.transact(|view| {
                        let n = view
                            .get("counters", "c")
                            .and_then(|v| v["n"].as_u64())
                            .unwrap_or(0);
                        Ok((
                            vec![DocWrite::Put {
                                collection: "counters",
                                id: "c".to_string(),
                                doc: json!({ "n": n + 1 }),
                            }],
                            (),
                        ))
                    })
                    .await
                    .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let counter = docs.get("counters", "c").await.unwrap().unwrap();
        assert_eq!(counter["n"], 64);
    }

    #[tokio::test]
    async fn test_simulated_failures() {
        let docs = MemoryDocs::new();
        docs.put("c", "a", json!({"x": 1})).await.unwrap();

        docs.fail_reads(true);
        assert!(matches!(docs.get("c", "a").await, Err(AppError::Database(_))));
        docs.fail_reads(false);
        assert!(docs.get("c", "a").await.unwrap().is_some());

        docs.fail_writes_after(Some(1));
        docs.put("c", "b", json!({"x": 2})).await.unwrap();
        assert!(docs.put("c", "c", json!({"x": 3})).await.is_err());
        assert!(docs.delete("c", "a").await.is_err());

        // Failed transactions write nothing
        let result = docs
            .transact(|_| {
                Ok((
                    vec![DocWrite::Delete {
                        collection: "c",
                        id: "a".to_string(),
                    }],
                    (),
                ))
            })
            .await;
        assert!(result.is_err());
        assert!(docs.get("c", "a").await.unwrap().is_some());

        docs.fail_writes_after(None);
        docs.delete("c", "a").await.unwrap();
        assert!(docs.get("c", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_scan_page_paginates() {
        let docs = MemoryDocs::new();
        for name in ["c", "a", "b"] {
            docs.put("users", name, json!({ "email": name }))
                .await
                .unwrap();
        }

        let first = docs.scan_page("users", "email", 2, 0).await;
        let second = docs.scan_page("users", "email", 2, 2).await;

        assert_eq!(first, vec![json!({"email": "a"}), json!({"email": "b"})]);
        assert_eq!(second, vec![json!({"email": "c"})]);
    }
}
