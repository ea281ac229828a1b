//! # partwise
//!
//! A concurrent table-partitioning manager: one logical table split into
//! many physical partitions by value range or by hash, with structural
//! changes (create/split/merge/attach/drop) serialized per parent, routed
//! DML that never blocks other readers, and a background worker that moves
//! rows out of an unpartitioned parent without taking it offline.
//!
//! ## Quick start
//!
//! ```
//! use partwise_core::api::PartitionManager;
//! use partwise_core::types::KeyValue;
//! use serde_json::json;
//!
//! let manager = PartitionManager::in_memory().unwrap();
//! manager.create_table("events").unwrap();
//!
//! // Five range partitions of width 10 starting at 0.
//! manager
//!     .create_range_partitions("events", "id", KeyValue::Int(0), 10, Some(5), true)
//!     .unwrap();
//!
//! // Inserts route by the partition key; a key past current coverage
//! // auto-creates the missing partition.
//! manager.insert("events", json!({"id": 7, "kind": "click"})).unwrap();
//! manager.insert("events", json!({"id": 55, "kind": "view"})).unwrap();
//!
//! assert_eq!(manager.partition_list(Some("events")).unwrap().len(), 6);
//! assert_eq!(manager.count("events").unwrap(), 2);
//! ```

pub mod api;
pub mod cache;
pub mod callback;
pub mod catalog;
pub mod config;
pub mod ddl;
pub mod encoding;
pub mod engine;
pub mod error;
pub mod lock;
pub mod migration;
pub mod routing;
pub mod types;
