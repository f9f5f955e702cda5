//! # Nodemap Engine
//!
//! The Nodemap Engine turns cloud inventory records into host-registry nodes.
//! A flat key/value mapping configuration decides which record fields become
//! node attributes and tags; adding or removing keys changes the output with
//! no code change.
//!
//! ## Key Features
//!
//! - **Field Resolution**: Dotted property paths with indices and mapped keys
//! - **Selectors**: Comma-separated fallbacks, `|`-separated merges for tags
//! - **Rule Tables**: Configuration keys compiled once into typed rules
//! - **Best-effort Queries**: One bad record or unreachable scope never fails a query
//!
//! ## Usage
//!
//! ```rust
//! use nodemap_engine::{MappingRuleSet, assemble};
//! use nodemap_types::ResourceRecord;
//! use serde_json::json;
//!
//! let rules: MappingRuleSet = [
//!     ("hostname.selector", "hostname"),
//!     ("tags.selector", "tags"),
//!     ("role.default", "worker"),
//! ]
//! .into_iter()
//! .collect();
//!
//! let record = ResourceRecord::from_value(json!({
//!     "id": "123",
//!     "hostname": "h1.example.com",
//!     "tags": ["web", "east"]
//! }))?;
//!
//! let node = assemble(&record, &rules, "proj-a")?.expect("record has a hostname");
//! assert_eq!(node.nodename, "h1.example.com");
//! assert!(node.has_tag("proj-a"));
//! assert_eq!(node.attribute("projectId"), Some("proj-a"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`field`**: Field Resolver over a [`FieldAccessor`]
//! - **`selector`**: Selector Evaluator
//! - **`rules`**: Mapping Rule Set
//! - **`assemble`**: Node Assembler
//! - **`inventory`**: Inventory Aggregator
//! - **`query`**: Query Orchestrator and its asynchronous handle
//! - **`config`**: Mapping file discovery and parsing

pub mod assemble;
pub mod config;
pub mod error;
pub mod field;
pub mod inventory;
pub mod query;
pub mod rules;
pub mod selector;

pub use assemble::{NodeDraft, SCOPE_ATTRIBUTE, assemble};
pub use config::{MAPPING_PATH_ENV, default_mapping, load_mapping, load_mapping_from_path, mapping_path};
pub use error::{CollectionWarning, MappingConfigError, MappingError, QueryError, ResolutionError};
pub use field::{FieldAccessor, FieldPath, Segment, resolve};
pub use inventory::{InventoryQuery, collect_records, try_collect_records};
pub use query::{QueryHandle, QueryOrchestrator, assemble_nodes};
pub use rules::{AttributeDefaultRule, AttributeSelectorRule, DynamicTagRule, MappingRuleSet, TagSetRule};
pub use selector::{Selector, SelectorMode, evaluate};
