//! pagebridge - correlation layer between plugin pages and an asynchronous protocol
//!
//! Page requests are answered immediately; protocol replies arrive whenever the
//! node gets around to them, tagged only by a raw identifier token. This crate
//! keeps the latest reply per logical id until the page that asked for it
//! claims it.
//!
//! ## Flow
//!
//! ```text
//! transport ──mpsc──▶ ingest loop ──▶ CorrelationService ◀── claim ── page handler
//!                        │ decode()        (messages +           │
//!                        ▼                  redirects)           ▼
//!                 drop + warn on                           RenderPass (gate,
//!                 malformed tokens                          boxes) → HTML
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use pagebridge::{CorrelationService, LogicalId, Message};
//!
//! let service = CorrelationService::new();
//! service
//!     .ingest(Message::new("DataFound").with_field("Identifier", "req_abc123_7"))
//!     .unwrap();
//! let claim = service.claim(&LogicalId::new("abc123"), "DataFound").unwrap();
//! assert!(claim.is_some());
//! ```

// Core error handling
pub mod error;

// Correlation core
pub mod identifier;
pub mod message;
pub mod service;
pub mod store;

// Request lifecycle and rendering
pub mod gate;
pub mod page;

// Collaborators
pub mod config;
pub mod ingest;
pub mod properties;

// HTTP shell (when enabled)
#[cfg(feature = "server")]
pub mod server;

pub use config::BridgeConfig;
pub use error::{CorrelationError, PropertyError};
pub use gate::{begin_render, is_allowed, CallerTrust, RenderBoxList, RenderPass, RenderPhase};
pub use identifier::{compose, decode, LogicalId};
pub use ingest::{run_ingest_loop, IngestStats};
pub use message::{Message, SskKeypair};
pub use page::{PageRegistry, PageRenderer, PageSpec, Refresh};
pub use properties::{FilePropertyStore, MemoryPropertyStore, PropertyStore};
pub use service::{run_eviction_sweep, Claim, CorrelationService, StoreStats};
