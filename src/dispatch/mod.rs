//! Topic dispatcher - in-process publish/subscribe over named topics.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Dispatcher                            │
//! │  map lock ─► HashMap<topic, Vec<Arc<HandlerRecord>>>         │
//! │  pending latch (outstanding async invocations)               │
//! └─────────────────────────────────────────────────────────────┘
//!                            │ publish(topic, args)
//!                            ▼
//!        snapshot of the topic's records, in subscription order
//!          │                  │                     │
//!          ▼                  ▼                     ▼
//! ┌─────────────┐    ┌─────────────────┐   ┌──────────────────────┐
//! │    sync     │    │      async      │   │ async transactional  │
//! │ caller's    │    │ worker thread,  │   │ waits for the prior  │
//! │ thread,     │    │ no ordering     │   │ invocation of the    │
//! │ lock held   │    │ between calls   │   │ same record, then    │
//! └─────────────┘    └─────────────────┘   │ worker thread        │
//!                                          └──────────────────────┘
//! ```
//!
//! Once subscriptions are removed from the live list before they run and are
//! never delivered twice. Handler failures (arity, binding, panics) are
//! caught at the dispatch boundary for every mode, logged with `tracing`,
//! and passed to the optional fault hook.

mod args;
mod config;
mod controller;
mod dispatcher;
mod handler;
mod record;

pub use args::{Args, Slot};
pub use config::{DispatcherBuilder, DispatcherConfig, FaultReport};
pub use controller::{Bus, BusController, BusPublisher, BusSubscriber};
pub use dispatcher::Dispatcher;
pub use handler::{Callback, Erased, Handler};
pub use record::{Mode, SubscriptionId};
