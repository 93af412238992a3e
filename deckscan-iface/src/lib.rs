//! External collaborator interfaces consumed by the `deckscan` pipeline.
//!
//! Per the specification these are treated as out-of-scope collaborators
//! the core pipeline consumes only through named interfaces: a typed
//! configuration store ([`config`]), the code-definition contract
//! ([`code_definition`]), a pause-aware clock ([`time`]) and the message
//! payloads exchanged with an external controller ([`messages`]). Minimal
//! concrete implementations of each are provided here so the pipeline runs
//! standalone; authoring tools, persistence-across-restarts and the network
//! transport itself remain out of scope.
pub mod code_definition;
pub mod config;
pub mod messages;
pub mod time;

pub use code_definition::{CodeDefinition, CodeDefinitionHandle, DeckLocation, DeckMatchResult, Edge, Format, MarkDefinition, MarkLocation, MarkType};
pub use config::{ConfigStore, ConfigValue, SubscriptionId};
pub use messages::{Command, CommandName, Message, PerformanceStats, ScanMetadata, ScanReport, StatusCode, Viewport, ViewportType};
pub use time::{ManualClock, PausableClock, SystemPausableClock};
