//! Conversational front-end for LedgerChat.
//!
//! [`ChatOrchestrator`] drives one turn at a time over a caller-owned
//! [`Session`]: mid-sign-in input goes to the login dialogue, everything
//! else is resolved to an intent and handed to the [`Dispatcher`].

pub mod directive;
pub mod dispatcher;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod response;
pub mod session;

pub use dispatcher::Dispatcher;
pub use error::ChatError;
pub use orchestrator::ChatOrchestrator;
pub use report::{ReportLine, ReportSection};
pub use response::{Reply, ReportCard};
pub use session::{Phase, Session, SessionSnapshot};
