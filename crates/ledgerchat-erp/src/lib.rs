//! ERP backend collaborators for LedgerChat.
//!
//! A [`Transport`] moves JSON requests to the ERP REST API. [`ErpClient`]
//! layers the authentication, bookkeeping and reporting services on top of
//! a transport. [`MockErp`] stands in for the whole backend in tests.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod mock;
pub mod responder;
pub mod services;
pub mod transport;

pub use client::ErpClient;
pub use error::ErpError;
pub use mock::{MockCall, MockErp, ScriptedResponder};
pub use responder::{ChatTurn, OpenAiResponder, Responder, TurnRole};
pub use services::{
    AccessToken, AuthService, BookkeepingService, ErpBackend, PurchaseDetails, RecordReceipt,
    ReportDocument, ReportingService, SaleDetails,
};
pub use transport::{ApiRequest, ApiResponse, CallContext, HttpTransport, Method, Transport};
