//! Client error taxonomy.

use thiserror::Error;

use super::types::{ContractId, OrderStatusCode, RequestId};

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Transport could not be opened or failed while connecting
    #[error("Connection error: {0}")]
    Connection(String),

    /// Operation requires a logged-in session
    #[error("Not logged in")]
    NotLoggedIn,

    /// LogOn while a session is connecting or active
    #[error("Session already connecting or logged in")]
    AlreadyConnected,

    #[error("Duplicate request id: {0}")]
    DuplicateRequestId(RequestId),

    /// Resolution completion for an id that is not pending
    #[error("Unknown request id: {0}")]
    UnknownRequestId(RequestId),

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    /// Cancel/modify attempted on an order that can no longer change
    #[error("Order {chain_order_id} is {status:?} and cannot be cancelled or modified")]
    OrderNotEligible {
        chain_order_id: String,
        status: OrderStatusCode,
    },

    #[error("Duplicate client order id: {0}")]
    DuplicateClientOrderId(String),

    #[error("Compound order {0} has no staged legs")]
    EmptyCompoundOrder(String),

    /// Report references a contract with no known metadata
    #[error("Unknown contract: {0}")]
    UnknownContract(ContractId),

    #[error("Invalid base time: {0}")]
    InvalidBaseTime(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Send error: {0}")]
    Send(String),
}

impl ClientError {
    /// Session-fatal errors end the session; everything else is local to
    /// one request or report.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ClientError::Connection(_) | ClientError::InvalidBaseTime(_))
    }
}
