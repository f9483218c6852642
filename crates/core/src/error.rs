use conduit_scene::SceneObjectKind;
use thiserror::Error;

use crate::attributes::{AttributeError, AttributeOwner};
use crate::input::InputKind;
use crate::transport::{ResultCode, TransportCall};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("{call:?} failed with {code:?}")]
    Transport { call: TransportCall, code: ResultCode },
    #[error("could not create node {name}: {code:?}")]
    NodeCreationFailed { name: String, code: ResultCode },
    #[error("attribute {name} on {owner:?} expects {expected} values, got {actual}")]
    AttributeLengthMismatch {
        name: String,
        owner: AttributeOwner,
        expected: usize,
        actual: usize,
    },
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    #[error("stale node handle for {0}")]
    StaleHandle(String),
    #[error("{slot:?} input cannot take a {object} object")]
    UnsupportedInputKind {
        slot: InputKind,
        object: SceneObjectKind,
    },
    #[error("rebuild cancelled")]
    Cancelled,
}

impl BridgeError {
    pub fn transport(call: TransportCall, code: ResultCode) -> Self {
        BridgeError::Transport { call, code }
    }

    /// Retryable errors leave the slot dirty for the next pass.
    pub fn is_retryable(&self) -> bool {
        match self {
            BridgeError::Transport { .. }
            | BridgeError::NodeCreationFailed { .. }
            | BridgeError::StaleHandle(_)
            | BridgeError::Cancelled => true,
            BridgeError::AttributeLengthMismatch { .. }
            | BridgeError::InvalidTopology(_)
            | BridgeError::UnsupportedInputKind { .. } => false,
        }
    }
}

impl From<AttributeError> for BridgeError {
    fn from(err: AttributeError) -> Self {
        match err {
            AttributeError::InvalidLength {
                name,
                owner,
                expected,
                actual,
            } => BridgeError::AttributeLengthMismatch {
                name,
                owner,
                expected,
                actual,
            },
            AttributeError::InvalidTopology(message) => BridgeError::InvalidTopology(message),
        }
    }
}
