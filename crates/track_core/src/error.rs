use serde::Serialize;
use thiserror::Error;

use crate::backend::BackendError;
use crate::geo::InvalidCoordinate;
use crate::routing::error::RoutingError;

/// Failures surfaced by a tracking session.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackingError {
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("provider location is invalid: {0}")]
    InvalidProviderLocation(InvalidCoordinate),
    #[error("order can no longer be cancelled (status {status:?})")]
    CancelNotAllowed { status: String },
    #[error("tracking session is not mounted")]
    NotMounted,
}

/// What the screen shows for an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAlert {
    pub title: String,
    pub message: String,
    /// Leave the tracking screen after dismissing.
    pub navigate_back: bool,
}

impl TrackingError {
    pub fn alert(&self) -> UserAlert {
        let (title, message, navigate_back) = match self {
            TrackingError::InvalidProviderLocation(_)
            | TrackingError::Routing(RoutingError::InvalidCoordinate(_)) => (
                "Location Error",
                "Invalid location coordinates.",
                true,
            ),
            TrackingError::Routing(RoutingError::Exhausted { .. }) => (
                "Route Error",
                "Could not load a route to your address. Please try again later.",
                true,
            ),
            TrackingError::Backend(BackendError::NotFound { .. }) => (
                "Error",
                "Could not find this order.",
                true,
            ),
            TrackingError::Backend(_) => (
                "Error",
                "Something went wrong. Please try again.",
                false,
            ),
            TrackingError::CancelNotAllowed { .. } => (
                "Cannot Cancel",
                "This order can only be cancelled before pickup.",
                false,
            ),
            TrackingError::NotMounted => ("Error", "Tracking is not active.", false),
        };
        UserAlert {
            title: title.to_string(),
            message: message.to_string(),
            navigate_back,
        }
    }
}
