//! Integration tests: the engine driven end to end through the public API,
//! with scripted collaborators in place of the network.

mod mock_estimator;
mod mock_feed;

mod lifecycle;
mod simulation;
