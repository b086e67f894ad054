//! Downstream channel programming.

mod tunarr;

pub use tunarr::{
    TunarrChannel, TunarrMediaSource, TunarrProgram, TunarrProgramming, TunarrPublisher,
};

use crate::playlist::Playlist;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Channel publisher unavailable: {0}")]
    Unavailable(String),

    #[error("Channel {0} not found")]
    ChannelNotFound(String),

    #[error("Tunarr media source {0} not found")]
    MediaSourceNotFound(String),

    #[error("Publisher rejected programming (status {status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Replaces a channel's programming with a playlist.
///
/// Publishing the same playlist twice leaves the channel in the same state.
#[cfg_attr(feature = "mock", mockall::automock)]
#[async_trait]
pub trait ChannelPublisher: Send + Sync {
    fn name(&self) -> &str;

    async fn set_programming(&self, channel_id: &str, playlist: &Playlist)
        -> Result<(), PublishError>;

    async fn health_check(&self) -> Result<(), PublishError>;
}
