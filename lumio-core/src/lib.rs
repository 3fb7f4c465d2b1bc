//! # Lumio Core
//!
//! Playback integrity engine for the Lumio video-learning platform: the
//! logic that observes an external embedded video player, derives a durable
//! watch-progress record, decides whether the minimum-engagement policy is
//! satisfied, and gates skip-ahead/advance on that policy.
//!
//! ## Overview
//!
//! Three components, composed bottom-up:
//!
//! - [`adapter`]: wraps the third-party embeddable player, normalizing its
//!   event stream and isolating the engine from its asynchronous,
//!   sometimes-delayed initialization
//! - [`store`]: the durability boundary, load and atomic replace-by-key of
//!   progress records with a transient/rejected error taxonomy
//! - [`session`]: the state machine that consumes player events, schedules
//!   autosave flushes, and answers the one question the rest of the
//!   application needs: is skipping ahead currently permitted?
//!
//! The rendering layer, identity, and content catalog are external
//! collaborators; the engine consumes a `VideoDescriptor` and a `UserId`
//! and emits read-only progress projections.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use lumio_core::prelude::*;
//!
//! async fn mount_player(
//!     user_id: UserId,
//!     video: VideoDescriptor,
//!     store: Arc<dyn ProgressStore>,
//! ) -> Result<()> {
//!     let session = PlaybackSession::start(
//!         user_id,
//!         video,
//!         store,
//!         SessionOptions::default(),
//!     )
//!     .await?;
//!
//!     session.play()?;
//!     match session.seek(300).await? {
//!         SeekDecision::Allowed { .. } => {}
//!         SeekDecision::Denied { hint_minutes, .. } => {
//!             println!("watch {hint_minutes} more minutes before skipping");
//!         }
//!     }
//!
//!     let report = session.shutdown().await?;
//!     println!("final flush: {:?}", report.final_flush);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod adapter;
pub mod error;
pub mod policy;
pub mod prelude;
pub mod session;
pub mod store;
pub mod testing;

pub use error::{EngineError, Result};
pub use policy::SkipPolicy;
pub use session::{
    PlaybackSession, ProgressProjection, SeekDecision, SessionEvent,
    SessionOptions, SessionState,
};
pub use store::{ProgressStore, StoreError};
