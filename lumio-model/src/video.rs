use crate::error::ModelError;
use crate::ids::{EmbedId, VideoId};

/// Immutable projection of a catalog video, as consumed by the playback
/// engine.
///
/// The catalog is the authority on duration; the embedded player may report
/// 0 before it is ready, or a slightly different value after, so gating and
/// percentage math always run against `duration_seconds` from here.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VideoDescriptor {
    pub id: VideoId,
    /// Identifier the third-party embed player uses for this video.
    pub embed_id: EmbedId,
    /// Authoritative runtime in whole seconds. Always > 0.
    pub duration_seconds: u32,
}

impl VideoDescriptor {
    pub fn new(
        id: VideoId,
        embed_id: EmbedId,
        duration_seconds: u32,
    ) -> Result<Self, ModelError> {
        if duration_seconds == 0 {
            return Err(ModelError::InvalidVideo(format!(
                "video {id} has zero duration"
            )));
        }
        Ok(Self {
            id,
            embed_id,
            duration_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_duration() {
        let embed = EmbedId::new("dQw4w9WgXcQ").unwrap();
        assert!(VideoDescriptor::new(VideoId::new(), embed, 0).is_err());
    }

    #[test]
    fn carries_catalog_duration() {
        let embed = EmbedId::new("dQw4w9WgXcQ").unwrap();
        let video = VideoDescriptor::new(VideoId::new(), embed, 600).unwrap();
        assert_eq!(video.duration_seconds, 600);
    }
}
