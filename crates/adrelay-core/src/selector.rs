//! Media source selection
//!
//! Picks the single best candidate from a list of declared sources: a hard
//! playability filter, a stable quality sort, then a geometric tie-break on
//! declared width. A "maybe playable" candidate can survive the filter and
//! still lose at the final step; only certainly-playable sources are ever
//! returned.

use std::sync::Arc;
use tracing::debug;

use crate::types::{MediaSource, Playability};

/// Rates whether an encoding is playable in the current runtime
pub trait PlayabilityProbe: Send + Sync {
    fn can_play(&self, mime_type: &str) -> Playability;
}

/// Default probe over well-known media MIME types
///
/// Mirrors what a media element's own capability query reports on common
/// runtimes: universally supported containers rate `Probably`, formats with
/// spotty support rate `Maybe`, everything else `No`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimePlayability;

impl PlayabilityProbe for MimePlayability {
    fn can_play(&self, mime_type: &str) -> Playability {
        match mime_type.to_ascii_lowercase().as_str() {
            "video/mp4" | "video/webm" => Playability::Probably,
            "video/ogg" | "video/3gpp" | "video/quicktime" | "application/x-mpegurl" => {
                Playability::Maybe
            }
            _ => Playability::No,
        }
    }
}

/// Selects the best playable source for a target rendering width
pub struct MediaSourceSelector {
    probe: Arc<dyn PlayabilityProbe>,
}

impl MediaSourceSelector {
    pub fn new(probe: Arc<dyn PlayabilityProbe>) -> Self {
        Self { probe }
    }

    /// Pick the best source, or `None` when nothing certainly-playable fits
    ///
    /// Candidates are filtered to playability above `No`, sorted by
    /// descending playability then descending bitrate (stable), and the
    /// entry whose declared width is closest to `target_width` wins; width
    /// ties resolve to the earlier entry in that sort order. The winner is
    /// discarded unless its playability is `Probably`.
    pub fn select<'a>(
        &self,
        sources: &'a [MediaSource],
        target_width: u32,
    ) -> Option<&'a MediaSource> {
        let mut candidates: Vec<(&MediaSource, Playability)> = sources
            .iter()
            .map(|source| (source, self.probe.can_play(&source.mime_type)))
            .filter(|(_, playability)| *playability > Playability::No)
            .collect();

        candidates.sort_by(|(a, pa), (b, pb)| pb.cmp(pa).then(b.bitrate.cmp(&a.bitrate)));

        let distances: Vec<u32> = candidates
            .iter()
            .map(|(source, _)| source.width.abs_diff(target_width))
            .collect();
        let closest = distances.iter().copied().min()?;
        let index = distances.iter().position(|&d| d == closest)?;

        let (source, playability) = candidates[index];
        if playability < Playability::Probably {
            debug!(
                uri = %source.uri,
                ?playability,
                "Closest source is only maybe-playable, rejecting"
            );
            return None;
        }

        debug!(
            uri = %source.uri,
            bitrate = source.bitrate,
            width = source.width,
            target_width,
            "Source selected"
        );
        Some(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn source(mime: &str, bitrate: u64, width: u32) -> MediaSource {
        MediaSource {
            uri: Url::parse(&format!("https://cdn.example.com/{}-{}.bin", bitrate, width))
                .unwrap(),
            mime_type: mime.to_string(),
            bitrate,
            width,
            height: width * 9 / 16,
        }
    }

    fn selector() -> MediaSourceSelector {
        MediaSourceSelector::new(Arc::new(MimePlayability))
    }

    #[test]
    fn test_picks_closest_width() {
        let sources = vec![
            source("video/mp4", 500, 320),
            source("video/mp4", 500, 640),
            source("video/mp4", 500, 1920),
        ];

        let picked = selector().select(&sources, 700).unwrap();
        assert_eq!(picked.width, 640);
    }

    #[test]
    fn test_equal_distance_resolves_to_higher_bitrate() {
        // 600 is equidistant from 500 and 700; the sort puts the higher
        // bitrate first, and first occurrence wins.
        let sources = vec![
            source("video/mp4", 800, 500),
            source("video/mp4", 2000, 700),
        ];

        let picked = selector().select(&sources, 600).unwrap();
        assert_eq!(picked.bitrate, 2000);
    }

    #[test]
    fn test_exact_tie_resolves_to_earlier_listed() {
        let a = source("video/mp4", 1000, 640);
        let mut b = source("video/mp4", 1000, 640);
        b.uri = Url::parse("https://cdn.example.com/second.mp4").unwrap();

        let sources = vec![a.clone(), b];
        let picked = selector().select(&sources, 640).unwrap();
        assert_eq!(picked.uri, a.uri);
    }

    #[test]
    fn test_unplayable_sources_yield_none() {
        let sources = vec![
            source("application/x-shockwave-flash", 1000, 640),
            source("video/x-unknown", 1000, 640),
        ];

        assert!(selector().select(&sources, 640).is_none());
    }

    #[test]
    fn test_closest_maybe_playable_is_rejected_not_substituted() {
        // The ogg source sits exactly at the target width but only rates
        // Maybe; the selector must return None rather than fall back to the
        // farther mp4.
        let sources = vec![
            source("video/mp4", 2000, 1920),
            source("video/ogg", 1000, 640),
        ];

        // mp4 sorts first (higher playability), but ogg is closer to the
        // target. Distance picks ogg, and ogg's tier fails the final check.
        assert!(selector().select(&sources, 640).is_none());
    }

    #[test]
    fn test_some_playable_source_always_selected_when_closest() {
        let sources = vec![source("video/mp4", 1000, 640)];
        assert!(selector().select(&sources, 10_000).is_some());
    }

    #[test]
    fn test_empty_list_yields_none() {
        assert!(selector().select(&[], 640).is_none());
    }
}
