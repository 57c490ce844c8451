//! Nearest-identity search over a gallery.

use crate::encoding::Encoding;
use crate::gallery::Gallery;

/// Default acceptance threshold on Euclidean distance.
///
/// Tuned for 128-d dlib-style face descriptors; other embedding backends
/// need their own value.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// Result of comparing a probe against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Identity of the closest candidate, set only when it is within the threshold.
    pub id: Option<String>,
    /// Smallest distance seen, whether or not it was accepted.
    pub distance: Option<f64>,
    /// Candidates actually compared.
    pub compared: usize,
    /// Candidates skipped because their shape differs from the probe's.
    pub mismatched: usize,
}

impl MatchResult {
    pub fn is_match(&self) -> bool {
        self.id.is_some()
    }
}

/// Strategy for comparing a probe encoding against a gallery of enrolled faces.
pub trait Matcher: Send + Sync {
    fn compare(&self, probe: &Encoding, gallery: &Gallery) -> MatchResult;
}

/// Linear-scan Euclidean matcher.
///
/// Every candidate is visited. The first candidate reaching the minimum
/// distance in gallery order wins ties, and the minimum is accepted only if
/// it is strictly below the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EuclideanMatcher {
    threshold: f64,
}

impl Default for EuclideanMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

impl EuclideanMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Matcher for EuclideanMatcher {
    fn compare(&self, probe: &Encoding, gallery: &Gallery) -> MatchResult {
        let mut best_distance = f64::INFINITY;
        let mut best: Option<&Encoding> = None;
        let mut compared = 0;
        let mut mismatched = 0;

        for candidate in gallery {
            let distance = match probe.distance(candidate) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(id = candidate.id(), error = %e, "skipping incomparable candidate");
                    mismatched += 1;
                    continue;
                }
            };
            compared += 1;
            if best_distance > distance {
                best_distance = distance;
                best = Some(candidate);
            }
        }

        let accepted = best.filter(|_| best_distance < self.threshold);
        tracing::debug!(
            compared,
            mismatched,
            distance = best.map(|_| best_distance),
            matched = accepted.map(Encoding::id),
            "gallery scan finished"
        );

        MatchResult {
            id: accepted.map(|e| e.id().to_string()),
            distance: best.map(|_| best_distance),
            compared,
            mismatched,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enc(id: &str, values: &[f32]) -> Encoding {
        Encoding::from_matrix(values.to_vec(), 1, values.len(), Some(id.to_string())).unwrap()
    }

    fn probe(values: &[f32]) -> Encoding {
        Encoding::from_matrix(values.to_vec(), 1, values.len(), None).unwrap()
    }

    #[test]
    fn test_empty_gallery_is_no_match() {
        let result = EuclideanMatcher::default().compare(&probe(&[0.0, 0.0]), &Gallery::new());
        assert!(!result.is_match());
        assert_eq!(result.distance, None);
        assert_eq!(result.compared, 0);
    }

    #[test]
    fn test_closest_within_threshold_wins() {
        let gallery: Gallery = [
            enc("far", &[1.0, 1.0]),
            enc("near", &[0.1, 0.0]),
            enc("nearer", &[0.05, 0.0]),
        ]
        .into_iter()
        .collect();

        let result = EuclideanMatcher::default().compare(&probe(&[0.0, 0.0]), &gallery);
        assert_eq!(result.id.as_deref(), Some("nearer"));
        assert_eq!(result.compared, 3);
        assert!((result.distance.unwrap() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_is_strict() {
        let at = [enc("edge", &[0.6, 0.0])].into_iter().collect::<Gallery>();
        let result = EuclideanMatcher::default().compare(&probe(&[0.0, 0.0]), &at);
        assert!(!result.is_match());
        assert_eq!(result.distance, Some(f64::from(0.6f32)));

        let below = [enc("inside", &[0.599999, 0.0])].into_iter().collect::<Gallery>();
        let result = EuclideanMatcher::default().compare(&probe(&[0.0, 0.0]), &below);
        assert_eq!(result.id.as_deref(), Some("inside"));
    }

    #[test]
    fn test_threshold_compares_unrounded_distance() {
        // sqrt(0.36000004^2 + 0.47999996^2) is just under 0.6 in f64 but
        // rounds to exactly 0.6 as f32.
        let gallery = [enc("close", &[0.360_000_04, 0.479_999_96])].into_iter().collect::<Gallery>();
        let result = EuclideanMatcher::default().compare(&probe(&[0.0, 0.0]), &gallery);
        let distance = result.distance.unwrap();
        assert!(distance < 0.6);
        assert_eq!(distance as f32, 0.6f32);
        assert_eq!(result.id.as_deref(), Some("close"));
    }

    #[test]
    fn test_tie_goes_to_first_enrolled() {
        let gallery: Gallery = [enc("A", &[0.3, 0.0]), enc("B", &[0.0, 0.3])].into_iter().collect();
        let result = EuclideanMatcher::default().compare(&probe(&[0.0, 0.0]), &gallery);
        assert_eq!(result.id.as_deref(), Some("A"));

        let reversed: Gallery = [enc("B", &[0.0, 0.3]), enc("A", &[0.3, 0.0])].into_iter().collect();
        let result = EuclideanMatcher::default().compare(&probe(&[0.0, 0.0]), &reversed);
        assert_eq!(result.id.as_deref(), Some("B"));
    }

    #[test]
    fn test_mismatched_candidates_are_skipped() {
        let gallery: Gallery = [enc("short", &[0.0; 64]), enc("full", &[0.01; 128])]
            .into_iter()
            .collect();
        let result = EuclideanMatcher::default().compare(&probe(&[0.0; 128]), &gallery);
        assert_eq!(result.id.as_deref(), Some("full"));
        assert_eq!(result.compared, 1);
        assert_eq!(result.mismatched, 1);
    }

    #[test]
    fn test_best_distance_reported_without_match() {
        let gallery: Gallery = [enc("x", &[3.0, 4.0])].into_iter().collect();
        let result = EuclideanMatcher::new(1.0).compare(&probe(&[0.0, 0.0]), &gallery);
        assert!(!result.is_match());
        assert!((result.distance.unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_configurable_threshold() {
        let gallery: Gallery = [enc("x", &[0.8])].into_iter().collect();
        assert!(!EuclideanMatcher::default().compare(&probe(&[0.0]), &gallery).is_match());
        assert!(EuclideanMatcher::new(0.9).compare(&probe(&[0.0]), &gallery).is_match());
    }
}
