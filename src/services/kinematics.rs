//! Kinematic scoring over a full keypoint sequence.
//!
//! Everything here is pure: no I/O, no shared state. A frame contributes to a
//! metric only when its first subject carries every joint that metric needs;
//! other frames are skipped without penalty.

use std::f64::consts::FRAC_PI_2;

use crate::models::analysis::{FrameMetadata, MetricsResult, Scores, VideoMetadata};
use crate::models::pose::{KeypointFrame, Point2D, SpineJoints};

/// Stability points lost per degree of spine-angle standard deviation.
pub const STABILITY_SENSITIVITY: f64 = 10.0;

/// Fraction of samples dropped from each end before averaging curvature.
pub const TRIM_FRACTION: f64 = 0.1;

/// Below this many samples the curvature mean is taken untrimmed.
pub const TRIM_MIN_SAMPLES: usize = 10;

/// Angle spread at or below this is a constant posture.
const SCORE_EPSILON: f64 = 1e-9;

/// Horizontal reference the spine vector is measured against.
pub const HORIZONTAL: Point2D = Point2D { x: 1.0, y: 0.0 };

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicsConfig {
    pub stability_joints: SpineJoints,
    pub curvature_joints: SpineJoints,
    pub stability_sensitivity: f64,
    pub curvature_reference: Point2D,
}

impl Default for KinematicsConfig {
    fn default() -> Self {
        Self {
            stability_joints: SpineJoints::COCO17,
            curvature_joints: SpineJoints::COCO17,
            stability_sensitivity: STABILITY_SENSITIVITY,
            curvature_reference: HORIZONTAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MetricError {
    #[error("{metric}: joint index {index} is outside the {len}-point keypoint layout")]
    JointOutOfRange {
        metric: &'static str,
        index: usize,
        len: usize,
    },

    #[error("{metric}: reference vector has zero length")]
    ZeroReference { metric: &'static str },

    #[error("no metric could be computed: {0}")]
    AllFailed(String),
}

/// Rejects a joint layout that no observed subject can fit. A single short
/// subject is just a frame missing joints and is skipped like any other.
fn check_layout(
    metric: &'static str,
    frames: &[KeypointFrame],
    joints: &SpineJoints,
) -> Result<(), MetricError> {
    let index = joints.max_index();
    let longest = frames
        .iter()
        .filter_map(KeypointFrame::primary)
        .map(|subject| subject.len())
        .max();
    match longest {
        Some(len) if len <= index => Err(MetricError::JointOutOfRange { metric, index, len }),
        _ => Ok(()),
    }
}

/// Angle of the hip-to-shoulder line, in degrees, as `atan2(dy, dx)`.
pub fn spine_angle(shoulder: Point2D, hip: Point2D) -> f64 {
    (shoulder.y - hip.y).atan2(shoulder.x - hip.x).to_degrees()
}

/// Angle in `[0, 180]` degrees between the shoulder-to-hip vector and
/// `reference`. `None` when the spine vector is degenerate.
pub fn spine_curvature_angle(shoulder: Point2D, hip: Point2D, reference: Point2D) -> Option<f64> {
    let (vx, vy) = (hip.x - shoulder.x, hip.y - shoulder.y);
    let norms = vx.hypot(vy) * reference.x.hypot(reference.y);
    if norms == 0.0 {
        return None;
    }
    let cos = ((vx * reference.x + vy * reference.y) / norms).clamp(-1.0, 1.0);
    Some(cos.acos().to_degrees())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Mean with the lowest and highest [`TRIM_FRACTION`] dropped once there are
/// at least [`TRIM_MIN_SAMPLES`] samples. `None` for an empty series.
pub fn trimmed_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let kept = if sorted.len() >= TRIM_MIN_SAMPLES {
        let cut = (sorted.len() as f64 * TRIM_FRACTION) as usize;
        &sorted[cut..sorted.len() - cut]
    } else {
        &sorted[..]
    };
    Some(mean(kept))
}

/// Maps a mean spine angle onto 0-100 with a sinusoidal ramp from 90 to 180
/// degrees.
pub fn curvature_to_score(angle: f64) -> f64 {
    if angle < 90.0 {
        return 0.0;
    }
    let x = (angle.min(180.0) - 90.0) / 90.0;
    (x * FRAC_PI_2).sin() * 100.0
}

/// Stability score in `0..=100`; zero when no frame is usable.
pub fn stability_score(
    frames: &[KeypointFrame],
    joints: &SpineJoints,
    sensitivity: f64,
) -> Result<u8, MetricError> {
    check_layout("stability", frames, joints)?;

    let angles: Vec<f64> = frames
        .iter()
        .filter_map(KeypointFrame::primary)
        .filter_map(|subject| joints.centers(subject))
        .map(|(shoulder, hip)| spine_angle(shoulder, hip))
        .collect();

    if angles.is_empty() {
        return Ok(0);
    }

    let std_dev = population_std_dev(&angles);
    if std_dev <= SCORE_EPSILON {
        return Ok(100);
    }
    let raw = 100.0 - std_dev * sensitivity;
    Ok(raw.clamp(0.0, 100.0) as u8)
}

/// Curvature score in `[0, 100]`; zero when no frame is usable.
pub fn curvature_score(
    frames: &[KeypointFrame],
    joints: &SpineJoints,
    reference: Point2D,
) -> Result<f64, MetricError> {
    check_layout("curvature", frames, joints)?;
    if reference.x == 0.0 && reference.y == 0.0 {
        return Err(MetricError::ZeroReference { metric: "curvature" });
    }

    let angles: Vec<f64> = frames
        .iter()
        .filter_map(KeypointFrame::primary)
        .filter_map(|subject| joints.centers(subject))
        .filter_map(|(shoulder, hip)| spine_curvature_angle(shoulder, hip, reference))
        .collect();

    Ok(trimmed_mean(&angles).map(curvature_to_score).unwrap_or(0.0))
}

/// Computes both scores independently. A metric that fails scores zero and
/// leaves a warning; only when both fail is the whole computation an error.
pub fn compute_metrics(
    frames: Vec<KeypointFrame>,
    video: VideoMetadata,
    config: &KinematicsConfig,
) -> Result<MetricsResult, MetricError> {
    let stability = stability_score(
        &frames,
        &config.stability_joints,
        config.stability_sensitivity,
    );
    let curvature = curvature_score(
        &frames,
        &config.curvature_joints,
        config.curvature_reference,
    );

    if let (Err(s), Err(c)) = (&stability, &curvature) {
        return Err(MetricError::AllFailed(format!("{s}; {c}")));
    }

    let mut warnings = Vec::new();
    let stability = stability.unwrap_or_else(|e| {
        warnings.push(e.to_string());
        0
    });
    let curvature = curvature.unwrap_or_else(|e| {
        warnings.push(e.to_string());
        0.0
    });
    for warning in &warnings {
        tracing::warn!(warning = %warning, "Metric skipped");
    }

    Ok(MetricsResult {
        scores: Scores {
            stability,
            curvature,
        },
        metadata: FrameMetadata {
            fps: video.fps,
            frame_count: frames.len() as u64,
        },
        keypoints: frames,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pose::Subject;

    const META: VideoMetadata = VideoMetadata {
        fps: 30.0,
        total_frames: 0,
    };

    /// A COCO-17 subject with only the four spine joints present.
    fn spine(
        shoulder_l: (f64, f64),
        shoulder_r: (f64, f64),
        hip_l: (f64, f64),
        hip_r: (f64, f64),
    ) -> KeypointFrame {
        let mut keypoints = vec![None; 17];
        keypoints[5] = Some(Point2D::new(shoulder_l.0, shoulder_l.1));
        keypoints[6] = Some(Point2D::new(shoulder_r.0, shoulder_r.1));
        keypoints[11] = Some(Point2D::new(hip_l.0, hip_l.1));
        keypoints[12] = Some(Point2D::new(hip_r.0, hip_r.1));
        KeypointFrame::new(vec![Subject::new(keypoints)])
    }

    /// Frame whose shoulder-center sits at `angle_deg` from the hip-center.
    fn at_angle(angle_deg: f64) -> KeypointFrame {
        let (s, c) = angle_deg.to_radians().sin_cos();
        let shoulder = (100.0 + 50.0 * c, 100.0 + 50.0 * s);
        spine(shoulder, shoulder, (100.0, 100.0), (100.0, 100.0))
    }

    /// Frame whose shoulder-to-hip vector makes `angle_deg` with the horizontal.
    fn curved(angle_deg: f64) -> KeypointFrame {
        let (s, c) = angle_deg.to_radians().sin_cos();
        let hip = (10.0 + 40.0 * c, 10.0 + 40.0 * s);
        spine((10.0, 10.0), (10.0, 10.0), hip, hip)
    }

    #[test]
    fn test_all_empty_frames_score_zero() {
        let frames = vec![KeypointFrame::empty(); 25];
        let result = compute_metrics(frames, META, &KinematicsConfig::default()).unwrap();
        assert_eq!(result.scores.stability, 0);
        assert_eq!(result.scores.curvature, 0.0);
        assert_eq!(result.metadata.frame_count, 25);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_no_frames_at_all() {
        let result = compute_metrics(Vec::new(), META, &KinematicsConfig::default()).unwrap();
        assert_eq!(result.scores.stability, 0);
        assert_eq!(result.scores.curvature, 0.0);
    }

    #[test]
    fn test_constant_posture_is_fully_stable() {
        let frames = vec![
            spine((0.1, 0.3), (0.7, 0.3), (0.1, 0.9), (0.7, 0.9));
            40
        ];
        let score = stability_score(&frames, &SpineJoints::COCO17, STABILITY_SENSITIVITY).unwrap();
        assert_eq!(score, 100);
    }

    #[test]
    fn test_wobble_is_penalized() {
        // Alternating +/-3 degrees: population std dev 3 -> 100 - 30
        let frames: Vec<_> = (0..20)
            .map(|i| at_angle(if i % 2 == 0 { 87.0 } else { 93.0 }))
            .collect();
        let score = stability_score(&frames, &SpineJoints::COCO17, STABILITY_SENSITIVITY).unwrap();
        assert!((69..=70).contains(&score), "score = {score}");
    }

    #[test]
    fn test_large_wobble_floors_at_zero() {
        let frames: Vec<_> = (0..10)
            .map(|i| at_angle(if i % 2 == 0 { 20.0 } else { 160.0 }))
            .collect();
        let score = stability_score(&frames, &SpineJoints::COCO17, STABILITY_SENSITIVITY).unwrap();
        assert_eq!(score, 0);
    }

    #[test]
    fn test_invalid_frames_are_skipped_not_penalized() {
        let mut frames = vec![at_angle(45.0); 10];
        frames.push(KeypointFrame::empty());
        let mut partial = at_angle(170.0);
        partial.subjects[0].keypoints[12] = None;
        frames.push(partial);
        let score = stability_score(&frames, &SpineJoints::COCO17, STABILITY_SENSITIVITY).unwrap();
        assert_eq!(score, 100);
    }

    #[test]
    fn test_only_first_subject_counts() {
        let mut frame = at_angle(45.0);
        frame.subjects.push(at_angle(170.0).subjects.remove(0));
        let frames = vec![frame, at_angle(45.0)];
        let score = stability_score(&frames, &SpineJoints::COCO17, STABILITY_SENSITIVITY).unwrap();
        assert_eq!(score, 100);
    }

    #[test]
    fn test_spine_angle_convention() {
        let angle = spine_angle(Point2D::new(1.0, 1.0), Point2D::new(0.0, 0.0));
        assert!((angle - 45.0).abs() < 1e-9);
        let angle = spine_angle(Point2D::new(-1.0, 0.0), Point2D::new(0.0, 0.0));
        assert!((angle - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_curvature_angle_range() {
        let origin = Point2D::new(0.0, 0.0);
        let angle = spine_curvature_angle(origin, Point2D::new(-3.0, 0.0), HORIZONTAL).unwrap();
        assert!((angle - 180.0).abs() < 1e-9);
        let angle = spine_curvature_angle(origin, Point2D::new(0.0, 2.0), HORIZONTAL).unwrap();
        assert!((angle - 90.0).abs() < 1e-9);
        assert!(spine_curvature_angle(origin, origin, HORIZONTAL).is_none());
    }

    #[test]
    fn test_curvature_score_at_135_degrees() {
        let expected = (45.0_f64 / 90.0 * FRAC_PI_2).sin() * 100.0;
        assert!((curvature_to_score(135.0) - expected).abs() < 1e-9);
        assert!((curvature_to_score(135.0) - 70.71).abs() < 0.01);

        let frames = vec![curved(135.0); 12];
        let score = curvature_score(&frames, &SpineJoints::COCO17, HORIZONTAL).unwrap();
        assert!((score - 70.71).abs() < 0.01, "score = {score}");
    }

    #[test]
    fn test_curvature_score_bounds() {
        assert_eq!(curvature_to_score(45.0), 0.0);
        assert_eq!(curvature_to_score(90.0), 0.0);
        assert_eq!(curvature_to_score(180.0), 100.0);
        assert_eq!(curvature_to_score(200.0), 100.0);
    }

    #[test]
    fn test_trimmed_mean_drops_outliers() {
        let mut values = vec![120.0; 8];
        values.push(0.0);
        values.push(1000.0);
        assert_eq!(trimmed_mean(&values), Some(120.0));
    }

    #[test]
    fn test_trimmed_mean_small_series_untrimmed() {
        assert_eq!(trimmed_mean(&[100.0, 130.0, 160.0]), Some(130.0));
        assert_eq!(trimmed_mean(&[170.0]), Some(170.0));
        assert_eq!(trimmed_mean(&[]), None);
    }

    #[test]
    fn test_single_glitch_frame_does_not_move_curvature() {
        let mut frames = vec![curved(180.0); 19];
        frames.push(curved(10.0));
        let score = curvature_score(&frames, &SpineJoints::COCO17, HORIZONTAL).unwrap();
        assert!((score - 100.0).abs() < 1e-6, "score = {score}");
    }

    #[test]
    fn test_degenerate_spine_excluded_from_curvature() {
        let frames = vec![
            spine((5.0, 5.0), (5.0, 5.0), (5.0, 5.0), (5.0, 5.0)),
            curved(180.0),
        ];
        let score = curvature_score(&frames, &SpineJoints::COCO17, HORIZONTAL).unwrap();
        assert!((score - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_one_failing_metric_does_not_block_the_other() {
        let config = KinematicsConfig {
            curvature_joints: SpineJoints {
                left_shoulder: 5,
                right_shoulder: 6,
                left_hip: 11,
                right_hip: 40,
            },
            ..KinematicsConfig::default()
        };
        let frames = vec![at_angle(60.0); 5];
        let result = compute_metrics(frames, META, &config).unwrap();
        assert_eq!(result.scores.stability, 100);
        assert_eq!(result.scores.curvature, 0.0);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("curvature"));
    }

    #[test]
    fn test_both_metrics_failing_is_an_error() {
        let out_of_range = SpineJoints {
            left_shoulder: 30,
            right_shoulder: 31,
            left_hip: 32,
            right_hip: 33,
        };
        let config = KinematicsConfig {
            stability_joints: out_of_range,
            curvature_joints: out_of_range,
            ..KinematicsConfig::default()
        };
        let err = compute_metrics(vec![at_angle(60.0)], META, &config).unwrap_err();
        assert!(matches!(err, MetricError::AllFailed(_)));
    }

    #[test]
    fn test_short_subject_in_one_frame_is_skipped() {
        let mut frames = vec![at_angle(60.0); 50];
        frames.insert(20, KeypointFrame::new(vec![Subject::new(Vec::new())]));
        frames.push(KeypointFrame::new(vec![Subject::new(vec![None; 7])]));

        let result = compute_metrics(frames, META, &KinematicsConfig::default()).unwrap();
        assert_eq!(result.scores.stability, 100);
        assert!(result.warnings.is_empty());
        assert_eq!(result.metadata.frame_count, 52);
    }

    #[test]
    fn test_layout_no_subject_fits_is_rejected() {
        let frames = vec![KeypointFrame::new(vec![Subject::new(vec![None; 7])]); 3];
        let err = stability_score(&frames, &SpineJoints::COCO17, STABILITY_SENSITIVITY).unwrap_err();
        assert_eq!(
            err,
            MetricError::JointOutOfRange {
                metric: "stability",
                index: 12,
                len: 7,
            }
        );
    }

    #[test]
    fn test_stability_truncates_just_below_integer() {
        // Spread of 3 degrees, scaled to land just under 70.
        let frames = vec![at_angle(57.0), at_angle(63.0)];
        let sensitivity = (30.0 + 5e-10) / 3.0;
        let score = stability_score(&frames, &SpineJoints::COCO17, sensitivity).unwrap();
        assert_eq!(score, 69);
    }

    #[test]
    fn test_zero_reference_rejected() {
        let err = curvature_score(&[curved(120.0)], &SpineJoints::COCO17, Point2D::new(0.0, 0.0))
            .unwrap_err();
        assert_eq!(err, MetricError::ZeroReference { metric: "curvature" });
    }
}
