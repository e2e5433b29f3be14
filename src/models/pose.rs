use serde::{Deserialize, Serialize};

/// A single 2D joint coordinate in image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(self, other: Point2D) -> Point2D {
        Point2D {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
        }
    }
}

/// Keypoints of one detected body, in layout order. `None` marks a joint the
/// model did not detect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject {
    pub keypoints: Vec<Option<Point2D>>,
}

impl Subject {
    pub fn new(keypoints: Vec<Option<Point2D>>) -> Self {
        Self { keypoints }
    }

    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// Joint at `index`, if the layout has it and the model detected it.
    pub fn joint(&self, index: usize) -> Option<Point2D> {
        self.keypoints.get(index).copied().flatten()
    }
}

/// Detections for one video frame. An empty list means nothing was detected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeypointFrame {
    pub subjects: Vec<Subject>,
}

impl KeypointFrame {
    pub fn new(subjects: Vec<Subject>) -> Self {
        Self { subjects }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The subject the metrics are computed on.
    pub fn primary(&self) -> Option<&Subject> {
        self.subjects.first()
    }
}

/// Indices of the joints that define the spine line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpineJoints {
    pub left_shoulder: usize,
    pub right_shoulder: usize,
    pub left_hip: usize,
    pub right_hip: usize,
}

impl SpineJoints {
    /// COCO 17-keypoint layout, as produced by the YOLO pose models.
    pub const COCO17: SpineJoints = SpineJoints {
        left_shoulder: 5,
        right_shoulder: 6,
        left_hip: 11,
        right_hip: 12,
    };

    pub fn max_index(&self) -> usize {
        self.left_shoulder
            .max(self.right_shoulder)
            .max(self.left_hip)
            .max(self.right_hip)
    }

    /// Shoulder-center and hip-center of `subject`, or `None` when any of the
    /// four joints is absent.
    pub fn centers(&self, subject: &Subject) -> Option<(Point2D, Point2D)> {
        let shoulder = subject
            .joint(self.left_shoulder)?
            .midpoint(subject.joint(self.right_shoulder)?);
        let hip = subject
            .joint(self.left_hip)?
            .midpoint(subject.joint(self.right_hip)?);
        Some((shoulder, hip))
    }
}

impl Default for SpineJoints {
    fn default() -> Self {
        Self::COCO17
    }
}
