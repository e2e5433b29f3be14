//! Gait Analysis Service
//!
//! This library provides the core of the gait-analysis server: video uploads
//! become background jobs, a pose model turns each video into per-frame body
//! keypoints, and the kinematics engine reduces those keypoints to stability
//! and curvature scores that are archived per subject.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
