pub mod archive;
pub mod executor;
pub mod kinematics;
pub mod pose;
pub mod registry;
pub mod storage;
