pub mod camera;
pub mod classifier;
pub mod color;
pub mod config;
pub mod control;
pub mod dispatch;
pub mod pipeline;
pub mod sampler;
