//! Render backends for motion clips.
//!
//! This crate provides:
//! - A `RenderBackend` seam the worker renders through
//! - A Blender command builder/runner with frame progress parsing
//! - FFmpeg muxing of an audio track into rendered videos

pub mod backend;
pub mod blender;
pub mod command;
pub mod error;
pub mod mux;
pub mod progress;

pub use backend::{progress_channel, ProgressSender, RenderBackend, RenderEvent, RenderRequest};
pub use blender::{move_file, BlenderConfig, BlenderRenderer};
pub use command::{check_blender, check_ffmpeg, BlenderCommand, BlenderRunner};
pub use error::{MediaError, MediaResult};
pub use mux::AudioMuxer;
pub use progress::{RenderLine, RenderOutputParser};
