//! Audio subsystem module

pub mod buffer;
#[cfg(feature = "device-output")]
pub mod playback;
pub mod render;

pub use buffer::{channel, AudioFrame, Consumer, Monitor, Producer};
#[cfg(feature = "device-output")]
pub use playback::DevicePlayback;
pub use render::Renderer;
