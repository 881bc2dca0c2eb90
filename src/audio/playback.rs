//! Output device playback
//!
//! Drives a [`Renderer`] from a real output device: the device's callback
//! thread plays the role of the host's real-time thread. Planar scratch
//! buffers are allocated before the stream starts; the callback itself only
//! renders and interleaves.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;

use crate::audio::render::Renderer;
use crate::constants::MAX_CHANNELS;
use crate::error::Error;

/// Largest number of frames rendered in one pass of the device callback
const MAX_CALLBACK_FRAMES: usize = 4096;

/// A running output stream fed by a renderer
pub struct DevicePlayback {
    _stream: cpal::Stream,
    config: StreamConfig,
    device_name: String,
}

impl DevicePlayback {
    /// Open the default output device and start rendering into it.
    pub fn start(mut renderer: Renderer, sample_rate: Option<u32>) -> Result<Self, Error> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Device("No default output device".to_string()))?;
        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

        let default_config = device
            .default_output_config()
            .map_err(|e| Error::Device(e.to_string()))?;
        if default_config.sample_format() != cpal::SampleFormat::F32 {
            return Err(Error::Device(format!(
                "Unsupported sample format: {:?}",
                default_config.sample_format()
            )));
        }

        let config = StreamConfig {
            channels: default_config.channels().min(MAX_CHANNELS as u16),
            sample_rate: sample_rate
                .map(cpal::SampleRate)
                .unwrap_or_else(|| default_config.sample_rate()),
            buffer_size: cpal::BufferSize::Default,
        };

        let channels = config.channels as usize;
        let mut planar = vec![vec![0.0f64; MAX_CALLBACK_FRAMES]; channels];

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for chunk in data.chunks_mut(MAX_CALLBACK_FRAMES * channels) {
                        let frames = chunk.len() / channels;
                        {
                            let mut outputs: [&mut [f64]; MAX_CHANNELS] = Default::default();
                            for (out, buf) in outputs.iter_mut().zip(planar.iter_mut()) {
                                *out = &mut buf[..frames];
                            }
                            renderer.render(&mut outputs[..channels], frames);
                        }
                        for (i, frame) in chunk.chunks_exact_mut(channels).enumerate() {
                            for (channel, sample) in frame.iter_mut().enumerate() {
                                *sample = planar[channel][i] as f32;
                            }
                        }
                    }
                },
                |err| tracing::error!("Output stream error: {}", err),
                None,
            )
            .map_err(|e| Error::Device(e.to_string()))?;

        stream.play().map_err(|e| Error::Device(e.to_string()))?;

        tracing::info!(
            "Playing on {}: {} channel(s) at {} Hz",
            device_name,
            config.channels,
            config.sample_rate.0
        );

        Ok(Self {
            _stream: stream,
            config,
            device_name,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}
