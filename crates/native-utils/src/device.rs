//! Audio device selection and discovery on the default host.

use cpal::Device;
use cpal::traits::{DeviceTrait, HostTrait};
use intona_core::audio::AudioError;

fn host() -> cpal::Host {
    cpal::default_host()
}

pub fn default_input() -> Result<Device, AudioError> {
    host()
        .default_input_device()
        .ok_or_else(|| AudioError::Device("no default input device available".into()))
}

pub fn default_output() -> Result<Device, AudioError> {
    host()
        .default_output_device()
        .ok_or_else(|| AudioError::Device("no default output device available".into()))
}

/// One line per input device: name, channel count, sample rate, and whether
/// it is the host default.
pub fn available_inputs() -> Result<String, AudioError> {
    let host = host();
    let default_name = host
        .default_input_device()
        .and_then(|device| device.name().ok());
    let devices = host
        .input_devices()
        .map_err(|error| AudioError::Device(error.to_string()))?;

    let mut lines = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else { continue };
        let Ok(config) = device.default_input_config() else {
            continue;
        };
        let mut line = format!(
            " * {}({}ch, {}hz)",
            name,
            config.channels(),
            config.sample_rate().0
        );
        if Some(&name) == default_name.as_ref() {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// One line per output device, same shape as [`available_inputs`].
pub fn available_outputs() -> Result<String, AudioError> {
    let host = host();
    let default_name = host
        .default_output_device()
        .and_then(|device| device.name().ok());
    let devices = host
        .output_devices()
        .map_err(|error| AudioError::Device(error.to_string()))?;

    let mut lines = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else { continue };
        let Ok(config) = device.default_output_config() else {
            continue;
        };
        let mut line = format!(
            " * {}({}ch, {}hz)",
            name,
            config.channels(),
            config.sample_rate().0
        );
        if Some(&name) == default_name.as_ref() {
            line.push_str(" [default]");
        }
        lines.push(line);
    }
    Ok(lines.join("\n"))
}
