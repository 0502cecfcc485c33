//! List available audio input devices.

use cpal::traits::{DeviceTrait, HostTrait};

use crate::capture::source::suppress_alsa_warnings;
use crate::capture::CaptureError;

/// Lists all audio input devices on the system, with the index and name
/// forms accepted by the `audio.device` config key.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    let (host, devices) = suppress_alsa_warnings(|| {
        let host = cpal::default_host();
        let devices: Vec<cpal::Device> = host
            .input_devices()
            .map_err(|e| {
                CaptureError::DeviceOpen(format!("failed to enumerate audio devices: {e}"))
            })?
            .filter(|d| d.name().is_ok())
            .collect();
        Ok((host, devices))
    })?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!();
    println!("Available audio input devices:");
    println!();

    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    for (index, device) in devices.iter().enumerate() {
        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        let default_indicator = if default_name.as_ref() == Some(&name) {
            " [DEFAULT]"
        } else {
            ""
        };

        let config_info = match device.default_input_config() {
            Ok(config) => format!(
                " ({}Hz, {} channels, {:?})",
                config.sample_rate().0,
                config.channels(),
                config.sample_format()
            ),
            Err(_) => " (configuration unavailable)".to_string(),
        };

        println!("  ID: {index}");
        println!("    Name: {name}{default_indicator}");
        println!("    Config:{config_info}");
        println!();
    }

    Ok(())
}
