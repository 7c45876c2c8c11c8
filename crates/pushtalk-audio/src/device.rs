use cpal::traits::{DeviceTrait, HostTrait};

use pushtalk_foundation::AudioError;

pub struct DeviceManager {
    host: cpal::Host,
}

impl DeviceManager {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn host_id(&self) -> cpal::HostId {
        self.host.id()
    }

    /// Open a named input device, or the host default when `name` is
    /// `None`.
    pub fn open_device(&self, name: Option<&str>) -> Result<cpal::Device, AudioError> {
        match name {
            Some(wanted) => {
                let devices = self.host.input_devices()?;
                for device in devices {
                    if device.name().map(|n| n == wanted).unwrap_or(false) {
                        return Ok(device);
                    }
                }
                Err(AudioError::DeviceError(format!(
                    "input device {:?} not found",
                    wanted
                )))
            }
            None => self
                .host
                .default_input_device()
                .ok_or(AudioError::NoInputDevice),
        }
    }

    pub fn enumerate_input_devices(&self) -> Vec<String> {
        match self.host.input_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                tracing::warn!("failed to enumerate input devices: {}", e);
                Vec::new()
            }
        }
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}
