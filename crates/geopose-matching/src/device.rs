use serde::{Deserialize, Serialize};

use crate::error::ConstructionError;

/// Compute device a backend runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Device {
    /// CPU device
    Cpu,
    /// CUDA device with device ID
    Cuda {
        /// The CUDA device ID
        device_id: usize,
    },
}

impl Device {
    /// Returns the device type as a string.
    pub fn device_type(&self) -> &str {
        match self {
            Device::Cpu => "cpu",
            Device::Cuda { .. } => "cuda",
        }
    }

    /// Returns the device ID if applicable.
    pub fn device_id(&self) -> Option<usize> {
        match self {
            Device::Cpu => None,
            Device::Cuda { device_id } => Some(*device_id),
        }
    }

    /// Returns true if the device is CPU.
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda { device_id } => write!(f, "cuda:{device_id}"),
        }
    }
}

/// Requested execution mode of a backend, resolved once at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionMode {
    /// Require an accelerator, fail construction without one.
    Accelerated,
    /// Always run on the CPU.
    NonAccelerated,
    /// Use an accelerator if one is available, the CPU otherwise.
    #[default]
    Auto,
}

/// Runtime capability probe for accelerators.
pub trait AcceleratorProbe {
    /// The accelerator to use, `None` if there is none.
    fn accelerator(&self) -> Option<Device>;
}

/// A probe that never finds an accelerator.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuOnly;

impl AcceleratorProbe for CpuOnly {
    fn accelerator(&self) -> Option<Device> {
        None
    }
}

impl<P: AcceleratorProbe + ?Sized> AcceleratorProbe for &P {
    fn accelerator(&self) -> Option<Device> {
        (**self).accelerator()
    }
}

/// Resolve an execution mode to a device.
///
/// Backends call this once when they are constructed and keep the result.
///
/// # Errors
///
/// [`ConstructionError::IncompatibleExecutionMode`] if an accelerator is
/// required but the probe finds none.
pub fn select_device<P: AcceleratorProbe>(
    mode: ExecutionMode,
    probe: &P,
) -> Result<Device, ConstructionError> {
    let device = match mode {
        ExecutionMode::NonAccelerated => Device::Cpu,
        ExecutionMode::Accelerated => {
            probe
                .accelerator()
                .ok_or(ConstructionError::IncompatibleExecutionMode {
                    requested: mode,
                    available: Device::Cpu,
                })?
        }
        ExecutionMode::Auto => match probe.accelerator() {
            Some(device) => device,
            None => {
                log::warn!("No accelerator available, defaulting to CPU");
                Device::Cpu
            }
        },
    };
    log::info!("Selected device: {device}");
    Ok(device)
}
