//! Backend selection
//!
//! Picks the Burn backend at compile time:
//! - CUDA when the `cuda` feature is enabled
//! - NdArray (CPU) otherwise, which is what the server ships with

use burn::backend::Autodiff;
use burn::tensor::backend::Backend;

#[cfg(feature = "cuda")]
pub type InferenceBackend = burn_cuda::Cuda;

#[cfg(not(feature = "cuda"))]
pub type InferenceBackend = burn::backend::NdArray;

/// Autodiff wrapper used for fitting the model
pub type TrainingBackend = Autodiff<InferenceBackend>;

/// Device handle of the inference backend
pub type Device = <InferenceBackend as Backend>::Device;

/// Get the default device for the current backend
pub fn default_device() -> Device {
    Device::default()
}

/// Get a human-readable name for the current backend
pub fn backend_name() -> &'static str {
    #[cfg(feature = "cuda")]
    {
        "CUDA (GPU)"
    }

    #[cfg(not(feature = "cuda"))]
    {
        "NdArray (CPU)"
    }
}
