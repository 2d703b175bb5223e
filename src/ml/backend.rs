// ============================================================
// Layer 5 — Compute Backends
// ============================================================
// Training runs on Autodiff<Wgpu> (GPU via wgpu) or
// Autodiff<NdArray> (pure CPU). Evaluation and inference use
// the inner backends directly, without gradient tracking.

use burn::backend::{
    ndarray::NdArrayDevice,
    wgpu::WgpuDevice,
    Autodiff, NdArray, Wgpu,
};
use serde::{Deserialize, Serialize};

pub type WgpuBackend         = Wgpu;
pub type WgpuTrainBackend    = Autodiff<Wgpu>;
pub type NdArrayBackend      = NdArray;
pub type NdArrayTrainBackend = Autodiff<NdArray>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Wgpu,
    NdArray,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Wgpu    => "wgpu",
            BackendKind::NdArray => "ndarray",
        }
    }
}

pub fn wgpu_device() -> WgpuDevice {
    WgpuDevice::default()
}

pub fn ndarray_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}
