//! Host buffer <-> tensor conversion.

use crate::error::{Error, Result};
use burn::prelude::*;
use burn::tensor::{ElementConversion, TensorData};

pub fn tensor_from_vec<B: Backend, const D: usize>(
    data: Vec<f32>,
    shape: [usize; D],
    device: &B::Device,
) -> Tensor<B, D> {
    Tensor::from_data(TensorData::new(data, shape), device)
}

pub fn tensor_to_vec<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Result<Vec<f32>> {
    tensor
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| Error::TensorData(format!("{:?}", e)))
}

/// Value of a single-element tensor.
pub fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f32 {
    tensor.into_scalar().elem::<f32>()
}
