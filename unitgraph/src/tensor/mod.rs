mod device;
mod scalar;
mod shape;
#[allow(clippy::module_inception)]
mod tensor;

pub use device::Device;
pub use scalar::Scalar;
pub use shape::{compute_strides, numel, Shape};
pub use tensor::{copy_tensor_data, forward_tensor_data, Tensor, TensorBuffer};
