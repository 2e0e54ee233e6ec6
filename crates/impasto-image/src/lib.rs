//! Image operators for stroke-based painting: Gaussian filtering,
//! structure tensors, edge tangent flow, orientation-aligned bilateral
//! filtering, flow-based difference-of-Gaussians and superpixel
//! segmentation.

pub mod convolution;
pub mod etf;
pub mod fdog;
pub mod superpixel;
pub mod tensor;

pub use superpixel::{ImageRegion, SeedingStrategy, SuperpixelSegmentation};
