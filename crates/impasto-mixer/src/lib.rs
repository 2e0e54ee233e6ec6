//! Paint mixing: Kubelka-Munk coefficient pairs, palettes, and the
//! constrained non-linear solvers that find mixture recipes for target
//! paints and reflectances.

pub mod error;
pub mod extraction;
pub mod measure;
pub mod mixer;
pub mod paint;
pub mod palette;
pub mod solver;

pub use error::MixerError;
pub use mixer::PaintMixer;
pub use paint::{PaintCoeff, thinning_medium};
pub use palette::Palette;
