pub mod algebra;
pub mod decomposition;
pub mod matrix;
pub mod normalize;
pub mod rows;

pub use decomposition::{lu, LuDecomposition};
pub use matrix::Matrix;
pub use normalize::Normalization;
