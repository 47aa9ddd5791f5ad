pub mod linear;

pub use linear::LinearGaussianModel;
