pub mod analysis;
pub mod relay;
