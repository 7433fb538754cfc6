pub mod acquisition;
pub mod analysis;
pub mod decode;
pub mod features;
