pub mod frame;
pub mod pipeline;
pub mod plots;
pub mod surface;
pub mod text;
pub mod waterfall;
