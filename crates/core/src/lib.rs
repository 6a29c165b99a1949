pub mod container;
pub mod pipeline;
pub mod publishing;
pub mod remux;
pub mod shared;
