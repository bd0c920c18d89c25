pub mod align;
pub mod batch;
pub mod consts;
pub mod crop;
pub mod error;
pub mod frame;
pub mod io;
pub mod pipeline;
