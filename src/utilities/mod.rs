pub mod buffer;

pub use buffer::{BufferError, BufferView, BufferViewMut, Element, NdBuffer};
