/// View-construction shorthand for the integration tests.
use todmap::{BufferView, BufferViewMut};

/// Contiguous read-only view with the given shape over a slice.
pub fn view<'a>(data: &'a [f64], shape: &[usize]) -> BufferView<'a, f64> {
    BufferView::from_slice(data, shape).expect("test view construction")
}

/// Contiguous mutable view with the given shape over a slice.
pub fn view_mut<'a>(data: &'a mut [f64], shape: &[usize]) -> BufferViewMut<'a, f64> {
    BufferViewMut::from_slice(data, shape).expect("test view construction")
}
