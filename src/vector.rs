/*!
 * Flat property storage shared by several aggregators.
 *
 * Every bin owns one array of floats. Each aggregator gets a fixed window (offset and length)
 * into it, and the windows never overlap. The layout only depends on the ordered list of
 * aggregators, so bins can be shipped around as bare float arrays.
 */

use std::ops::Range;

/// A window into a [PropertyVector].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyWindow {
    offset: usize,
    len: usize,
}

impl PropertyWindow {
    /// Create a window starting at `offset` spanning `len` elements.
    pub fn new(offset: usize, len: usize) -> Self {
        PropertyWindow { offset, len }
    }

    /// The first element of the window.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The number of elements in the window.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Is this window empty?
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The window as a range of indexes into the backing array.
    pub fn range(&self) -> Range<usize> {
        self.offset..(self.offset + self.len)
    }
}

/**
 * A fixed size array of floats with a window based view.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyVector(Vec<f32>);

impl PropertyVector {
    /// Create a vector of `size` zeros.
    pub fn zeros(size: usize) -> Self {
        PropertyVector(vec![0.0; size])
    }

    /// Create a vector of `size` NaN values.
    pub fn nan(size: usize) -> Self {
        PropertyVector(vec![f32::NAN; size])
    }

    /// The total number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Is this vector empty?
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get a single element.
    pub fn get(&self, index: usize) -> f32 {
        self.0[index]
    }

    /// Borrow the elements inside `window`.
    pub fn window(&self, window: PropertyWindow) -> &[f32] {
        &self.0[window.range()]
    }

    /// Mutably borrow the elements inside `window`.
    pub fn window_mut(&mut self, window: PropertyWindow) -> &mut [f32] {
        &mut self.0[window.range()]
    }

    /// All elements.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// All elements, mutable.
    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_are_disjoint_views() {
        let mut vec = PropertyVector::zeros(5);
        let first = PropertyWindow::new(0, 2);
        let second = PropertyWindow::new(2, 3);

        vec.window_mut(first).copy_from_slice(&[1.0, 2.0]);
        vec.window_mut(second)[1] = 7.0;

        assert_eq!(vec.window(first), &[1.0, 2.0]);
        assert_eq!(vec.window(second), &[0.0, 7.0, 0.0]);
        assert_eq!(vec.as_slice(), &[1.0, 2.0, 0.0, 7.0, 0.0]);
        assert_eq!(second.range(), 2..5);
    }

    #[test]
    fn test_empty_window() {
        let vec = PropertyVector::nan(3);
        let w = PropertyWindow::new(3, 0);
        assert!(w.is_empty());
        assert!(vec.window(w).is_empty());
        assert!(vec.get(1).is_nan());
    }
}
