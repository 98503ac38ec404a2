/*!
 * Grids mapping a position on the Earth to the index of a bin.
 */

pub use isin::IsinGrid;

/**
 * A partition of the globe into numbered cells arranged in rows of constant latitude.
 *
 * Bin indexes must be numbered row major: every bin of row `r` has a smaller index than every
 * bin of row `r + 1`, and within a row the index grows with longitude. Implementations must be
 * pure functions of their arguments.
 */
pub trait BinningGrid {
    /// The number of rows of the grid.
    fn num_rows(&self) -> usize;

    /// The index of the bin containing the given position.
    fn bin_index(&self, lat: f64, lon: f64) -> i64;

    /// The row of the bin with the given index.
    fn row_index(&self, bin_index: i64) -> usize;
}

mod isin;
