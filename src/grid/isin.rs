use super::BinningGrid;

/**
 * A sinusoidal equal-area grid, the same scheme as the MODIS/SeaWiFS integerized sinusoidal
 * (ISIN) level 3 bins.
 *
 * Row `0` is the southernmost. Each row spans `180 / num_rows` degrees of latitude and is cut into
 * `round(2 * num_rows * cos(lat))` columns, `lat` being the latitude of the row center, so that
 * every cell covers about the same area. Bins are numbered row by row starting at the south pole,
 * columns from west (-180) to east.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct IsinGrid {
    num_rows: usize,
    /// The index of the first bin of each row.
    base_bins: Vec<i64>,
    num_cols: Vec<usize>,
    num_bins: i64,
}

impl IsinGrid {
    /// Create a grid with `num_rows` rows. Zero rows is treated as one.
    pub fn new(num_rows: usize) -> Self {
        let num_rows = num_rows.max(1);

        let mut base_bins = Vec::with_capacity(num_rows);
        let mut num_cols = Vec::with_capacity(num_rows);

        let mut next_base = 0i64;
        for row in 0..num_rows {
            let lat = Self::row_center_lat(num_rows, row);
            let cols = f64::round(2.0 * num_rows as f64 * lat.to_radians().cos()).max(1.0) as usize;

            base_bins.push(next_base);
            num_cols.push(cols);
            next_base += cols as i64;
        }

        IsinGrid {
            num_rows,
            base_bins,
            num_cols,
            num_bins: next_base,
        }
    }

    fn row_center_lat(num_rows: usize, row: usize) -> f64 {
        -90.0 + (row as f64 + 0.5) * 180.0 / num_rows as f64
    }

    /// The number of columns in `row`. Rows outside the grid have none.
    pub fn num_cols(&self, row: usize) -> usize {
        self.num_cols.get(row).copied().unwrap_or(0)
    }

    /// The total number of bins.
    pub fn num_bins(&self) -> i64 {
        self.num_bins
    }

    /// The index of the first bin of `row`.
    pub fn base_bin(&self, row: usize) -> i64 {
        self.base_bins
            .get(row)
            .copied()
            .unwrap_or(self.num_bins)
    }

    /// The latitude of the center of `row`.
    pub fn center_lat(&self, row: usize) -> f64 {
        Self::row_center_lat(self.num_rows, row)
    }

    /// The position of the center of a bin as (latitude, longitude).
    pub fn center_lat_lon(&self, bin_index: i64) -> (f64, f64) {
        let row = self.row_index(bin_index);
        let col = (bin_index - self.base_bin(row)) as f64;
        let cols = self.num_cols(row) as f64;

        let lat = self.center_lat(row);
        let lon = -180.0 + (col + 0.5) * 360.0 / cols;
        (lat, lon)
    }
}

impl BinningGrid for IsinGrid {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn bin_index(&self, lat: f64, lon: f64) -> i64 {
        let row = ((lat + 90.0) * self.num_rows as f64 / 180.0).floor();
        let row = (row.max(0.0) as usize).min(self.num_rows - 1);

        let cols = self.num_cols[row];
        let col = ((lon + 180.0) * cols as f64 / 360.0).floor();
        let col = (col.max(0.0) as usize).min(cols - 1);

        self.base_bins[row] + col as i64
    }

    fn row_index(&self, bin_index: i64) -> usize {
        // Index of the last row whose base bin is not greater than bin_index.
        let pos = self.base_bins.partition_point(|&base| base <= bin_index);
        pos.saturating_sub(1)
    }
}
