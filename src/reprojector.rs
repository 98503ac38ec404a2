/*!
 * Resampling temporal bins onto a regular latitude/longitude raster.
 *
 * The raster is `2 * num_rows` pixels wide and `num_rows` pixels high, so a pixel spans as many
 * degrees of latitude as a grid row. Row `y = 0` is the southernmost row of the raster. A
 * [PixelRegion] restricts the output to a rectangle of the raster, pixels are then reported
 * relative to its south west corner.
 *
 * Within a row the bin indexes wanted by the pixels never decrease from west to east, and the
 * bins of the row are sorted by index. Each row is therefore resolved with a single forward pass
 * over its bins, like a merge join.
 */

use crate::{
    bin_manager::BinManager,
    bins::TemporalBin,
    error::{BinningError, BinningResult},
    grid::BinningGrid,
    vector::PropertyVector,
};
use std::error::Error;

/**
 * Receives the pixels of the raster, row by row from the south, each row west to east.
 */
pub trait TemporalBinProcessor {
    /// Called once before the first pixel with the size of the region being reprojected.
    fn begin(&mut self, _width: usize, _height: usize) -> Result<(), Box<dyn Error>> {
        Ok(())
    }

    /// A pixel covered by `bin`, `output` holds the output values of the bin.
    fn process_bin(
        &mut self,
        x: usize,
        y: usize,
        bin: &TemporalBin,
        output: &PropertyVector,
    ) -> Result<(), Box<dyn Error>>;

    /// A pixel in a cell without any data.
    fn process_missing_bin(&mut self, x: usize, y: usize) -> Result<(), Box<dyn Error>>;

    /// Called once after the last pixel.
    fn end(&mut self) -> Result<(), Box<dyn Error>> {
        Ok(())
    }
}

/// A rectangle of raster pixels, `(x, y)` is its south west corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl PixelRegion {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        PixelRegion {
            x,
            y,
            width,
            height,
        }
    }

    fn contains_row(&self, y: usize) -> bool {
        y >= self.y && y < self.y + self.height
    }
}

/**
 * Maps the temporal bins of a grid onto a raster.
 */
pub struct Reprojector<'a, G> {
    bin_manager: &'a BinManager,
    grid: &'a G,
    width: usize,
    height: usize,
    region: PixelRegion,
}

impl<'a, G: BinningGrid> Reprojector<'a, G> {
    /// Create a reprojector for the whole raster.
    pub fn new(bin_manager: &'a BinManager, grid: &'a G) -> Self {
        let height = grid.num_rows();
        let width = 2 * height;

        Reprojector {
            bin_manager,
            grid,
            width,
            height,
            region: PixelRegion::new(0, 0, width, height),
        }
    }

    /// Only reproject the pixels inside `region`, which must lie within the raster.
    pub fn with_region(mut self, region: PixelRegion) -> BinningResult<Self> {
        if region.width == 0
            || region.height == 0
            || region.x + region.width > self.width
            || region.y + region.height > self.height
        {
            return Err(BinningError::InvalidParameter {
                parameter: "pixelRegion",
                value: format!(
                    "{}x{} at ({}, {}) on a {}x{} raster",
                    region.width, region.height, region.x, region.y, self.width, self.height
                ),
            });
        }

        self.region = region;
        Ok(self)
    }

    /// The width of the raster in pixels.
    pub fn width(&self) -> usize {
        self.width
    }

    /// The height of the raster in pixels.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The part of the raster that is reprojected.
    pub fn region(&self) -> PixelRegion {
        self.region
    }

    /**
     * Reproject all temporal bins of a grid.
     *
     * The bins must be sorted by strictly ascending bin index. Every pixel of the region is handed
     * to the processor exactly once, rows without any bins as missing pixels. Bins of rows outside
     * the region are passed over.
     */
    pub fn reproject<I, P>(&self, bins: I, processor: &mut P) -> Result<(), Box<dyn Error>>
    where
        I: IntoIterator<Item = TemporalBin>,
        P: TemporalBinProcessor + ?Sized,
    {
        let region = self.region;
        let end_y = region.y + region.height;

        processor.begin(region.width, region.height)?;

        let mut row_bins: Vec<TemporalBin> = vec![];
        let mut current_row: Option<usize> = None;
        let mut last_index: Option<i64> = None;
        let mut next_y = region.y;
        let mut num_bins = 0;

        for bin in bins {
            if let Some(prev) = last_index {
                if bin.index <= prev {
                    return Err(format!(
                        "temporal bins are not sorted, bin {} after bin {}",
                        bin.index, prev
                    )
                    .into());
                }
            }
            last_index = Some(bin.index);

            let row = self.grid.row_index(bin.index);
            if !region.contains_row(row) {
                continue;
            }

            if current_row != Some(row) {
                if let Some(y) = current_row {
                    self.reproject_row(y, &row_bins, processor)?;
                    row_bins.clear();
                    next_y = y + 1;
                }

                if row < next_y {
                    return Err(format!(
                        "temporal bins are not sorted, bin {} of row {} after row {}",
                        bin.index,
                        row,
                        next_y - 1
                    )
                    .into());
                }

                for y in next_y..row {
                    self.reproject_missing_row(y, processor)?;
                }
                current_row = Some(row);
            }

            row_bins.push(bin);
            num_bins += 1;
        }

        if let Some(y) = current_row {
            self.reproject_row(y, &row_bins, processor)?;
            next_y = y + 1;
        }
        for y in next_y..end_y {
            self.reproject_missing_row(y, processor)?;
        }

        log::info!(
            "reprojected {} bins onto {}x{} pixels of a {}x{} raster",
            num_bins,
            region.width,
            region.height,
            self.width,
            self.height
        );

        processor.end()
    }

    /**
     * Reproject the bins of one raster row.
     *
     * `bins` holds the bins of the grid row under raster row `y`, sorted by index. Only the
     * columns of the region are visited and a row outside the region is ignored. Returns the
     * number of bins stepped over, which never exceeds the number of bins in the row.
     */
    pub fn reproject_row<P>(
        &self,
        y: usize,
        bins: &[TemporalBin],
        processor: &mut P,
    ) -> Result<usize, Box<dyn Error>>
    where
        P: TemporalBinProcessor + ?Sized,
    {
        let region = self.region;
        if !region.contains_row(y) {
            return Ok(0);
        }

        let lat = -90.0 + (y as f64 + 0.5) * 180.0 / self.height as f64;

        let mut output = self.bin_manager.create_output_vector();
        let mut last_wanted: Option<i64> = None;
        let mut matched: Option<usize> = None;
        let mut next = 0;
        let mut scanned = 0;

        for x in region.x..region.x + region.width {
            let lon = -180.0 + (x as f64 + 0.5) * 360.0 / self.width as f64;
            let wanted = self.grid.bin_index(lat, lon);

            if last_wanted != Some(wanted) {
                last_wanted = Some(wanted);
                matched = None;

                while let Some(bin) = bins.get(next) {
                    // A greater index belongs to a pixel further east.
                    if bin.index > wanted {
                        break;
                    }

                    next += 1;
                    scanned += 1;
                    if bin.index == wanted {
                        self.bin_manager.compute_output(bin, &mut output);
                        matched = Some(next - 1);
                        break;
                    }
                }
            }

            let (px, py) = (x - region.x, y - region.y);
            match matched {
                Some(pos) => processor.process_bin(px, py, &bins[pos], &output)?,
                None => processor.process_missing_bin(px, py)?,
            }
        }

        Ok(scanned)
    }

    fn reproject_missing_row<P>(&self, y: usize, processor: &mut P) -> Result<(), Box<dyn Error>>
    where
        P: TemporalBinProcessor + ?Sized,
    {
        for x in 0..self.region.width {
            processor.process_missing_bin(x, y - self.region.y)?;
        }
        Ok(())
    }
}
