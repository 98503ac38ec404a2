/*!
 * A single satellite measurement at a location on the Earth.
 */

use chrono::{DateTime, Utc};

/**
 * The measured values of one valid pixel along with its geolocation.
 *
 * The values are indexed by the position of the variable in the
 * [VariableContext](crate::VariableContext) that was used to build the aggregators.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// Latitude of the pixel center in degrees.
    pub lat: f64,
    /// Longitude of the pixel center in degrees.
    pub lon: f64,
    /// Acquisition time of the pixel, if the source product provides one.
    pub time: Option<DateTime<Utc>>,
    /// One value per variable.
    pub values: Vec<f32>,
}

impl Observation {
    /// Create an observation without a time stamp.
    pub fn new(lat: f64, lon: f64, values: Vec<f32>) -> Self {
        Observation {
            lat,
            lon,
            time: None,
            values,
        }
    }

    /// Attach an acquisition time.
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Get the value of the variable at `index`.
    ///
    /// Missing values read as NaN, which every aggregator treats like any other float.
    pub fn value(&self, index: usize) -> f32 {
        self.values.get(index).copied().unwrap_or(f32::NAN)
    }
}

/// A geographically contiguous batch of observations, e.g. one band of scan lines of a product.
pub type ObservationSlice = Vec<Observation>;
