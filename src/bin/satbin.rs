use std::{
    error::Error,
    fmt::{self, Display},
    fs::File,
    io::{BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    thread::{self, JoinHandle},
};

use clap::Parser;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::LevelFilter;
use satbin::{
    AggregatorConfig, BinningConfig, BinningContext, BinningGrid, BinningResult, Observation,
    PropertyVector, Reprojector, SpatialBin, SpatialBinProcessor, SpatialBinStore, SpatialBinner,
    TemporalBin, TemporalBinProcessor, TemporalBinner, VariableConfig,
};
use simple_logger::SimpleLogger;

const CHANNEL_SIZE: usize = 100;

/*-------------------------------------------------------------------------------------------------
 *                               Parse Command Line Arguments
 *-----------------------------------------------------------------------------------------------*/
///
/// Bin satellite observations onto an equal-area grid.
///
/// Every "*.obs" file below the input directory is one product. Each line of a product holds
/// the latitude, the longitude and then one value per variable, separated by white space, lines
/// starting with '#' are ignored. The lines must be in scan order. All products are binned
/// spatially, merged into temporal bins and written as a CSV raster.
///
#[derive(Debug, Parser)]
#[clap(name = "satbin")]
#[clap(author, version, about)]
struct SatBinOptionsInit {
    /// The directory to search for observation files.
    ///
    /// If this is not specified, then the program will check the "SATBIN_INPUT" environment
    /// variable.
    #[clap(short, long)]
    #[clap(env = "SATBIN_INPUT")]
    input_dir: PathBuf,

    /// The CSV file to write.
    ///
    /// If this is not specified, "binned.csv" in the input directory is used.
    #[clap(short, long)]
    output_file: Option<PathBuf>,

    /// Comma separated names of the value columns, in file order.
    #[clap(long)]
    #[clap(env = "SATBIN_VARIABLES")]
    variables: String,

    /// An aggregator as TYPE:var[,var...][:weight], e.g. AVG:chl or ON_MAX_SET:ndvi,red,nir
    ///
    /// May be given more than once.
    #[clap(short, long, required = true)]
    #[clap(parse(try_from_str=parse_aggregator))]
    aggregator: Vec<AggregatorConfig>,

    /// The number of rows of the binning grid.
    #[clap(short, long, default_value_t = satbin::DEFAULT_NUM_ROWS)]
    #[clap(env = "SATBIN_NUM_ROWS")]
    num_rows: usize,

    /// The number of lines of a product handled as one slice.
    #[clap(short, long, default_value_t = 64)]
    slice_height: usize,

    /// Verbose output
    #[clap(long)]
    verbose: bool,
}

/// Parse an aggregator argument.
fn parse_aggregator(agg_str: &str) -> BinningResult<AggregatorConfig> {
    AggregatorConfig::parse(agg_str)
}

#[derive(Debug)]
struct SatBinOptionsChecked {
    /// The directory to search for observation files.
    input_dir: PathBuf,

    /// The CSV file to write.
    output_file: PathBuf,

    /// The configuration of the binning engine.
    config: BinningConfig,

    /// Lines per slice.
    slice_height: usize,

    /// Verbose output
    verbose: bool,
}

impl Display for SatBinOptionsChecked {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        writeln!(f, "\n")?; // yes, two blank lines.
        writeln!(f, "    Input dir: {}", self.input_dir.display())?;
        writeln!(f, "   Output CSV: {}", self.output_file.display())?;
        writeln!(f, "     Num rows: {}", self.config.num_rows)?;
        writeln!(f, " Slice height: {}", self.slice_height)?;
        for var in &self.config.variables {
            writeln!(f, "     Variable: {}", var.name)?;
        }
        for agg in &self.config.aggregators {
            writeln!(
                f,
                "   Aggregator: {} {}",
                agg.type_name,
                agg.var_name
                    .clone()
                    .unwrap_or_else(|| agg.var_names.join(","))
            )?;
        }
        writeln!(f, "\n")?; // yes, two blank lines.

        Ok(())
    }
}

/// Get the command line arguments and check them.
fn parse_args() -> Result<SatBinOptionsChecked, Box<dyn Error>> {
    let SatBinOptionsInit {
        input_dir,
        output_file,
        variables,
        aggregator,
        num_rows,
        slice_height,
        verbose,
    } = SatBinOptionsInit::parse();

    let output_file = output_file.unwrap_or_else(|| input_dir.join("binned.csv"));

    if slice_height == 0 {
        return Err("slice height must be at least 1".into());
    }

    let variables: Vec<VariableConfig> = variables
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(|name| VariableConfig::new(name, None))
        .collect();

    for (i, var) in variables.iter().enumerate() {
        if variables[..i].iter().any(|v| v.name == var.name) {
            return Err(format!("duplicate variable: {}", var.name).into());
        }
    }

    let config = BinningConfig {
        num_rows,
        mask_expr: None,
        variables,
        aggregators: aggregator,
    };

    let checked = SatBinOptionsChecked {
        input_dir,
        output_file,
        config,
        slice_height,
        verbose,
    };

    if verbose {
        println!("{}", checked);
    }

    Ok(checked)
}

/*-------------------------------------------------------------------------------------------------
 *                                             MAIN
 *-----------------------------------------------------------------------------------------------*/
fn main() -> Result<(), Box<dyn Error>> {
    let opts = parse_args()?;

    let level = if opts.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .with_module_level("satbin", level)
        .init()?;

    let ctx = opts.config.create_context()?;

    // Aggregators may only use variables that are columns of the input files.
    let num_columns = opts.config.variables.len();
    if ctx.variables.variable_count() > num_columns {
        let unknown: Vec<&str> = ctx.variables.names().skip(num_columns).collect();
        return Err(format!("variables not found in input columns: {}", unknown.join(", ")).into());
    }

    let ctx = Arc::new(ctx);

    let (to_binning, from_path_gen) = bounded(CHANNEL_SIZE);
    let (to_collector, from_binning) = bounded(CHANNEL_SIZE);

    let path_gen = start_path_generation_thread(opts.input_dir.clone(), to_binning)?;

    let mut binning_threads = vec![];
    for i in 0..num_cpus::get() {
        binning_threads.push(start_binning_thread(
            i,
            Arc::clone(&ctx),
            opts.slice_height,
            from_path_gen.clone(),
            to_collector.clone(),
        )?);
    }
    drop(from_path_gen);
    drop(to_collector);

    let collector = start_collector_thread(from_binning)?;

    path_gen.join().unwrap();
    let mut num_degraded = 0;
    for jh in binning_threads {
        num_degraded += jh.join().unwrap();
    }
    let store = collector.join().unwrap();

    log::info!(
        "collected {} spatial bins in {} cells from {} observations",
        store.num_bins(),
        store.len(),
        store.num_observations()
    );
    if num_degraded > 0 {
        log::warn!("{} products were only partially binned", num_degraded);
    }

    let temporal_bins = TemporalBinner::new(&ctx.bin_manager).process_store(&store);
    drop(store);

    let mut writer = CsvRaster::create(&opts.output_file, &ctx)?;
    Reprojector::new(&ctx.bin_manager, &ctx.grid).reproject(temporal_bins, &mut writer)?;

    log::info!("wrote {}", opts.output_file.display());

    Ok(())
}

/*-------------------------------------------------------------------------------------------------
 *                                          Threads
 *-----------------------------------------------------------------------------------------------*/
fn start_path_generation_thread(
    input_dir: PathBuf,
    to_binning: Sender<PathBuf>,
) -> Result<JoinHandle<()>, Box<dyn Error>> {
    let jh = thread::Builder::new()
        .name("satbin-path_gen".to_owned())
        .spawn(move || {
            for entry in walkdir::WalkDir::new(input_dir)
                .into_iter()
                .filter_map(|res| res.ok())
                // Ignore directories, WalkDir will take care of recursing into them.
                .filter(|entry| entry.path().is_file())
                .filter(|entry| entry.file_name().to_string_lossy().ends_with(".obs"))
            {
                log::debug!("Processing {}", entry.path().display());
                to_binning.send(entry.into_path()).unwrap();
            }
        })?;

    Ok(jh)
}

/// Hands completed spatial bins over to the collector thread.
struct ChannelProcessor(Sender<Vec<SpatialBin>>);

impl SpatialBinProcessor for ChannelProcessor {
    fn process_spatial_bins(
        &mut self,
        _slice_index: usize,
        bins: Vec<SpatialBin>,
    ) -> Result<(), Box<dyn Error>> {
        self.0
            .send(bins)
            .map_err(|_| "collector thread is gone".into())
    }
}

/// Returns the number of products that could only be partially binned.
fn start_binning_thread(
    id: usize,
    ctx: Arc<BinningContext>,
    slice_height: usize,
    from_path_gen: Receiver<PathBuf>,
    to_collector: Sender<Vec<SpatialBin>>,
) -> Result<JoinHandle<usize>, Box<dyn Error>> {
    let jh = thread::Builder::new()
        .name(format!("satbin-binning-{}", id))
        .spawn(move || {
            let mut num_degraded = 0;

            for path in from_path_gen {
                let observations = match read_observations(&path, ctx.variables.variable_count())
                {
                    Ok(obs) => obs,
                    Err(err) => {
                        log::error!("Error reading {}: {}", path.display(), err);
                        continue;
                    }
                };

                let slices: Vec<&[Observation]> = observations.chunks(slice_height).collect();
                let processor = ChannelProcessor(to_collector.clone());
                let mut binner = SpatialBinner::new(
                    &ctx.bin_manager,
                    &ctx.grid,
                    processor,
                    Some(slices.len()),
                );

                for slice in slices {
                    binner.process_slice(slice);
                }
                binner.complete();

                let errors = binner.take_errors();
                if !errors.is_empty() {
                    num_degraded += 1;
                    log::warn!("{} is degraded:", path.display());
                    for err in errors {
                        log::warn!("    {}", err);
                    }
                }
            }

            num_degraded
        })?;

    Ok(jh)
}

fn start_collector_thread(
    from_binning: Receiver<Vec<SpatialBin>>,
) -> Result<JoinHandle<SpatialBinStore>, Box<dyn Error>> {
    let jh = thread::Builder::new()
        .name("satbin-collector".to_owned())
        .spawn(move || {
            let mut store = SpatialBinStore::new();
            for bins in from_binning {
                store.add_bins(bins);
            }
            store
        })?;

    Ok(jh)
}

/*-------------------------------------------------------------------------------------------------
 *                                       Input and Output
 *-----------------------------------------------------------------------------------------------*/
/// Read the observations of one product.
fn read_observations(path: &Path, num_values: usize) -> Result<Vec<Observation>, Box<dyn Error>> {
    let reader = BufReader::new(File::open(path)?);

    let mut observations = vec![];
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        match parse_observation(&line, num_values) {
            Ok(Some(obs)) => observations.push(obs),
            Ok(None) => {}
            Err(err) => {
                log::warn!("{}:{} skipped: {}", path.display(), line_num + 1, err);
            }
        }
    }

    Ok(observations)
}

/// Parse one line of an observation file, `None` for blank and comment lines.
fn parse_observation(line: &str, num_values: usize) -> Result<Option<Observation>, Box<dyn Error>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace();
    let lat: f64 = tokens.next().ok_or("missing latitude")?.parse()?;
    let lon: f64 = tokens.next().ok_or("missing longitude")?.parse()?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err(format!("position out of range: {} {}", lat, lon).into());
    }

    let values = tokens
        .map(|tok| tok.parse::<f32>())
        .collect::<Result<Vec<f32>, _>>()?;

    if values.len() != num_values {
        return Err(format!("expected {} values, found {}", num_values, values.len()).into());
    }

    Ok(Some(Observation::new(lat, lon, values)))
}

/// Writes every pixel of the raster as a line of a CSV file.
struct CsvRaster {
    out: BufWriter<File>,
    fill_values: Vec<f32>,
}

impl CsvRaster {
    fn create(path: &Path, ctx: &BinningContext) -> Result<Self, Box<dyn Error>> {
        let mut out = BufWriter::new(File::create(path)?);

        let names = ctx.bin_manager.output_property_names();
        writeln!(out, "x,y,{}", names.join(","))?;

        let fill_values = (0..ctx.bin_manager.output_property_count())
            .map(|i| ctx.bin_manager.output_fill_value(i))
            .collect();

        log::debug!(
            "raster of {} rows for {} outputs",
            ctx.grid.num_rows(),
            names.len()
        );

        Ok(CsvRaster { out, fill_values })
    }
}

fn write_pixel<W: Write>(
    out: &mut W,
    x: usize,
    y: usize,
    values: &[f32],
) -> Result<(), Box<dyn Error>> {
    write!(out, "{},{}", x, y)?;
    for v in values {
        write!(out, ",{}", v)?;
    }
    writeln!(out)?;
    Ok(())
}

impl TemporalBinProcessor for CsvRaster {
    fn process_bin(
        &mut self,
        x: usize,
        y: usize,
        _bin: &TemporalBin,
        output: &PropertyVector,
    ) -> Result<(), Box<dyn Error>> {
        write_pixel(&mut self.out, x, y, output.as_slice())
    }

    fn process_missing_bin(&mut self, x: usize, y: usize) -> Result<(), Box<dyn Error>> {
        write_pixel(&mut self.out, x, y, &self.fill_values)
    }

    fn end(&mut self) -> Result<(), Box<dyn Error>> {
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_observation() {
        let obs = parse_observation("  45.5 -110.25 1.5 2 ", 2).unwrap().unwrap();
        assert_eq!(obs.lat, 45.5);
        assert_eq!(obs.lon, -110.25);
        assert_eq!(obs.values, vec![1.5, 2.0]);

        assert!(parse_observation("# lat lon chl", 2).unwrap().is_none());
        assert!(parse_observation("   ", 2).unwrap().is_none());

        assert!(parse_observation("45.5 -110.25 1.5", 2).is_err());
        assert!(parse_observation("45.5 -110.25 1.5 abc", 2).is_err());
        assert!(parse_observation("95.0 0.0 1.5 1.0", 2).is_err());
        assert!(parse_observation("45.5", 2).is_err());
    }
}
