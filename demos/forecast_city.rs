use chrono::NaiveDate;
use meteocast::{ForecastConfig, ForecastError, Forecaster, LatLon, PowerSource};
use std::env;
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), ForecastError> {
    env_logger::init();
    configure_polars_display();

    let config = match env::args().nth(1) {
        Some(path) => ForecastConfig::from_path(Path::new(&path))?,
        None => ForecastConfig::builtin()?,
    };
    let forecaster = Forecaster::new(PowerSource::new(), Arc::new(config));

    let report = forecaster
        .forecast()
        .location(LatLon(10.8231, 106.6297))
        .date(NaiveDate::from_ymd_opt(2025, 10, 2).unwrap())
        .call()
        .await?;

    println!("{}", report.band_frame()?);
    for (key, value) in &report.forecast.summary.entries {
        println!("{key}: {value:.2}");
    }
    for (parameter, bands) in &report.forecast.classifications {
        for band in bands {
            println!("{parameter} {} from {} to {}", band.label, band.start, band.end);
        }
    }

    Ok(())
}

fn configure_polars_display() {
    // show every column
    env::set_var("POLARS_FMT_MAX_COLS", "-1");
    // show all 25 rows
    env::set_var("POLARS_FMT_MAX_ROWS", "25");
}
