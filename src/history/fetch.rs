use crate::history::error::FetchError;
use crate::history::table::HistoricalTable;
use crate::types::calendar::{anniversary_window, DateWindow};
use crate::types::location::LatLon;
use chrono::{Datelike, NaiveDate};
use futures_util::future::try_join_all;
use log::{info, warn};
use std::future::Future;

/// A provider of raw hourly observations.
///
/// Implementations return one [`HistoricalTable`] covering `window` (inclusive)
/// with one column per requested parameter.
pub trait HistorySource: Send + Sync {
    fn fetch_window(
        &self,
        location: LatLon,
        window: DateWindow,
        parameters: &[String],
    ) -> impl Future<Output = Result<HistoricalTable, FetchError>> + Send;
}

/// Fetches the anniversary window of `date` in each of the `years_back` previous years.
///
/// All requests run concurrently. The first failure fails the whole fetch; otherwise
/// the per-year tables are concatenated with `year` set to the window's year.
///
/// # Errors
///
/// Any error of the source, or [`FetchError::Empty`] when no observation came back.
pub async fn fetch_history<S: HistorySource>(
    source: &S,
    location: LatLon,
    date: NaiveDate,
    window_days: u32,
    years_back: u32,
    parameters: &[String],
) -> Result<HistoricalTable, FetchError> {
    let windows: Vec<(i32, DateWindow)> = (1..=years_back as i32)
        .filter_map(|back| {
            let year = date.year() - back;
            let window = anniversary_window(date, year, window_days);
            if window.is_none() {
                warn!("No anniversary of {} in {}, skipping that year", date, year);
            }
            window.map(|w| (year, w))
        })
        .collect();

    info!(
        "Fetching {} anniversary windows of {} days (±{}) around {} at {}",
        windows.len(),
        windows.first().map_or(0, |(_, w)| w.days()),
        window_days,
        date,
        location
    );

    let tables = try_join_all(windows.into_iter().map(|(year, window)| async move {
        let table = source.fetch_window(location, window, parameters).await?;
        Ok::<_, FetchError>(table.with_year(year)?)
    }))
    .await?;

    let table = HistoricalTable::concat(parameters, tables)?;
    if table.is_empty() {
        return Err(FetchError::Empty { date, years_back });
    }
    info!("Fetched {} historical rows for {}", table.len(), location);
    Ok(table)
}
