//! Polars-backed container for raw hourly observations.

use crate::history::error::AggregateError;
use chrono::{DateTime, Datelike, NaiveDateTime, Timelike};
use polars::prelude::*;

pub const DATETIME: &str = "datetime";
pub const HOUR: &str = "hour";
pub const YEAR: &str = "year";

/// One timestamped row of observations, values in parameter order. `None` is missing.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoricalRecord {
    pub datetime: NaiveDateTime,
    pub values: Vec<Option<f64>>,
}

impl HistoricalRecord {
    pub fn new(datetime: NaiveDateTime, values: Vec<Option<f64>>) -> Self {
        Self { datetime, values }
    }
}

/// Row-aligned plain copy of a [`HistoricalTable`], values per parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Observations {
    pub datetimes: Vec<NaiveDateTime>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// Raw historical observations for one location.
///
/// The wrapped frame has a `datetime` column (naive UTC), one nullable `Float64`
/// column per parameter, and the derived `hour` and `year` columns. Missing
/// observations are nulls.
#[derive(Debug, Clone)]
pub struct HistoricalTable {
    /// The underlying Polars DataFrame.
    pub frame: DataFrame,
    parameters: Vec<String>,
}

impl HistoricalTable {
    /// Builds a table from records. Non-finite values are stored as nulls.
    ///
    /// # Errors
    ///
    /// [`AggregateError::RecordWidth`] if a record does not carry exactly one value per parameter.
    pub fn from_records(
        parameters: &[String],
        records: &[HistoricalRecord],
    ) -> Result<Self, AggregateError> {
        if let Some(bad) = records.iter().find(|r| r.values.len() != parameters.len()) {
            return Err(AggregateError::RecordWidth {
                datetime: bad.datetime,
                expected: parameters.len(),
                found: bad.values.len(),
            });
        }

        let datetimes: Vec<NaiveDateTime> = records.iter().map(|r| r.datetime).collect();
        let hours: Vec<u32> = datetimes.iter().map(|d| d.hour()).collect();
        let years: Vec<i32> = datetimes.iter().map(|d| d.year()).collect();

        let mut columns: Vec<Column> = Vec::with_capacity(parameters.len() + 3);
        let datetime = Series::new(DATETIME.into(), datetimes.as_slice())
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?;
        columns.push(datetime.into());
        for (i, parameter) in parameters.iter().enumerate() {
            let values: Vec<Option<f64>> = records
                .iter()
                .map(|r| r.values[i].filter(|v| v.is_finite()))
                .collect();
            columns.push(Series::new(parameter.as_str().into(), values).into());
        }
        columns.push(Series::new(HOUR.into(), hours).into());
        columns.push(Series::new(YEAR.into(), years).into());

        Ok(Self {
            frame: DataFrame::new(columns)?,
            parameters: parameters.to_vec(),
        })
    }

    /// Wraps an existing frame after checking the required columns are present.
    pub fn from_frame(frame: DataFrame, parameters: &[String]) -> Result<Self, AggregateError> {
        let required = [DATETIME, HOUR, YEAR]
            .into_iter()
            .chain(parameters.iter().map(String::as_str));
        for name in required {
            if frame.column(name).is_err() {
                return Err(AggregateError::MissingColumn(name.to_string()));
            }
        }
        Ok(Self {
            frame,
            parameters: parameters.to_vec(),
        })
    }

    pub fn empty(parameters: &[String]) -> Result<Self, AggregateError> {
        Self::from_records(parameters, &[])
    }

    /// Stacks tables sharing the same parameter list. No tables yields an empty table.
    pub fn concat(
        parameters: &[String],
        tables: Vec<HistoricalTable>,
    ) -> Result<Self, AggregateError> {
        let mut tables = tables.into_iter();
        let Some(first) = tables.next() else {
            return Self::empty(parameters);
        };
        let mut frame = first.frame;
        for table in tables {
            frame.vstack_mut(&table.frame)?;
        }
        Self::from_frame(frame, parameters)
    }

    /// Overwrites the `year` column, used to tag rows with the year of the window they came from.
    pub fn with_year(mut self, year: i32) -> Result<Self, AggregateError> {
        let years = vec![year; self.frame.height()];
        self.frame.with_column(Series::new(YEAR.into(), years))?;
        Ok(self)
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn datetimes(&self) -> Result<Vec<NaiveDateTime>, AggregateError> {
        let column = self
            .frame
            .column(DATETIME)
            .map_err(|_| AggregateError::MissingColumn(DATETIME.to_string()))?;
        let unit = match column.dtype() {
            DataType::Datetime(unit, _) => *unit,
            other => {
                return Err(AggregateError::UnexpectedType {
                    column: DATETIME.to_string(),
                    dtype: other.to_string(),
                })
            }
        };
        let physical = column.cast(&DataType::Int64)?;
        physical
            .i64()?
            .into_iter()
            .map(|ts| {
                ts.and_then(|ts| timestamp_to_datetime(ts, unit))
                    .ok_or_else(|| AggregateError::UnexpectedType {
                        column: DATETIME.to_string(),
                        dtype: "null or out-of-range timestamp".to_string(),
                    })
            })
            .collect()
    }

    /// Extracts the timestamps and every parameter column.
    pub fn observations(&self) -> Result<Observations, AggregateError> {
        let datetimes = self.datetimes()?;
        let values = self
            .parameters
            .iter()
            .map(|p| self.values(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Observations { datetimes, values })
    }

    /// Values of one parameter column, nulls as `None`.
    pub fn values(&self, parameter: &str) -> Result<Vec<Option<f64>>, AggregateError> {
        let column = self
            .frame
            .column(parameter)
            .map_err(|_| AggregateError::MissingColumn(parameter.to_string()))?;
        let values = column.cast(&DataType::Float64)?;
        Ok(values
            .f64()?
            .into_iter()
            .map(|v| v.filter(|v| v.is_finite()))
            .collect())
    }
}

pub(crate) fn timestamp_to_datetime(value: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    match unit {
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(value),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(value),
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(value)),
    }
    .map(|d| d.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 9, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
    }

    fn params() -> Vec<String> {
        vec!["T2M".to_string(), "WS2M".to_string()]
    }

    #[test]
    fn test_from_records_schema() -> Result<(), Box<dyn std::error::Error>> {
        let table = HistoricalTable::from_records(
            &params(),
            &[
                HistoricalRecord::new(at(27, 12), vec![Some(14.5), None]),
                HistoricalRecord::new(at(27, 13), vec![Some(f64::NAN), Some(3.0)]),
            ],
        )?;
        assert_eq!(table.len(), 2);
        let names: Vec<String> = table
            .frame
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, ["datetime", "T2M", "WS2M", "hour", "year"]);
        assert!(matches!(
            table.frame.column(DATETIME)?.dtype(),
            DataType::Datetime(_, None)
        ));
        assert_eq!(table.values("T2M")?, vec![Some(14.5), None]);
        assert_eq!(table.values("WS2M")?, vec![None, Some(3.0)]);
        assert_eq!(table.datetimes()?, vec![at(27, 12), at(27, 13)]);
        Ok(())
    }

    #[test]
    fn test_record_width_is_checked() {
        let err = HistoricalTable::from_records(
            &params(),
            &[HistoricalRecord::new(at(1, 0), vec![Some(1.0)])],
        );
        assert!(matches!(err, Err(AggregateError::RecordWidth { .. })));
    }

    #[test]
    fn test_concat_and_year_tag() -> Result<(), Box<dyn std::error::Error>> {
        let a = HistoricalTable::from_records(
            &params(),
            &[HistoricalRecord::new(at(1, 0), vec![Some(1.0), Some(2.0)])],
        )?
        .with_year(2023)?;
        let b = HistoricalTable::from_records(
            &params(),
            &[HistoricalRecord::new(at(2, 0), vec![Some(3.0), None])],
        )?;
        let table = HistoricalTable::concat(&params(), vec![a, b])?;
        assert_eq!(table.len(), 2);
        assert_eq!(table.values("T2M")?, vec![Some(1.0), Some(3.0)]);
        let years: Vec<Option<i32>> = table.frame.column(YEAR)?.i32()?.into_iter().collect();
        assert_eq!(years, vec![Some(2023), Some(2024)]);

        let empty = HistoricalTable::concat(&params(), Vec::new())?;
        assert!(empty.is_empty());
        Ok(())
    }

    #[test]
    fn test_missing_column_is_reported() -> Result<(), Box<dyn std::error::Error>> {
        let table = HistoricalTable::empty(&params())?;
        let err = table.values("RH2M");
        assert!(matches!(err, Err(AggregateError::MissingColumn(c)) if c == "RH2M"));
        Ok(())
    }
}
