//! Export of diagnostic series for offline inspection.

#[cfg(feature = "csv")]
use std::collections::BTreeMap;
#[cfg(feature = "csv")]
use std::error::Error;
#[cfg(feature = "csv")]
use std::fs::File;

#[cfg(feature = "csv")]
use csv::Writer;

#[cfg(feature = "csv")]
use crate::diagnostics::DiagnosticSeries;

#[cfg(feature = "csv")]
/// Saves one chain's diagnostic series as a CSV file: an `iteration` column
/// followed by one column per statistic, in the series' name order.
pub fn save_series_csv(series: &DiagnosticSeries, filename: &str) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);

    let mut header = vec!["iteration".to_string()];
    header.extend(series.names().map(str::to_string));
    wtr.write_record(&header)?;

    for i in 0..series.num_iters() {
        let mut row = vec![i.to_string()];
        row.extend(series.iter().map(|(_, values)| values[i].to_string()));
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(feature = "csv")]
/// Saves pooled samples as a long-format CSV with columns
/// `statistic,index,value`, one row per pooled value.
pub fn save_pooled_csv(
    pooled: &BTreeMap<String, Vec<f64>>,
    filename: &str,
) -> Result<(), Box<dyn Error>> {
    let mut wtr = Writer::from_writer(File::create(filename)?);
    wtr.write_record(["statistic", "index", "value"])?;

    for (name, values) in pooled {
        for (i, value) in values.iter().enumerate() {
            wtr.write_record([name.as_str(), &i.to_string(), &value.to_string()])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
