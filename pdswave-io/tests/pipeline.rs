//! Table in, histograms out: reading in batches must not change the result.
#![cfg(feature = "hdf5")]

use pdswave_analysis::{accumulate, Accumulator};
use pdswave_core::channel_map::ChannelMap;
use pdswave_core::config::AnalysisConfig;
use pdswave_core::record::{WaveformRecord, SAMPLES_PER_WAVEFORM};
use pdswave_io::{
    read_results_hdf5, results_path, write_results_hdf5, write_waveform_table, RecordBatches,
    RecordSource, WaveformTableReader,
};
use tempfile::TempDir;

fn records() -> Vec<WaveformRecord> {
    (0..120)
        .map(|i: i32| {
            let level = 7000 + i16::try_from(i % 11).unwrap();
            let mut adc = vec![level; SAMPLES_PER_WAVEFORM];
            for (t, s) in adc.iter_mut().enumerate().skip(130).take(50) {
                *s += i16::try_from((t * 3 + usize::try_from(i).unwrap()) % 90).unwrap();
            }
            let mut r = WaveformRecord::from_samples((i * 7) % 160, adc);
            r.event = i;
            r
        })
        .collect()
}

#[test]
fn test_batch_size_does_not_change_histograms() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("table.h5");
    let written = records();
    write_waveform_table(&input, &written).unwrap();

    let config = AnalysisConfig::default();
    let mut direct = Accumulator::new(&config);
    for r in &written {
        direct.process(r).unwrap();
    }

    let reader = WaveformTableReader::open(&input).unwrap();
    assert_eq!(reader.len(), written.len());
    for batch_size in [1, 7, 64, 1000] {
        let acc = accumulate(RecordBatches::new(&reader, batch_size), &config).unwrap();
        assert_eq!(acc.histograms(), direct.histograms(), "batch size {batch_size}");
        assert_eq!(acc.stats(), direct.stats());
    }
}

#[test]
fn test_results_file_matches_accumulated_histograms() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("table.h5");
    write_waveform_table(&input, &records()).unwrap();

    let config = AnalysisConfig::default().with_batch_size(32);
    let reader = WaveformTableReader::open(&input).unwrap();
    let acc = accumulate(RecordBatches::new(&reader, config.batch_size), &config).unwrap();

    let path = results_path(dir.path(), 12);
    write_results_hdf5(&path, 12, acc.histograms(), &ChannelMap::new()).unwrap();
    let stored = read_results_hdf5(&path).unwrap();

    for (channel, hists) in acc.histograms().iter() {
        match stored.charge.get(&channel) {
            Some(s) => assert_eq!(s.histogram, hists.charge),
            None => assert!(hists.charge.is_empty()),
        }
        match stored.persistence.get(&channel) {
            Some(s) => assert_eq!(s.histogram, hists.persistence),
            None => assert!(hists.persistence.is_empty()),
        }
    }
    assert!(!stored.charge.is_empty());
}
