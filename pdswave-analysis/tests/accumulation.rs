#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss
)]
use approx::assert_abs_diff_eq;
use pdswave_analysis::{accumulate, Accumulator};
use pdswave_core::config::AnalysisConfig;
use pdswave_core::record::{WaveformRecord, SAMPLES_PER_WAVEFORM};
use pdswave_core::Error;

// Deterministic pseudo-random waveforms spread over every channel,
// plus a few records with invalid channels.
fn generate_records(n: usize) -> Vec<WaveformRecord> {
    let mut state: u32 = 0x1234_5678;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        state
    };

    (0..n)
        .map(|i| {
            let channel = if i % 97 == 0 { 170 } else { (next() % 160) as i32 };
            let base = 7000 + (next() % 200) as i16;
            let height = (next() % 300) as i16;
            let adc = (0..SAMPLES_PER_WAVEFORM)
                .map(|t| {
                    let noise = (next() % 7) as i16 - 3;
                    let signal = if (140..160).contains(&t) { height } else { 0 };
                    base + signal + noise
                })
                .collect();
            WaveformRecord {
                event: i as i32,
                ..WaveformRecord::from_samples(channel, adc)
            }
        })
        .collect()
}

#[test]
fn test_parallel_batch_matches_sequential() {
    let records = generate_records(600);
    let config = AnalysisConfig::default();

    let mut sequential = Accumulator::new(&config);
    for record in &records {
        sequential.process(record).unwrap();
    }

    let mut parallel = Accumulator::new(&config);
    for chunk in records.chunks(64) {
        parallel.process_batch(chunk).unwrap();
    }

    assert_eq!(sequential.histograms(), parallel.histograms());
    assert_eq!(sequential.stats(), parallel.stats());
    assert_eq!(parallel.stats().records_skipped, 7);
}

#[test]
fn test_order_does_not_change_histograms() {
    let records = generate_records(300);
    let config = AnalysisConfig::default();

    let mut forward = Accumulator::new(&config);
    forward.process_batch(&records).unwrap();

    let mut reversed_records = records.clone();
    reversed_records.reverse();
    let mut reversed = Accumulator::new(&config);
    reversed.process_batch(&reversed_records).unwrap();

    assert_eq!(forward.histograms(), reversed.histograms());
}

#[test]
fn test_split_and_merge_matches_single_pass() {
    let records = generate_records(200);
    let config = AnalysisConfig::default();

    let mut whole = Accumulator::new(&config);
    whole.process_batch(&records).unwrap();

    let (left, right) = records.split_at(77);
    let mut a = Accumulator::new(&config);
    a.process_batch(left).unwrap();
    let mut b = Accumulator::new(&config);
    b.process_batch(right).unwrap();
    a.merge(&b).unwrap();

    assert_eq!(whole.histograms(), a.histograms());
    assert_eq!(whole.stats(), a.stats());
}

#[test]
fn test_bin_counts_equal_values_per_bin() {
    let records = generate_records(400);
    let config = AnalysisConfig::default();
    let acc: Accumulator = accumulate(
        records.chunks(50).map(|c| Ok::<_, Error>(c.to_vec())),
        &config,
    )
    .unwrap();

    // Recompute charge bin counts for one channel by hand.
    let binning = config.histograms.charge;
    let mut expected = vec![0u64; binning.bins];
    for record in records.iter().filter(|r| r.offline_channel == 42) {
        let features =
            pdswave_core::extract_features(&record.adc, &config.features).unwrap();
        if let pdswave_core::Bin::Index(i) = binning.locate(features.charge as f64) {
            expected[i] += 1;
        }
    }
    let hists = acc.histograms().channel(42).unwrap();
    assert_eq!(hists.charge.counts(), expected.as_slice());
}

#[test]
fn test_accumulate_propagates_reader_errors() {
    let config = AnalysisConfig::default();
    let batches = vec![
        Ok(generate_records(5)),
        Err(Error::ConfigError("reader failed".to_string())),
    ];
    let result = accumulate(batches, &config);
    assert!(matches!(result, Err(Error::ConfigError(_))));
}

#[test]
fn test_histogram_mean_tracks_exact_mean() {
    let records = generate_records(500);
    let config = AnalysisConfig::default();
    let mut acc = Accumulator::new(&config);
    acc.process_batch(&records).unwrap();

    // Only in-range fills contribute to the mean.
    let binning = config.histograms.charge;
    let mut checked = 0;
    for (channel, hists) in acc.histograms().iter() {
        let charges: Vec<f64> = records
            .iter()
            .filter(|r| r.offline_channel == channel as i32)
            .map(|r| {
                pdswave_core::extract_features(&r.adc, &config.features)
                    .unwrap()
                    .charge as f64
            })
            .filter(|&c| (binning.low..binning.high).contains(&c))
            .collect();
        assert_eq!(hists.charge.in_range(), charges.len() as u64);
        if charges.is_empty() {
            assert!(hists.charge.mean().is_none());
            continue;
        }
        let exact = charges.iter().sum::<f64>() / charges.len() as f64;
        let half_bin = binning.width() / 2.0;
        assert_abs_diff_eq!(hists.charge.mean().unwrap(), exact, epsilon = half_bin);
        checked += 1;
    }
    assert!(checked > 0);
}
