use binnedcorr::{
    BinParams, BinType, Correlation, Metric, MetricOptions, PatchKey, PatchResult, ResultStore,
    resolve_bin_spec,
};

mod common;
use common::{TableCounter, build_store, init_logging, random_auto_results, result};

fn log_correlation(nbins: usize) -> Correlation {
    let spec = resolve_bin_spec(
        &BinParams::new(BinType::Log)
            .min_sep(1.0)
            .max_sep(100.0)
            .nbins(nbins),
    )
    .unwrap();
    Correlation::new(spec, MetricOptions::new(Metric::Euclidean), 1).unwrap()
}

#[test]
fn merge_order_is_irrelevant() {
    let entries = random_auto_results(4, 6, 1234);

    let forward = build_store(6, entries.iter());
    let backward = build_store(6, entries.iter().rev());
    assert_eq!(forward, backward);

    // merging the same key repeatedly in any grouping gives the same total
    let mut grouped = PatchResult::zeros(6);
    let mut pair = entries[0].1.clone();
    pair.merge(&entries[1].1).unwrap();
    grouped.merge(&pair).unwrap();
    for (_, r) in &entries[2..] {
        grouped.merge(r).unwrap();
    }
    let mut sequential = PatchResult::zeros(6);
    for (_, r) in entries.iter().rev() {
        sequential.merge(r).unwrap();
    }
    assert_eq!(grouped, sequential);
    assert_eq!(forward.combined_total(), sequential);
}

#[test]
fn auto_skips_empty_cross_pairs() {
    init_logging();
    let stat_len = 3;
    let mut entries = random_auto_results(3, stat_len, 7);
    // make (0, 2) and (1, 1) empty
    for (key, r) in entries.iter_mut() {
        if *key == PatchKey::new(0, 2) || *key == PatchKey::new(1, 1) {
            r.clear();
        }
    }

    let mut corr = log_correlation(stat_len);
    let mut counter = TableCounter::new(stat_len, &entries);
    corr.process_auto(3, &mut counter).unwrap();

    assert_eq!(counter.visited.len(), 6);
    assert_eq!(counter.skipped.len(), 1);
    assert_eq!(counter.skipped[0], PatchResult::zeros(stat_len));

    let keys = corr.results().sorted_keys();
    assert!(keys.contains(&PatchKey::new(1, 1)));
    assert!(!keys.contains(&PatchKey::new(0, 2)));
    assert_eq!(keys.len(), 5);
    assert_eq!(corr.combined(), &corr.results().combined_total());
}

#[test]
fn cross_with_single_patch_catalog() {
    let stat_len = 2;
    let entries = vec![
        (PatchKey::new(0, 0), result(&[1.0, 1.0], &[1.0, 1.0])),
        (PatchKey::new(1, 0), result(&[2.0, 0.0], &[2.0, 0.0])),
        (PatchKey::new(2, 0), result(&[3.0, 3.0], &[1.0, 1.0])),
    ];
    let mut corr = log_correlation(stat_len);
    let mut counter = TableCounter::new(stat_len, &entries);
    corr.process_cross(3, 1, &mut counter).unwrap();

    assert_eq!(corr.results().patch_counts().unwrap(), (3, 1));
    assert!(counter.skipped.is_empty());
    assert_eq!(corr.combined().stat(), &[6.0, 4.0]);
    assert_eq!(corr.combined().weight(), &[4.0, 2.0]);
}

#[test]
fn unpatched_runs_only_touch_combined() {
    let stat_len = 2;
    let entries = vec![(PatchKey::new(0, 0), result(&[5.0, 1.0], &[2.0, 1.0]))];
    let mut corr = log_correlation(stat_len);
    let mut counter = TableCounter::new(stat_len, &entries);

    corr.process_cross(1, 1, &mut counter).unwrap();
    corr.process_auto(1, &mut counter).unwrap();
    assert_eq!(counter.visited, vec![(0, 0), (0, 0)]);
    assert_eq!(corr.results(), &ResultStore::new(stat_len));
    assert_eq!(corr.combined().stat(), &[10.0, 2.0]);

    corr.clear();
    assert_eq!(corr.combined(), &PatchResult::zeros(stat_len));
}

#[test]
fn invalid_metric_options() {
    let spec = resolve_bin_spec(
        &BinParams::new(BinType::Linear)
            .min_sep(0.0)
            .max_sep(10.0)
            .nbins(10),
    )
    .unwrap();
    let mut opts = MetricOptions::new(Metric::Euclidean);
    opts.min_rpar = Some(-5.0);
    assert!(Correlation::new(spec.clone(), opts, 1).is_err());

    let mut opts = MetricOptions::new(Metric::Periodic);
    opts.xperiod = Some(50.0);
    opts.yperiod = Some(50.0);
    let corr = Correlation::new(spec, opts, 1).unwrap();
    let params = corr.traversal_params();
    assert_eq!(params.periods, [50.0, 50.0, 0.0]);
    // non-euclidean metrics traverse all the way to the leaves
    assert_eq!((params.min_cell_size, params.max_cell_size), (0.0, 0.0));
}
