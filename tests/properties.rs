//! Property-based tests for diversity primitives.
//!
//! These check invariants that must hold for any abundance profile rather
//! than specific reference values.
//!
//! ```bash
//! PROPTEST_CASES=10000 cargo test --test properties
//! ```

use composable_diversity::data::normalize_assignment;
use composable_diversity::prelude::*;
use composable_diversity::test::permutation_test;
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

/// A count profile with at least one observed taxon.
fn profile(max_taxa: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..500, 1..max_taxa).prop_filter("empty sample", |v| v.iter().sum::<u64>() > 0)
}

/// Two non-empty profiles over the same taxa.
fn profile_pair() -> impl Strategy<Value = (Vec<u64>, Vec<u64>)> {
    (1usize..30).prop_flat_map(|n| {
        let counts = prop::collection::vec(0u64..500, n);
        (counts.clone(), counts)
            .prop_filter("empty sample", |(x, y)| x.iter().sum::<u64>() > 0 && y.iter().sum::<u64>() > 0)
    })
}

fn p_values() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.0f64..=1.0, 1..40)
}

fn dataset(rows: &[Vec<u64>]) -> CommunityDataset {
    let n_taxa = rows[0].len();
    let taxa: Vec<String> = (0..n_taxa).map(|i| format!("t{}", i)).collect();
    let samples: Vec<String> = (0..rows.len()).map(|i| format!("S{}", i)).collect();
    let abundance = AbundanceMatrix::from_sample_rows(samples.clone(), taxa.clone(), rows).unwrap();
    let taxonomy =
        Taxonomy::from_records(taxa.into_iter().map(|t| (t, TaxonRecord::new())).collect()).unwrap();
    let metadata = Metadata::from_rows(
        vec!["g".into()],
        samples
            .into_iter()
            .map(|s| (s, vec![Variable::Categorical("x".into())]))
            .collect(),
    )
    .unwrap();
    CommunityDataset::build(abundance, taxonomy, metadata).unwrap()
}

// =============================================================================
// Alpha diversity
// =============================================================================

proptest! {
    #[test]
    fn alpha_indices_in_range(counts in profile(40)) {
        let observed = AlphaIndex::Observed.compute(&counts);
        let n_present = counts.iter().filter(|&&c| c > 0).count() as f64;
        prop_assert_eq!(observed, n_present);

        prop_assert!(AlphaIndex::Chao1.compute(&counts) >= observed);

        let shannon = AlphaIndex::Shannon.compute(&counts);
        prop_assert!(shannon >= 0.0);
        prop_assert!(shannon <= n_present.ln() + 1e-9);

        let simpson = AlphaIndex::Simpson.compute(&counts);
        prop_assert!(simpson > -1e-12 && simpson < 1.0);
        prop_assert!(AlphaIndex::InverseSimpson.compute(&counts) >= 1.0 - 1e-9);

        let pielou = AlphaIndex::Pielou.compute(&counts);
        prop_assert!((0.0..=1.0 + 1e-9).contains(&pielou));
    }

    #[test]
    fn shannon_zero_iff_single_taxon(counts in profile(30)) {
        let n_present = counts.iter().filter(|&&c| c > 0).count();
        let shannon = AlphaIndex::Shannon.compute(&counts);
        if n_present == 1 {
            prop_assert_eq!(shannon, 0.0);
        } else {
            prop_assert!(shannon > 0.0, "{} taxa gave H = {}", n_present, shannon);
        }
    }

    #[test]
    fn shannon_zero_for_any_single_taxon(count in 1u64..10_000, position in 0usize..20, width in 1usize..20) {
        let mut counts = vec![0u64; position.max(width - 1) + 1];
        counts[position] = count;
        prop_assert_eq!(AlphaIndex::Shannon.compute(&counts), 0.0);
    }

    #[test]
    fn alpha_ignores_absent_taxa(counts in profile(20), padding in 0usize..10) {
        let mut padded = counts.clone();
        padded.extend(std::iter::repeat(0).take(padding));
        for index in AlphaIndex::ALL {
            prop_assert_eq!(index.compute(&counts), index.compute(&padded));
        }
    }
}

// =============================================================================
// Beta diversity
// =============================================================================

proptest! {
    #[test]
    fn dissimilarities_symmetric_and_bounded((x, y) in profile_pair()) {
        for metric in [&BrayCurtis as &dyn Dissimilarity, &Jaccard] {
            let d = metric.dissimilarity(&x, &y);
            prop_assert!((0.0..=1.0).contains(&d), "{} = {}", metric.name(), d);
            prop_assert_eq!(d, metric.dissimilarity(&y, &x));
            prop_assert_eq!(metric.dissimilarity(&x, &x), 0.0);
        }
    }

    #[test]
    fn distance_matrix_covers_all_pairs(rows in (1usize..10).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(1u64..100, n), 2..8)
    })) {
        let ds = dataset(&rows);
        let dm = compute_distance(&ds, DistanceMethod::BrayCurtis, None).unwrap();
        let n = rows.len();
        prop_assert_eq!(dm.condensed().len(), n * (n - 1) / 2);
        for i in 0..n {
            prop_assert_eq!(dm.get(i, i), 0.0);
            for j in 0..n {
                prop_assert_eq!(dm.get(i, j), dm.get(j, i));
            }
        }
    }
}

// =============================================================================
// Filtering
// =============================================================================

proptest! {
    #[test]
    fn prune_extremes(rows in (1usize..12).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(0u64..50, n), 1..6)
    }).prop_filter("all zero", |rows| rows.iter().flatten().sum::<u64>() > 0)) {
        let ds = dataset(&rows);
        let observed_taxa = (0..rows[0].len())
            .filter(|&t| rows.iter().any(|r| r[t] > 0))
            .count();

        let kept = prune_rare_taxa(&ds, 0.0).unwrap();
        prop_assert_eq!(kept.n_taxa(), observed_taxa);
        prop_assert_eq!(kept.n_samples(), ds.n_samples());
        prop_assert!(kept.is_aligned());

        prop_assert_eq!(prune_rare_taxa(&ds, 1.0).unwrap().n_taxa(), 0);
    }

    #[test]
    fn prune_is_monotone(
        rows in prop::collection::vec(prop::collection::vec(0u64..50, 8), 1..5)
            .prop_filter("all zero", |rows| rows.iter().flatten().sum::<u64>() > 0),
        low in 0.0f64..0.5,
        step in 0.0f64..0.5,
    ) {
        let ds = dataset(&rows);
        let a = prune_rare_taxa(&ds, low).unwrap();
        let b = prune_rare_taxa(&ds, low + step).unwrap();
        prop_assert!(b.n_taxa() <= a.n_taxa());
        for id in b.taxon_ids() {
            prop_assert!(a.taxon_ids().contains(id));
        }
    }

    #[test]
    fn rank_prefix_stripped(prefix in "[a-z]", name in "[A-Z][a-z]{1,15}") {
        let raw = format!("{}__{}", prefix, name);
        prop_assert_eq!(normalize_assignment(&raw), Some(name));
    }
}

// =============================================================================
// Testing and correction
// =============================================================================

proptest! {
    #[test]
    fn adjustment_never_lowers_p(p in p_values()) {
        for method in [PAdjust::Holm, PAdjust::Bonferroni, PAdjust::BenjaminiHochberg] {
            let adjusted = adjust(&p, method);
            prop_assert_eq!(adjusted.len(), p.len());
            for (a, raw) in adjusted.iter().zip(&p) {
                prop_assert!(a >= raw, "{:?}: {} < {}", method, a, raw);
                prop_assert!(*a <= 1.0);
            }
        }
    }

    #[test]
    fn permutation_p_bounded(values in prop::collection::vec(-100.0f64..100.0, 4..20), seed in any::<u64>()) {
        let half = values.len() / 2;
        let config = PermutationConfig { n_permutations: 99, seed: Some(seed), parallel: false };
        let outcome = permutation_test(values.len(), &config, |perm| {
            let a: f64 = perm[..half].iter().map(|&i| values[i]).sum::<f64>() / half as f64;
            let b: f64 = perm[half..].iter().map(|&i| values[i]).sum::<f64>() / (values.len() - half) as f64;
            (a - b).abs()
        }).unwrap();
        prop_assert!(outcome.p_value >= 1.0 / 100.0);
        prop_assert!(outcome.p_value <= 1.0);
        prop_assert_eq!(outcome.p_value, (outcome.n_extreme + 1) as f64 / 100.0);
    }

    #[test]
    fn pcoa_reconstructs_euclidean(points in prop::collection::vec((-10.0f64..10.0, -10.0f64..10.0), 3..9)) {
        let n = points.len();
        let euclid = |i: usize, j: usize| {
            ((points[i].0 - points[j].0).powi(2) + (points[i].1 - points[j].1).powi(2)).sqrt()
        };
        let mut condensed = Vec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                condensed.push(euclid(i, j));
            }
        }
        prop_assume!(condensed.iter().any(|&d| d > 1e-3));

        let ids: Vec<String> = (0..n).map(|i| format!("S{}", i)).collect();
        let dm = DistanceMatrix::new(ids, "euclidean", condensed).unwrap();
        let max_d2 = dm.condensed().iter().fold(0.0f64, |m, d| m.max(d * d));
        let tolerance = 1e-5 * max_d2.max(1.0);
        let pc = principal_coordinates(&dm).unwrap();
        prop_assert!(pc.n_positive() <= 2);
        for i in 0..n {
            for j in (i + 1)..n {
                let d2: f64 = (0..pc.vectors.ncols())
                    .map(|a| {
                        let diff = pc.vectors[(i, a)] - pc.vectors[(j, a)];
                        pc.eigenvalues[a].signum() * diff * diff
                    })
                    .sum();
                prop_assert!((d2 - euclid(i, j).powi(2)).abs() < tolerance, "{} vs {}", d2, euclid(i, j).powi(2));
            }
        }
    }
}
