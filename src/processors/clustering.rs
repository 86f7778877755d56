//! Greedy label-and-distance clustering of labeled point clouds.
//!
//! Points are visited once, in file order. Each labeled point is compared
//! against the *current* center of every cluster built so far and appended
//! to every cluster of the same class whose center is strictly closer than
//! the distance threshold. A point matching no cluster seeds a new one.
//! Background points (label 0) are skipped.
//!
//! Because centers move as points are added, the result depends on the
//! input order, and a point may land in more than one cluster.
//!
//! # Example
//!
//! ```
//! use pcd_label_centers::config::ClusteringConfig;
//! use pcd_label_centers::core::loaders::parse_pcd;
//! use pcd_label_centers::processors::clustering::cluster_points;
//!
//! let table = parse_pcd("FIELDS x y z label\nDATA ascii\n0 0 0 1\n0.1 0 0 1\n").unwrap();
//! let clusters = cluster_points(&table, &ClusteringConfig::default()).unwrap();
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters[0].len(), 2);
//! ```

use std::collections::BTreeMap;

use crate::config::ClusteringConfig;
use crate::core::loaders::{Point, PointTable, SchemaError};

/// Spatial part (x, y, z) of a point.
#[inline]
fn xyz(point: &[f64]) -> [f64; 3] {
    [point[0], point[1], point[2]]
}

/// Euclidean distance between two positions.
#[inline]
pub fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// A same-class group of points with a running centroid.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    class: i64,
    points: Vec<Point>,
    center: [f64; 3],
}

impl Cluster {
    /// Seed a cluster with its first point.
    ///
    /// The class is the point's label truncated toward zero and never changes.
    pub fn new(point: Point, label_index: usize) -> Self {
        let class = point[label_index] as i64;
        let center = xyz(&point);
        Self {
            class,
            points: vec![point],
            center,
        }
    }

    /// Append a point and recompute the center.
    pub fn add(&mut self, point: Point) {
        self.points.push(point);
        self.recompute_center();
    }

    fn recompute_center(&mut self) {
        let mut sum = [0.0f64; 3];
        for point in &self.points {
            sum[0] += point[0];
            sum[1] += point[1];
            sum[2] += point[2];
        }
        let n = self.points.len() as f64;
        self.center = [sum[0] / n, sum[1] / n, sum[2] / n];
    }

    /// Whether a point with this label and position may join.
    ///
    /// The raw label is compared with the integer class, so a non-integral
    /// label never joins an existing cluster.
    #[inline]
    pub fn accepts(&self, label: f64, position: &[f64; 3], threshold: f64) -> bool {
        label == self.class as f64 && distance(position, &self.center) < threshold
    }

    #[inline]
    pub fn class(&self) -> i64 {
        self.class
    }

    /// Mean x, y, z of all members.
    #[inline]
    pub fn center(&self) -> [f64; 3] {
        self.center
    }

    #[inline]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Number of member points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Cluster the labeled points of a table.
///
/// # Algorithm
///
/// For each point in input order whose label is not the background label:
/// 1. Measure its x/y/z distance to the current center of every cluster
/// 2. Add it to *every* cluster of the same class closer than
///    `config.distance_threshold` (strict)
/// 3. If none matched, start a new cluster with it
///
/// # Returns
///
/// Clusters in creation order.
///
/// # Errors
///
/// Returns a [`SchemaError`] if the fields do not start with `x y z` or no
/// field is named `label`.
pub fn cluster_points(
    table: &PointTable,
    config: &ClusteringConfig,
) -> Result<Vec<Cluster>, SchemaError> {
    let label_index = table.label_index()?;
    let background = config.background_label as f64;

    let mut clusters: Vec<Cluster> = Vec::new();

    for point in table.points() {
        let label = point[label_index];
        if label == background {
            continue;
        }

        let position = xyz(point);
        let mut matched = false;
        for cluster in clusters.iter_mut() {
            if cluster.accepts(label, &position, config.distance_threshold) {
                cluster.add(point.clone());
                matched = true;
            }
        }

        if !matched {
            clusters.push(Cluster::new(point.clone(), label_index));
        }
    }

    Ok(clusters)
}

/// Counts describing one clustering run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusteringSummary {
    /// Points in the input table.
    pub points: usize,
    /// Points skipped as background.
    pub background_points: usize,
    /// Clusters produced.
    pub clusters: usize,
    /// Point-to-cluster assignments; exceeds the labeled point count when a
    /// point joined several clusters.
    pub assignments: usize,
    /// Clusters per class.
    pub clusters_per_class: BTreeMap<i64, usize>,
}

/// Summarize a run of [`cluster_points`] over `table`.
pub fn summarize(
    table: &PointTable,
    clusters: &[Cluster],
    config: &ClusteringConfig,
) -> ClusteringSummary {
    let background = config.background_label as f64;
    let background_points = table.label_index().map_or(0, |idx| {
        table
            .points()
            .iter()
            .filter(|p| p[idx] == background)
            .count()
    });

    let mut clusters_per_class = BTreeMap::new();
    for cluster in clusters {
        *clusters_per_class.entry(cluster.class()).or_insert(0) += 1;
    }

    ClusteringSummary {
        points: table.len(),
        background_points,
        clusters: clusters.len(),
        assignments: clusters.iter().map(Cluster::len).sum(),
        clusters_per_class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(points: &[[f64; 4]]) -> PointTable {
        let fields = ["x", "y", "z", "label"].map(String::from).to_vec();
        PointTable::new(fields, points.iter().map(|p| p.to_vec()).collect()).unwrap()
    }

    fn run(points: &[[f64; 4]]) -> Vec<Cluster> {
        cluster_points(&table(points), &ClusteringConfig::default()).unwrap()
    }

    fn assert_close(actual: [f64; 3], expected: [f64; 3]) {
        for i in 0..3 {
            assert!(
                (actual[i] - expected[i]).abs() < 1e-9,
                "{actual:?} != {expected:?}"
            );
        }
    }

    /// Deterministic pseudo-random cloud: coordinates in [0, 2), labels 0..=3.
    fn generated_cloud(n: usize, seed: u64) -> Vec<[f64; 4]> {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64
        };
        (0..n)
            .map(|_| {
                let x = next() * 2.0;
                let y = next() * 2.0;
                let z = next() * 2.0;
                let label = (next() * 4.0).floor();
                [x, y, z, label]
            })
            .collect()
    }

    #[test]
    fn test_five_point_example() {
        let clusters = run(&[
            [0.0, 0.0, 0.0, 1.0],
            [0.1, 0.0, 0.0, 1.0],
            [5.0, 5.0, 5.0, 1.0],
            [0.0, 0.0, 0.0, 0.0],
            [0.2, 0.0, 0.0, 2.0],
        ]);

        assert_eq!(clusters.len(), 3);

        assert_eq!(clusters[0].class(), 1);
        assert_eq!(clusters[0].len(), 2);
        assert_close(clusters[0].center(), [0.05, 0.0, 0.0]);

        assert_eq!(clusters[1].class(), 1);
        assert_eq!(clusters[1].len(), 1);
        assert_close(clusters[1].center(), [5.0, 5.0, 5.0]);

        assert_eq!(clusters[2].class(), 2);
        assert_eq!(clusters[2].len(), 1);
        assert_close(clusters[2].center(), [0.2, 0.0, 0.0]);

        for cluster in &clusters {
            assert!(cluster.points().iter().all(|p| p[3] != 0.0));
        }
    }

    #[test]
    fn test_threshold_is_strict() {
        let clusters = run(&[[0.0, 0.0, 0.0, 1.0], [0.5, 0.0, 0.0, 1.0]]);
        assert_eq!(clusters.len(), 2);

        let clusters = run(&[[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.49, 1.0]]);
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_different_classes_never_merge() {
        let clusters = run(&[[0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 2.0]]);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].class(), 1);
        assert_eq!(clusters[1].class(), 2);
    }

    #[test]
    fn test_point_joins_every_matching_cluster() {
        let clusters = run(&[
            [0.0, 0.0, 0.0, 1.0],
            [0.6, 0.0, 0.0, 1.0],
            [0.3, 0.0, 0.0, 1.0],
        ]);

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 2);
        assert_eq!(clusters[1].len(), 2);
        assert_close(clusters[0].center(), [0.15, 0.0, 0.0]);
        assert_close(clusters[1].center(), [0.45, 0.0, 0.0]);
    }

    #[test]
    fn test_result_depends_on_input_order() {
        let in_line = run(&[
            [0.0, 0.0, 0.0, 1.0],
            [0.3, 0.0, 0.0, 1.0],
            [0.6, 0.0, 0.0, 1.0],
        ]);
        assert_eq!(in_line.len(), 1);
        assert_eq!(in_line[0].len(), 3);
        assert_close(in_line[0].center(), [0.3, 0.0, 0.0]);

        let middle_last = run(&[
            [0.0, 0.0, 0.0, 1.0],
            [0.6, 0.0, 0.0, 1.0],
            [0.3, 0.0, 0.0, 1.0],
        ]);
        assert_eq!(middle_last.len(), 2);
    }

    #[test]
    fn test_moving_center_captures_later_points() {
        // 0.8 is out of reach of the seed point, but the center has moved
        // to 0.3375 by the time it is visited.
        let clusters = run(&[
            [0.0, 0.0, 0.0, 3.0],
            [0.45, 0.0, 0.0, 3.0],
            [0.45, 0.0, 0.0, 3.0],
            [0.45, 0.0, 0.0, 3.0],
            [0.8, 0.0, 0.0, 3.0],
        ]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 5);
    }

    #[test]
    fn test_background_only_yields_no_clusters() {
        let clusters = run(&[[0.0, 0.0, 0.0, 0.0], [1.0, 1.0, 1.0, -0.0]]);
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_empty_table() {
        assert!(run(&[]).is_empty());
    }

    #[test]
    fn test_non_integral_label_never_joins() {
        let clusters = run(&[[0.0, 0.0, 0.0, 1.5], [0.0, 0.0, 0.0, 1.5]]);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].class(), 1);
    }

    #[test]
    fn test_label_field_located_by_name() {
        let fields = ["x", "y", "z", "label", "intensity"]
            .map(String::from)
            .to_vec();
        let table = PointTable::new(
            fields,
            vec![
                vec![0.0, 0.0, 0.0, 4.0, 100.0],
                vec![0.1, 0.0, 0.0, 4.0, 0.0],
            ],
        )
        .unwrap();
        let clusters = cluster_points(&table, &ClusteringConfig::default()).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].class(), 4);
    }

    #[test]
    fn test_schema_errors() {
        let config = ClusteringConfig::default();

        let no_label = PointTable::new(["x", "y", "z"].map(String::from).to_vec(), vec![]).unwrap();
        assert!(matches!(
            cluster_points(&no_label, &config),
            Err(SchemaError::MissingLabel { .. })
        ));

        let bad_prefix =
            PointTable::new(["label", "x", "y", "z"].map(String::from).to_vec(), vec![]).unwrap();
        assert!(matches!(
            cluster_points(&bad_prefix, &config),
            Err(SchemaError::CoordinateFields { .. })
        ));
    }

    #[test]
    fn test_custom_config() {
        let config = ClusteringConfig {
            distance_threshold: 2.0,
            background_label: 7,
        };
        let table = table(&[
            [0.0, 0.0, 0.0, 1.0],
            [1.5, 0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0, 7.0],
            [0.0, 0.0, 0.0, 0.0],
        ]);
        let clusters = cluster_points(&table, &config).unwrap();

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].len(), 2);
        assert_eq!(clusters[1].class(), 0);
    }

    #[test]
    fn test_generated_clouds_hold_invariants() {
        let config = ClusteringConfig::default();

        for seed in 1..=8u64 {
            let mut cloud = generated_cloud(200, seed);
            for ordering in 0..3 {
                match ordering {
                    1 => cloud.reverse(),
                    2 => cloud.rotate_left(37),
                    _ => {}
                }
                let table = table(&cloud);
                let clusters = cluster_points(&table, &config).unwrap();

                for cluster in &clusters {
                    // no background members and no background class
                    assert_ne!(cluster.class(), 0);
                    assert!(cluster.points().iter().all(|p| p[3] != 0.0));
                    assert!(cluster.points().iter().all(|p| p[3] as i64 == cluster.class()));

                    // center is the mean of exactly the members
                    let n = cluster.len() as f64;
                    let mut mean = [0.0; 3];
                    for p in cluster.points() {
                        mean[0] += p[0];
                        mean[1] += p[1];
                        mean[2] += p[2];
                    }
                    assert_close(cluster.center(), [mean[0] / n, mean[1] / n, mean[2] / n]);
                }

                let labeled = cloud.iter().filter(|p| p[3] != 0.0).count();
                let summary = summarize(&table, &clusters, &config);
                assert_eq!(summary.background_points, cloud.len() - labeled);
                assert!(summary.assignments >= labeled);
                assert_eq!(summary.clusters, clusters.len());
            }
        }
    }

    #[test]
    fn test_summarize() {
        let table = table(&[
            [0.0, 0.0, 0.0, 1.0],
            [0.6, 0.0, 0.0, 1.0],
            [0.3, 0.0, 0.0, 1.0],
            [9.0, 9.0, 9.0, 2.0],
            [1.0, 1.0, 1.0, 0.0],
        ]);
        let config = ClusteringConfig::default();
        let clusters = cluster_points(&table, &config).unwrap();
        let summary = summarize(&table, &clusters, &config);

        assert_eq!(summary.points, 5);
        assert_eq!(summary.background_points, 1);
        assert_eq!(summary.clusters, 3);
        assert_eq!(summary.assignments, 5);
        assert_eq!(summary.clusters_per_class.get(&1), Some(&2));
        assert_eq!(summary.clusters_per_class.get(&2), Some(&1));
    }

    #[test]
    fn test_distance() {
        assert_eq!(distance(&[0.0, 0.0, 0.0], &[3.0, 4.0, 0.0]), 5.0);
        assert_eq!(distance(&[1.0, 1.0, 1.0], &[1.0, 1.0, 1.0]), 0.0);
    }
}
