//! Broad-phase collision detection using Sweep-and-Prune (SAP).
//!
//! The broad phase reduces the O(n²) set of body pairs to the pairs whose
//! axis-aligned bounding boxes overlap. Only those are handed to the narrow
//! phase.
//!
//! # Algorithm
//!
//! Sweep-and-Prune (also known as Sort-and-Sweep) works by:
//! 1. Projecting every AABB onto a single sweep axis
//! 2. Sorting intervals by their minimum endpoint
//! 3. Sweeping through sorted intervals, confirming overlaps on all axes
//!
//! The sweep axis is the one along which body centers are most spread out.
//! Plane AABBs are unbounded and simply never end the sweep early.
//!
//! Both algorithms return pairs `(i, j)` with `i < j`, sorted, so that the
//! contact order (and therefore the simulation) does not depend on which
//! algorithm ran.
//!
//! # Example
//!
//! ```
//! use sim_core::broad_phase::{Aabb, BroadPhase, Proxy, SweepAndPrune};
//! use nalgebra::{Point3, Vector3};
//!
//! let proxies = [
//!     Proxy::dynamic(Aabb::from_center(Point3::origin(), Vector3::repeat(1.0))),
//!     Proxy::dynamic(Aabb::from_center(Point3::new(1.5, 0.0, 0.0), Vector3::repeat(1.0))),
//! ];
//!
//! let mut sap = SweepAndPrune::new();
//! assert_eq!(sap.find_potential_pairs(&proxies), vec![(0, 1)]);
//! ```

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box (AABB) for broad-phase collision detection.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner of the bounding box.
    pub min: Point3<f64>,
    /// Maximum corner of the bounding box.
    pub max: Point3<f64>,
}

impl Aabb {
    /// Create a new AABB from minimum and maximum corners.
    #[must_use]
    pub const fn new(min: Point3<f64>, max: Point3<f64>) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with the given half-extents.
    #[must_use]
    pub fn from_center(center: Point3<f64>, half_extents: Vector3<f64>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Check if this AABB overlaps with another AABB. Touching counts.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Expand this AABB by a margin on all sides.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        let margin = Vector3::repeat(margin);
        Self {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    /// Whether every bound is finite.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
    }

    /// Center of a bounded box.
    #[must_use]
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Get the minimum value along a specific axis.
    #[must_use]
    pub fn min_on_axis(&self, axis: Axis) -> f64 {
        self.min[axis.index()]
    }

    /// Get the maximum value along a specific axis.
    #[must_use]
    pub fn max_on_axis(&self, axis: Axis) -> f64 {
        self.max[axis.index()]
    }
}

/// Coordinate axis for sweep direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    /// X-axis.
    X,
    /// Y-axis (up).
    Y,
    /// Z-axis.
    Z,
}

impl Axis {
    const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// What the broad phase knows about one body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proxy {
    /// World-space bounds.
    pub aabb: Aabb,
    /// Static bodies are never paired with each other.
    pub is_static: bool,
}

impl Proxy {
    /// Proxy for a body that moves.
    #[must_use]
    pub const fn dynamic(aabb: Aabb) -> Self {
        Self {
            aabb,
            is_static: false,
        }
    }

    /// Proxy for a body that never moves.
    #[must_use]
    pub const fn fixed(aabb: Aabb) -> Self {
        Self {
            aabb,
            is_static: true,
        }
    }
}

/// Trait for broad-phase collision detection algorithms.
pub trait BroadPhase {
    /// Find all pairs of proxies that potentially collide.
    ///
    /// Returns index pairs `(i, j)` with `i < j` in ascending order. Pairs of
    /// two static proxies are never returned.
    fn find_potential_pairs(&mut self, proxies: &[Proxy]) -> Vec<(usize, usize)>;
}

/// Sweep-and-Prune (Sort-and-Sweep) broad-phase algorithm.
///
/// For temporal coherence (bodies moving slowly between frames) the sort
/// runs on nearly-sorted data and stays close to O(n).
#[derive(Debug, Clone)]
pub struct SweepAndPrune {
    /// Cached sorted intervals on the sweep axis.
    intervals: Vec<Interval>,
    /// The axis to sweep along (auto-selected based on scene extent).
    sweep_axis: Axis,
    /// Margin to add to AABBs for predictive collision detection.
    margin: f64,
}

/// An interval on the sweep axis.
#[derive(Debug, Clone, Copy)]
struct Interval {
    /// Index into the proxy slice.
    index: usize,
    /// Minimum endpoint on the sweep axis.
    min: f64,
    /// Maximum endpoint on the sweep axis.
    max: f64,
}

impl Default for SweepAndPrune {
    fn default() -> Self {
        Self::new()
    }
}

impl SweepAndPrune {
    /// Create a new sweep-and-prune broad phase.
    #[must_use]
    pub fn new() -> Self {
        Self {
            intervals: Vec::new(),
            sweep_axis: Axis::X,
            margin: 0.0,
        }
    }

    /// Create with a predictive margin for fast-moving objects.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Axis chosen by the last sweep.
    #[must_use]
    pub fn sweep_axis(&self) -> Axis {
        self.sweep_axis
    }

    /// Pick the axis with the largest spread of bounded box centers.
    fn choose_sweep_axis(proxies: &[Proxy]) -> Axis {
        let mut lo = Vector3::repeat(f64::INFINITY);
        let mut hi = Vector3::repeat(f64::NEG_INFINITY);
        let mut any = false;

        for proxy in proxies.iter().filter(|p| p.aabb.is_bounded()) {
            let center = proxy.aabb.center().coords;
            lo = lo.inf(&center);
            hi = hi.sup(&center);
            any = true;
        }
        if !any {
            return Axis::X;
        }

        let extent = hi - lo;
        if extent.x >= extent.y && extent.x >= extent.z {
            Axis::X
        } else if extent.y >= extent.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }
}

impl BroadPhase for SweepAndPrune {
    fn find_potential_pairs(&mut self, proxies: &[Proxy]) -> Vec<(usize, usize)> {
        let axis = Self::choose_sweep_axis(proxies);
        self.sweep_axis = axis;
        let margin = self.margin;
        let aabb_of = |index: usize| proxies[index].aabb.expanded(margin);

        self.intervals.clear();
        self.intervals
            .extend(proxies.iter().enumerate().map(|(index, proxy)| {
                let aabb = proxy.aabb.expanded(margin);
                Interval {
                    index,
                    min: aabb.min_on_axis(axis),
                    max: aabb.max_on_axis(axis),
                }
            }));

        self.intervals.sort_by(|a, b| a.min.total_cmp(&b.min));

        let mut pairs = Vec::new();
        for (i, first) in self.intervals.iter().enumerate() {
            for second in &self.intervals[i + 1..] {
                // Sorted by min: nothing further along can overlap `first`.
                if second.min > first.max {
                    break;
                }
                if proxies[first.index].is_static && proxies[second.index].is_static {
                    continue;
                }
                if aabb_of(first.index).overlaps(&aabb_of(second.index)) {
                    let pair = if first.index < second.index {
                        (first.index, second.index)
                    } else {
                        (second.index, first.index)
                    };
                    pairs.push(pair);
                }
            }
        }

        pairs.sort_unstable();
        pairs
    }
}

/// Simple O(n²) brute-force broad phase for small scenes.
#[derive(Debug, Clone, Default)]
pub struct BruteForce {
    /// Margin for AABB expansion.
    margin: f64,
}

impl BruteForce {
    /// Create a new brute-force broad phase.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with a predictive margin.
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }
}

impl BroadPhase for BruteForce {
    fn find_potential_pairs(&mut self, proxies: &[Proxy]) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();

        for (i, a) in proxies.iter().enumerate() {
            let aabb_a = a.aabb.expanded(self.margin);
            for (j, b) in proxies.iter().enumerate().skip(i + 1) {
                if a.is_static && b.is_static {
                    continue;
                }
                if aabb_a.overlaps(&b.aabb.expanded(self.margin)) {
                    pairs.push((i, j));
                }
            }
        }

        pairs
    }
}

/// Configuration for broad-phase collision detection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BroadPhaseConfig {
    /// Algorithm to use for broad-phase detection.
    pub algorithm: BroadPhaseAlgorithm,
    /// Margin to add to AABBs for predictive detection.
    pub margin: f64,
    /// Threshold body count below which brute force is used.
    pub brute_force_threshold: usize,
}

impl Default for BroadPhaseConfig {
    fn default() -> Self {
        Self {
            algorithm: BroadPhaseAlgorithm::Auto,
            margin: 0.0,
            brute_force_threshold: 32,
        }
    }
}

/// Broad-phase algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum BroadPhaseAlgorithm {
    /// Automatically choose based on body count.
    #[default]
    Auto,
    /// Always use brute force O(n²).
    BruteForce,
    /// Always use sweep-and-prune O(n log n).
    SweepAndPrune,
}

/// Algorithm selection wrapped behind one stable interface for the world.
#[derive(Debug, Clone)]
pub struct BroadPhaseDetector {
    config: BroadPhaseConfig,
    sap: SweepAndPrune,
    brute: BruteForce,
}

impl Default for BroadPhaseDetector {
    fn default() -> Self {
        Self::new(BroadPhaseConfig::default())
    }
}

impl BroadPhaseDetector {
    /// Create a new broad-phase detector with the given configuration.
    #[must_use]
    pub fn new(config: BroadPhaseConfig) -> Self {
        Self {
            sap: SweepAndPrune::new().with_margin(config.margin),
            brute: BruteForce::new().with_margin(config.margin),
            config,
        }
    }

    /// Find all potentially colliding pairs.
    pub fn find_potential_pairs(&mut self, proxies: &[Proxy]) -> Vec<(usize, usize)> {
        match self.config.algorithm {
            BroadPhaseAlgorithm::Auto => {
                if proxies.len() < self.config.brute_force_threshold {
                    self.brute.find_potential_pairs(proxies)
                } else {
                    self.sap.find_potential_pairs(proxies)
                }
            }
            BroadPhaseAlgorithm::BruteForce => self.brute.find_potential_pairs(proxies),
            BroadPhaseAlgorithm::SweepAndPrune => self.sap.find_potential_pairs(proxies),
        }
    }

    /// Get the current configuration.
    #[must_use]
    pub fn config(&self) -> &BroadPhaseConfig {
        &self.config
    }

    /// Update the configuration.
    pub fn set_config(&mut self, config: BroadPhaseConfig) {
        self.sap = SweepAndPrune::new().with_margin(config.margin);
        self.brute = BruteForce::new().with_margin(config.margin);
        self.config = config;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp, clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use sim_types::Pose;

    fn sphere_at(x: f64, y: f64, z: f64, radius: f64) -> Proxy {
        Proxy::dynamic(Aabb::from_center(
            Point3::new(x, y, z),
            Vector3::repeat(radius),
        ))
    }

    fn ground() -> Proxy {
        Proxy::fixed(Shape::ground().aabb(&Pose::identity()))
    }

    #[test]
    fn test_aabb_overlaps() {
        let a = Aabb::from_center(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
        let b = Aabb::from_center(Point3::new(1.5, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));
        let c = Aabb::from_center(Point3::new(5.0, 0.0, 0.0), Vector3::new(1.0, 1.0, 1.0));

        assert!(a.overlaps(&b), "a and b should overlap");
        assert!(b.overlaps(&a), "overlap should be symmetric");
        assert!(!a.overlaps(&c), "a and c should not overlap");
    }

    #[test]
    fn test_aabb_expanded() {
        let aabb = Aabb::from_center(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
        let expanded = aabb.expanded(0.5);

        assert_eq!(expanded.min.x, -1.5);
        assert_eq!(expanded.max.z, 1.5);
    }

    #[test]
    fn test_half_space_overlaps_everything_below() {
        let plane = ground().aabb;
        assert!(!plane.is_bounded());
        assert!(plane.overlaps(&sphere_at(100.0, 0.5, -40.0, 1.0).aabb));
        assert!(!plane.overlaps(&sphere_at(0.0, 1.5, 0.0, 1.0).aabb));
    }

    #[test]
    fn test_sweep_and_prune_finds_overlapping_spheres() {
        let proxies = [sphere_at(0.0, 0.0, 0.0, 1.0), sphere_at(1.5, 0.0, 0.0, 1.0)];
        let mut sap = SweepAndPrune::new();
        assert_eq!(sap.find_potential_pairs(&proxies), vec![(0, 1)]);
    }

    #[test]
    fn test_sweep_and_prune_no_overlap() {
        let proxies = [sphere_at(0.0, 0.0, 0.0, 1.0), sphere_at(5.0, 0.0, 0.0, 1.0)];
        let mut sap = SweepAndPrune::new();
        assert!(sap.find_potential_pairs(&proxies).is_empty());
    }

    #[test]
    fn test_skips_static_static() {
        let proxies = [ground(), ground()];
        assert!(SweepAndPrune::new().find_potential_pairs(&proxies).is_empty());
        assert!(BruteForce::new().find_potential_pairs(&proxies).is_empty());
    }

    #[test]
    fn test_includes_static_dynamic() {
        let proxies = [sphere_at(0.0, 0.5, 0.0, 1.0), ground()];
        let mut sap = SweepAndPrune::new();
        assert_eq!(sap.find_potential_pairs(&proxies), vec![(0, 1)]);
    }

    #[test]
    fn test_pairs_ordered_by_index() {
        // Listed so that the sweep visits index 1 before index 0.
        let proxies = [sphere_at(1.5, 0.0, 0.0, 1.0), sphere_at(0.0, 0.0, 0.0, 1.0)];
        let mut sap = SweepAndPrune::new();
        assert_eq!(sap.find_potential_pairs(&proxies), vec![(0, 1)]);
    }

    #[test]
    fn test_brute_force_matches_sap() {
        let proxies = [
            sphere_at(0.0, 0.0, 0.0, 1.0),
            sphere_at(1.5, 0.0, 0.0, 1.0),
            sphere_at(0.0, 1.5, 0.0, 1.0),
            sphere_at(5.0, 0.0, 0.0, 1.0),
            ground(),
        ];

        let sap_pairs = SweepAndPrune::new().find_potential_pairs(&proxies);
        let brute_pairs = BruteForce::new().find_potential_pairs(&proxies);

        assert_eq!(sap_pairs, brute_pairs);
        assert!(sap_pairs.contains(&(3, 4)));
    }

    #[test]
    fn test_sweep_axis_follows_spread() {
        let proxies: Vec<_> = (0..5)
            .map(|i| sphere_at(0.0, 0.0, f64::from(i) * 10.0, 1.0))
            .collect();
        let mut sap = SweepAndPrune::new();
        let _ = sap.find_potential_pairs(&proxies);
        assert_eq!(sap.sweep_axis(), Axis::Z);
    }

    #[test]
    fn test_broad_phase_detector_auto() {
        let mut detector = BroadPhaseDetector::default();

        // Chain of touching spheres: each overlaps only its neighbours.
        let small: Vec<_> = (0..10)
            .map(|i| sphere_at(f64::from(i) * 1.5, 0.0, 0.0, 1.0))
            .collect();
        assert_eq!(detector.find_potential_pairs(&small).len(), 9);

        let large: Vec<_> = (0..100)
            .map(|i| sphere_at(f64::from(i) * 1.5, 0.0, 0.0, 1.0))
            .collect();
        assert_eq!(detector.find_potential_pairs(&large).len(), 99);
    }

    #[test]
    fn test_margin_expands_detection() {
        let proxies = [sphere_at(0.0, 0.0, 0.0, 1.0), sphere_at(2.1, 0.0, 0.0, 1.0)];

        let mut sap_no_margin = SweepAndPrune::new();
        assert!(sap_no_margin.find_potential_pairs(&proxies).is_empty());

        let mut sap_with_margin = SweepAndPrune::new().with_margin(0.2);
        assert_eq!(sap_with_margin.find_potential_pairs(&proxies).len(), 1);
    }
}
