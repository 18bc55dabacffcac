use nalgebra::{Point3, Vector3};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Atom {atom} has {count} neighbors, exceeding the limit of {max}")]
pub struct NeighborOverflow {
    pub atom: usize,
    pub count: usize,
    pub max: usize,
}

type CellKey = (i32, i32, i32);

/// Bins atoms into cubic cells so that a radius query only inspects adjacent cells.
///
/// The cell edge equals the largest radius the list will be queried with.
#[derive(Debug)]
pub struct CellList<'a> {
    positions: &'a [Point3<f32>],
    cell_size: f32,
    cells: HashMap<CellKey, Vec<usize>>,
}

impl<'a> CellList<'a> {
    pub fn new(positions: &'a [Point3<f32>], cell_size: f32) -> Self {
        let cell_size = cell_size.max(f32::EPSILON);
        let mut cells: HashMap<CellKey, Vec<usize>> = HashMap::new();
        for (i, p) in positions.iter().enumerate() {
            cells.entry(key_of(p, cell_size)).or_default().push(i);
        }
        Self {
            positions,
            cell_size,
            cells,
        }
    }

    /// Visits every unordered pair `(i, j)` with `i < j` and squared distance below
    /// `radius^2`, in ascending `(i, j)` order.
    pub fn for_each_pair_within(&self, radius: f32, mut visit: impl FnMut(usize, usize, f32)) {
        let radius_sq = radius * radius;
        let reach = (radius / self.cell_size).ceil().max(1.0) as i32;
        let mut candidates = Vec::new();

        for (i, p) in self.positions.iter().enumerate() {
            let (cx, cy, cz) = key_of(p, self.cell_size);
            candidates.clear();
            for dx in -reach..=reach {
                for dy in -reach..=reach {
                    for dz in -reach..=reach {
                        if let Some(members) = self.cells.get(&(cx + dx, cy + dy, cz + dz)) {
                            candidates.extend(members.iter().copied().filter(|&j| j > i));
                        }
                    }
                }
            }
            candidates.sort_unstable();

            for &j in &candidates {
                let d_sq = (self.positions[j] - p).norm_squared();
                if d_sq < radius_sq {
                    visit(i, j, d_sq);
                }
            }
        }
    }
}

fn key_of(p: &Point3<f32>, cell_size: f32) -> CellKey {
    (
        (p.x / cell_size).floor() as i32,
        (p.y / cell_size).floor() as i32,
        (p.z / cell_size).floor() as i32,
    )
}

/// Builds the unordered pair list for distances in `[cutoff_lower, cutoff_upper)`.
///
/// # Errors
///
/// Returns [`NeighborOverflow`] for the lowest-indexed atom whose neighbor count exceeds
/// `max_neighbors`.
pub fn build_pairs(
    positions: &[Point3<f32>],
    cutoff_lower: f32,
    cutoff_upper: f32,
    max_neighbors: usize,
) -> Result<Vec<(usize, usize)>, NeighborOverflow> {
    let lower_sq = cutoff_lower * cutoff_lower;
    let mut pairs = Vec::new();
    let mut counts = vec![0usize; positions.len()];

    CellList::new(positions, cutoff_upper).for_each_pair_within(cutoff_upper, |i, j, d_sq| {
        if d_sq >= lower_sq {
            pairs.push((i, j));
            counts[i] += 1;
            counts[j] += 1;
        }
    });

    if let Some((atom, &count)) = counts.iter().enumerate().find(|(_, c)| **c > max_neighbors) {
        return Err(NeighborOverflow {
            atom,
            count,
            max: max_neighbors,
        });
    }
    Ok(pairs)
}

/// Returns the shortest interatomic distance below `radius`, if any pair is that close.
pub fn closest_contact(positions: &[Point3<f32>], radius: f32) -> Option<f32> {
    let mut best: Option<f32> = None;
    CellList::new(positions, radius).for_each_pair_within(radius, |_, _, d_sq| {
        best = Some(best.map_or(d_sq, |b| b.min(d_sq)));
    });
    best.map(f32::sqrt)
}

/// Radius of gyration of a set of points with equal weights.
pub fn gyration_radius(positions: &[Point3<f32>]) -> f32 {
    if positions.is_empty() {
        return 0.0;
    }
    let n = positions.len() as f32;
    let centroid = positions
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords)
        / n;
    let mean_sq = positions
        .iter()
        .map(|p| (p.coords - centroid).norm_squared())
        .sum::<f32>()
        / n;
    mean_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brute_force(points: &[Point3<f32>], lower: f32, upper: f32) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for i in 0..points.len() {
            for j in (i + 1)..points.len() {
                let d = (points[j] - points[i]).norm();
                if d >= lower && d < upper {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    fn scattered_points(n: usize) -> Vec<Point3<f32>> {
        (0..n)
            .map(|i| {
                let t = i as f32;
                Point3::new(
                    (t * 1.37).sin() * 6.0,
                    (t * 0.71).cos() * 6.0,
                    (t * 0.13) - 3.0,
                )
            })
            .collect()
    }

    #[test]
    fn cell_list_matches_brute_force() {
        let points = scattered_points(60);
        let pairs = build_pairs(&points, 0.0, 5.0, 1000).unwrap();
        assert_eq!(pairs, brute_force(&points, 0.0, 5.0));
    }

    #[test]
    fn lower_cutoff_excludes_close_pairs() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.5, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        ];
        let pairs = build_pairs(&points, 1.0, 5.0, 10).unwrap();
        assert_eq!(pairs, vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn upper_cutoff_is_exclusive() {
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)];
        assert!(build_pairs(&points, 0.0, 5.0, 10).unwrap().is_empty());
    }

    #[test]
    fn overflow_reports_first_offending_atom() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
        ];
        let err = build_pairs(&points, 0.0, 5.0, 2).unwrap_err();
        assert_eq!(
            err,
            NeighborOverflow {
                atom: 0,
                count: 3,
                max: 2
            }
        );
    }

    #[test]
    fn closest_contact_finds_shortest_distance() {
        let points = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(3.0, 0.4, 0.0),
        ];
        let d = closest_contact(&points, 1.0).unwrap();
        assert!((d - 0.4).abs() < 1e-6);
        assert!(closest_contact(&points, 0.3).is_none());
    }

    #[test]
    fn gyration_radius_of_symmetric_pair() {
        let points = vec![Point3::new(-1.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        assert!((gyration_radius(&points) - 1.0).abs() < 1e-6);
        assert_eq!(gyration_radius(&[]), 0.0);
    }
}
