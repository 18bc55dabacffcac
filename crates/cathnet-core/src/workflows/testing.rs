//! Synthetic domain files for tests that exercise the whole pipeline.

use crate::core::geometry::neighbors::gyration_radius;
use crate::core::io::container::DomainContainer;
use crate::core::io::traits::SourceFile;
use crate::core::models::domain::{DomainRecord, ReplicaRecord, TemperatureRecord};
use crate::data::provision::domain_path;
use nalgebra::Point3;
use std::path::{Path, PathBuf};

const BASE: [[f32; 3]; 6] = [
    [0.0, 0.0, 0.0],
    [1.4, 0.0, 0.0],
    [2.1, 1.2, 0.0],
    [1.4, 2.4, 0.3],
    [0.0, 2.4, 0.0],
    [-0.7, 1.2, 0.2],
];
const ELEMENTS: [u8; 6] = [6, 6, 7, 6, 8, 1];
const SPRING: f32 = 10.0;

fn distance(a: &[f32], b: &[f32]) -> f32 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
}

/// A harmonic six-atom molecule vibrating around a fixed geometry: coordinates, exact
/// forces and energy of one frame.
pub fn synthetic_frame(phase: f32, frame: usize) -> (Vec<f32>, Vec<f32>, f32) {
    let mut coords = Vec::with_capacity(3 * BASE.len());
    for (a, base) in BASE.iter().enumerate() {
        for (c, x) in base.iter().enumerate() {
            let angle = 0.37 * frame as f32 + 1.3 * a as f32 + 2.1 * c as f32 + phase;
            coords.push(x + 0.1 * angle.sin());
        }
    }

    let mut forces = vec![0.0; coords.len()];
    let mut energy = 0.0;
    for i in 0..BASE.len() {
        for j in i + 1..BASE.len() {
            let rest = distance(&BASE[i], &BASE[j]);
            let d = distance(&coords[3 * j..3 * j + 3], &coords[3 * i..3 * i + 3]);
            energy += 0.5 * SPRING * (d - rest).powi(2);
            let g = SPRING * (d - rest) / d;
            for c in 0..3 {
                let component = g * (coords[3 * j + c] - coords[3 * i + c]);
                forces[3 * j + c] -= component;
                forces[3 * i + c] += component;
            }
        }
    }
    (coords, forces, energy)
}

/// Writes a one-replica domain file under `dir` and returns its path.
///
/// The first `num_invalid` frames are broken on purpose: even ones get a NaN energy and
/// odd ones a clash between the first two atoms.
pub fn write_synthetic_domain(
    dir: &Path,
    domain: &str,
    kelvin: u32,
    num_frames: usize,
    num_invalid: usize,
) -> PathBuf {
    let phase = domain.bytes().map(f32::from).sum::<f32>() * 0.01;
    let mut coords = Vec::new();
    let mut forces = Vec::new();
    let mut energies = Vec::new();
    let mut min_rg = f32::INFINITY;
    let mut max_rg = 0.0f32;

    for frame in 0..num_frames {
        let (mut c, f, mut e) = synthetic_frame(phase, frame);
        if frame < num_invalid {
            if frame % 2 == 0 {
                e = f32::NAN;
            } else {
                c[3] = c[0] + 0.1;
                c[4] = c[1];
                c[5] = c[2];
            }
        }
        let positions: Vec<Point3<f32>> = c
            .chunks_exact(3)
            .map(|p| Point3::new(p[0], p[1], p[2]))
            .collect();
        let rg = gyration_radius(&positions);
        min_rg = min_rg.min(rg);
        max_rg = max_rg.max(rg);
        coords.extend(c);
        forces.extend(f);
        energies.push(e);
    }

    let record = DomainRecord {
        domain_id: domain.to_string(),
        atomic_numbers: ELEMENTS.to_vec(),
        num_residues: 1,
        num_chains: 1,
        temperatures: vec![TemperatureRecord {
            kelvin,
            replicas: vec![ReplicaRecord {
                replica: 0,
                num_frames: num_frames as u32,
                coords,
                forces,
                energies,
                min_gyration_radius: min_rg,
                max_gyration_radius: max_rg,
                alpha: 0.0,
                beta: 0.0,
                coil: 1.0,
                max_num_neighbors_5a: (ELEMENTS.len() - 1) as u32,
                max_num_neighbors_9a: (ELEMENTS.len() - 1) as u32,
            }],
        }],
    };

    let path = domain_path(dir, domain);
    DomainContainer::write_to_path(&record, &path).expect("synthetic domain is writable");
    path
}

#[test]
fn synthetic_forces_are_the_negative_energy_gradient() {
    let (coords, forces, _) = synthetic_frame(0.3, 4);
    let h = 1e-3f32;
    for k in [0, 5, 13] {
        let energy_at = |delta: f32| {
            let mut shifted = coords.clone();
            shifted[k] += delta;
            let mut e = 0.0f64;
            for i in 0..BASE.len() {
                for j in i + 1..BASE.len() {
                    let rest = distance(&BASE[i], &BASE[j]) as f64;
                    let d = distance(&shifted[3 * j..3 * j + 3], &shifted[3 * i..3 * i + 3]) as f64;
                    e += 0.5 * SPRING as f64 * (d - rest).powi(2);
                }
            }
            e
        };
        let numeric = -(energy_at(h) - energy_at(-h)) / (2.0 * h as f64);
        assert!((numeric - forces[k] as f64).abs() < 5e-2);
    }
}
