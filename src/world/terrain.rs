//! Terrain height map and population density fields.
//!
//! Both fields are row-major grids sampled at rounded map positions: the cell
//! for `(x, y)` is `data[round(y) * width + round(x)]`. A height of zero marks
//! water; a density of zero marks uninhabitable land.

use bevy::prelude::*;
use noise::{NoiseFn, Perlin};
use rand::{rngs::StdRng, Rng, SeedableRng};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FieldError {
    #[error("field data has {actual} cells, expected {width}x{height}")]
    DimensionMismatch {
        width: usize,
        height: usize,
        actual: usize,
    },
    #[error("field rows have uneven lengths")]
    RaggedRows,
}

/// A read-only scalar grid.
#[derive(Clone, Debug, PartialEq)]
pub struct ScalarField {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

/// Terrain elevation; `0.0` is water.
pub type HeightMap = ScalarField;

/// Normalized population density; `0.0` is uninhabitable.
pub type PopulationMap = ScalarField;

impl ScalarField {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Result<Self, FieldError> {
        if data.len() != width * height {
            return Err(FieldError::DimensionMismatch {
                width,
                height,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A field with every cell set to `value`.
    pub fn filled(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Build a field by evaluating `f(x, y)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> f32) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Build a field from `rows[y][x]`.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, FieldError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != width) {
            return Err(FieldError::RaggedRows);
        }
        Ok(Self {
            width,
            height,
            data: rows.concat(),
        })
    }

    /// Cell coordinates for a map position, if inside the grid.
    pub fn cell(&self, position: Vec2) -> Option<(usize, usize)> {
        let x = position.x.round();
        let y = position.y.round();
        if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
            return None;
        }
        Some((x as usize, y as usize))
    }

    pub fn contains(&self, position: Vec2) -> bool {
        self.cell(position).is_some()
    }

    /// Value at the rounded position, `None` outside the grid.
    pub fn value_at(&self, position: Vec2) -> Option<f32> {
        self.cell(position).map(|(x, y)| self.data[y * self.width + x])
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    /// Water test for height maps; positions outside the grid count as water.
    pub fn is_water(&self, position: Vec2) -> bool {
        self.value_at(position).map_or(true, |h| h == 0.0)
    }

    /// Generate terrain using octave Perlin noise, flattening everything below
    /// `water_threshold` (a fraction of the value range) to zero.
    pub fn generate(
        width: usize,
        height: usize,
        seed: u32,
        scale: f64,
        octaves: u32,
        exponent: f32,
        water_threshold: f32,
    ) -> Self {
        let perlin = Perlin::new(seed);
        let mut rng = StdRng::seed_from_u64(seed as u64);
        let origin = [rng.gen_range(-500.0..500.0), rng.gen_range(-500.0..500.0)];

        let mut field = Self::from_fn(width, height, |x, y| {
            let nx = origin[0] + x as f64 / width as f64 * scale;
            let ny = origin[1] + y as f64 / height as f64 * scale;

            let mut value = 0.0;
            let mut normalizer = 0.0;
            for k in 0..octaves {
                let frequency = 2f64.powi(k as i32);
                let amplitude = 1.0 / frequency;
                normalizer += amplitude;
                // Normalize each octave to 0-1 range.
                value += amplitude * ((perlin.get([nx * frequency, ny * frequency]) + 1.0) * 0.5).clamp(0.0, 1.0);
            }
            ((value / normalizer) as f32).powf(exponent)
        });

        let min = field.data.iter().copied().fold(f32::MAX, f32::min);
        let max = field.data.iter().copied().fold(f32::MIN, f32::max);
        let threshold = water_threshold * (max - min);
        for value in &mut field.data {
            *value = (*value - min - threshold).max(0.0);
        }
        field
    }
}

/// Search for a city centre: a land cell whose `radius` neighborhood stays
/// within `slope_threshold` of the centre height and holds at most
/// `water_ratio` water cells.
pub fn find_city_centre(
    heightmap: &HeightMap,
    radius: usize,
    slope_threshold: f32,
    water_ratio: f32,
    boundary_scale: f32,
    rng: &mut impl Rng,
    attempts: usize,
) -> Option<Vec2> {
    let w = heightmap.width as f32 - 1.0;
    let h = heightmap.height as f32 - 1.0;
    let max_water = ((radius * 2) as f32).powi(2) * water_ratio;

    for _ in 0..attempts {
        let x = (w * boundary_scale * rng.gen::<f32>() + w * (1.0 - boundary_scale) / 2.0).round();
        let y = (h * boundary_scale * rng.gen::<f32>() + h * (1.0 - boundary_scale) / 2.0).round();
        let centre = Vec2::new(x, y);
        if is_city_centre_valid(heightmap, centre, radius as i32, slope_threshold, max_water) {
            return Some(centre);
        }
    }
    None
}

fn is_city_centre_valid(
    heightmap: &HeightMap,
    centre: Vec2,
    radius: i32,
    slope_threshold: f32,
    max_water: f32,
) -> bool {
    let centre_value = match heightmap.value_at(centre) {
        Some(v) if v > 0.0 => v,
        _ => return false,
    };

    let mut water = 0;
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let Some(value) = heightmap.value_at(centre + Vec2::new(dx as f32, dy as f32)) else {
                return false;
            };
            if value == 0.0 {
                water += 1;
            } else if (value - centre_value).abs() > slope_threshold {
                return false;
            }
        }
    }
    water as f32 <= max_water
}

impl PopulationMap {
    /// Radial density around `centre`, modulated by Perlin noise and zeroed on
    /// water and beyond `radius`.
    pub fn around_centre(heightmap: &HeightMap, centre: Vec2, radius: f32, seed: u32, noise_scale: f64) -> Self {
        let perlin = Perlin::new(seed.wrapping_add(1));
        Self::from_fn(heightmap.width, heightmap.height, |x, y| {
            if heightmap.get(x, y) == 0.0 {
                return 0.0;
            }
            let distance = centre.distance(Vec2::new(x as f32, y as f32));
            let falloff = (1.0 - distance / radius).clamp(0.0, 1.0);
            if falloff == 0.0 {
                return 0.0;
            }
            let n = perlin.get([x as f64 * noise_scale, y as f64 * noise_scale]);
            let variation = 0.7 + 0.3 * ((n as f32 + 1.0) * 0.5);
            (falloff * variation).clamp(0.0, 1.0)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_at_rounds_and_respects_bounds() {
        let field = ScalarField::from_fn(4, 3, |x, y| (y * 10 + x) as f32);
        assert_eq!(field.value_at(Vec2::new(1.2, 1.8)), Some(21.0));
        assert_eq!(field.value_at(Vec2::new(3.4, 2.0)), Some(23.0));
        assert_eq!(field.value_at(Vec2::new(3.6, 0.0)), None);
        assert_eq!(field.value_at(Vec2::new(-0.6, 0.0)), None);
    }

    #[test]
    fn new_rejects_mismatched_dimensions() {
        let err = ScalarField::new(3, 3, vec![0.0; 8]).unwrap_err();
        assert_eq!(
            err,
            FieldError::DimensionMismatch {
                width: 3,
                height: 3,
                actual: 8
            }
        );
        assert_eq!(
            ScalarField::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err(),
            FieldError::RaggedRows
        );
    }

    #[test]
    fn generated_terrain_has_water_and_land() {
        let map = HeightMap::generate(64, 64, 7, 4.0, 4, 2.0, 0.2);
        assert!(map.data.iter().all(|h| *h >= 0.0));
        assert!(map.data.iter().any(|h| *h == 0.0));
        assert!(map.data.iter().any(|h| *h > 0.0));
    }

    #[test]
    fn population_is_zero_on_water_and_outside_radius() {
        let mut heightmap = HeightMap::filled(40, 40, 1.0);
        heightmap.set(20, 21, 0.0);
        let centre = Vec2::new(20.0, 20.0);
        let population = PopulationMap::around_centre(&heightmap, centre, 10.0, 3, 0.1);

        assert_eq!(population.get(20, 21), 0.0);
        assert_eq!(population.get(0, 0), 0.0);
        assert!(population.get(20, 20) > 0.5);
    }

    #[test]
    fn city_centre_avoids_water() {
        let heightmap = HeightMap::from_fn(50, 50, |x, _| if x < 25 { 0.0 } else { 1.0 });
        let mut rng = StdRng::seed_from_u64(9);
        let centre = find_city_centre(&heightmap, 3, 0.1, 0.0, 0.8, &mut rng, 500)
            .expect("land half should host a centre");
        assert!(centre.x >= 28.0);
    }
}
