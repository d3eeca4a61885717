//! Basic procedural mesh generation routines.
use crate::error::SolveError;
use crate::mesh::refinement::refine_uniformly_repeat;
use crate::mesh::TriangleMesh2d;
use nalgebra::{convert, Point2};
use nlfem_optimize::Real;
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};

/// Largest number of triangles a [`RectangleMeshConfig`] may produce after refinement.
pub const MAX_RECTANGLE_MESH_TRIANGLES: usize = 1 << 24;

pub fn create_unit_square_uniform_tri_mesh_2d<T>(cells_per_dim: usize) -> TriangleMesh2d<T>
where
    T: Real,
{
    create_rectangular_uniform_tri_mesh_2d(T::zero(), T::one(), T::zero(), T::one(), cells_per_dim, cells_per_dim)
}

/// Generates a structured triangle mesh of the rectangle `[x_min, x_max] x [y_min, y_max]`.
///
/// The rectangle is divided into `cells_x` by `cells_y` cells, and each cell is split into two
/// counter-clockwise triangles along the diagonal from its lower-left to its upper-right corner.
/// The vertex at grid position `(i, j)` has index `j * (cells_x + 1) + i`.
pub fn create_rectangular_uniform_tri_mesh_2d<T>(
    x_min: T,
    x_max: T,
    y_min: T,
    y_max: T,
    cells_x: usize,
    cells_y: usize,
) -> TriangleMesh2d<T>
where
    T: Real,
{
    if cells_x == 0 || cells_y == 0 {
        return TriangleMesh2d::from_vertices_and_connectivity(Vec::new(), Vec::new());
    }

    let hx = (x_max - x_min) / convert(cells_x as f64);
    let hy = (y_max - y_min) / convert(cells_y as f64);
    let num_vertices_x = cells_x + 1;
    let index = |i: usize, j: usize| j * num_vertices_x + i;

    let mut vertices = Vec::with_capacity(num_vertices_x * (cells_y + 1));
    for j in 0..=cells_y {
        for i in 0..=cells_x {
            // Pin the last row/column to the exact extent to avoid round-off at the far edges
            let x = if i == cells_x { x_max } else { x_min + hx * convert(i as f64) };
            let y = if j == cells_y { y_max } else { y_min + hy * convert(j as f64) };
            vertices.push(Point2::new(x, y));
        }
    }

    let mut connectivity = Vec::with_capacity(2 * cells_x * cells_y);
    for j in 0..cells_y {
        for i in 0..cells_x {
            let v00 = index(i, j);
            let v10 = index(i + 1, j);
            let v01 = index(i, j + 1);
            let v11 = index(i + 1, j + 1);
            connectivity.push([v00, v10, v11]);
            connectivity.push([v00, v11, v01]);
        }
    }

    TriangleMesh2d::from_vertices_and_connectivity(vertices, connectivity)
}

/// Describes a rectangle mesh: the extent of the rectangle, the target cell size and the
/// number of uniform refinements applied after generating the structured mesh.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleMeshConfig<T> {
    pub x_min: T,
    pub x_max: T,
    pub y_min: T,
    pub y_max: T,
    pub cell_size: T,
    pub refinements: usize,
}

impl<T: Real> RectangleMeshConfig<T> {
    pub fn unit_square(cell_size: T) -> Self {
        Self {
            x_min: T::zero(),
            x_max: T::one(),
            y_min: T::zero(),
            y_max: T::one(),
            cell_size,
            refinements: 1,
        }
    }

    /// Parses `[x_min, x_max, y_min, y_max, cell_size]` or
    /// `[x_min, x_max, y_min, y_max, cell_size, refinements]`.
    ///
    /// Without an explicit refinement count, the mesh is refined once.
    pub fn from_slice(values: &[T]) -> Result<Self, SolveError> {
        let (refinements, extent) = match values {
            [x_min, x_max, y_min, y_max, h] => (1, [*x_min, *x_max, *y_min, *y_max, *h]),
            [x_min, x_max, y_min, y_max, h, r] => {
                let r = *r;
                if !(r >= T::zero()) || r.fract() != T::zero() {
                    return Err(SolveError::InvalidMeshConfig(format!(
                        "refinement count must be a non-negative integer, got {}",
                        r
                    )));
                }
                let refinements = r
                    .to_subset()
                    .map(|r: f64| r as usize)
                    .ok_or_else(|| SolveError::InvalidMeshConfig(format!("refinement count {} is not representable", r)))?;
                (refinements, [*x_min, *x_max, *y_min, *y_max, *h])
            }
            _ => {
                return Err(SolveError::InvalidMeshConfig(format!(
                    "expected 5 or 6 values (x_min, x_max, y_min, y_max, cell_size[, refinements]), got {}",
                    values.len()
                )))
            }
        };

        let [x_min, x_max, y_min, y_max, cell_size] = extent;
        let config = Self {
            x_min,
            x_max,
            y_min,
            y_max,
            cell_size,
            refinements,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SolveError> {
        let values = [self.x_min, self.x_max, self.y_min, self.y_max, self.cell_size];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SolveError::InvalidMeshConfig(String::from("all values must be finite")));
        }
        if !(self.x_min < self.x_max) || !(self.y_min < self.y_max) {
            return Err(SolveError::InvalidMeshConfig(format!(
                "empty rectangle [{}, {}] x [{}, {}]",
                self.x_min, self.x_max, self.y_min, self.y_max
            )));
        }
        if !(self.cell_size > T::zero()) {
            return Err(SolveError::InvalidMeshConfig(format!(
                "cell size must be positive, got {}",
                self.cell_size
            )));
        }
        self.count_triangles()?;
        Ok(())
    }

    /// Number of cells along the x and y axes before refinement.
    pub fn num_cells(&self) -> Result<(usize, usize), SolveError> {
        self.validate()?;
        self.count_cells()
    }

    /// Number of triangles in the refined mesh.
    pub fn num_triangles(&self) -> Result<usize, SolveError> {
        self.validate()?;
        self.count_triangles()
    }

    fn count_cells(&self) -> Result<(usize, usize), SolveError> {
        let cells_x = cells_for_extent(self.x_max - self.x_min, self.cell_size)?;
        let cells_y = cells_for_extent(self.y_max - self.y_min, self.cell_size)?;
        Ok((cells_x, cells_y))
    }

    /// Each refinement splits every triangle into four, so the count is
    /// `2 * cells_x * cells_y * 4^refinements`.
    fn count_triangles(&self) -> Result<usize, SolveError> {
        let (cells_x, cells_y) = self.count_cells()?;
        let too_large = || {
            SolveError::InvalidMeshConfig(format!(
                "mesh with {} x {} cells and {} refinements exceeds {} triangles",
                cells_x, cells_y, self.refinements, MAX_RECTANGLE_MESH_TRIANGLES
            ))
        };
        let refinements = u32::try_from(self.refinements).map_err(|_| too_large())?;
        let triangles = cells_x
            .checked_mul(cells_y)
            .and_then(|cells| cells.checked_mul(2))
            .and_then(|triangles| {
                4usize
                    .checked_pow(refinements)
                    .and_then(|factor| triangles.checked_mul(factor))
            })
            .filter(|&triangles| triangles <= MAX_RECTANGLE_MESH_TRIANGLES)
            .ok_or_else(too_large)?;
        Ok(triangles)
    }

    pub fn build(&self) -> Result<TriangleMesh2d<T>, SolveError> {
        let (cells_x, cells_y) = self.num_cells()?;
        let mesh = create_rectangular_uniform_tri_mesh_2d(self.x_min, self.x_max, self.y_min, self.y_max, cells_x, cells_y);
        Ok(refine_uniformly_repeat(&mesh, self.refinements))
    }
}

/// Smallest number of cells of size at most `cell_size` covering `extent`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
fn cells_for_extent<T: Real>(extent: T, cell_size: T) -> Result<usize, SolveError> {
    // Tolerate round-off so that e.g. 1.0 / 0.1 gives 10 cells rather than 11
    let cells = (extent / cell_size - 1e-9).ceil().max(1.0);
    cells
        .to_subset()
        .filter(|c: &f64| *c <= u32::MAX as f64)
        .map(|c| c as usize)
        .ok_or_else(|| SolveError::InvalidMeshConfig(format!("cell size {} is too small", cell_size)))
}
