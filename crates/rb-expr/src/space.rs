//! Nodal function spaces and mixed-solution layouts.

use nalgebra::{DMatrix, DVector};
use rb_core::{RbError, RbResult, Real};
use std::ops::Range;

/// A space with one degree of freedom per node (Lagrange-1 style), so
/// interpolation is plain nodal evaluation.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionSpace {
    /// Node coordinates, one row per degree of freedom.
    points: DMatrix<Real>,
}

impl FunctionSpace {
    pub fn new(points: DMatrix<Real>) -> Self {
        Self { points }
    }

    /// `n` equispaced nodes on `[a, b]`.
    pub fn interval(n: usize, a: Real, b: Real) -> Self {
        let h = if n > 1 { (b - a) / (n - 1) as Real } else { 0.0 };
        Self {
            points: DMatrix::from_fn(n, 1, |i, _| a + h * i as Real),
        }
    }

    pub fn dim(&self) -> usize {
        self.points.nrows()
    }

    pub fn geometric_dim(&self) -> usize {
        self.points.ncols()
    }

    pub fn coordinate(&self, axis: usize) -> RbResult<DVector<Real>> {
        if axis >= self.geometric_dim() {
            return Err(RbError::dimension(
                "coordinate axis",
                axis + 1,
                self.geometric_dim(),
            ));
        }
        Ok(self.points.column(axis).into_owned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentSpec {
    pub name: String,
    pub range: Range<usize>,
}

/// Named sub-fields of a (possibly mixed) solution vector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentLayout {
    dim: usize,
    components: Vec<ComponentSpec>,
}

impl ComponentLayout {
    /// A single unnamed field of size `dim`.
    pub fn single(dim: usize) -> Self {
        Self {
            dim,
            components: Vec::new(),
        }
    }

    /// Consecutive blocks, e.g. `[("u", 10), ("p", 4)]`.
    pub fn mixed(blocks: &[(&str, usize)]) -> Self {
        let mut offset = 0;
        let components = blocks
            .iter()
            .map(|&(name, len)| {
                let spec = ComponentSpec {
                    name: name.to_string(),
                    range: offset..offset + len,
                };
                offset += len;
                spec
            })
            .collect();
        Self {
            dim: offset,
            components,
        }
    }

    /// Add a named view onto an arbitrary range (e.g. "u.x" inside "u").
    pub fn with_component(mut self, name: &str, range: Range<usize>) -> RbResult<Self> {
        if range.end > self.dim || range.start > range.end {
            return Err(RbError::dimension(
                format!("component {name}"),
                range.end,
                self.dim,
            ));
        }
        self.components.push(ComponentSpec {
            name: name.to_string(),
            range,
        });
        Ok(self)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn components(&self) -> &[ComponentSpec] {
        &self.components
    }

    pub fn contains(&self, name: &str) -> bool {
        self.components.iter().any(|c| c.name == name)
    }

    /// Range of a component; `None` selects the whole solution.
    pub fn range(&self, component: Option<&str>) -> Option<Range<usize>> {
        match component {
            None => Some(0..self.dim),
            Some(name) => self
                .components
                .iter()
                .find(|c| c.name == name)
                .map(|c| c.range.clone()),
        }
    }

    pub fn extract(&self, values: &DVector<Real>, component: Option<&str>) -> Option<DVector<Real>> {
        let range = self.range(component)?;
        if range.end > values.len() {
            return None;
        }
        Some(values.rows(range.start, range.len()).into_owned())
    }

    /// Copy `component` of `from` into the same range of `to`.
    pub fn assign(
        &self,
        to: &mut DVector<Real>,
        from: &DVector<Real>,
        component: Option<&str>,
    ) -> RbResult<()> {
        let range = self.range(component).ok_or_else(|| RbError::UnknownComponent {
            problem: String::from("<layout>"),
            component: component.unwrap_or_default().to_string(),
        })?;
        if range.end > to.len() || range.end > from.len() {
            return Err(RbError::dimension(
                "component assignment",
                range.end,
                to.len().min(from.len()),
            ));
        }
        to.rows_mut(range.start, range.len())
            .copy_from(&from.rows(range.start, range.len()));
        Ok(())
    }
}
