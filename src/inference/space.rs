//! The search grid: named dimensions and their Cartesian product.

use serde::{Deserialize, Serialize};

use crate::{
    Error, Result,
    priors::PriorSet,
    types::{ParamValue, Parameters},
};

/// One searched parameter and its candidate values, in prior order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub values: Vec<ParamValue>,
}

/// Ordered dimensions whose Cartesian product is the search grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationSpace {
    dimensions: Vec<Dimension>,
}

impl OptimizationSpace {
    /// # Errors
    ///
    /// Returns [`Error::EmptySearchSpace`] if any dimension has no values.
    pub fn new(dimensions: Vec<Dimension>) -> Result<Self> {
        if let Some(empty) = dimensions.iter().find(|dimension| dimension.values.is_empty()) {
            return Err(Error::EmptySearchSpace {
                dimension: empty.name.clone(),
            });
        }
        Ok(Self { dimensions })
    }

    /// Cost dimensions first, then policy dimensions.
    pub fn from_priors(cost: &PriorSet, policy: &PriorSet) -> Result<Self> {
        Self::new(
            cost.iter()
                .chain(policy.iter())
                .map(|(name, prior)| Dimension {
                    name: name.clone(),
                    values: prior.values().cloned().collect(),
                })
                .collect(),
        )
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension(&self, name: &str) -> Option<&Dimension> {
        self.dimensions.iter().find(|dimension| dimension.name == name)
    }

    /// The sub-grid over the named dimensions only, in this space's order.
    pub fn restricted_to<'a, I>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = &'a String>,
    {
        let names: Vec<&String> = names.into_iter().collect();
        Self {
            dimensions: self
                .dimensions
                .iter()
                .filter(|dimension| names.contains(&&dimension.name))
                .cloned()
                .collect(),
        }
    }

    /// Number of grid points. The product over no dimensions is one point.
    pub fn len(&self) -> usize {
        self.dimensions
            .iter()
            .map(|dimension| dimension.values.len())
            .product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every grid point, last dimension varying fastest.
    ///
    /// # Examples
    ///
    /// ```
    /// use costometer::inference::{Dimension, OptimizationSpace};
    ///
    /// let space = OptimizationSpace::new(vec![
    ///     Dimension { name: "a".into(), values: vec![0.0.into(), 1.0.into()] },
    ///     Dimension { name: "b".into(), values: vec![5.0.into(), 6.0.into(), 7.0.into()] },
    /// ])?;
    /// let points: Vec<_> = space.points().collect();
    /// assert_eq!(points.len(), 6);
    /// assert_eq!(points[1].get("b"), Some(&6.0.into()));
    /// assert_eq!(points[3].get("a"), Some(&1.0.into()));
    /// # Ok::<(), costometer::Error>(())
    /// ```
    pub fn points(&self) -> GridPoints<'_> {
        GridPoints {
            space: self,
            odometer: vec![0; self.dimensions.len()],
            done: self.is_empty(),
        }
    }
}

/// Odometer iterator over an [`OptimizationSpace`].
pub struct GridPoints<'a> {
    space: &'a OptimizationSpace,
    odometer: Vec<usize>,
    done: bool,
}

impl Iterator for GridPoints<'_> {
    type Item = Parameters;

    fn next(&mut self) -> Option<Parameters> {
        if self.done {
            return None;
        }

        let point = self
            .space
            .dimensions
            .iter()
            .zip(&self.odometer)
            .map(|(dimension, &index)| (dimension.name.clone(), dimension.values[index].clone()))
            .collect();

        // advance, carrying from the last dimension
        self.done = true;
        for (position, dimension) in self.space.dimensions.iter().enumerate().rev() {
            self.odometer[position] += 1;
            if self.odometer[position] < dimension.values.len() {
                self.done = false;
                break;
            }
            self.odometer[position] = 0;
        }

        Some(point)
    }
}
