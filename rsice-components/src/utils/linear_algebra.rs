//! Tridiagonal matrices for 1-D diffusion operators.

use rsice_core::errors::{RSIceError, RSIceResult};
use rsice_core::labeled::FloatValue;

const PIVOT_TOLERANCE: FloatValue = 1e-15;

/// A square tridiagonal matrix stored by diagonals.
///
/// ```text
/// | diag[0]  sup[0]    0       ...      0     |
/// | sub[1]   diag[1]  sup[1]   ...      0     |
/// |  ...      ...      ...     ...     ...    |
/// |   0       ...      0    sub[n-1] diag[n-1]|
/// ```
///
/// `sub[0]` and `sup[n-1]` are unused and kept at zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Tridiagonal {
    pub sub: Vec<FloatValue>,
    pub diag: Vec<FloatValue>,
    pub sup: Vec<FloatValue>,
}

impl Tridiagonal {
    pub fn new(
        sub: Vec<FloatValue>,
        diag: Vec<FloatValue>,
        sup: Vec<FloatValue>,
    ) -> RSIceResult<Self> {
        let n = diag.len();
        if n == 0 || sub.len() != n || sup.len() != n {
            return Err(RSIceError::ShapeMismatch(format!(
                "tridiagonal bands have lengths {}, {}, {}",
                sub.len(),
                n,
                sup.len()
            )));
        }
        Ok(Self { sub, diag, sup })
    }

    pub fn identity(n: usize) -> Self {
        Self {
            sub: vec![0.0; n],
            diag: vec![1.0; n],
            sup: vec![0.0; n],
        }
    }

    pub fn len(&self) -> usize {
        self.diag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diag.is_empty()
    }

    /// `a·self + b·other`, element-wise on the bands.
    pub fn combine(&self, a: FloatValue, other: &Tridiagonal, b: FloatValue) -> Tridiagonal {
        let lin = |x: &[FloatValue], y: &[FloatValue]| -> Vec<FloatValue> {
            x.iter().zip(y).map(|(x, y)| a * x + b * y).collect()
        };
        Tridiagonal {
            sub: lin(&self.sub, &other.sub),
            diag: lin(&self.diag, &other.diag),
            sup: lin(&self.sup, &other.sup),
        }
    }

    /// Subtract `values` from the main diagonal.
    pub fn minus_diagonal(&self, values: &[FloatValue]) -> Tridiagonal {
        let mut out = self.clone();
        for (d, v) in out.diag.iter_mut().zip(values) {
            *d -= v;
        }
        out
    }

    /// Matrix-vector product.
    pub fn matvec(&self, x: &[FloatValue]) -> Vec<FloatValue> {
        let n = self.len();
        (0..n)
            .map(|i| {
                let mut y = self.diag[i] * x[i];
                if i > 0 {
                    y += self.sub[i] * x[i - 1];
                }
                if i + 1 < n {
                    y += self.sup[i] * x[i + 1];
                }
                y
            })
            .collect()
    }

    /// Solve `self · x = rhs` with the Thomas algorithm.
    ///
    /// No pivoting is done, so the matrix should be diagonally dominant.
    pub fn solve(&self, rhs: &[FloatValue]) -> RSIceResult<Vec<FloatValue>> {
        let n = self.len();
        if rhs.len() != n {
            return Err(RSIceError::ShapeMismatch(format!(
                "right-hand side has length {}, matrix has {} rows",
                rhs.len(),
                n
            )));
        }

        let mut c_prime = vec![0.0; n];
        let mut d_prime = vec![0.0; n];

        // Forward sweep
        let mut denom = self.diag[0];
        check_pivot(denom, 0)?;
        c_prime[0] = self.sup[0] / denom;
        d_prime[0] = rhs[0] / denom;
        for i in 1..n {
            denom = self.diag[i] - self.sub[i] * c_prime[i - 1];
            check_pivot(denom, i)?;
            if i < n - 1 {
                c_prime[i] = self.sup[i] / denom;
            }
            d_prime[i] = (rhs[i] - self.sub[i] * d_prime[i - 1]) / denom;
        }

        // Back substitution
        let mut x = d_prime;
        for i in (0..n - 1).rev() {
            x[i] -= c_prime[i] * x[i + 1];
        }
        Ok(x)
    }
}

fn check_pivot(denom: FloatValue, row: usize) -> RSIceResult<()> {
    if denom.abs() > PIVOT_TOLERANCE {
        Ok(())
    } else {
        Err(RSIceError::SingularMatrix(format!(
            "zero pivot encountered at row {}",
            row
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn second_difference(n: usize) -> Tridiagonal {
        Tridiagonal::new(
            (0..n).map(|i| if i == 0 { 0.0 } else { -1.0 }).collect(),
            vec![2.0; n],
            (0..n).map(|i| if i == n - 1 { 0.0 } else { -1.0 }).collect(),
        )
        .unwrap()
    }

    #[test]
    fn identity_solve() {
        let d = vec![1.0, 2.0, 3.0];
        assert_eq!(Tridiagonal::identity(3).solve(&d).unwrap(), d);
    }

    #[test]
    fn known_3x3_solution() {
        let x = second_difference(3).solve(&[1.0, 0.0, 1.0]).unwrap();
        for (i, &xi) in x.iter().enumerate() {
            assert!((xi - 1.0).abs() < 1e-10, "x[{}] = {} (expected 1.0)", i, xi);
        }
    }

    #[test]
    fn larger_system_residual() {
        let n = 50;
        let h = 1.0 / (n as f64 + 1.0);
        let rhs = vec![h * h; n];
        let m = second_difference(n);
        let x = m.solve(&rhs).unwrap();

        // Solving then multiplying recovers the right-hand side
        for (got, want) in m.matvec(&x).iter().zip(&rhs) {
            assert!((got - want).abs() < 1e-10, "{} vs {}", got, want);
        }
    }

    #[test]
    fn two_equations() {
        // | 4 1 | x = | 1 |  =>  x = [1/11, 7/11]
        // | 1 3 |     | 2 |
        let m = Tridiagonal::new(vec![0.0, 1.0], vec![4.0, 3.0], vec![1.0, 0.0]).unwrap();
        let x = m.solve(&[1.0, 2.0]).unwrap();
        assert!((x[0] - 1.0 / 11.0).abs() < 1e-12);
        assert!((x[1] - 7.0 / 11.0).abs() < 1e-12);
    }

    #[test]
    fn combine_and_diagonal_shift() {
        let k = Tridiagonal::identity(3).combine(2.0, &second_difference(3), -1.0);
        assert_eq!(k.diag, vec![0.0, 0.0, 0.0]);
        assert_eq!(k.sup, vec![1.0, 1.0, 0.0]);
        let shifted = k.minus_diagonal(&[-1.0, -1.0, -1.0]);
        assert_eq!(shifted.diag, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn errors_instead_of_panics() {
        let singular = Tridiagonal::new(vec![0.0], vec![0.0], vec![0.0]).unwrap();
        assert!(matches!(
            singular.solve(&[1.0]),
            Err(RSIceError::SingularMatrix(_))
        ));
        assert!(Tridiagonal::identity(2).solve(&[1.0]).is_err());
        assert!(Tridiagonal::new(vec![0.0], vec![1.0, 1.0], vec![0.0]).is_err());
    }
}
