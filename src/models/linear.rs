use nalgebra::{DMatrix, DVector, RealField};

use crate::error::{Error, Result};

/// Time-invariant linear-Gaussian state-space model
///
/// x_{i} = A * x_{i-1} + w,  w ~ N(0, Q)
///
/// z_{i} = B * x_{i} + v,  v ~ N(0, P)
#[derive(Debug, Clone)]
pub struct LinearGaussianModel<T: RealField> {
    a: DMatrix<T>,
    b: DMatrix<T>,
    q: DMatrix<T>,
    p: DMatrix<T>,
}

impl<T: RealField + Copy> LinearGaussianModel<T> {
    pub fn new(
        a: DMatrix<T>,
        b: DMatrix<T>,
        q: DMatrix<T>,
        p: DMatrix<T>,
    ) -> Result<LinearGaussianModel<T>> {
        let n = a.nrows();
        if n == 0 || a.ncols() != n {
            return Err(Error::mismatch(
                "transition matrix A",
                (n.max(1), n.max(1)),
                a.shape(),
            ));
        }
        if q.shape() != (n, n) {
            return Err(Error::mismatch("process noise Q", (n, n), q.shape()));
        }
        let m = b.nrows();
        if m == 0 || b.ncols() != n {
            return Err(Error::mismatch(
                "observation matrix B",
                (m.max(1), n),
                b.shape(),
            ));
        }
        if p.shape() != (m, m) {
            return Err(Error::mismatch("observation noise P", (m, m), p.shape()));
        }
        Ok(LinearGaussianModel { a, b, q, p })
    }

    /// 2-D rotation by `angle` per step, observed directly:
    /// A = R(angle), B = I, Q = process_var * I, P = observation_var * I
    pub fn rotation(angle: T, process_var: T, observation_var: T) -> LinearGaussianModel<T> {
        let (s, c) = angle.sin_cos();
        #[cfg_attr(rustfmt, rustfmt_skip)]
        let a = DMatrix::from_row_slice(2, 2, &[
            c, -s,
            s, c,
        ]);
        LinearGaussianModel {
            a,
            b: DMatrix::identity(2, 2),
            q: DMatrix::identity(2, 2) * process_var,
            p: DMatrix::identity(2, 2) * observation_var,
        }
    }

    pub fn state_dim(&self) -> usize {
        self.a.nrows()
    }

    pub fn observation_dim(&self) -> usize {
        self.b.nrows()
    }

    pub fn a(&self) -> &DMatrix<T> {
        &self.a
    }

    pub fn b(&self) -> &DMatrix<T> {
        &self.b
    }

    pub fn q(&self) -> &DMatrix<T> {
        &self.q
    }

    pub fn p(&self) -> &DMatrix<T> {
        &self.p
    }

    /// A * x
    pub fn transition(&self, x: &DVector<T>) -> DVector<T> {
        &self.a * x
    }

    /// B * x
    pub fn observe(&self, x: &DVector<T>) -> DVector<T> {
        &self.b * x
    }

    pub fn check_state(&self, x: &DVector<T>, what: &str) -> Result<()> {
        if x.len() != self.state_dim() {
            return Err(Error::mismatch(what, (self.state_dim(), 1), (x.len(), 1)));
        }
        Ok(())
    }

    pub fn check_observation(&self, z: &DVector<T>, step: usize) -> Result<()> {
        if z.len() != self.observation_dim() {
            return Err(Error::mismatch(
                format!("observation at step {step}"),
                (self.observation_dim(), 1),
                (z.len(), 1),
            ));
        }
        Ok(())
    }
}
