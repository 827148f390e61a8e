use crate::error::{Result, SpectraError};

/// A smoothing filter: equal-length output for a numeric sequence.
pub trait Smoother {
    fn smooth(&self, values: &[f64], window: usize, polyorder: usize) -> Result<Vec<f64>>;
}

/// Savitzky-Golay least-squares smoothing.
///
/// Each output sample is the value at that position of a polynomial of
/// degree `polyorder` fitted over `window` neighbours. Near the edges the
/// polynomial fitted to the first/last full window is evaluated instead of
/// padding the input.
#[derive(Debug, Clone, Copy, Default)]
pub struct SavitzkyGolay;

impl Smoother for SavitzkyGolay {
    fn smooth(&self, values: &[f64], window: usize, polyorder: usize) -> Result<Vec<f64>> {
        if window == 0 || window % 2 == 0 {
            return Err(SpectraError::InvalidParameter(format!(
                "smoothing window must be a positive odd number, got {window}"
            )));
        }
        if polyorder >= window {
            return Err(SpectraError::InvalidParameter(format!(
                "polynomial order {polyorder} must be less than the window {window}"
            )));
        }
        if window > values.len() {
            return Err(SpectraError::InvalidParameter(format!(
                "smoothing window {window} exceeds the {} samples",
                values.len()
            )));
        }

        let n = values.len();
        let half = window / 2;
        let mut out = Vec::with_capacity(n);
        let mut xs = vec![0.0; window];
        for i in 0..n {
            let start = i.saturating_sub(half).min(n - window);
            for (j, x) in xs.iter_mut().enumerate() {
                *x = (start + j) as f64 - i as f64;
            }
            // Centred on i, so the constant term is the fitted value at i.
            let coeffs = polyfit(&xs, &values[start..start + window], polyorder)?;
            out.push(coeffs[0]);
        }
        Ok(out)
    }
}

/// Least-squares polynomial coefficients, lowest degree first.
fn polyfit(xs: &[f64], ys: &[f64], order: usize) -> Result<Vec<f64>> {
    let m = order + 1;
    let mut power_sums = vec![0.0; 2 * order + 1];
    let mut rhs = vec![0.0; m];
    for (&x, &y) in xs.iter().zip(ys) {
        let mut p = 1.0;
        for (k, s) in power_sums.iter_mut().enumerate() {
            *s += p;
            if k < m {
                rhs[k] += p * y;
            }
            p *= x;
        }
    }
    let mut a: Vec<Vec<f64>> = (0..m)
        .map(|r| (0..m).map(|c| power_sums[r + c]).collect())
        .collect();
    solve(&mut a, &mut rhs)?;
    Ok(rhs)
}

/// Gaussian elimination with partial pivoting; the solution replaces `b`.
fn solve(a: &mut [Vec<f64>], b: &mut [f64]) -> Result<()> {
    let m = b.len();
    for col in 0..m {
        let pivot = (col..m)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < f64::EPSILON {
            return Err(SpectraError::InvalidParameter(
                "singular smoothing system".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..m {
            let factor = a[row][col] / a[col][col];
            for k in col..m {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    for col in (0..m).rev() {
        let tail: f64 = (col + 1..m).map(|k| a[col][k] * b[k]).sum();
        b[col] = (b[col] - tail) / a[col][col];
    }
    Ok(())
}
