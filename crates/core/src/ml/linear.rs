use serde::{Deserialize, Serialize};

use super::{check_row, check_training_input, ModelError, Regressor};

/// Diagonal jitter keeping the normal equations solvable for collinear inputs.
const RIDGE: f64 = 1e-8;

/// Ordinary least squares with an intercept.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    pub fitted: bool,
}

impl Regressor for LinearRegression {
    fn fit(&mut self, rows: &[Vec<f64>], labels: &[f64]) -> Result<(), ModelError> {
        let width = check_training_input(rows, labels)?;
        let dim = width + 1;

        // X^T X and X^T y with a leading bias column
        let mut gram = vec![vec![0.0; dim]; dim];
        let mut moment = vec![0.0; dim];
        for (row, label) in rows.iter().zip(labels) {
            let augmented: Vec<f64> = std::iter::once(1.0).chain(row.iter().copied()).collect();
            for i in 0..dim {
                moment[i] += augmented[i] * label;
                for j in 0..dim {
                    gram[i][j] += augmented[i] * augmented[j];
                }
            }
        }
        for (i, row) in gram.iter_mut().enumerate().skip(1) {
            row[i] += RIDGE;
        }

        let solution = solve(gram, moment)?;
        self.intercept = solution[0];
        self.coefficients = solution[1..].to_vec();
        self.fitted = true;
        Ok(())
    }

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        if !self.fitted {
            return Err(ModelError::NotFitted);
        }
        check_row(row, self.coefficients.len())?;
        Ok(self.intercept + self.coefficients.iter().zip(row).map(|(w, x)| w * x).sum::<f64>())
    }
}

/// Gaussian elimination with partial pivoting.
fn solve(mut matrix: Vec<Vec<f64>>, mut rhs: Vec<f64>) -> Result<Vec<f64>, ModelError> {
    let n = rhs.len();
    for column in 0..n {
        let pivot = (column..n)
            .max_by(|a, b| matrix[*a][column].abs().total_cmp(&matrix[*b][column].abs()))
            .unwrap_or(column);
        if matrix[pivot][column].abs() < 1e-12 {
            return Err(ModelError::Singular);
        }
        matrix.swap(column, pivot);
        rhs.swap(column, pivot);

        for row in column + 1..n {
            let factor = matrix[row][column] / matrix[column][column];
            if factor == 0.0 {
                continue;
            }
            for k in column..n {
                matrix[row][k] -= factor * matrix[column][k];
            }
            rhs[row] -= factor * rhs[column];
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (rhs[row] - tail) / matrix[row][row];
    }

    if solution.iter().any(|value| !value.is_finite()) {
        return Err(ModelError::NonFinite("coefficients"));
    }
    Ok(solution)
}

#[cfg(test)]
mod tests {
    use super::LinearRegression;
    use crate::ml::{ModelError, Regressor};

    #[test]
    fn recovers_exact_plane() {
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![f64::from(i), f64::from((i * 3) % 5)])
            .collect();
        let labels: Vec<f64> = rows.iter().map(|r| 1.5 + 2.0 * r[0] - 0.5 * r[1]).collect();

        let mut model = LinearRegression::default();
        model.fit(&rows, &labels).expect("fit");

        assert!((model.intercept - 1.5).abs() < 1e-5, "{model:?}");
        assert!((model.coefficients[0] - 2.0).abs() < 1e-6);
        assert!((model.coefficients[1] + 0.5).abs() < 1e-6);
        assert!((model.predict(&[10.0, 2.0]).expect("predict") - 20.5).abs() < 1e-5);
    }

    #[test]
    fn constant_column_does_not_break_the_solve() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![f64::from(i), 0.0]).collect();
        let labels: Vec<f64> = (0..10).map(|i| f64::from(i) * 3.0).collect();

        let mut model = LinearRegression::default();
        model.fit(&rows, &labels).expect("ridge keeps the system solvable");
        assert!((model.predict(&[4.0, 0.0]).expect("predict") - 12.0).abs() < 1e-4);
    }

    #[test]
    fn unfitted_and_wrong_width_are_errors() {
        let model = LinearRegression::default();
        assert_eq!(model.predict(&[1.0]), Err(ModelError::NotFitted));

        let mut model = LinearRegression::default();
        model.fit(&[vec![1.0], vec![2.0]], &[1.0, 2.0]).expect("fit");
        assert_eq!(model.predict(&[1.0, 2.0]), Err(ModelError::ShapeMismatch { expected: 1, actual: 2 }));
    }
}
