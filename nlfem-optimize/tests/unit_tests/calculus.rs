use matrixcompare::{assert_matrix_eq, assert_scalar_eq};
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut};
use nlfem_optimize::calculus::*;

#[test]
fn approximate_jacobian_simple_function() {
    struct SimpleTwoDimensionalPolynomial;

    impl VectorFunction<f64> for SimpleTwoDimensionalPolynomial {
        fn dimension(&self) -> usize {
            2
        }

        fn eval_into(&mut self, f: &mut DVectorViewMut<f64>, x: &DVectorView<f64>) {
            assert_eq!(x.len(), 2);
            assert_eq!(f.len(), x.len());
            let x1 = x[0];
            let x2 = x[1];
            f[0] = x1 * x2 + 3.0;
            f[1] = x1 * x1 + x2 * x2 + x1 + 5.0;
        }
    }

    let x = DVector::from_column_slice(&[3.0, 4.0]);
    let j = approximate_jacobian(SimpleTwoDimensionalPolynomial, &x, 1e-6);

    // J = [   x2           x1 ]
    //     [ 2*x1 + 1     2*x2 ]
    #[rustfmt::skip]
    let expected = DMatrix::from_row_slice(2, 2,
                                           &[4.0, 3.0,
                                             7.0, 8.0]);

    assert_matrix_eq!(j, expected, comp = abs, tol = 1e-6);
}

#[test]
fn concrete_scalar_function_evaluates_closures() {
    let g = ConcreteScalarFunction::new(|x: f64| x.powi(3) - x, |x: f64| 3.0 * x * x - 1.0);
    assert_scalar_eq!(g.eval(2.0), 6.0);
    assert_scalar_eq!(g.derivative(2.0), 11.0);
}

#[test]
fn approximate_derivative_matches_analytic_derivative() {
    let g = ConcreteScalarFunction::new(|x: f64| x.sinh(), |x: f64| x.cosh());
    for &x in &[-2.0, -0.5, 0.0, 0.3, 1.7] {
        let fd = approximate_derivative(&g, x, 1e-6);
        assert_scalar_eq!(fd, g.derivative(x), comp = abs, tol = 1e-8);
    }
}
