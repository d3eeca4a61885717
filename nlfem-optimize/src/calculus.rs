use crate::Real;
use nalgebra::{DMatrix, DVector, DVectorView, DVectorViewMut, Scalar};
use numeric_literals::replace_float_literals;
use std::error::Error;

/// A scalar function $g: \mathbb{R} \rightarrow \mathbb{R}$ together with its derivative.
pub trait ScalarFunction<T> {
    fn eval(&self, x: T) -> T;
    fn derivative(&self, x: T) -> T;
}

impl<T, X> ScalarFunction<T> for &X
where
    X: ScalarFunction<T> + ?Sized,
{
    fn eval(&self, x: T) -> T {
        X::eval(self, x)
    }

    fn derivative(&self, x: T) -> T {
        X::derivative(self, x)
    }
}

/// A scalar function defined by a pair of closures for the value and the derivative.
#[derive(Debug, Clone)]
pub struct ConcreteScalarFunction<F, DF> {
    function: F,
    derivative: DF,
}

impl<F, DF> ConcreteScalarFunction<F, DF> {
    pub fn new<T>(function: F, derivative: DF) -> Self
    where
        F: Fn(T) -> T,
        DF: Fn(T) -> T,
    {
        Self { function, derivative }
    }
}

impl<T, F, DF> ScalarFunction<T> for ConcreteScalarFunction<F, DF>
where
    F: Fn(T) -> T,
    DF: Fn(T) -> T,
{
    fn eval(&self, x: T) -> T {
        (self.function)(x)
    }

    fn derivative(&self, x: T) -> T {
        (self.derivative)(x)
    }
}

pub trait VectorFunction<T>
where
    T: Scalar,
{
    fn dimension(&self) -> usize;
    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>);
}

impl<T, X> VectorFunction<T> for &mut X
where
    T: Scalar,
    X: VectorFunction<T>,
{
    fn dimension(&self) -> usize {
        X::dimension(self)
    }

    fn eval_into(&mut self, f: &mut DVectorViewMut<T>, x: &DVectorView<T>) {
        X::eval_into(self, f, x)
    }
}

pub trait DifferentiableVectorFunction<T>: VectorFunction<T>
where
    T: Scalar,
{
    /// Solves `J(x) sol = rhs`, where `J(x)` is the Jacobian of the function at `x`.
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), Box<dyn Error>>;
}

impl<T, X> DifferentiableVectorFunction<T> for &mut X
where
    T: Scalar,
    X: DifferentiableVectorFunction<T>,
{
    fn solve_jacobian_system(
        &mut self,
        sol: &mut DVectorViewMut<T>,
        x: &DVectorView<T>,
        rhs: &DVectorView<T>,
    ) -> Result<(), Box<dyn Error>> {
        X::solve_jacobian_system(self, sol, x, rhs)
    }
}

/// Approximates the derivative of a scalar function at `x` using central finite differences
/// with step size `h`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn approximate_derivative<T>(f: impl ScalarFunction<T>, x: T, h: T) -> T
where
    T: Real,
{
    (f.eval(x + h) - f.eval(x - h)) / (2.0 * h)
}

/// Approximates the Jacobian of a vector function evaluated at `x`, using
/// central finite differences with resolution `h`.
#[replace_float_literals(T::from_f64(literal).expect("Literal must fit in T"))]
pub fn approximate_jacobian<T>(mut f: impl VectorFunction<T>, x: &DVector<T>, h: T) -> DMatrix<T>
where
    T: Real,
{
    let out_dim = f.dimension();
    let in_dim = x.len();

    let mut result = DMatrix::zeros(out_dim, in_dim);

    let mut x_shifted = x.clone();
    let mut f_plus = DVector::zeros(out_dim);
    let mut f_minus = DVector::zeros(out_dim);

    for j in 0..in_dim {
        let x_j = x[j];

        x_shifted[j] = x_j + h;
        f.eval_into(&mut DVectorViewMut::from(&mut f_plus), &DVectorView::from(&x_shifted));
        x_shifted[j] = x_j - h;
        f.eval_into(&mut DVectorViewMut::from(&mut f_minus), &DVectorView::from(&x_shifted));
        x_shifted[j] = x_j;

        // result[.., j] := (f+ - f-) / 2h
        let mut column_j = result.column_mut(j);
        column_j.copy_from(&f_plus);
        column_j -= &f_minus;
        column_j /= 2.0 * h;
    }

    result
}
