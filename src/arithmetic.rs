//! Arithmetic and number-theory functions.
//!
//! The same ten functions ship as the demo Python project the agent works on
//! (`demos/calculator/calculator.py`). Invalid arguments are reported through
//! [`ArithmeticError`] instead of panicking.

use num_traits::Num;
use thiserror::Error;

/// Invalid-argument conditions of the arithmetic functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArithmeticError {
    /// `divide` with a zero divisor
    #[error("Cannot divide by zero")]
    DivisionByZero,
    /// `factorial` of a negative number
    #[error("Negative numbers do not have factorials: {0}")]
    NegativeFactorial(i64),
    /// `fibonacci` of a negative index
    #[error("Index cannot be negative: {0}")]
    NegativeIndex(i64),
    /// The exact result does not fit the return type
    #[error("Result of {operation} does not fit in the result type")]
    Overflow {
        /// Function that overflowed
        operation: &'static str,
    },
}

/// Result of the fallible arithmetic functions
pub type Result<T> = std::result::Result<T, ArithmeticError>;

/// `a + b`
pub fn add<T: Num>(a: T, b: T) -> T {
    a + b
}

/// `a - b`
pub fn subtract<T: Num>(a: T, b: T) -> T {
    a - b
}

/// `a * b`
pub fn multiply<T: Num>(a: T, b: T) -> T {
    a * b
}

/// `a / b`; a zero divisor is an error, whatever the sign of zero
pub fn divide(a: f64, b: f64) -> Result<f64> {
    if b == 0.0 {
        return Err(ArithmeticError::DivisionByZero);
    }
    Ok(a / b)
}

/// `base` raised to `exponent`
pub fn power(base: f64, exponent: f64) -> f64 {
    base.powf(exponent)
}

/// `n!`, with `0! == 1! == 1`
pub fn factorial(n: i64) -> Result<u128> {
    if n < 0 {
        return Err(ArithmeticError::NegativeFactorial(n));
    }

    (2..=n as u128).try_fold(1u128, |acc, k| {
        acc.checked_mul(k)
            .ok_or(ArithmeticError::Overflow { operation: "factorial" })
    })
}

/// Trial division by odd numbers up to the square root
pub fn is_prime(n: i64) -> bool {
    if n < 2 {
        return false;
    }
    if n == 2 {
        return true;
    }
    if n % 2 == 0 {
        return false;
    }

    let mut i = 3;
    while i <= n / i {
        if n % i == 0 {
            return false;
        }
        i += 2;
    }
    true
}

/// The `n`th Fibonacci number, `fibonacci(0) == 0`, `fibonacci(1) == 1`
pub fn fibonacci(n: i64) -> Result<u128> {
    if n < 0 {
        return Err(ArithmeticError::NegativeIndex(n));
    }

    if n == 0 {
        return Ok(0);
    }

    let (mut previous, mut current) = (0u128, 1u128);
    for _ in 1..n {
        let next = previous
            .checked_add(current)
            .ok_or(ArithmeticError::Overflow { operation: "fibonacci" })?;
        previous = current;
        current = next;
    }
    Ok(current)
}

/// Greatest common divisor of the absolute values; `gcd(0, 0) == 0`
pub fn gcd(a: i64, b: i64) -> u64 {
    let (mut a, mut b) = (a.unsigned_abs(), b.unsigned_abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Least common multiple; zero when either argument is zero, `lcm(0, 0)` included
pub fn lcm(a: i64, b: i64) -> Result<u64> {
    if a == 0 || b == 0 {
        return Ok(0);
    }

    (a.unsigned_abs() / gcd(a, b))
        .checked_mul(b.unsigned_abs())
        .ok_or(ArithmeticError::Overflow { operation: "lcm" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn basic_operations() {
        assert_eq!(add(2, 3), 5);
        assert_eq!(add(1.5, 2.5), 4.0);
        assert_eq!(subtract(0, 4), -4);
        assert_eq!(multiply(-3, 4), -12);
        assert_eq!(power(2.0, 3.0), 8.0);
        assert_eq!(power(-1.0, 2.0), 1.0);
        assert_eq!(power(4.0, 0.5), 2.0);
    }

    #[test]
    fn divide_by_zero_is_an_error() {
        assert_eq!(divide(10.0, 2.0), Ok(5.0));
        assert_eq!(divide(1.0, 0.0), Err(ArithmeticError::DivisionByZero));
        assert_eq!(divide(0.0, -0.0), Err(ArithmeticError::DivisionByZero));
    }

    #[test]
    fn factorial_values_and_errors() {
        assert_eq!(factorial(0), Ok(1));
        assert_eq!(factorial(1), Ok(1));
        assert_eq!(factorial(5), Ok(120));
        assert_eq!(factorial(20), Ok(2_432_902_008_176_640_000));
        assert_eq!(factorial(-1), Err(ArithmeticError::NegativeFactorial(-1)));
        assert_eq!(
            factorial(40),
            Err(ArithmeticError::Overflow { operation: "factorial" })
        );
    }

    #[test]
    fn primality() {
        for n in [-7, -1, 0, 1, 4, 9, 15, 21, 25, 49] {
            assert!(!is_prime(n), "{n} should not be prime");
        }
        for n in [2, 3, 5, 7, 11, 13, 97, 7919] {
            assert!(is_prime(n), "{n} should be prime");
        }
        assert!(is_prime(1_000_000_007));
    }

    #[test]
    fn fibonacci_values_and_errors() {
        let first: Vec<u128> = (0..10).map(|n| fibonacci(n).unwrap()).collect();
        assert_eq!(first, vec![0, 1, 1, 2, 3, 5, 8, 13, 21, 34]);
        assert_eq!(fibonacci(50), Ok(12_586_269_025));
        assert_eq!(fibonacci(-1), Err(ArithmeticError::NegativeIndex(-1)));
        assert!(fibonacci(186).is_ok());
        assert_eq!(
            fibonacci(187),
            Err(ArithmeticError::Overflow { operation: "fibonacci" })
        );
    }

    #[test]
    fn gcd_and_lcm_conventions() {
        assert_eq!(gcd(12, 15), 3);
        assert_eq!(gcd(-12, 18), 6);
        assert_eq!(gcd(0, -7), 7);
        assert_eq!(gcd(0, 0), 0);
        assert_eq!(gcd(i64::MIN, 0), 1 << 63);

        assert_eq!(lcm(4, 6), Ok(12));
        assert_eq!(lcm(-4, 6), Ok(12));
        assert_eq!(lcm(0, 5), Ok(0));
        assert_eq!(lcm(0, 0), Ok(0));
    }

    proptest! {
        #[test]
        fn gcd_with_zero_is_absolute_value(k in any::<i64>()) {
            prop_assert_eq!(gcd(0, k), k.unsigned_abs());
            prop_assert_eq!(lcm(0, k), Ok(0));
        }

        #[test]
        fn gcd_divides_both(a in -10_000i64..10_000, b in 1i64..10_000) {
            let g = gcd(a, b);
            prop_assert_eq!(a.unsigned_abs() % g, 0);
            prop_assert_eq!(b.unsigned_abs() % g, 0);
            prop_assert_eq!(lcm(a, b).unwrap() * g, a.unsigned_abs() * b.unsigned_abs());
        }
    }
}
