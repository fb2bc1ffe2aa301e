// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Built-in math functions callable from expressions.

use std::collections::HashMap;

use rand::Rng;

/// A function the evaluator may expand inline. Argument counts are
/// checked before `apply` runs, so implementations can index freely.
#[derive(Clone, Copy)]
pub struct FunctionDef {
    pub min_args: usize,
    pub max_args: usize,
    pub apply: fn(&[f64]) -> f64,
}

impl FunctionDef {
    fn unary(apply: fn(&[f64]) -> f64) -> Self {
        FunctionDef { min_args: 1, max_args: 1, apply }
    }

    fn binary(apply: fn(&[f64]) -> f64) -> Self {
        FunctionDef { min_args: 2, max_args: 2, apply }
    }
}

fn fn_frac(args: &[f64]) -> f64 {
    args[0] - args[0].trunc()
}

fn fn_sgn(args: &[f64]) -> f64 {
    if args[0] > 0.0 {
        1.0
    } else if args[0] < 0.0 {
        -1.0
    } else {
        0.0
    }
}

// round(x) or round(x, digits)
fn fn_round(args: &[f64]) -> f64 {
    if args.len() == 2 {
        let scale = 10f64.powi(args[1].trunc() as i32);
        (args[0] * scale).round() / scale
    } else {
        args[0].round()
    }
}

// Inclusive integer range; argument order does not matter.
fn fn_random(args: &[f64]) -> f64 {
    let a = args[0].trunc() as i64;
    let b = args[1].trunc() as i64;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    if lo == hi {
        return lo as f64;
    }
    rand::thread_rng().gen_range(lo..=hi) as f64
}

/// The default function table.
pub fn default_functions() -> HashMap<String, FunctionDef> {
    let mut table = HashMap::new();
    let mut add = |name: &str, def: FunctionDef| {
        table.insert(name.to_string(), def);
    };
    add("abs", FunctionDef::unary(|a| a[0].abs()));
    add("acos", FunctionDef::unary(|a| a[0].acos()));
    add("atan", FunctionDef::unary(|a| a[0].atan()));
    add("cbrt", FunctionDef::unary(|a| a[0].cbrt()));
    add("ceil", FunctionDef::unary(|a| a[0].ceil()));
    add("cos", FunctionDef::unary(|a| a[0].cos()));
    add("cosh", FunctionDef::unary(|a| a[0].cosh()));
    add("deg", FunctionDef::unary(|a| a[0].to_degrees()));
    add("exp", FunctionDef::unary(|a| a[0].exp()));
    add("floor", FunctionDef::unary(|a| a[0].floor()));
    add("frac", FunctionDef::unary(fn_frac));
    add("hypot", FunctionDef::binary(|a| a[0].hypot(a[1])));
    add("ln", FunctionDef::unary(|a| a[0].ln()));
    add("log10", FunctionDef::unary(|a| a[0].log10()));
    add("pow", FunctionDef::binary(|a| a[0].powf(a[1])));
    add("rad", FunctionDef::unary(|a| a[0].to_radians()));
    add("random", FunctionDef::binary(fn_random));
    add("round", FunctionDef { min_args: 1, max_args: 2, apply: fn_round });
    add("sgn", FunctionDef::unary(fn_sgn));
    add("sin", FunctionDef::unary(|a| a[0].sin()));
    add("sinh", FunctionDef::unary(|a| a[0].sinh()));
    add("sqrt", FunctionDef::unary(|a| a[0].sqrt()));
    add("tan", FunctionDef::unary(|a| a[0].tan()));
    add("tanh", FunctionDef::unary(|a| a[0].tanh()));
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_the_usual_suspects() {
        let table = default_functions();
        for name in ["abs", "sqrt", "pow", "round", "random", "hypot"] {
            assert!(table.contains_key(name), "missing {name}");
        }
    }

    #[test]
    fn sgn_of_zero_is_zero() {
        assert_eq!(fn_sgn(&[0.0]), 0.0);
        assert_eq!(fn_sgn(&[-3.5]), -1.0);
        assert_eq!(fn_sgn(&[2.0]), 1.0);
    }

    #[test]
    fn round_honors_digit_count() {
        assert_eq!(fn_round(&[3.14159, 2.0]), 3.14);
        assert_eq!(fn_round(&[2.5]), 3.0);
    }

    #[test]
    fn random_stays_in_range_either_order() {
        for _ in 0..100 {
            let v = fn_random(&[10.0, 1.0]);
            assert!((1.0..=10.0).contains(&v));
            assert_eq!(v, v.trunc());
        }
        assert_eq!(fn_random(&[7.0, 7.0]), 7.0);
    }
}
