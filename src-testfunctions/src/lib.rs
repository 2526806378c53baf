//! Benchmark cost functions for optimizer tests
//!
//! A small collection of standard test functions for validating the
//! devolve solvers, organized by category:
//!
//! - **Unimodal**: single global optimum (sphere, rosenbrock, ...)
//! - **Multimodal**: many local minima (rastrigin, ackley)
//!
//! Every function maps an `Array1<f64>` to a scalar cost. Per-function
//! metadata (bounds, known minima) backs the integration tests.
//!
//! # Example
//!
//! ```rust
//! use ndarray::Array1;
//! use devolve_testfunctions::*;
//!
//! let x = Array1::from_vec(vec![0.0, 0.0]);
//! assert_eq!(sphere(&x), 0.0);
//!
//! let bounds = get_function_bounds("sphere").unwrap();
//! assert_eq!(bounds.len(), 2);
//! ```

use std::collections::HashMap;

pub mod functions;
pub use functions::*;

/// Metadata for a test function.
#[derive(Debug, Clone)]
pub struct FunctionMetadata {
    pub name: String,
    /// Bounds per dimension (min, max).
    pub bounds: Vec<(f64, f64)>,
    /// Known global minima as (location, value).
    pub global_minima: Vec<(Vec<f64>, f64)>,
    pub multimodal: bool,
}

/// `n` identical `(lower, upper)` bound pairs.
pub fn create_bounds(n: usize, lower: f64, upper: f64) -> Vec<(f64, f64)> {
    vec![(lower, upper); n]
}

/// Metadata for all bundled test functions.
pub fn get_function_metadata() -> HashMap<String, FunctionMetadata> {
    let mut metadata = HashMap::new();

    metadata.insert(
        "sphere".to_string(),
        FunctionMetadata {
            name: "sphere".to_string(),
            bounds: create_bounds(2, -10.0, 10.0),
            global_minima: vec![(vec![0.0, 0.0], 0.0)],
            multimodal: false,
        },
    );

    metadata.insert(
        "rosenbrock".to_string(),
        FunctionMetadata {
            name: "rosenbrock".to_string(),
            bounds: create_bounds(2, -5.0, 5.0),
            global_minima: vec![(vec![1.0, 1.0], 0.0)],
            multimodal: false,
        },
    );

    metadata.insert(
        "paired_deviation".to_string(),
        FunctionMetadata {
            name: "paired_deviation".to_string(),
            bounds: create_bounds(4, -5.0, 5.0),
            global_minima: vec![(vec![0.0, 0.0, 0.0, 0.0], 0.0)],
            multimodal: false,
        },
    );

    metadata.insert(
        "rastrigin".to_string(),
        FunctionMetadata {
            name: "rastrigin".to_string(),
            bounds: create_bounds(2, -5.12, 5.12),
            global_minima: vec![(vec![0.0, 0.0], 0.0)],
            multimodal: true,
        },
    );

    metadata.insert(
        "ackley".to_string(),
        FunctionMetadata {
            name: "ackley".to_string(),
            bounds: create_bounds(2, -32.768, 32.768),
            global_minima: vec![(vec![0.0, 0.0], 0.0)],
            multimodal: true,
        },
    );

    metadata
}

/// Bounds for a named function, if it is bundled.
pub fn get_function_bounds(name: &str) -> Option<Vec<(f64, f64)>> {
    get_function_metadata().get(name).map(|m| m.bounds.clone())
}
