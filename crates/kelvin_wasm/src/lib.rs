//! WASM bridge: deserializes a solve request from JS, runs the engine,
//! and hands the solution back in the shape the frontend plots.

use kelvin_core::HeatProblem;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Response body mirrored from the original service: the full space-time
/// field as nested rows plus an echo of the parameters that produced it.
#[derive(Serialize)]
struct SolveResponse {
    solution: Vec<Vec<f64>>,
    parameters: HeatProblem,
}

#[wasm_bindgen]
pub fn solve_heat_equation(params: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let problem: HeatProblem = from_value(params)
        .map_err(|e| JsValue::from_str(&format!("Invalid parameters: {e}")))?;
    let field = problem
        .solve()
        .map_err(|e| JsValue::from_str(&e.to_string()))?;

    let solution = (0..field.nrows())
        .map(|i| field.row(i).iter().copied().collect())
        .collect();
    let response = SolveResponse {
        solution,
        parameters: problem,
    };
    to_value(&response).map_err(|e| JsValue::from_str(&format!("Serialization error: {e}")))
}
