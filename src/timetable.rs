use log::{info, warn};
use std::time::Instant;

use crate::data::{TimetableInput, TimetableOutput};
use crate::decoder::Decoder;
use crate::encoder::encode;
use crate::error::TimetableError;
use crate::normalize::Dataset;
use crate::solver::Backend;

/// Runs the whole pipeline once: normalize, encode, solve, decode.
///
/// An infeasible or inconclusive solve renders nothing.
pub fn generate(
    input: &TimetableInput,
    backend: &dyn Backend,
    seed: u64,
) -> Result<TimetableOutput, TimetableError> {
    let start_time = Instant::now();
    let dataset = Dataset::from_input(input);
    let encoding = encode(&dataset, seed);

    let result = backend.solve(&encoding.model)?;
    let valuation = match (result.status.has_solution(), result.valuation) {
        (true, Some(valuation)) => valuation,
        _ => {
            warn!("No timetable producible: solver returned {:?}", result.status);
            return Err(TimetableError::Infeasible {
                status: result.status,
            });
        }
    };

    let decoder = Decoder::new(&dataset, &encoding, &valuation);
    let grids = decoder.render_all();
    let unmet_soft_constraints = decoder.unmet_soft_constraints();
    for unmet in &unmet_soft_constraints {
        info!("{}", unmet);
    }
    info!(
        "Rendered {} timetables in {:.2?}",
        grids.len(),
        start_time.elapsed()
    );

    Ok(TimetableOutput {
        status: result.status,
        seed,
        grids,
        unmet_soft_constraints,
        warnings: encoding.gaps,
    })
}
