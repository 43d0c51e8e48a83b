//! Runs the reclamation stress scenario: seven writers racing to replace one
//! published record while a reader keeps protecting and checking it.
//!
//! Exits successfully on a clean run. A poisoned read aborts immediately; any
//! other violated reclamation invariant aborts once the run has finished. Set `RUST_LOG=info` (or `debug`) to follow the run.

use hazard_swap::stress::{self, StressConfig};
use log::{error, info};
use std::process::ExitCode;

const N_READERS: usize = 1;
const N_WRITERS: usize = 7;
const N_ITERS: usize = 1 << 20;

fn main() -> ExitCode {
    env_logger::init();

    let config = StressConfig::new()
        .readers(N_READERS)
        .writers(N_WRITERS)
        .iterations(N_ITERS)
        .abort_on_violation(true);

    let report = match stress::run(&config) {
        Ok(report) => report,
        Err(e) => {
            error!("stress run could not start: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !report.is_clean() {
        error!("reclamation invariant violated: {report:?}");
        std::process::abort();
    }

    info!(
        "{} allocations matched by {} frees ({} expected)",
        report.allocated,
        report.freed,
        config.expected_allocations()
    );
    ExitCode::SUCCESS
}
