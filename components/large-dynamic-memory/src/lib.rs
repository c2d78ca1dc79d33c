//! Large dynamic memory fixture. `run` allocates 512 blocks of 1 MiB and
//! returns the number of bytes held at the end.

wit_bindgen::generate!({
    path: "wit",
    world: "large-dynamic-memory",
});

use exports::golem::it::api::Guest;
use starter_runtime::memory::{run, AllocationPlan};

struct Component;

impl Guest for Component {
    fn run() -> u64 {
        let report = run(&AllocationPlan::default());
        if report.exhausted {
            eprintln!(
                "allocation failed after {} blocks ({} bytes)",
                report.blocks, report.bytes
            );
        }
        report.bytes
    }
}

export!(Component);
