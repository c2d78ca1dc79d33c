//! Print fixture. `run` prints a greeting and returns 100; `print` echoes its
//! argument prefixed with the wall-clock time.

wit_bindgen::generate!({
    path: "wit",
    world: "print-fixture",
});

use exports::golem::it::api::Guest;
use starter_runtime::print::{line, write_hello, RUN_RESULT};
use starter_runtime::Timestamp;
use wasi::clocks::wall_clock;

struct Component;

impl Guest for Component {
    fn run() -> i32 {
        let mut out = String::new();
        let result = write_hello(&mut out).unwrap_or(RUN_RESULT);
        print!("{out}");
        result
    }

    fn print(s: String) {
        let now = wall_clock::now();
        let at = Timestamp::new(now.seconds, now.nanoseconds);
        print!("{}", line(s.as_bytes(), s.len(), at));
    }
}

export!(Component);
