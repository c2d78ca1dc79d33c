//! Counter starter: `add` accumulates into a process-wide total, `get` reads it.

wit_bindgen::generate!({
    path: "wit",
    world: "counter",
});

use exports::pack::name::api::Guest;
use starter_runtime::TOTAL;

struct Component;

impl Guest for Component {
    fn add(value: u64) {
        TOTAL.add(value);
    }

    fn get() -> u64 {
        TOTAL.get()
    }
}

export!(Component);
