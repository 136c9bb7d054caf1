//! Runs the create, update and read workflow against a RESTful objects API with a constant number
//! of concurrent users and prints latencies and failures.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    restful_loadtest::cli::execute()
}
