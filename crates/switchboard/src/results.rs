//! Result handlers.
//!
//! A results handler is a capability registered alongside a command that
//! post-processes the result values of a successful invocation. Multiple
//! handlers compose in registration order; the first error stops the chain
//! and surfaces as the dispatch error.

use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::serialize;

/// Post-processing capability for successful invocation results.
pub trait ResultsHandler: Send + Sync {
    /// Handles the result values of one invocation.
    fn handle_results(&self, results: &[Value]) -> Result<(), anyhow::Error>;
}

/// Shared handle to a results handler, as stored by the registry.
pub type ResultsHandlerRef = Arc<dyn ResultsHandler>;

struct FnResultsHandler<F>(F);

impl<F> ResultsHandler for FnResultsHandler<F>
where
    F: Fn(&[Value]) -> Result<(), anyhow::Error> + Send + Sync,
{
    fn handle_results(&self, results: &[Value]) -> Result<(), anyhow::Error> {
        (self.0)(results)
    }
}

/// Creates a results handler from a closure.
pub fn from_fn<F>(f: F) -> ResultsHandlerRef
where
    F: Fn(&[Value]) -> Result<(), anyhow::Error> + Send + Sync + 'static,
{
    Arc::new(FnResultsHandler(f))
}

/// Writes each result value on its own line.
///
/// String values print bare; everything else prints as compact JSON.
pub fn print_to<W>(writer: W) -> ResultsHandlerRef
where
    W: Write + Send + 'static,
{
    let writer = Mutex::new(writer);
    from_fn(move |results| {
        let mut w = writer
            .lock()
            .map_err(|_| anyhow::anyhow!("results writer poisoned"))?;
        for value in results {
            match value {
                Value::String(s) => writeln!(w, "{s}")?,
                other => writeln!(w, "{other}")?,
            }
        }
        Ok(())
    })
}

/// [`print_to`] standard output.
pub fn print_to_stdout() -> ResultsHandlerRef {
    print_to(std::io::stdout())
}

/// Writes the collapsed result value as pretty JSON, followed by a newline.
pub fn json_to<W>(writer: W) -> ResultsHandlerRef
where
    W: Write + Send + 'static,
{
    let writer = Mutex::new(writer);
    from_fn(move |results| {
        let text = serialize::to_json(results)?;
        let mut w = writer
            .lock()
            .map_err(|_| anyhow::anyhow!("results writer poisoned"))?;
        writeln!(w, "{text}")?;
        Ok(())
    })
}
