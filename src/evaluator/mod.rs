use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use deno_core::{JsRuntime, RuntimeOptions};

use crate::common::errors::{Error, Result};
use crate::configs::EvaluatorConfig;

/// Nominal conversion rate between the configured instruction budget and
/// the watchdog deadline; V8 exposes termination, not instruction counts.
const INSTRUCTIONS_PER_MS: u64 = 100;

/// Evaluates one self-contained function definition against string
/// arguments in a fresh V8 isolate. No extensions or ops are registered,
/// so the script has no file, network, or clock access.
pub struct ScriptEvaluator {
    budget: Duration,
}

impl ScriptEvaluator {
    pub fn new(config: &EvaluatorConfig) -> Self {
        let millis = (config.instruction_budget / INSTRUCTIONS_PER_MS).max(50);
        Self {
            budget: Duration::from_millis(millis),
        }
    }

    /// Binds `source` (a single function expression) to `main` and applies
    /// it to `args`, returning the result coerced to a string.
    pub async fn run(&self, source: &str, args: &[&str]) -> Result<String> {
        let program = compose_program(source, args);
        let budget = self.budget;
        tokio::task::spawn_blocking(move || evaluate(program, budget))
            .await
            .map_err(|e| Error::Script {
                message: format!("evaluator task failed: {e}"),
            })?
    }
}

fn compose_program(source: &str, args: &[&str]) -> String {
    let rendered: Vec<String> = args
        .iter()
        .map(|a| serde_json::to_string(a).unwrap_or_else(|_| "\"\"".to_string()))
        .collect();
    format!("var main = {source};\nmain({})", rendered.join(", "))
}

fn evaluate(program: String, budget: Duration) -> Result<String> {
    let mut runtime = JsRuntime::new(RuntimeOptions::default());

    let isolate = runtime.v8_isolate().thread_safe_handle();
    let finished = Arc::new(AtomicBool::new(false));
    let fired = Arc::new(AtomicBool::new(false));
    let watchdog = {
        let finished = finished.clone();
        let fired = fired.clone();
        std::thread::spawn(move || {
            std::thread::sleep(budget);
            if !finished.load(Ordering::SeqCst) {
                fired.store(true, Ordering::SeqCst);
                isolate.terminate_execution();
            }
        })
    };

    let result = runtime.execute_script("<descrambler>", deno_core::FastString::from(program));
    finished.store(true, Ordering::SeqCst);
    let _ = watchdog.join();

    let global = match result {
        Ok(global) => global,
        Err(e) => {
            if fired.load(Ordering::SeqCst) {
                return Err(Error::ScriptTimeout);
            }
            return Err(Error::Script {
                message: e.to_string(),
            });
        }
    };

    let mut scope = runtime.handle_scope();
    let local = deno_core::v8::Local::new(&mut scope, global);
    let value = local
        .to_string(&mut scope)
        .ok_or(Error::Script {
            message: "result is not stringifiable".to_string(),
        })?
        .to_rust_string_lossy(&mut scope);
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator(budget: u64) -> ScriptEvaluator {
        ScriptEvaluator::new(&EvaluatorConfig {
            instruction_budget: budget,
        })
    }

    #[tokio::test]
    async fn runs_array_and_string_manipulation() {
        let source = r#"function(a) {
            var b = a.split("");
            b.reverse();
            b.push(String.fromCharCode(33));
            return b.join("");
        }"#;
        let out = evaluator(100_000).run(source, &["abc"]).await.unwrap();
        assert_eq!(out, "cba!");
    }

    #[tokio::test]
    async fn arguments_are_escaped() {
        let source = r#"function(a) { return a; }"#;
        let out = evaluator(100_000)
            .run(source, &["with\"quote\\and\nnewline"])
            .await
            .unwrap();
        assert_eq!(out, "with\"quote\\and\nnewline");
    }

    #[tokio::test]
    async fn runaway_scripts_hit_the_budget() {
        let source = r#"function(a) { while (true) { a += "x"; } }"#;
        let err = evaluator(10_000).run(source, &["n"]).await.unwrap_err();
        assert!(matches!(err, Error::ScriptTimeout));
    }
}
