//! Workflow Executor: runs a handler's step list against an action resolver.
//!
//! The executor never inspects business semantics. It sequences steps in
//! step-number order, threads data (call-site params first, then prior step
//! outputs keyed `step_<n>_result`), and dispatches each action name to an
//! externally supplied [`ActionResolver`]. New handlers require zero executor
//! changes — that is the point of the design.
//!
//! A resolver failure aborts the remaining steps and the call reports failure
//! with the partial result map; executed steps are not rolled back
//! (at-least-once side effects are the caller's contract, not ours).

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use miette::Diagnostic;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::error::{OntoResult, WorkflowError};
use crate::handler::HandlerRegistry;

/// Named arguments passed to an action.
pub type ActionArgs = serde_json::Map<String, Value>;

/// Error raised by an action resolver.
#[derive(Debug, Error, Diagnostic)]
#[error("action \"{action}\" failed: {message}")]
#[diagnostic(
    code(onto::workflow::action_failed),
    help("The host's action resolver reported a failure. The workflow stops at this step.")
)]
pub struct ActionError {
    pub action: String,
    pub message: String,
}

impl ActionError {
    pub fn new(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            message: message.into(),
        }
    }
}

/// Host-supplied capability that executes named actions.
///
/// Implementations should return a sentinel "simulated" value for unknown
/// action names rather than failing, so development can proceed before every
/// action is implemented.
pub trait ActionResolver {
    fn resolve(&mut self, action: &str, args: &ActionArgs) -> Result<Value, ActionError>;
}

/// Resolver that simulates every action: echoes the action name and its
/// arguments in a `{"simulated": true, ...}` object.
#[derive(Debug, Default)]
pub struct SimulatedResolver;

impl ActionResolver for SimulatedResolver {
    fn resolve(&mut self, action: &str, args: &ActionArgs) -> Result<Value, ActionError> {
        tracing::debug!(action, "action simulated");
        Ok(json!({
            "simulated": true,
            "action": action,
            "args": Value::Object(args.clone()),
        }))
    }
}

type ConditionFn = dyn Fn(&BTreeMap<String, Value>) -> bool + Send + Sync;

/// Named condition checks evaluated against the step result map.
///
/// The set is fixed but extensible: the built-ins scan recorded values for a
/// marker substring; hosts can register their own predicates.
pub struct ConditionRegistry {
    checks: DashMap<String, Arc<ConditionFn>>,
}

impl ConditionRegistry {
    /// Create a registry with the built-in checks.
    pub fn with_defaults() -> Self {
        let registry = Self {
            checks: DashMap::new(),
        };
        registry.register_marker("stock_insufficient", "stock_error");
        registry.register_marker("payment_failed", "payment_error");
        registry
    }

    /// Register a condition that fires when any recorded value contains
    /// `marker` in its serialized form.
    pub fn register_marker(&self, name: &str, marker: &str) {
        let marker = marker.to_string();
        self.register(name, move |results| {
            results.values().any(|v| v.to_string().contains(&marker))
        });
    }

    /// Register an arbitrary named condition.
    pub fn register(
        &self,
        name: &str,
        check: impl Fn(&BTreeMap<String, Value>) -> bool + Send + Sync + 'static,
    ) {
        self.checks.insert(name.to_string(), Arc::new(check));
    }

    /// Evaluate a condition by name. Unknown names never fire.
    pub fn check(&self, name: &str, results: &BTreeMap<String, Value>) -> bool {
        match self.checks.get(name) {
            Some(check) => (check.value().as_ref())(results),
            None => {
                tracing::debug!(condition = name, "unknown condition never fires");
                false
            }
        }
    }
}

impl Default for ConditionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ConditionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionRegistry")
            .field("conditions", &self.checks.len())
            .finish()
    }
}

/// Structured result of a workflow execution: a success flag and a
/// human-readable message, never a raw error.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub success: bool,
    pub summary: String,
    /// Recorded step outputs, keyed `step_<n>_result` (and
    /// `rule_<i>_result` for fired rule actions).
    pub results: BTreeMap<String, Value>,
    /// Step number the workflow failed at, if any.
    pub failed_step: Option<u32>,
    /// Conditions of the rules that fired.
    pub triggered_rules: Vec<String>,
}

/// Executes declarative workflows looked up from the handler registry.
pub struct WorkflowExecutor {
    handlers: Arc<HandlerRegistry>,
    conditions: Arc<ConditionRegistry>,
}

impl WorkflowExecutor {
    pub fn new(handlers: Arc<HandlerRegistry>, conditions: Arc<ConditionRegistry>) -> Self {
        Self {
            handlers,
            conditions,
        }
    }

    /// Execute the workflow registered for `intent`.
    ///
    /// Fails only when the handler is missing (or the registry itself errors);
    /// step failures are reported through the returned [`WorkflowOutcome`].
    pub fn execute(
        &self,
        intent: &str,
        call_params: &ActionArgs,
        resolver: &mut dyn ActionResolver,
    ) -> OntoResult<WorkflowOutcome> {
        let config = self
            .handlers
            .get(intent)?
            .ok_or(WorkflowError::HandlerNotFound {
                intent: intent.to_string(),
            })?;

        tracing::info!(intent, steps = config.workflow.len(), "executing workflow");
        let mut results: BTreeMap<String, Value> = BTreeMap::new();

        // Steps are already sorted by step number by the registry.
        for step in &config.workflow {
            let mut args = ActionArgs::new();
            for param in &step.params {
                if let Some(value) = call_params.get(param) {
                    args.insert(param.clone(), value.clone());
                } else if let Some(value) = results.get(param) {
                    args.insert(param.clone(), value.clone());
                }
                // Absent on both sides: omitted, the action decides.
            }

            tracing::debug!(intent, step = step.step, action = %step.action, "running step");
            match resolver.resolve(&step.action, &args) {
                Ok(value) => {
                    results.insert(format!("step_{}_result", step.step), value);
                }
                Err(e) => {
                    tracing::warn!(intent, step = step.step, error = %e, "workflow step failed");
                    return Ok(WorkflowOutcome {
                        success: false,
                        summary: format!(
                            "step {} (\"{}\") failed: {}",
                            step.step, step.action, e.message
                        ),
                        results,
                        failed_step: Some(step.step),
                        triggered_rules: Vec::new(),
                    });
                }
            }
        }

        // Business rules run after all steps, against the recorded results.
        let mut triggered = Vec::new();
        for (i, rule) in config.rules.iter().enumerate() {
            if !self.conditions.check(&rule.condition, &results) {
                continue;
            }
            tracing::info!(intent, condition = %rule.condition, action = %rule.action, "business rule fired");
            triggered.push(rule.condition.clone());
            match resolver.resolve(&rule.action, &ActionArgs::new()) {
                Ok(value) => {
                    results.insert(format!("rule_{i}_result"), value);
                }
                Err(e) => {
                    tracing::warn!(intent, rule = i, error = %e, "rule action failed");
                    return Ok(WorkflowOutcome {
                        success: false,
                        summary: format!(
                            "rule action \"{}\" (condition \"{}\") failed: {}",
                            rule.action, rule.condition, e.message
                        ),
                        results,
                        failed_step: None,
                        triggered_rules: triggered,
                    });
                }
            }
        }

        let summary = format!(
            "workflow \"{intent}\" completed: {} step(s) executed, {} rule(s) fired",
            config.workflow.len(),
            triggered.len()
        );
        Ok(WorkflowOutcome {
            success: true,
            summary,
            results,
            failed_step: None,
            triggered_rules: triggered,
        })
    }
}

impl std::fmt::Debug for WorkflowExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutor").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OntoError;
    use crate::handler::{BusinessRule, HandlerConfig, WorkflowStep};
    use crate::namespace::NamespaceRegistry;
    use crate::schema::SchemaRegistry;
    use crate::store::mem::TripleStore;

    /// Resolver that records every call and replies with canned values.
    #[derive(Default)]
    struct RecordingResolver {
        calls: Vec<(String, ActionArgs)>,
        fail_on: Option<String>,
        reply: BTreeMap<String, Value>,
    }

    impl ActionResolver for RecordingResolver {
        fn resolve(&mut self, action: &str, args: &ActionArgs) -> Result<Value, ActionError> {
            self.calls.push((action.to_string(), args.clone()));
            if self.fail_on.as_deref() == Some(action) {
                return Err(ActionError::new(action, "boom"));
            }
            Ok(self
                .reply
                .get(action)
                .cloned()
                .unwrap_or_else(|| json!(format!("{action}_done"))))
        }
    }

    fn executor() -> (Arc<HandlerRegistry>, WorkflowExecutor) {
        let store = Arc::new(TripleStore::new());
        let ns = Arc::new(NamespaceRegistry::with_defaults("http://example.org/"));
        let schema = Arc::new(SchemaRegistry::new(
            Arc::clone(&store),
            Arc::clone(&ns),
            "http://example.org/",
        ));
        let handlers = Arc::new(HandlerRegistry::new(store, schema));
        let exec = WorkflowExecutor::new(
            Arc::clone(&handlers),
            Arc::new(ConditionRegistry::with_defaults()),
        );
        (handlers, exec)
    }

    fn step(n: u32, action: &str, params: &[&str]) -> WorkflowStep {
        WorkflowStep {
            step: n,
            action: action.into(),
            params: params.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn missing_handler_errors() {
        let (_, exec) = executor();
        let err = exec
            .execute("ghost", &ActionArgs::new(), &mut SimulatedResolver)
            .unwrap_err();
        assert!(matches!(
            err,
            OntoError::Workflow(WorkflowError::HandlerNotFound { .. })
        ));
    }

    #[test]
    fn steps_run_in_numeric_order() {
        let (handlers, exec) = executor();
        handlers
            .register(
                "shuffled",
                &HandlerConfig {
                    workflow: vec![step(3, "third", &[]), step(1, "first", &[]), step(2, "second", &[])],
                    ..Default::default()
                },
            )
            .unwrap();

        let mut resolver = RecordingResolver::default();
        let outcome = exec
            .execute("shuffled", &ActionArgs::new(), &mut resolver)
            .unwrap();
        assert!(outcome.success);
        let order: Vec<&str> = resolver.calls.iter().map(|(a, _)| a.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[test]
    fn params_threaded_from_prior_step_results() {
        let (handlers, exec) = executor();
        handlers
            .register(
                "threaded",
                &HandlerConfig {
                    workflow: vec![
                        step(1, "check_stock", &["product"]),
                        step(2, "create_order", &["product", "step_1_result"]),
                    ],
                    ..Default::default()
                },
            )
            .unwrap();

        let mut resolver = RecordingResolver {
            reply: BTreeMap::from([("check_stock".to_string(), json!({"stock": 12}))]),
            ..Default::default()
        };
        let mut call_params = ActionArgs::new();
        call_params.insert("product".into(), json!("laptop"));

        let outcome = exec.execute("threaded", &call_params, &mut resolver).unwrap();
        assert!(outcome.success);

        // Step 2 received the product from call params and step 1's output.
        let (_, args) = &resolver.calls[1];
        assert_eq!(args.get("product").unwrap(), &json!("laptop"));
        assert_eq!(args.get("step_1_result").unwrap(), &json!({"stock": 12}));
    }

    #[test]
    fn call_params_shadow_step_results() {
        let (handlers, exec) = executor();
        handlers
            .register(
                "shadow",
                &HandlerConfig {
                    workflow: vec![step(1, "a", &[]), step(2, "b", &["step_1_result"])],
                    ..Default::default()
                },
            )
            .unwrap();

        let mut resolver = RecordingResolver::default();
        let mut call_params = ActionArgs::new();
        call_params.insert("step_1_result".into(), json!("from_caller"));

        exec.execute("shadow", &call_params, &mut resolver).unwrap();
        let (_, args) = &resolver.calls[1];
        assert_eq!(args.get("step_1_result").unwrap(), &json!("from_caller"));
    }

    #[test]
    fn missing_params_are_omitted() {
        let (handlers, exec) = executor();
        handlers
            .register(
                "partial",
                &HandlerConfig {
                    workflow: vec![step(1, "act", &["present", "absent"])],
                    ..Default::default()
                },
            )
            .unwrap();

        let mut resolver = RecordingResolver::default();
        let mut call_params = ActionArgs::new();
        call_params.insert("present".into(), json!(1));

        let outcome = exec.execute("partial", &call_params, &mut resolver).unwrap();
        assert!(outcome.success);
        let (_, args) = &resolver.calls[0];
        assert!(args.contains_key("present"));
        assert!(!args.contains_key("absent"));
    }

    #[test]
    fn failing_step_aborts_with_partial_results() {
        let (handlers, exec) = executor();
        handlers
            .register(
                "fragile",
                &HandlerConfig {
                    workflow: vec![step(1, "ok_step", &[]), step(2, "explode", &[]), step(3, "never", &[])],
                    ..Default::default()
                },
            )
            .unwrap();

        let mut resolver = RecordingResolver {
            fail_on: Some("explode".into()),
            ..Default::default()
        };
        let outcome = exec
            .execute("fragile", &ActionArgs::new(), &mut resolver)
            .unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.failed_step, Some(2));
        assert!(outcome.summary.contains("step 2"));
        assert!(outcome.summary.contains("explode"));
        // Step 1's result is kept; step 3 never ran.
        assert!(outcome.results.contains_key("step_1_result"));
        assert_eq!(resolver.calls.len(), 2);
    }

    #[test]
    fn rule_fires_on_stock_error_marker() {
        let (handlers, exec) = executor();
        handlers
            .register(
                "ruled",
                &HandlerConfig {
                    workflow: vec![step(1, "check_stock", &[])],
                    rules: vec![
                        BusinessRule {
                            condition: "stock_insufficient".into(),
                            action: "suggest_alternatives".into(),
                        },
                        BusinessRule {
                            condition: "payment_failed".into(),
                            action: "retry_payment".into(),
                        },
                    ],
                    ..Default::default()
                },
            )
            .unwrap();

        let mut resolver = RecordingResolver {
            reply: BTreeMap::from([(
                "check_stock".to_string(),
                json!({"error": "stock_error: only 1 left"}),
            )]),
            ..Default::default()
        };
        let outcome = exec
            .execute("ruled", &ActionArgs::new(), &mut resolver)
            .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.triggered_rules, vec!["stock_insufficient"]);
        // The rule action went through the same resolver.
        assert!(resolver
            .calls
            .iter()
            .any(|(a, _)| a == "suggest_alternatives"));
        assert!(!resolver.calls.iter().any(|(a, _)| a == "retry_payment"));
        assert!(outcome.results.contains_key("rule_0_result"));
    }

    #[test]
    fn unknown_condition_never_fires() {
        let (handlers, exec) = executor();
        handlers
            .register(
                "mystery",
                &HandlerConfig {
                    workflow: vec![step(1, "a", &[])],
                    rules: vec![BusinessRule {
                        condition: "mercury_in_retrograde".into(),
                        action: "panic".into(),
                    }],
                    ..Default::default()
                },
            )
            .unwrap();

        let mut resolver = RecordingResolver::default();
        let outcome = exec
            .execute("mystery", &ActionArgs::new(), &mut resolver)
            .unwrap();
        assert!(outcome.success);
        assert!(outcome.triggered_rules.is_empty());
        assert!(!resolver.calls.iter().any(|(a, _)| a == "panic"));
    }

    #[test]
    fn custom_condition_can_be_registered() {
        let (handlers, _) = executor();
        let conditions = ConditionRegistry::with_defaults();
        conditions.register("always", |_| true);
        let exec = WorkflowExecutor::new(Arc::clone(&handlers), Arc::new(conditions));

        handlers
            .register(
                "custom",
                &HandlerConfig {
                    workflow: vec![step(1, "a", &[])],
                    rules: vec![BusinessRule {
                        condition: "always".into(),
                        action: "celebrate".into(),
                    }],
                    ..Default::default()
                },
            )
            .unwrap();

        let mut resolver = RecordingResolver::default();
        let outcome = exec
            .execute("custom", &ActionArgs::new(), &mut resolver)
            .unwrap();
        assert_eq!(outcome.triggered_rules, vec!["always"]);
    }

    #[test]
    fn simulated_resolver_echoes() {
        let mut resolver = SimulatedResolver;
        let mut args = ActionArgs::new();
        args.insert("x".into(), json!(1));
        let value = resolver.resolve("anything", &args).unwrap();
        assert_eq!(value["simulated"], json!(true));
        assert_eq!(value["action"], json!("anything"));
        assert_eq!(value["args"]["x"], json!(1));
    }
}
