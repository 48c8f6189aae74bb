//! Handler Registry: declarative business handlers stored as graph data.
//!
//! A handler bundles extraction patterns, an ordered workflow and
//! condition/action rules under an intent name. The bundle is stored through
//! a fixed relation shape in the triple store (so handlers survive export,
//! show up in introspection, and can be inspected like any other data) and is
//! decoded back into the typed [`HandlerConfig`] the executor consumes.
//!
//! Every node written for a handler carries an `ownedBy` back-pointer to its
//! handler; re-registering an intent sweeps all owned nodes before writing
//! the new definition, so overwrites never leave orphaned sub-graphs behind.

use std::collections::BTreeMap;
use std::sync::Arc;

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

use crate::error::{HandlerError, HandlerResult};
use crate::schema::SchemaRegistry;
use crate::store::TriplePattern;
use crate::store::mem::TripleStore;
use crate::term::Term;
use crate::vocab;

/// One ordered unit of a handler's execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// Step number; defines execution order and must be unique per workflow.
    pub step: u32,
    /// Action name resolved by the host's action resolver.
    pub action: String,
    /// Parameter names taken from call params or prior step results.
    #[serde(default)]
    pub params: Vec<String>,
}

/// A condition/action pair evaluated after the workflow runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessRule {
    pub condition: String,
    pub action: String,
}

/// Full declarative definition of a business handler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerConfig {
    #[serde(default)]
    pub description: String,
    /// Parameter name → ordered regex patterns.
    #[serde(default)]
    pub extraction_patterns: BTreeMap<String, Vec<String>>,
    /// Steps, in any order; always returned sorted by step number.
    #[serde(default)]
    pub workflow: Vec<WorkflowStep>,
    #[serde(default)]
    pub rules: Vec<BusinessRule>,
}

/// Intent name and description, for listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerSummary {
    pub intent: String,
    pub description: String,
}

/// Registry of declarative handlers over the triple store.
pub struct HandlerRegistry {
    store: Arc<TripleStore>,
    schema: Arc<SchemaRegistry>,
}

impl HandlerRegistry {
    pub fn new(store: Arc<TripleStore>, schema: Arc<SchemaRegistry>) -> Self {
        Self { store, schema }
    }

    fn handler_uri(&self, intent: &str) -> HandlerResult<Term> {
        Ok(self.schema.schema_term(&format!("Handler_{intent}"))?)
    }

    fn rel(&self, name: &str) -> HandlerResult<Term> {
        Ok(self.schema.schema_term(name)?)
    }

    /// Whether a handler is registered for the intent.
    pub fn exists(&self, intent: &str) -> bool {
        let Ok(handler) = self.handler_uri(intent) else {
            return false;
        };
        let Ok(marker) = self.rel("Handler") else {
            return false;
        };
        self.store.contains(&handler, &vocab::rdf_type(), &marker)
    }

    /// Register (or overwrite) the handler for an intent.
    ///
    /// Step numbers must be unique; re-registering the same intent replaces
    /// the previous definition wholesale.
    pub fn register(&self, intent: &str, config: &HandlerConfig) -> HandlerResult<()> {
        let mut seen = std::collections::HashSet::new();
        for step in &config.workflow {
            if !seen.insert(step.step) {
                return Err(HandlerError::DuplicateStep {
                    intent: intent.to_string(),
                    step: step.step,
                });
            }
        }

        // The Handler class itself is ordinary schema data.
        let handler_class = self.rel("Handler")?;
        if !self
            .store
            .contains(&handler_class, &vocab::rdf_type(), &vocab::owl_class())
        {
            self.store
                .add(&handler_class, &vocab::rdf_type(), &vocab::owl_class())?;
            self.store.add(
                &handler_class,
                &vocab::rdfs_label(),
                &Term::literal("BusinessHandler"),
            )?;
        }

        let handler = self.handler_uri(intent)?;
        if self.exists(intent) {
            self.sweep(&handler);
            tracing::debug!(intent, "previous handler definition swept");
        }

        let owned_by = self.rel("ownedBy")?;
        let own = |node: &Term| -> HandlerResult<()> {
            self.store.add(node, &owned_by, &handler)?;
            Ok(())
        };

        self.store.add(&handler, &vocab::rdf_type(), &handler_class)?;
        self.store.add(
            &handler,
            &vocab::rdfs_label(),
            &Term::literal(format!("Handler_{intent}")),
        )?;
        self.store
            .add(&handler, &self.rel("hasIntent")?, &Term::literal(intent))?;
        self.store.add(
            &handler,
            &self.rel("hasDescription")?,
            &Term::literal(&config.description),
        )?;

        // Extraction patterns
        if !config.extraction_patterns.is_empty() {
            let patterns = self.rel(&format!("Patterns_{intent}"))?;
            self.store
                .add(&handler, &self.rel("hasExtractionPatterns")?, &patterns)?;
            self.store.add(
                &patterns,
                &vocab::rdf_type(),
                &self.rel("ExtractionPatterns")?,
            )?;
            own(&patterns)?;

            for (param, regexes) in &config.extraction_patterns {
                let param_node = self.rel(&format!("Param_{intent}_{param}"))?;
                self.store
                    .add(&patterns, &self.rel("hasParameter")?, &param_node)?;
                self.store
                    .add(&param_node, &self.rel("hasName")?, &Term::literal(param))?;
                own(&param_node)?;

                for (i, pattern) in regexes.iter().enumerate() {
                    let pattern_node = self.rel(&format!("Pattern_{intent}_{param}_{i}"))?;
                    self.store
                        .add(&param_node, &self.rel("hasPattern")?, &pattern_node)?;
                    self.store.add(
                        &pattern_node,
                        &self.rel("hasRegex")?,
                        &Term::literal(pattern),
                    )?;
                    self.store.add(
                        &pattern_node,
                        &self.rel("hasIndex")?,
                        &Term::literal(i.to_string()),
                    )?;
                    own(&pattern_node)?;
                }
            }
        }

        // Workflow steps
        if !config.workflow.is_empty() {
            let workflow = self.rel(&format!("Workflow_{intent}"))?;
            self.store
                .add(&handler, &self.rel("hasWorkflow")?, &workflow)?;
            self.store
                .add(&workflow, &vocab::rdf_type(), &self.rel("Workflow")?)?;
            own(&workflow)?;

            for step in &config.workflow {
                let step_node = self.rel(&format!("Step_{intent}_{}", step.step))?;
                self.store.add(&workflow, &self.rel("hasStep")?, &step_node)?;
                self.store
                    .add(&step_node, &vocab::rdf_type(), &self.rel("WorkflowStep")?)?;
                self.store.add(
                    &step_node,
                    &self.rel("hasStepNumber")?,
                    &Term::literal(step.step.to_string()),
                )?;
                self.store.add(
                    &step_node,
                    &self.rel("hasAction")?,
                    &Term::literal(&step.action),
                )?;
                own(&step_node)?;

                for (i, param) in step.params.iter().enumerate() {
                    let param_node =
                        self.rel(&format!("StepParam_{intent}_{}_{i}", step.step))?;
                    self.store
                        .add(&step_node, &self.rel("hasParameter")?, &param_node)?;
                    self.store
                        .add(&param_node, &self.rel("hasName")?, &Term::literal(param))?;
                    self.store.add(
                        &param_node,
                        &self.rel("hasIndex")?,
                        &Term::literal(i.to_string()),
                    )?;
                    own(&param_node)?;
                }
            }
        }

        // Business rules
        if !config.rules.is_empty() {
            let rules = self.rel(&format!("Rules_{intent}"))?;
            self.store.add(&handler, &self.rel("hasRules")?, &rules)?;
            self.store
                .add(&rules, &vocab::rdf_type(), &self.rel("BusinessRules")?)?;
            own(&rules)?;

            for (i, rule) in config.rules.iter().enumerate() {
                let rule_node = self.rel(&format!("Rule_{intent}_{i}"))?;
                self.store.add(&rules, &self.rel("hasRule")?, &rule_node)?;
                self.store
                    .add(&rule_node, &vocab::rdf_type(), &self.rel("BusinessRule")?)?;
                self.store.add(
                    &rule_node,
                    &self.rel("hasCondition")?,
                    &Term::literal(&rule.condition),
                )?;
                self.store.add(
                    &rule_node,
                    &self.rel("hasAction")?,
                    &Term::literal(&rule.action),
                )?;
                self.store.add(
                    &rule_node,
                    &self.rel("hasIndex")?,
                    &Term::literal(i.to_string()),
                )?;
                own(&rule_node)?;
            }
        }

        tracing::info!(
            intent,
            steps = config.workflow.len(),
            rules = config.rules.len(),
            "business handler registered"
        );
        Ok(())
    }

    /// Delete every node owned by the handler, then the handler node itself.
    fn sweep(&self, handler: &Term) {
        let Ok(owned_by) = self.rel("ownedBy") else {
            return;
        };
        for node in self.store.subjects_of(&owned_by, handler) {
            self.store
                .remove_matching(&TriplePattern::subject(&node));
            self.store.remove_matching(&TriplePattern {
                object: Some(&node),
                ..Default::default()
            });
        }
        self.store
            .remove_matching(&TriplePattern::subject(handler));
        self.store.remove_matching(&TriplePattern {
            object: Some(handler),
            ..Default::default()
        });
    }

    /// First literal object of (subject, relation), if any.
    fn literal_of(&self, subject: &Term, relation: &Term) -> Option<String> {
        self.store
            .objects_of(subject, relation)
            .into_iter()
            .next()
            .map(|t| t.lexical().to_string())
    }

    /// Decode an indexed list of (hasIndex, value-producing node) children.
    fn indexed<T>(&self, items: Vec<(usize, T)>) -> Vec<T> {
        let mut items = items;
        items.sort_by_key(|(i, _)| *i);
        items.into_iter().map(|(_, v)| v).collect()
    }

    /// Reconstruct the full handler definition from the graph.
    ///
    /// Steps come back sorted by step number regardless of registration
    /// order: execution order is a correctness property, not a storage
    /// property.
    pub fn get(&self, intent: &str) -> HandlerResult<Option<HandlerConfig>> {
        if !self.exists(intent) {
            return Ok(None);
        }
        let handler = self.handler_uri(intent)?;
        let has_index = self.rel("hasIndex")?;
        let has_name = self.rel("hasName")?;

        let description = self
            .literal_of(&handler, &self.rel("hasDescription")?)
            .unwrap_or_default();

        // Extraction patterns
        let mut extraction_patterns = BTreeMap::new();
        for patterns in self
            .store
            .objects_of(&handler, &self.rel("hasExtractionPatterns")?)
        {
            for param_node in self.store.objects_of(&patterns, &self.rel("hasParameter")?) {
                let Some(name) = self.literal_of(&param_node, &has_name) else {
                    continue;
                };
                let entries: Vec<(usize, String)> = self
                    .store
                    .objects_of(&param_node, &self.rel("hasPattern")?)
                    .into_iter()
                    .filter_map(|pattern_node| {
                        let regex = self.literal_of(&pattern_node, &self.rel("hasRegex").ok()?)?;
                        let index = self
                            .literal_of(&pattern_node, &has_index)
                            .and_then(|i| i.parse().ok())
                            .unwrap_or(0);
                        Some((index, regex))
                    })
                    .collect();
                extraction_patterns.insert(name, self.indexed(entries));
            }
        }

        // Workflow steps
        let mut workflow = Vec::new();
        for wf in self.store.objects_of(&handler, &self.rel("hasWorkflow")?) {
            for step_node in self.store.objects_of(&wf, &self.rel("hasStep")?) {
                let Some(number) = self
                    .literal_of(&step_node, &self.rel("hasStepNumber")?)
                    .and_then(|n| n.parse::<u32>().ok())
                else {
                    tracing::warn!(intent, step = %step_node, "step without a number skipped");
                    continue;
                };
                let Some(action) = self.literal_of(&step_node, &self.rel("hasAction")?) else {
                    continue;
                };
                let params: Vec<(usize, String)> = self
                    .store
                    .objects_of(&step_node, &self.rel("hasParameter")?)
                    .into_iter()
                    .filter_map(|param_node| {
                        let name = self.literal_of(&param_node, &has_name)?;
                        let index = self
                            .literal_of(&param_node, &has_index)
                            .and_then(|i| i.parse().ok())
                            .unwrap_or(0);
                        Some((index, name))
                    })
                    .collect();
                workflow.push(WorkflowStep {
                    step: number,
                    action,
                    params: self.indexed(params),
                });
            }
        }
        workflow.sort_by_key(|s| s.step);

        // Rules
        let mut rules = Vec::new();
        for rules_node in self.store.objects_of(&handler, &self.rel("hasRules")?) {
            let entries: Vec<(usize, BusinessRule)> = self
                .store
                .objects_of(&rules_node, &self.rel("hasRule")?)
                .into_iter()
                .filter_map(|rule_node| {
                    let condition = self.literal_of(&rule_node, &self.rel("hasCondition").ok()?)?;
                    let action = self.literal_of(&rule_node, &self.rel("hasAction").ok()?)?;
                    let index = self
                        .literal_of(&rule_node, &has_index)
                        .and_then(|i| i.parse().ok())
                        .unwrap_or(0);
                    Some((index, BusinessRule { condition, action }))
                })
                .collect();
            rules.extend(self.indexed(entries));
        }

        Ok(Some(HandlerConfig {
            description,
            extraction_patterns,
            workflow,
            rules,
        }))
    }

    /// All registered handlers, sorted by intent.
    pub fn list(&self) -> HandlerResult<Vec<HandlerSummary>> {
        let marker = self.rel("Handler")?;
        let has_intent = self.rel("hasIntent")?;
        let has_description = self.rel("hasDescription")?;
        let mut summaries: Vec<HandlerSummary> = self
            .store
            .subjects_of(&vocab::rdf_type(), &marker)
            .into_iter()
            .filter_map(|handler| {
                let intent = self.literal_of(&handler, &has_intent)?;
                let description = self
                    .literal_of(&handler, &has_description)
                    .unwrap_or_default();
                Some(HandlerSummary {
                    intent,
                    description,
                })
            })
            .collect();
        summaries.sort_by(|a, b| a.intent.cmp(&b.intent));
        Ok(summaries)
    }

    /// Apply a handler's extraction patterns to free text.
    ///
    /// For each parameter, the first matching pattern wins; the value is
    /// capture group 1 when present, the whole match otherwise. Patterns are
    /// matched case-insensitively against whitespace-normalized text;
    /// patterns that fail to compile are skipped with a warning.
    pub fn extract_params(
        &self,
        intent: &str,
        text: &str,
    ) -> HandlerResult<BTreeMap<String, String>> {
        let config = self.get(intent)?.ok_or_else(|| HandlerError::NotFound {
            intent: intent.to_string(),
        })?;

        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut params = BTreeMap::new();

        for (param, patterns) in &config.extraction_patterns {
            for pattern in patterns {
                let regex = match RegexBuilder::new(pattern).case_insensitive(true).build() {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(intent, param = %param, pattern = %pattern, error = %e, "invalid extraction pattern skipped");
                        continue;
                    }
                };
                if let Some(caps) = regex.captures(&normalized) {
                    let value = caps
                        .get(1)
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().trim().to_string())
                        .unwrap_or_default();
                    if !value.is_empty() {
                        params.insert(param.clone(), value);
                        break;
                    }
                }
            }
        }
        Ok(params)
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry").finish()
    }
}
