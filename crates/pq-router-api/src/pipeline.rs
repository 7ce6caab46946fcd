//! End-to-end routing of one question.
//!
//! classify → resolve follow-up → rule router → (model routing when
//! confidence is low) → query building or namespace attachment → context
//! write. Every model step is optional: without a backend, with the breaker
//! open, on failure or on cancellation, the deterministic result stands and
//! the decision's `reason` says which fallback was taken.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::{Local, NaiveDate, Utc};
use pq_intent::{
    ClassifierConfig, ContextEntry, FollowUpConfig, FollowUpContext, FollowUpKind,
    FollowUpResolver, IntentClassifier, QuickContext,
};
use pq_protocol::{
    Classification, ConversationTurn, RouteSource, RouterDecision, Task, parse_merge_response,
    parse_route_response,
};
use pq_query::{
    BuildError, BuildRequest, SafetyError, SafetyValidator, SchemaDictionary, build_or_list,
    build_validated,
};
use tracing::{debug, info, warn};

use crate::config::{ApiConfig, Thresholds};
use crate::inference::generation::generate_query;
use crate::inference::rules::{RuleContext, RuleRouter};
use crate::inference::{ModelError, prompts};
use crate::resilience::ResilientModel;

/// One question to route.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    pub question: String,
    pub user_id: Option<String>,
    /// Recent turns, oldest first.
    pub history: Vec<ConversationTurn>,
    /// Reference date for relative dates and current-year defaults.
    pub today: NaiveDate,
}

impl RouteRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            user_id: None,
            history: Vec::new(),
            today: Local::now().date_naive(),
        }
    }

    pub fn for_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn on(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PipelineError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("query rejected by safety validator: {0}")]
    UnsafeQuery(#[from] SafetyError),

    #[error("no query could be produced for this question")]
    NoQuery,
}

impl From<BuildError> for PipelineError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::Unsafe { source, .. } => PipelineError::UnsafeQuery(source),
            BuildError::NoBuilder => PipelineError::NoQuery,
        }
    }
}

/// Races model steps against a caller-supplied cancellation signal. Once
/// the signal fires, every later step is refused without starting.
struct Cancellation<C> {
    signal: Pin<Box<C>>,
    fired: bool,
}

impl<C: Future<Output = ()>> Cancellation<C> {
    fn new(signal: C) -> Self {
        Self {
            signal: Box::pin(signal),
            fired: false,
        }
    }

    async fn run<T>(
        &mut self,
        step: impl Future<Output = Result<T, ModelError>>,
    ) -> Result<T, ModelError> {
        if self.fired {
            return Err(ModelError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.signal.as_mut() => {
                self.fired = true;
                warn!("model step cancelled by caller");
                Err(ModelError::Cancelled)
            }
            result = step => result,
        }
    }
}

fn follow_up_label(kind: FollowUpKind) -> &'static str {
    match kind {
        FollowUpKind::Continuation => "continuation",
        FollowUpKind::Modification => "modification",
        FollowUpKind::PronounDelta => "pronoun reference",
    }
}

/// Routing service object. Cheap to share behind an `Arc`.
pub struct RoutingPipeline {
    classifier: IntentClassifier,
    resolver: FollowUpResolver,
    rules: RuleRouter,
    validator: SafetyValidator,
    context: QuickContext,
    model: Option<ResilientModel>,
    thresholds: Thresholds,
    namespaces: Vec<String>,
    schema: SchemaDictionary,
}

impl Default for RoutingPipeline {
    fn default() -> Self {
        Self::new(&Thresholds::default())
    }
}

impl RoutingPipeline {
    pub fn new(thresholds: &Thresholds) -> Self {
        let schema = SchemaDictionary::builtin();
        Self {
            classifier: IntentClassifier::new(ClassifierConfig {
                min_confidence: thresholds.classifier_min_confidence,
                tie_margin: thresholds.tie_margin,
            }),
            resolver: FollowUpResolver::new(FollowUpConfig {
                assist_low: thresholds.followup_assist_low,
                assist_high: thresholds.followup_assist_high,
                ..FollowUpConfig::default()
            }),
            rules: RuleRouter::new(thresholds.rule_floor, thresholds.catch_all_floor),
            validator: SafetyValidator::new(schema.clone(), pq_protocol::MAX_LIMIT),
            context: QuickContext::default(),
            model: None,
            thresholds: *thresholds,
            namespaces: crate::config::ApiConfig::default().namespaces,
            schema,
        }
    }

    /// Pipeline wired from service configuration.
    pub fn from_config(
        config: &ApiConfig,
        schema: SchemaDictionary,
        model: Option<ResilientModel>,
    ) -> Self {
        let pipeline = Self::new(&config.thresholds)
            .with_schema(schema)
            .with_namespaces(config.namespaces.clone())
            .with_context(QuickContext::new(
                Duration::from_secs(config.context.ttl_secs),
                config.context.capacity,
            ));
        match model {
            Some(model) => pipeline.with_model(model),
            None => pipeline,
        }
    }

    pub fn with_model(mut self, model: ResilientModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Replace the schema dictionary used for validation and prompts.
    pub fn with_schema(mut self, schema: SchemaDictionary) -> Self {
        self.validator = SafetyValidator::new(schema.clone(), self.validator.max_rows());
        self.schema = schema;
        self
    }

    pub fn with_namespaces(mut self, namespaces: Vec<String>) -> Self {
        self.namespaces = namespaces;
        self
    }

    pub fn with_context(mut self, context: QuickContext) -> Self {
        self.context = context;
        self
    }

    pub fn context(&self) -> &QuickContext {
        &self.context
    }

    pub fn model(&self) -> Option<&ResilientModel> {
        self.model.as_ref()
    }

    pub fn schema(&self) -> &SchemaDictionary {
        &self.schema
    }

    pub async fn route(&self, request: &RouteRequest) -> Result<RouterDecision, PipelineError> {
        self.route_until(request, std::future::pending()).await
    }

    /// Route, abandoning model steps once `cancel` completes.
    pub async fn route_until<C>(
        &self,
        request: &RouteRequest,
        cancel: C,
    ) -> Result<RouterDecision, PipelineError>
    where
        C: Future<Output = ()>,
    {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        let mut cancel = Cancellation::new(cancel);

        let mut classification = self.classifier.classify_at(question, request.today);
        let follow_up = self.resolve_follow_up(question, &classification, request);
        let mut notes = Vec::new();

        if let Some(fu) = &follow_up {
            classification.intent = fu.intent;
            classification.parameters = fu.parameters.clone();
            notes.push(format!(
                "follow-up ({}) of \"{}\"",
                follow_up_label(fu.kind),
                fu.prior.question
            ));
            if !fu.unapplied_exclusions.is_empty() {
                let ids: Vec<String> = fu.unapplied_exclusions.iter().map(ToString::to_string).collect();
                notes.push(format!(
                    "exclusion of {} not applied: no equipment filter to exclude from",
                    ids.join(", ")
                ));
            }
            if fu.needs_model_merge
                && let Some(note) = self
                    .assist_merge(question, fu, &mut classification, &mut cancel)
                    .await
            {
                notes.push(note);
            }
        }

        let ctx = RuleContext::new(question, &classification);
        let mut decision = self.rules.route(&ctx);
        decision.follow_up = follow_up.is_some();
        for note in &notes {
            decision.note(note);
        }

        if decision.confidence < self.thresholds.model_routing_threshold {
            self.assist_routing(question, &mut decision, &mut cancel).await;
        }

        match decision.task {
            Task::StructuredQuery => {
                self.attach_query(question, request.today, &mut decision, &mut cancel)
                    .await?
            }
            Task::Retrieval => {
                if decision.namespaces.is_none() {
                    decision.namespaces = Some(self.namespaces.clone());
                }
            }
            Task::OptimizationAdvice => {}
        }

        if let Some(user) = &request.user_id {
            self.context.put(
                user,
                ContextEntry {
                    intent: decision.intent,
                    parameters: decision.parameters.clone(),
                    question: question.to_string(),
                    task: Some(decision.task),
                    resolved_at: Utc::now(),
                },
            );
        }

        info!(
            id = %decision.id,
            task = %decision.task,
            confidence = decision.confidence,
            source = ?decision.route_source,
            rule = decision.matched_rule.as_deref().unwrap_or("-"),
            follow_up = decision.follow_up,
            "question routed"
        );
        Ok(decision)
    }

    fn resolve_follow_up(
        &self,
        question: &str,
        classification: &Classification,
        request: &RouteRequest,
    ) -> Option<FollowUpContext> {
        let prior = request
            .user_id
            .as_deref()
            .and_then(|user| self.context.get(user))
            .map(|entry| entry.to_prior())
            .or_else(|| {
                self.resolver
                    .prior_from_history(&self.classifier, &request.history, request.today)
            });
        self.resolver.resolve(question, classification, prior.as_ref())
    }

    /// Ask the model to refine a follow-up merge. Returns a reason clause.
    async fn assist_merge<C: Future<Output = ()>>(
        &self,
        question: &str,
        fu: &FollowUpContext,
        classification: &mut Classification,
        cancel: &mut Cancellation<C>,
    ) -> Option<String> {
        let model = self.model.as_ref()?;
        let request =
            prompts::merge_request(question, &fu.prior.question, &fu.prior.parameters, &fu.delta);
        match cancel
            .run(model.call_parsed(&request, parse_merge_response))
            .await
        {
            Ok(merge) if merge.confidence >= self.thresholds.merge_confidence_floor => {
                debug!(confidence = merge.confidence, "model merge accepted");
                classification.parameters = merge.parameters.merged_over(&fu.parameters);
                Some("parameters merged with model assistance".to_string())
            }
            Ok(merge) => Some(format!(
                "model merge confidence {:.2} below floor; deterministic merge kept",
                merge.confidence
            )),
            Err(e) => Some(format!("model merge failed ({e}); deterministic merge kept")),
        }
    }

    async fn assist_routing<C: Future<Output = ()>>(
        &self,
        question: &str,
        decision: &mut RouterDecision,
        cancel: &mut Cancellation<C>,
    ) {
        let Some(model) = &self.model else {
            decision.note("no model configured; deterministic decision kept");
            return;
        };
        let request = prompts::routing_request(question, &self.schema);
        match cancel
            .run(model.call_parsed(&request, parse_route_response))
            .await
        {
            Ok(route) => {
                info!(
                    task = %route.task,
                    confidence = route.confidence,
                    rules_task = %decision.task,
                    "model-assisted routing"
                );
                let deterministic = std::mem::take(&mut decision.reason);
                decision.task = route.task;
                decision.confidence = route.confidence;
                decision.route_source = RouteSource::ModelAssisted;
                decision.reason = format!("model: {}", route.reason);
                decision.note(format!("rules: {deterministic}"));
                if route.task == Task::Retrieval {
                    decision.namespaces = route.namespaces;
                }
            }
            Err(e) => {
                warn!(error = %e, "model routing failed, keeping deterministic decision");
                decision.note(format!("model routing failed ({e}); deterministic fallback"));
            }
        }
    }

    async fn attach_query<C: Future<Output = ()>>(
        &self,
        question: &str,
        today: NaiveDate,
        decision: &mut RouterDecision,
        cancel: &mut Cancellation<C>,
    ) -> Result<(), PipelineError> {
        let params = decision.parameters.clone();
        let build = BuildRequest::new(&params, question, today);

        let built = match build_validated(&build, &self.validator) {
            Ok(built) => built,
            Err(BuildError::NoBuilder) => {
                if let Some(model) = &self.model {
                    match cancel
                        .run(generate_query(model, &self.schema, question, &params))
                        .await
                    {
                        Ok(generated) => {
                            let query = self.validator.validate(&generated.query)?;
                            decision.generated_query = Some(query);
                            decision.note(format!(
                                "model-generated query ({})",
                                generated.strategy.as_str()
                            ));
                            return Ok(());
                        }
                        Err(e) => {
                            decision.note(format!("query generation failed ({e}); listing fallback"))
                        }
                    }
                } else {
                    decision.note("no query builder applies; listing fallback");
                }
                build_or_list(&build, &self.validator)?
            }
            Err(e) => return Err(e.into()),
        };

        decision.note(format!("query builder `{}`", built.builder));
        decision.generated_query = Some(built.query);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use pq_protocol::{ModelRequest, Shift};

    use crate::inference::ModelClient;
    use crate::resilience::tests::{ScriptedModel, resilient};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    fn ask(text: &str) -> RouteRequest {
        RouteRequest::new(text).on(today())
    }

    fn with_model(client: Arc<ScriptedModel>, threshold: u32) -> RoutingPipeline {
        RoutingPipeline::default().with_model(resilient(client, threshold))
    }

    // ── Deterministic routing ───────────────────────────────────

    #[tokio::test]
    async fn chart_question_builds_plain_series() {
        let decision = RoutingPipeline::default()
            .route(&ask("have shift A, B, C production data with different color"))
            .await
            .unwrap();
        assert_eq!(decision.task, Task::StructuredQuery);
        assert_eq!(decision.route_source, RouteSource::Deterministic);
        let query = decision.generated_query.unwrap();
        assert!(
            query.starts_with(
                "SELECT date, shift, production_tons FROM production_summary \
                 WHERE shift IN ('A', 'B', 'C') ORDER BY date, shift"
            ),
            "{query}"
        );
        assert!(!query.contains("GROUP BY"));
    }

    #[tokio::test]
    async fn forecast_is_advice_without_query() {
        let decision = RoutingPipeline::default()
            .route(&ask("forecast next week production"))
            .await
            .unwrap();
        assert_eq!(decision.task, Task::OptimizationAdvice);
        assert!(decision.generated_query.is_none());
        assert!(decision.namespaces.is_none());
    }

    #[tokio::test]
    async fn advisory_question_gets_namespaces() {
        let decision = RoutingPipeline::default()
            .with_namespaces(vec!["manuals".into()])
            .route(&ask("best practice for excavator maintenance"))
            .await
            .unwrap();
        assert_eq!(decision.task, Task::Retrieval);
        assert_eq!(decision.namespaces, Some(vec!["manuals".to_string()]));
    }

    #[tokio::test]
    async fn empty_question_is_rejected() {
        let err = RoutingPipeline::default().route(&ask("   ")).await.unwrap_err();
        assert_eq!(err, PipelineError::EmptyQuestion);
    }

    #[tokio::test]
    async fn unmatched_data_question_gets_listing_without_model() {
        let decision = RoutingPipeline::default()
            .route(&ask("give me the production records"))
            .await
            .unwrap();
        assert_eq!(decision.task, Task::StructuredQuery);
        assert!(decision.reason.contains("listing fallback"), "{}", decision.reason);
        assert!(decision.generated_query.unwrap().contains("ORDER BY date DESC"));
    }

    // ── Follow-ups ──────────────────────────────────────────────

    #[tokio::test]
    async fn follow_up_inherits_from_quick_context() {
        let pipeline = RoutingPipeline::default();
        pipeline
            .route(&ask("production for january").for_user("u1"))
            .await
            .unwrap();
        let decision = pipeline
            .route(&ask("and for shift B?").for_user("u1"))
            .await
            .unwrap();
        assert!(decision.follow_up);
        assert_eq!(decision.parameters.month.map(|m| m.number()), Some(1));
        assert_eq!(decision.parameters.shifts, vec![Shift::B]);
        assert!(decision.reason.contains("follow-up"));
    }

    #[tokio::test]
    async fn follow_up_from_history_when_context_is_empty() {
        let decision = RoutingPipeline::default()
            .route(
                &ask("what about shift B?")
                    .with_history(vec![ConversationTurn::new("production for january")]),
            )
            .await
            .unwrap();
        assert!(decision.follow_up);
        assert_eq!(decision.parameters.month.map(|m| m.number()), Some(1));
    }

    #[tokio::test]
    async fn three_shifts_with_or_keep_every_shift() {
        let decision = RoutingPipeline::default()
            .route(&ask("total production for shift A, B or C"))
            .await
            .unwrap();
        assert!(decision.parameters.comparison.is_none());
        let query = decision.generated_query.unwrap();
        assert!(query.contains("'C'"), "{query}");
        assert!(!query.contains("IN ('A', 'B')"), "{query}");
    }

    #[tokio::test]
    async fn period_determiner_does_not_inherit_prior_filters() {
        let pipeline = RoutingPipeline::default();
        pipeline
            .route(&ask("shift A production for january").for_user("u"))
            .await
            .unwrap();
        let decision = pipeline
            .route(&ask("total production this month").for_user("u"))
            .await
            .unwrap();
        assert!(!decision.follow_up);
        assert!(decision.parameters.shifts.is_empty());
        let query = decision.generated_query.unwrap();
        assert!(!query.contains("shift = 'A'"), "{query}");
    }

    #[tokio::test]
    async fn unapplied_equipment_exclusion_is_explained() {
        let pipeline = RoutingPipeline::default();
        pipeline
            .route(&ask("production for january").for_user("u1"))
            .await
            .unwrap();
        let decision = pipeline
            .route(&ask("same but excluding EX-189").for_user("u1"))
            .await
            .unwrap();
        assert!(decision.follow_up);
        assert!(decision.parameters.equipment.is_empty());
        assert!(
            decision.reason.contains("exclusion of EX-189 not applied"),
            "{}",
            decision.reason
        );
    }

    #[tokio::test]
    async fn users_do_not_share_context() {
        let pipeline = RoutingPipeline::default();
        pipeline
            .route(&ask("production for january").for_user("u1"))
            .await
            .unwrap();
        let decision = pipeline
            .route(&ask("and for shift B?").for_user("u2"))
            .await
            .unwrap();
        assert!(!decision.follow_up);
        assert!(decision.parameters.month.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn low_confidence_merge_is_discarded() {
        let client = Arc::new(ScriptedModel::always(Ok(
            r#"{"parameters": {"month": 2}, "confidence": 0.4}"#.into(),
        )));
        let pipeline = with_model(client, 5);
        pipeline
            .route(&ask("production for january").for_user("u1"))
            .await
            .unwrap();
        let decision = pipeline
            .route(&ask("only for shift B instead").for_user("u1"))
            .await
            .unwrap();
        assert_eq!(decision.parameters.month.map(|m| m.number()), Some(1));
        assert!(decision.reason.contains("below floor"), "{}", decision.reason);
    }

    // ── Model-assisted paths ────────────────────────────────────

    #[tokio::test(start_paused = true)]
    async fn model_routes_low_confidence_questions() {
        let client = Arc::new(ScriptedModel::always(Ok(
            r#"{"task": "retrieval", "confidence": 0.8, "reason": "asks about documents"}"#.into(),
        )));
        let decision = with_model(client, 5)
            .route(&ask("why is that?"))
            .await
            .unwrap();
        assert_eq!(decision.route_source, RouteSource::ModelAssisted);
        assert_eq!(decision.task, Task::Retrieval);
        assert!(decision.reason.starts_with("model: asks about documents"));
        assert!(decision.namespaces.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_model_response_falls_back() {
        let client = Arc::new(ScriptedModel::always(Ok("I am not JSON".into())));
        let decision = with_model(client.clone(), 5)
            .route(&ask("why is that?"))
            .await
            .unwrap();
        assert_eq!(decision.route_source, RouteSource::Deterministic);
        assert!(decision.reason.contains("deterministic fallback"), "{}", decision.reason);
        assert_eq!(client.calls(), 1, "structural errors are not retried");
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_short_circuits_with_reason() {
        let client = Arc::new(ScriptedModel::always(Err(ModelError::Transport(
            "connection refused".into(),
        ))));
        let pipeline = with_model(client.clone(), 2);
        for _ in 0..2 {
            pipeline.route(&ask("why is that?")).await.unwrap();
        }
        let before = client.calls();

        let decision = pipeline.route(&ask("why is that?")).await.unwrap();
        assert_eq!(client.calls(), before);
        assert_eq!(decision.route_source, RouteSource::Deterministic);
        assert!(decision.reason.contains("circuit breaker open"), "{}", decision.reason);
    }

    #[tokio::test(start_paused = true)]
    async fn model_generated_query_is_validated() {
        let client = Arc::new(ScriptedModel::scripted(
            vec![
                Ok(r#"{"tables": ["production_summary"]}"#.into()),
                Ok(r#"{"query": "SELECT date, production_tons FROM production_summary"}"#.into()),
            ],
            Err(ModelError::Timeout),
        ));
        let decision = with_model(client, 5)
            .route(&ask("give me the production records"))
            .await
            .unwrap();
        let query = decision.generated_query.unwrap();
        assert!(query.starts_with("SELECT date, production_tons FROM production_summary"));
        assert!(query.contains("LIMIT"));
        assert!(decision.reason.contains("two-stage"));
    }

    #[tokio::test(start_paused = true)]
    async fn unsafe_generated_query_is_an_error() {
        let client = Arc::new(ScriptedModel::scripted(
            vec![
                Ok(r#"{"tables": ["production_summary"]}"#.into()),
                Ok(r#"{"query": "DELETE FROM production_summary"}"#.into()),
            ],
            Err(ModelError::Timeout),
        ));
        let err = with_model(client, 5)
            .route(&ask("give me the production records"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnsafeQuery(_)));
    }

    struct StalledModel;

    #[async_trait]
    impl ModelClient for StalledModel {
        async fn complete(&self, _request: &ModelRequest) -> Result<String, ModelError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(String::new())
        }

        fn backend_name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_keeps_deterministic_decision() {
        let model = ResilientModel::new(
            Arc::new(StalledModel),
            Arc::default(),
            crate::resilience::RetryPolicy::default(),
        );
        let pipeline = RoutingPipeline::default().with_model(model.clone());
        let decision = pipeline
            .route_until(
                &ask("why is that?"),
                tokio::time::sleep(Duration::from_secs(1)),
            )
            .await
            .unwrap();
        assert_eq!(decision.route_source, RouteSource::Deterministic);
        assert!(decision.reason.contains("cancelled"), "{}", decision.reason);
        assert_eq!(model.breaker().snapshot().recent_failures, 0);
    }
}
