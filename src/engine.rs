use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use crate::agent::assemble::{
    assemble_recipe, diagnose_recipe, parse_detailed_steps, parse_menus, Diagnostics,
};
use crate::agent::extract::DEFAULT_PREVIEW_CHARS;
use crate::agent::rules::ReferenceTables;
use crate::agent::telemetry::{self, GenerationTrace};
use crate::agent::workflow;
use crate::ai::message::ChatMessage;
use crate::ai::provider::AiProvider;
use crate::catalog::IngredientCatalog;
use crate::config::AppConfig;
use crate::error::AppError;
use crate::recipe::{MenuCandidate, SelectedIngredient, Settings, ValidatedRecipe};
use crate::selection::{self, Advisory, ToggleOutcome};
use crate::session::SessionStore;
use crate::state::{Phase, WorkflowState};
use crate::transfer::{self, ImportedSettings};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub preview_chars: usize,
    pub telemetry_enabled: bool,
    /// Defaults to `<config_dir>/ai-cooking/telemetry`.
    pub telemetry_dir: Option<PathBuf>,
    /// Fixed seed for the selection RNG; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            preview_chars: DEFAULT_PREVIEW_CHARS,
            telemetry_enabled: false,
            telemetry_dir: None,
            seed: None,
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            preview_chars: config.error_preview_chars,
            telemetry_enabled: config.telemetry_enabled,
            ..Self::default()
        }
    }
}

struct Inner {
    state: WorkflowState,
    /// Bumped by every clear; a reply captured under an older value is stale.
    generation: u64,
    /// Set while a model call is outstanding.
    pending: bool,
    diagnostics: Diagnostics,
    rng: StdRng,
}

/// Clears the pending flag however the call ends.
struct PendingGuard<'a> {
    inner: &'a Mutex<Inner>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.pending = false;
    }
}

/// One workflow instance per session. The lock is only ever held for
/// synchronous work; model calls run with it released.
pub struct RecipeEngine {
    inner: Mutex<Inner>,
    provider: Box<dyn AiProvider>,
    session: SessionStore,
    catalog: Arc<dyn IngredientCatalog>,
    tables: ReferenceTables,
    options: EngineOptions,
}

impl RecipeEngine {
    pub fn new(
        provider: Box<dyn AiProvider>,
        session: SessionStore,
        catalog: Arc<dyn IngredientCatalog>,
        tables: ReferenceTables,
        options: EngineOptions,
    ) -> Self {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            inner: Mutex::new(Inner {
                state: WorkflowState::default(),
                generation: 0,
                pending: false,
                diagnostics: Diagnostics::default(),
                rng,
            }),
            provider,
            session,
            catalog,
            tables,
            options,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, AppError> {
        self.inner
            .lock()
            .map_err(|e| AppError::Config(format!("Failed to lock engine state: {}", e)))
    }

    /// Swap in the new state and persist it. A failed write is logged; the
    /// in-memory transition still stands.
    fn commit(&self, inner: &mut Inner, next: WorkflowState) {
        inner.state = next;
        if let Err(e) = self.session.save(&inner.state) {
            warn!(error = %e, "failed to persist session state");
        }
    }

    fn transition(
        &self,
        f: impl FnOnce(&WorkflowState) -> Result<WorkflowState, AppError>,
    ) -> Result<WorkflowState, AppError> {
        let mut inner = self.lock()?;
        let next = f(&inner.state)?;
        self.commit(&mut inner, next);
        Ok(inner.state.clone())
    }

    /// Plan a model call and mark it pending. Rejected with `Busy` while
    /// another call is outstanding.
    fn begin_call(
        &self,
        plan: impl FnOnce(&WorkflowState) -> Result<Vec<ChatMessage>, AppError>,
    ) -> Result<(Vec<ChatMessage>, u64, PendingGuard<'_>), AppError> {
        let mut inner = self.lock()?;
        if inner.pending {
            return Err(AppError::Busy);
        }
        let messages = plan(&inner.state)?;
        inner.pending = true;
        Ok((
            messages,
            inner.generation,
            PendingGuard { inner: &self.inner },
        ))
    }

    fn ensure_current(inner: &Inner, generation: u64) -> Result<(), AppError> {
        if inner.generation != generation {
            info!(
                started = generation,
                current = inner.generation,
                "discarding model reply from a cleared session"
            );
            return Err(AppError::Stale);
        }
        Ok(())
    }

    fn start_trace(&self, action: &str, messages: &[ChatMessage]) -> GenerationTrace {
        let prompt: String = messages.iter().map(|m| m.content.as_str()).collect();
        GenerationTrace::new(action, &prompt, self.provider.model_name())
    }

    fn record<T>(&self, mut trace: GenerationTrace, result: &Result<T, AppError>) {
        if !self.options.telemetry_enabled {
            return;
        }
        trace.success = result.is_ok();
        trace.error = result.as_ref().err().map(|e| e.to_string());
        let written = match &self.options.telemetry_dir {
            Some(dir) => telemetry::write_trace_to(dir, &trace),
            None => telemetry::write_trace(&trace),
        };
        if let Err(e) = written {
            warn!(error = %e, "failed to write generation trace");
        }
    }

    // --- read accessors ---

    /// Load the saved session, if any, and recompute diagnostics for a
    /// restored recipe.
    pub fn restore(&self) -> Result<Phase, AppError> {
        let loaded = self.session.load();
        let mut inner = self.lock()?;
        if let Some(state) = loaded {
            inner.diagnostics = match &state.current_recipe {
                Some(recipe) => diagnose_recipe(
                    recipe,
                    &state.selected_ingredients,
                    &self.tables,
                    self.catalog.as_ref(),
                ),
                None => Diagnostics::default(),
            };
            inner.state = state;
            info!(phase = ?inner.state.phase(), "session restored");
        }
        Ok(inner.state.phase())
    }

    pub fn snapshot(&self) -> Result<WorkflowState, AppError> {
        Ok(self.lock()?.state.clone())
    }

    pub fn phase(&self) -> Result<Phase, AppError> {
        Ok(self.lock()?.state.phase())
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.lock()
            .map(|inner| inner.diagnostics.clone())
            .unwrap_or_default()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().map(|inner| inner.pending).unwrap_or(false)
    }

    pub fn catalog(&self) -> &dyn IngredientCatalog {
        self.catalog.as_ref()
    }

    // --- model-calling transitions ---

    /// Ask for menus. `settings`, when given, replace the stored settings on
    /// success.
    pub async fn propose_menus(
        &self,
        settings: Option<Settings>,
    ) -> Result<Vec<MenuCandidate>, AppError> {
        self.run_menu_proposal("propose_menus", settings, false)
            .await
    }

    /// New menus avoiding the names of the ones being replaced.
    pub async fn regenerate(&self) -> Result<Vec<MenuCandidate>, AppError> {
        self.run_menu_proposal("regenerate", None, true).await
    }

    async fn run_menu_proposal(
        &self,
        action: &'static str,
        settings: Option<Settings>,
        regenerate: bool,
    ) -> Result<Vec<MenuCandidate>, AppError> {
        let (messages, generation, _pending) = self.begin_call(|state| match &settings {
            Some(s) => {
                workflow::plan_menu_proposal(&workflow::with_settings(state, s.clone()), regenerate)
            }
            None => workflow::plan_menu_proposal(state, regenerate),
        })?;
        let mut trace = self.start_trace(action, &messages);

        let reply = self.provider.complete(&messages).await;
        let result = self.finish_menu_proposal(reply, generation, settings);

        if let Ok(menus) = &result {
            trace.menu_count = Some(menus.len());
        }
        self.record(trace, &result);
        result
    }

    fn finish_menu_proposal(
        &self,
        reply: Result<String, AppError>,
        generation: u64,
        settings: Option<Settings>,
    ) -> Result<Vec<MenuCandidate>, AppError> {
        let raw = reply?;
        let mut inner = self.lock()?;
        Self::ensure_current(&inner, generation)?;

        let menus = parse_menus(&raw, self.options.preview_chars)?;
        let mut next = workflow::apply_menu_proposal(&inner.state, menus.clone());
        if let Some(settings) = settings {
            next = workflow::with_settings(&next, settings);
        }
        inner.diagnostics = Diagnostics::default();
        self.commit(&mut inner, next);
        info!(count = menus.len(), "menus proposed");
        Ok(menus)
    }

    /// Turn the selected menu into a validated recipe. On failure the menu
    /// list and selection are left as they were.
    pub async fn confirm_selection(&self) -> Result<ValidatedRecipe, AppError> {
        let (messages, generation, _pending) = self.begin_call(workflow::plan_recipe)?;
        let mut trace = self.start_trace("confirm_selection", &messages);

        let reply = self.provider.complete(&messages).await;
        let result = self.finish_recipe(reply, generation);

        if let Ok(recipe) = &result {
            let diagnostics = self.diagnostics();
            trace.menu_name = Some(recipe.menu_name.clone());
            trace.violations = diagnostics.violations.len();
            trace.warnings = diagnostics.warnings.len();
            trace.contradictions = diagnostics.contradictions.len();
        }
        self.record(trace, &result);
        result
    }

    fn finish_recipe(
        &self,
        reply: Result<String, AppError>,
        generation: u64,
    ) -> Result<ValidatedRecipe, AppError> {
        let raw = reply?;
        let mut inner = self.lock()?;
        Self::ensure_current(&inner, generation)?;

        let assembled = assemble_recipe(
            &raw,
            &inner.state.selected_ingredients,
            &self.tables,
            self.catalog.as_ref(),
            self.options.preview_chars,
        )?;
        let next = workflow::apply_recipe(&inner.state, assembled.recipe.clone())?;
        inner.diagnostics = assembled.diagnostics;
        self.commit(&mut inner, next);
        Ok(assembled.recipe)
    }

    /// Replace the recipe's steps with a more detailed version. Ingredient
    /// diagnostics are not recomputed.
    pub async fn expand_steps(&self) -> Result<Vec<String>, AppError> {
        let (messages, generation, _pending) = self.begin_call(workflow::plan_step_expansion)?;
        let trace = self.start_trace("expand_steps", &messages);

        let reply = self.provider.complete(&messages).await;
        let result = self.finish_steps(reply, generation);

        self.record(trace, &result);
        result
    }

    fn finish_steps(
        &self,
        reply: Result<String, AppError>,
        generation: u64,
    ) -> Result<Vec<String>, AppError> {
        let raw = reply?;
        let mut inner = self.lock()?;
        Self::ensure_current(&inner, generation)?;

        let steps = parse_detailed_steps(&raw, self.options.preview_chars)?;
        let next = workflow::apply_detailed_steps(&inner.state, steps.clone())?;
        self.commit(&mut inner, next);
        Ok(steps)
    }

    // --- synchronous transitions ---

    /// Rejected with `Busy` while a call is outstanding, so a pending recipe
    /// always lands on the menu it was generated for.
    pub fn select_menu(&self, index: usize) -> Result<Option<usize>, AppError> {
        let mut inner = self.lock()?;
        if inner.pending {
            return Err(AppError::Busy);
        }
        let next = workflow::select_menu(&inner.state, index)?;
        self.commit(&mut inner, next);
        Ok(inner.state.selected_menu_index)
    }

    pub fn back_to_menus(&self) -> Result<Phase, AppError> {
        let mut inner = self.lock()?;
        if inner.pending {
            return Err(AppError::Busy);
        }
        let next = workflow::back_to_menus(&inner.state)?;
        inner.diagnostics = Diagnostics::default();
        self.commit(&mut inner, next);
        Ok(inner.state.phase())
    }

    /// Back to `Idle`, keeping ingredients and settings. Any reply still in
    /// flight will be discarded.
    pub fn clear(&self) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner.generation += 1;
        inner.diagnostics = Diagnostics::default();
        let next = workflow::clear(&inner.state);
        self.commit(&mut inner, next);
        Ok(())
    }

    /// Like [`clear`](Self::clear), and also drops the selection and settings.
    pub fn clear_all(&self) -> Result<(), AppError> {
        let mut inner = self.lock()?;
        inner.generation += 1;
        inner.diagnostics = Diagnostics::default();
        self.commit(&mut inner, workflow::clear_all());
        Ok(())
    }

    pub fn update_settings(&self, settings: Settings) -> Result<(), AppError> {
        self.transition(|state| Ok(workflow::with_settings(state, settings)))?;
        Ok(())
    }

    pub fn random_settings(&self) -> Result<Settings, AppError> {
        let mut inner = self.lock()?;
        let settings = selection::random_settings(&mut inner.rng);
        let next = workflow::with_settings(&inner.state, settings.clone());
        self.commit(&mut inner, next);
        Ok(settings)
    }

    // --- ingredient selection ---

    pub fn toggle_ingredient(&self, id: &str) -> Result<ToggleOutcome, AppError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let mut picked = inner.state.selected_ingredients.clone();
        let outcome = selection::toggle(&mut picked, id, self.catalog.as_ref(), &mut inner.rng)?;
        let next = workflow::with_selection(&inner.state, picked);
        self.commit(inner, next);
        Ok(outcome)
    }

    /// Replace the selection with a chef's-choice pick.
    pub fn random_select(&self) -> Result<Vec<SelectedIngredient>, AppError> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let picked = selection::random_pick(self.catalog.as_ref(), &mut inner.rng);
        let next = workflow::with_selection(&inner.state, picked.clone());
        self.commit(inner, next);
        Ok(picked)
    }

    pub fn clear_selection(&self) -> Result<(), AppError> {
        self.transition(|state| Ok(workflow::with_selection(state, Vec::new())))?;
        Ok(())
    }

    pub fn selection_advisories(&self) -> Result<Vec<Advisory>, AppError> {
        Ok(selection::advisories(&self.lock()?.state.selected_ingredients))
    }

    // --- export / import ---

    pub fn export_settings(&self, now: DateTime<Utc>) -> Result<String, AppError> {
        transfer::export_json(&self.lock()?.state, now)
    }

    /// Replace selection and settings from an exported bundle. A bundle from
    /// another application is refused unless `allow_foreign` is set.
    pub fn import_settings(
        &self,
        raw: &str,
        allow_foreign: bool,
    ) -> Result<ImportedSettings, AppError> {
        let imported = transfer::parse_bundle(raw)?;
        if imported.foreign_app && !allow_foreign {
            return Err(AppError::Validation(
                "bundle was exported by another application".into(),
            ));
        }
        self.transition(|state| {
            let next = workflow::with_settings(state, imported.settings.clone());
            Ok(workflow::with_selection(
                &next,
                imported.selected_ingredients.clone(),
            ))
        })?;
        info!(
            ingredients = imported.selected_ingredients.len(),
            "settings imported"
        );
        Ok(imported)
    }
}
