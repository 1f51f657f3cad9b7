//! Agent control loop: a vision planner routing instructions to engines,
//! bounded by a step budget and stoppable from another thread.

pub mod memory;
pub mod world_model;

pub use memory::ShortTermMemory;
pub use world_model::{EngineKind, Plan, WorldModel};

use crate::driver::Driver;
use crate::engine::{
    EngineResult, ExtractionEngine, NavigationControls, NavigationEngine, Rephraser,
};
use crate::error::{Result, WebpilotError};
use crate::llm::{LanguageModel, MultiModalModel};
use crate::retrieval::Bm25Ranker;
use crate::trajectory::{Action, ActionStatus, Trajectory};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Default planning cycles per run
pub const DEFAULT_N_STEPS: usize = 10;

/// Cooperative cancellation handle.
///
/// Clone it, hand the clone to another thread, call [`stop`](Self::stop);
/// the agent checks it at the top of each cycle and between attempts and
/// finishes the run with a cancelled trajectory.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// The full agent: drives a browser toward an objective, one planned
/// instruction per cycle, and records everything as a [`Trajectory`].
pub struct WebAgent {
    driver: Box<dyn Driver>,
    world_model: Box<dyn MultiModalModel>,
    action_model: Box<dyn LanguageModel>,
    memory: ShortTermMemory,
    stop: StopSignal,
    pub n_steps: usize,
    pub n_attempts: usize,
    pub time_between_actions: Duration,
    /// Screenshot downscale factor for the planner; 1.0 sends full size
    pub screenshot_ratio: f32,
    pub viewport_only: bool,
    pub use_rephraser: bool,
    pub retrieval_top_k: usize,
}

impl WebAgent {
    pub fn new(
        driver: Box<dyn Driver>,
        world_model: Box<dyn MultiModalModel>,
        action_model: Box<dyn LanguageModel>,
    ) -> Self {
        Self {
            driver,
            world_model,
            action_model,
            memory: ShortTermMemory::new(),
            stop: StopSignal::new(),
            n_steps: DEFAULT_N_STEPS,
            n_attempts: crate::engine::navigation::DEFAULT_N_ATTEMPTS,
            time_between_actions: crate::engine::navigation::DEFAULT_TIME_BETWEEN_ACTIONS,
            screenshot_ratio: 1.0,
            viewport_only: false,
            use_rephraser: false,
            retrieval_top_k: crate::retrieval::rank::DEFAULT_TOP_K,
        }
    }

    pub fn n_steps(mut self, n_steps: usize) -> Self {
        self.n_steps = n_steps.max(1);
        self
    }

    pub fn n_attempts(mut self, n_attempts: usize) -> Self {
        self.n_attempts = n_attempts.max(1);
        self
    }

    pub fn time_between_actions(mut self, cooldown: Duration) -> Self {
        self.time_between_actions = cooldown;
        self
    }

    pub fn screenshot_ratio(mut self, ratio: f32) -> Self {
        self.screenshot_ratio = ratio.clamp(0.1, 1.0);
        self
    }

    pub fn viewport_only(mut self, viewport_only: bool) -> Self {
        self.viewport_only = viewport_only;
        self
    }

    pub fn use_rephraser(mut self, use_rephraser: bool) -> Self {
        self.use_rephraser = use_rephraser;
        self
    }

    /// Data the planner may use when writing instructions
    pub fn add_user_input(&mut self, input: impl Into<String>) {
        self.memory.add_user_input(input);
    }

    /// Handle for cancelling the run from another thread
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run toward the objective. The trajectory always comes back: completed
    /// when the planner stopped, cancelled on the stop signal, failed when
    /// the step budget ran out or an infrastructure error hit.
    pub fn run(&mut self, url: &str, objective: &str) -> Trajectory {
        let mut trajectory = Trajectory::new(url, objective);
        trajectory.start();
        match self.run_loop(url, objective, &mut trajectory) {
            Ok(()) => {}
            Err(WebpilotError::Cancelled) => {
                log::info!("run cancelled by stop signal");
                trajectory.cancel();
            }
            Err(e) => {
                log::error!("run failed: {e}");
                trajectory.fail();
            }
        }
        trajectory
    }

    fn run_loop(&mut self, url: &str, objective: &str, trajectory: &mut Trajectory) -> Result<()> {
        self.driver.goto(url)?;
        for step in 0..self.n_steps {
            if self.stop.is_stopped() {
                return Err(WebpilotError::Cancelled);
            }
            let screenshot = self.capture_screenshot()?;
            let tabs = self.driver.get_tabs()?;
            let plan = WorldModel::new(&*self.world_model).plan(
                objective,
                &self.memory.current_state_summary(),
                &self.memory.previous_instructions_summary(),
                self.memory.last_engine().unwrap_or("[NONE]"),
                &tabs,
                &[screenshot],
            )?;
            log::info!(
                "step {}/{}: {:?} -> {:?}",
                step + 1,
                self.n_steps,
                plan.engine,
                plan.instruction
            );
            self.memory.note_engine(format!("{:?}", plan.engine));

            let result = match plan.engine {
                EngineKind::Stop => {
                    trajectory.complete();
                    return Ok(());
                }
                EngineKind::Navigation => {
                    let mut engine = NavigationEngine::new(
                        &*self.driver,
                        &*self.action_model,
                        Box::new(Bm25Ranker::new(self.retrieval_top_k)),
                    )
                    .n_attempts(self.n_attempts)
                    .time_between_actions(self.time_between_actions)
                    .viewport_only(self.viewport_only);
                    if self.use_rephraser {
                        engine = engine.rephraser(Rephraser::new(&*self.action_model));
                    }
                    engine.execute_instruction(&plan.instruction, Some(&self.stop))?
                }
                EngineKind::Controls => self.soft(
                    NavigationControls::new(&*self.driver).execute_instruction(&plan.instruction),
                )?,
                EngineKind::Extraction => self.soft(
                    ExtractionEngine::new(&*self.driver, &*self.action_model)
                        .execute_instruction(&plan.instruction),
                )?,
            };

            let page_url = self
                .driver
                .get_url()
                .unwrap_or_else(|_| String::from("about:blank"));
            let status = if result.success {
                ActionStatus::Completed
            } else {
                ActionStatus::Failed
            };
            trajectory.add_action(Action::new(
                &plan.instruction,
                page_url,
                result.outputs.clone(),
                status,
            ));
            self.memory
                .update_state(&plan.instruction, result.success, &result.outputs);
        }
        log::warn!("step budget exhausted without reaching the objective");
        trajectory.fail();
        Ok(())
    }

    /// Instruction-level errors become failed results; cancellation still
    /// aborts the run
    fn soft(&self, result: Result<EngineResult>) -> Result<EngineResult> {
        match result {
            Ok(result) => Ok(result),
            Err(WebpilotError::Cancelled) => Err(WebpilotError::Cancelled),
            Err(e) => {
                log::warn!("instruction failed: {e}");
                Ok(EngineResult::failure())
            }
        }
    }

    fn capture_screenshot(&self) -> Result<Vec<u8>> {
        let png = self.driver.get_screenshot_as_png()?;
        if self.screenshot_ratio >= 1.0 {
            return Ok(png);
        }
        let img = image::load_from_memory(&png)
            .map_err(|e| WebpilotError::DriverError(format!("screenshot decode failed: {e}")))?;
        let width = ((img.width() as f32) * self.screenshot_ratio).max(1.0) as u32;
        let height = ((img.height() as f32) * self.screenshot_ratio).max(1.0) as u32;
        let resized = img.resize(width, height, image::imageops::FilterType::Triangle);
        let mut out = std::io::Cursor::new(Vec::new());
        resized
            .write_to(&mut out, image::ImageFormat::Png)
            .map_err(|e| WebpilotError::DriverError(format!("screenshot encode failed: {e}")))?;
        Ok(out.into_inner())
    }
}
