use crate::agent::StopSignal;
use crate::driver::Driver;
use crate::engine::{EngineResult, Extractor};
use crate::error::{Result, WebpilotError};
use crate::llm::LanguageModel;
use crate::retrieval::{Chunk, RetrievalPipeline, Retriever};
use crate::trajectory::{ActionOutput, NavigationOutput};
use std::collections::HashSet;
use std::time::Duration;

/// Attempts per instruction before giving up
pub const DEFAULT_N_ATTEMPTS: usize = 5;

/// Cooldown after a successful action
pub const DEFAULT_TIME_BETWEEN_ACTIONS: Duration = Duration::from_millis(1500);

/// Idle-wait ceiling between attempts
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

const ACTION_PROMPT: &str = r#"You are a web automation assistant. Below are HTML fragments of the
current page; interactive elements carry an xpath attribute.

Page fragments:
{context}

Instruction: {instruction}

Respond with your reasoning, then a yaml code block listing the actions to
perform. Each action has a navigation_command (click, set_value,
set_value_and_enter, type_key, hover, scroll, back, switch_tab, pass), and
where applicable an xpath (copied exactly from the fragments above) and a
value. Example:

```yaml
- navigation_command: set_value_and_enter
  xpath: "/html/body/div/input"
  value: search terms
```
"#;

const REPHRASE_PROMPT: &str = r#"Rewrite the instruction below as a short search query describing the page
element it targets. Reply with the query only, no punctuation around it.

Instruction: {instruction}"#;

/// Turns an instruction into a retrieval query with one model call,
/// falling back to the raw instruction when the call fails
pub struct Rephraser<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> Rephraser<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    pub fn rephrase(&self, instruction: &str) -> String {
        let prompt = REPHRASE_PROMPT.replace("{instruction}", instruction);
        match self.model.complete(&prompt) {
            Ok(query) => {
                let query = query.trim().to_string();
                if query.is_empty() {
                    instruction.to_string()
                } else {
                    query
                }
            }
            Err(e) => {
                log::warn!("rephrasing failed, using raw instruction: {e}");
                instruction.to_string()
            }
        }
    }
}

/// Resolves instructions into executed browser actions.
///
/// One retrieval per instruction; generation and execution retry up to
/// `n_attempts` times against that same context. An xpath the model invents
/// is rejected before execution: `Hallucinated` when it is nowhere in the
/// DOM's offered context, `ElementOutOfContext` when it exists on the page
/// but was not retrieved.
pub struct NavigationEngine<'a> {
    driver: &'a dyn Driver,
    model: &'a dyn LanguageModel,
    ranker: Box<dyn Retriever + 'a>,
    rephraser: Option<Rephraser<'a>>,
    extractor: Extractor,
    pub n_attempts: usize,
    pub time_between_actions: Duration,
    pub viewport_only: bool,
}

impl<'a> NavigationEngine<'a> {
    pub fn new(
        driver: &'a dyn Driver,
        model: &'a dyn LanguageModel,
        ranker: Box<dyn Retriever + 'a>,
    ) -> Self {
        Self {
            driver,
            model,
            ranker,
            rephraser: None,
            extractor: Extractor::Dynamic,
            n_attempts: DEFAULT_N_ATTEMPTS,
            time_between_actions: DEFAULT_TIME_BETWEEN_ACTIONS,
            viewport_only: false,
        }
    }

    pub fn rephraser(mut self, rephraser: Rephraser<'a>) -> Self {
        self.rephraser = Some(rephraser);
        self
    }

    pub fn extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
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

    pub fn viewport_only(mut self, viewport_only: bool) -> Self {
        self.viewport_only = viewport_only;
        self
    }

    /// One generation pass: prompt with the retrieved context, parse the
    /// response into structured outputs
    pub fn get_action_from_context(
        &self,
        context: &str,
        instruction: &str,
    ) -> Result<Vec<NavigationOutput>> {
        let prompt = ACTION_PROMPT
            .replace("{context}", context)
            .replace("{instruction}", instruction);
        let response = self.model.complete(&prompt)?;
        self.extractor.parse_navigation(&response)
    }

    /// Reject outputs naming xpaths the model was never offered
    fn check_authorized(
        &self,
        outputs: &[NavigationOutput],
        retrieved: &HashSet<&String>,
    ) -> Result<()> {
        let unauthorized: Vec<&String> = outputs
            .iter()
            .filter_map(|o| o.xpath.as_ref())
            .filter(|x| !retrieved.contains(*x))
            .collect();
        let Some(first) = unauthorized.first() else {
            return Ok(());
        };
        // Snapshot the page to tell the two failure modes apart
        let snapshot = self.driver.snapshot()?;
        let mut dom = HashSet::new();
        snapshot.for_each_xpath(|_, p| {
            dom.insert(p.to_string());
        });
        if dom.contains(*first) {
            Err(WebpilotError::ElementOutOfContext((*first).clone()))
        } else {
            Err(WebpilotError::Hallucinated((*first).clone()))
        }
    }

    /// Retrieve once, then generate and execute with retries.
    ///
    /// Per-attempt failures are logged and retried; only cancellation
    /// propagates as an error. The returned result says whether any attempt
    /// succeeded.
    pub fn execute_instruction(
        &self,
        instruction: &str,
        stop: Option<&StopSignal>,
    ) -> Result<EngineResult> {
        let query = match &self.rephraser {
            Some(rephraser) => rephraser.rephrase(instruction),
            None => instruction.to_string(),
        };
        log::debug!("navigation: retrieving context for query {query:?}");

        let pipeline = RetrievalPipeline::new(self.driver, Box::new(BorrowedRanker(&*self.ranker)));
        let chunks = pipeline.retrieve(&query, self.viewport_only)?;
        let context = chunks
            .iter()
            .map(|c| c.html.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let retrieved: HashSet<&String> = chunks.iter().flat_map(|c| &c.xpaths).collect();

        for attempt in 1..=self.n_attempts {
            if let Some(stop) = stop {
                if stop.is_stopped() {
                    return Err(WebpilotError::Cancelled);
                }
            }
            match self.attempt(&context, instruction, &retrieved) {
                Ok(outputs) => {
                    std::thread::sleep(self.time_between_actions);
                    self.driver.wait_for_idle(IDLE_TIMEOUT)?;
                    return Ok(EngineResult::success(
                        outputs.into_iter().map(ActionOutput::WebNavigation).collect(),
                    ));
                }
                Err(e) => {
                    log::warn!(
                        "navigation attempt {attempt}/{} failed: {e}",
                        self.n_attempts
                    );
                    self.driver.wait_for_idle(IDLE_TIMEOUT)?;
                }
            }
        }
        Ok(EngineResult::failure())
    }

    fn attempt(
        &self,
        context: &str,
        instruction: &str,
        retrieved: &HashSet<&String>,
    ) -> Result<Vec<NavigationOutput>> {
        let outputs = self.get_action_from_context(context, instruction)?;
        self.check_authorized(&outputs, retrieved)?;
        for output in &outputs {
            self.driver.execute(output)?;
        }
        Ok(outputs)
    }
}

/// Lets the pipeline borrow the engine's ranker for one retrieval
struct BorrowedRanker<'a>(&'a dyn Retriever);

impl Retriever for BorrowedRanker<'_> {
    fn retrieve(&self, query: &str, chunks: Vec<Chunk>, viewport_only: bool) -> Result<Vec<Chunk>> {
        self.0.retrieve(query, chunks, viewport_only)
    }
}
