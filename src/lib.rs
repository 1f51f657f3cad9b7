//! # webpilot
//!
//! A Rust library for LLM-driven web automation over the Chrome DevTools
//! Protocol (CDP): retrieval-augmented DOM targeting, structured browser
//! actions and a planning agent loop.
//!
//! ## Features
//!
//! - **DOM snapshots**: full element trees with synthetic xpath addressing
//!   across iframe and shadow-root boundaries
//! - **Element retrieval**: annotate, chunk and rank page fragments so a
//!   model only sees the elements relevant to an instruction
//! - **Structured actions**: every browser operation is data (a
//!   [`NavigationCommand`](trajectory::NavigationCommand) plus arguments),
//!   validated before execution and replayable afterwards
//! - **Agent loop**: a vision planner routes instructions to engines until
//!   the objective is met, recording a [`Trajectory`](trajectory::Trajectory)
//!
//! ## Executing one instruction
//!
//! ```rust,no_run
//! use webpilot::driver::{ChromeDriver, Driver, LaunchOptions};
//! use webpilot::engine::NavigationEngine;
//! use webpilot::llm::OpenAiCompatible;
//! use webpilot::retrieval::Bm25Ranker;
//!
//! # fn main() -> webpilot::Result<()> {
//! let driver = ChromeDriver::launch(LaunchOptions::default())?;
//! let model = OpenAiCompatible::from_env()?;
//! driver.goto("https://crates.io")?;
//!
//! let engine = NavigationEngine::new(&driver, &model, Box::new(Bm25Ranker::default()));
//! let result = engine.execute_instruction("Search for serde", None)?;
//! println!("succeeded: {}", result.success);
//! # Ok(())
//! # }
//! ```
//!
//! ## Running the full agent
//!
//! ```rust,no_run
//! use webpilot::agent::WebAgent;
//! use webpilot::driver::{ChromeDriver, LaunchOptions};
//! use webpilot::llm::OpenAiCompatible;
//!
//! # fn main() -> webpilot::Result<()> {
//! let driver = ChromeDriver::launch(LaunchOptions::default())?;
//! let mut agent = WebAgent::new(
//!     Box::new(driver),
//!     Box::new(OpenAiCompatible::from_env()?),
//!     Box::new(OpenAiCompatible::from_env()?),
//! );
//! let trajectory = agent.run("https://crates.io", "Find the most downloaded crate");
//! trajectory.write_to_file("run.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`dom`]: element trees, interaction detection, xpath synthesis
//! - [`driver`]: the [`Driver`](driver::Driver) trait, Chrome and mock implementations
//! - [`retrieval`]: annotation, structural chunking and ranking
//! - [`engine`]: instruction resolution into executed actions
//! - [`agent`]: the planning loop, memory and stop signal
//! - [`trajectory`]: the recorded action data model
//! - [`exporter`]: trajectory replay and script export
//! - [`llm`]: model traits and the OpenAI-compatible client
//! - [`error`]: error types and result alias

pub mod agent;
pub mod dom;
pub mod driver;
pub mod engine;
pub mod error;
pub mod exporter;
pub mod llm;
pub mod retrieval;
pub mod trajectory;

pub use agent::{StopSignal, WebAgent};
pub use dom::{BoundingBox, DomSnapshot, ElementNode, InteractionType, ScrollDirection};
pub use driver::{ChromeDriver, Driver, LaunchOptions, MockDriver};
pub use engine::{ExtractionEngine, NavigationControls, NavigationEngine};
pub use error::{Result, WebpilotError};
pub use retrieval::{Bm25Ranker, Chunk, RetrievalPipeline, Retriever};
pub use trajectory::{NavigationCommand, NavigationOutput, Trajectory};
