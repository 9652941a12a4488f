//! Guided step-sequencer for browser and device agents.
//!
//! A [`Sequence`] is an ordered list of [`Step`]s, each with a [`LocatorChain`]
//! of fallbacks tried in priority order, plus [`Checkpoint`]s where a human takes
//! over (CAPTCHA, email verification). The [`SessionRecoveryHandler`] opens the
//! agent through a [`Driver`], runs the [`StepSequencer`] and always closes the
//! session, whatever happened in between.
//!
//! # Example
//!
//! ```ignore
//! use stepwise::{Locator, ManualGate, Sequence, SessionRecoveryHandler, Step};
//!
//! let sequence = Sequence::builder("signup")
//!     .entry("https://example.com/signup")
//!     .step(Step::fill("someone@example.com").locate(Locator::id("email")))
//!     .step(
//!         Step::activate()
//!             .locate(Locator::attribute("data-continue-to", "password-container").on("button"))
//!             .locate(Locator::text("Continue").on("button"))
//!             .warn_and_continue(),
//!     )
//!     .checkpoint(Checkpoint::blocking("Solve the CAPTCHA"))
//!     .build()?;
//!
//! let summary = SessionRecoveryHandler::new(driver).gate(ManualGate::unattended()).run_guarded(&sequence).await;
//! println!("{}", summary.result);
//! ```

pub mod agent;
pub mod chain;
pub mod events;
pub mod flow;
pub mod gate;
pub mod interrupt;
pub mod recovery;
pub mod report;
pub mod resolver;
pub mod sequence;
pub mod sequencer;
pub mod session;
pub mod step;

pub use agent::{AgentHandle, Control, Driver, DriverError, DriverResult};
pub use chain::{AttemptOutcome, ChainError, LocatorAttempt, LocatorChain, ResolutionFailed, ResolvedControl};
pub use events::{EventSink, NullSink, RunEvent};
pub use flow::{FlowError, Vars, compile};
pub use gate::{Checkpoint, DEFAULT_FALLBACK_WAIT, GateMode, GateOutcome, HumanSignal, ManualGate, Signal, Unattended};
pub use interrupt::Interrupt;
pub use recovery::SessionRecoveryHandler;
pub use report::{RunReport, StepRecord};
pub use resolver::{ResolverConfig, StepFailure, StepOutcome, StepResolver, StepSuccess};
pub use sequence::{Sequence, SequenceBuilder, SequenceDefaults, SequenceError};
pub use sequencer::{SequencerState, StepSequencer};
pub use session::Session;
pub use step::{Action, Step, StepBuilder};
pub use stepwise_protocol::{
	AgentSpec, BrowserKind, FailurePolicy, FlowFile, Locator, RunResult, RunSummary, StepReport, StepStatus,
};
