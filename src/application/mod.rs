pub mod orchestrator;
pub mod scheduler;
pub mod session;

pub use orchestrator::{
    CycleKind, CycleReport, EngineConfig, EngineSnapshot, Host, InstrumentSnapshot,
    InstrumentState, Orchestrator, OrchestratorError, SkippedInstrument, TransformSettings,
};
pub use scheduler::{DailySchedule, ScheduleError, ScheduledEvent, ScheduledTask, Scheduler};
pub use session::{PaperSession, SimulationSummary};
