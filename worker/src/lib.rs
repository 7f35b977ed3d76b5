//! Executors de sesiones: el contrato que usa el master y las
//! implementaciones de serie (simulada y remota por HTTP).

pub mod remote;
pub mod simulated;
pub mod worker;

pub use remote::HttpWorker;
pub use simulated::SimulatedWorker;
pub use worker::{SessionJob, SessionWorker, WorkOutcome, WorkerError};
