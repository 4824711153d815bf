// ─── InterfaceOficial Java Runtime Core ───
// Finds, verifies and ranks the Java runtimes installed on the host.
//
// Architecture:
//   core/
//     error.rs  — LauncherError + LauncherResult
//     java/     — Discovery, inspection, verification, scoring, caches
//     state/    — Data dir resolution + orchestrator wiring

pub mod error;
pub mod java;
pub mod state;
