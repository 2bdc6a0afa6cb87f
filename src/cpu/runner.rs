//! Background execution.
//!
//! `run` steps a shared CPU on its own thread with a short delay between
//! steps. The delay is a `recv_timeout` on a stop channel, so `stop()`
//! takes effect between two steps and never in the middle of one.

use crate::config::RunConfig;
use crate::cpu::{Cpu, CpuError};
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{info, warn};

/// A CPU shared between the runner thread and its host.
pub type SharedCpu = Arc<Mutex<Cpu>>;

/// Lock a shared CPU.
///
/// `step` cannot leave the CPU half-updated, so a poisoned lock is still
/// safe to use.
pub fn lock(cpu: &SharedCpu) -> MutexGuard<'_, Cpu> {
    cpu.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Successful steps taken by this run.
    pub steps: u64,
    /// The error that ended the run, or `None` if it was stopped.
    pub error: Option<CpuError>,
}

/// Handle to a background run.
///
/// Dropping the handle stops the run.
pub struct RunHandle {
    stop: Sender<()>,
    worker: JoinHandle<RunReport>,
}

impl RunHandle {
    /// Ask the run to stop after the current step. Idempotent.
    pub fn stop(&self) {
        // The worker may already be gone; that's fine.
        let _ = self.stop.send(());
    }

    /// Check if the worker thread is still stepping.
    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    /// Wait for the run to end on its own (halt, error or step limit).
    pub fn join(self) -> RunReport {
        match self.worker.join() {
            Ok(report) => report,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Start stepping `cpu` on a background thread.
///
/// `on_finished` is called exactly once from the worker thread with the
/// error that ended the run, or `None` if it was stopped or hit
/// `max_steps`.
pub fn run<F>(cpu: SharedCpu, config: &RunConfig, on_finished: F) -> RunHandle
where
    F: FnOnce(Option<CpuError>) + Send + 'static,
{
    let (stop_tx, stop_rx) = channel::<()>();
    let tick = config.tick();
    let max_steps = config.max_steps;

    let worker = thread::spawn(move || {
        info!(tick_ms = tick.as_millis() as u64, ?max_steps, "run started");

        let mut steps = 0u64;
        let error = loop {
            if max_steps.map_or(false, |max| steps >= max) {
                break None;
            }

            let result = lock(&cpu).step();
            if let Err(e) = result {
                break Some(e);
            }
            steps += 1;

            match stop_rx.recv_timeout(tick) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break None,
            }
        };

        match &error {
            None => info!(steps, "run stopped"),
            Some(e) if e.is_halt() => info!(steps, "run halted"),
            Some(e) => warn!(steps, error = %e, "run failed"),
        }

        on_finished(error);
        RunReport { steps, error }
    });

    RunHandle {
        stop: stop_tx,
        worker,
    }
}

/// Single owner of a CPU and its background run.
///
/// `step`, `reset` and a second `run` are refused while a run is active.
pub struct Emulator {
    cpu: SharedCpu,
    config: RunConfig,
    active: Option<RunHandle>,
    last_report: Option<RunReport>,
}

impl Emulator {
    /// Wrap a CPU with the default run configuration.
    pub fn new(cpu: Cpu) -> Self {
        Self::with_config(cpu, RunConfig::default())
    }

    /// Wrap a CPU with a run configuration.
    pub fn with_config(cpu: Cpu, config: RunConfig) -> Self {
        Self {
            cpu: Arc::new(Mutex::new(cpu)),
            config,
            active: None,
            last_report: None,
        }
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Change the run configuration. Takes effect on the next `run`.
    pub fn set_config(&mut self, config: RunConfig) {
        self.config = config;
    }

    /// Another handle to the shared CPU.
    pub fn shared(&self) -> SharedCpu {
        Arc::clone(&self.cpu)
    }

    /// Inspect or edit the CPU between steps.
    ///
    /// Allowed while running: the closure runs under the same lock as
    /// `step`. Editing the ROM mid-run is the caller's business.
    pub fn with_cpu<R>(&self, f: impl FnOnce(&mut Cpu) -> R) -> R {
        f(&mut *lock(&self.cpu))
    }

    /// A copy of the current CPU state.
    pub fn snapshot(&self) -> Cpu {
        lock(&self.cpu).clone()
    }

    /// Check if a background run is active.
    pub fn is_running(&self) -> bool {
        self.active.as_ref().map_or(false, RunHandle::is_running)
    }

    /// Report of the most recently finished run.
    pub fn last_report(&self) -> Option<RunReport> {
        self.last_report
    }

    /// Execute one instruction.
    pub fn step(&mut self) -> Result<(), EmulatorError> {
        self.ensure_idle()?;
        lock(&self.cpu).step()?;
        Ok(())
    }

    /// Reset the CPU.
    pub fn reset(&mut self) -> Result<(), EmulatorError> {
        self.ensure_idle()?;
        lock(&self.cpu).reset();
        Ok(())
    }

    /// Start a background run.
    pub fn run<F>(&mut self, on_finished: F) -> Result<(), EmulatorError>
    where
        F: FnOnce(Option<CpuError>) + Send + 'static,
    {
        self.ensure_idle()?;
        self.active = Some(run(self.shared(), &self.config, on_finished));
        Ok(())
    }

    /// Stop the background run and wait for it to wind down.
    ///
    /// Returns the run's report, or `None` if nothing was running.
    pub fn stop(&mut self) -> Option<RunReport> {
        let handle = self.active.take()?;
        handle.stop();
        let report = handle.join();
        self.last_report = Some(report);
        Some(report)
    }

    /// Wait for the background run to end on its own.
    pub fn wait(&mut self) -> Option<RunReport> {
        let report = self.active.take()?.join();
        self.last_report = Some(report);
        Some(report)
    }

    fn ensure_idle(&mut self) -> Result<(), EmulatorError> {
        if self.is_running() {
            return Err(EmulatorError::Busy);
        }
        // Collect a run that finished on its own.
        if let Some(handle) = self.active.take() {
            self.last_report = Some(handle.join());
        }
        Ok(())
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Errors from the emulator control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EmulatorError {
    #[error("a run is in progress")]
    Busy,

    #[error(transparent)]
    Cpu(#[from] CpuError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    fn fast() -> RunConfig {
        RunConfig { tick_ms: 0, ..RunConfig::default() }
    }

    fn shared(program: &[u8]) -> SharedCpu {
        Arc::new(Mutex::new(Cpu::from_bytes(program)))
    }

    #[test]
    fn test_run_until_halt() {
        let cpu = shared(&[0x51, 0xE0, 0xF2]);
        let (tx, rx) = mpsc::channel();

        let report = run(Arc::clone(&cpu), &fast(), move |err| tx.send(err).unwrap()).join();

        assert_eq!(report, RunReport { steps: 32, error: Some(CpuError::Halted) });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Some(CpuError::Halted));
        assert!(lock(&cpu).is_halted());
    }

    #[test]
    fn test_run_reports_invalid_opcode() {
        let cpu = shared(&[0x31, 0x80]);
        let (tx, rx) = mpsc::channel();

        let report = run(Arc::clone(&cpu), &fast(), move |err| tx.send(err).unwrap()).join();

        assert_eq!(report.steps, 1);
        assert_eq!(report.error, Some(CpuError::InvalidOpcode(0b1000)));
        assert_eq!(rx.recv().unwrap(), Some(CpuError::InvalidOpcode(0b1000)));
        assert_eq!(lock(&cpu).regs.pc(), 1);
    }

    #[test]
    fn test_stop_reports_no_error() {
        // jnc 0 loops forever without halting.
        let cpu = shared(&[0xE0]);
        let (tx, rx) = mpsc::channel();
        let config = RunConfig { tick_ms: 5, ..RunConfig::default() };

        let handle = run(Arc::clone(&cpu), &config, move |err| tx.send(err).unwrap());
        handle.stop();
        handle.stop();
        let report = handle.join();

        assert_eq!(report.error, None);
        assert!(report.steps >= 1);
        assert_eq!(rx.recv().unwrap(), None);
    }

    #[test]
    fn test_max_steps() {
        let cpu = shared(&[0xE0]);
        let config = RunConfig { tick_ms: 0, max_steps: Some(5), ..RunConfig::default() };

        let report = run(Arc::clone(&cpu), &config, |_| {}).join();

        assert_eq!(report, RunReport { steps: 5, error: None });
        assert_eq!(lock(&cpu).cycles(), 5);
    }

    #[test]
    fn test_emulator_refuses_while_running() {
        let config = RunConfig { tick_ms: 10_000, ..RunConfig::default() };
        let mut emu = Emulator::with_config(Cpu::from_bytes(&[0xE0]), config);

        emu.run(|_| {}).unwrap();
        assert!(emu.is_running());
        assert_eq!(emu.step(), Err(EmulatorError::Busy));
        assert_eq!(emu.reset(), Err(EmulatorError::Busy));
        assert_eq!(emu.run(|_| {}), Err(EmulatorError::Busy));

        // Input can still change mid-run.
        emu.with_cpu(|cpu| cpu.regs.set_input(3));

        let report = emu.stop().unwrap();
        assert_eq!(report.error, None);
        assert!(!emu.is_running());
        assert_eq!(emu.stop(), None);

        emu.step().unwrap();
        assert_eq!(emu.snapshot().regs.input(), 3);
    }

    #[test]
    fn test_emulator_wait_and_rerun() {
        let mut emu = Emulator::with_config(Cpu::from_bytes(&[0x35, 0xF1]), fast());

        emu.run(|_| {}).unwrap();
        let report = emu.wait().unwrap();
        assert_eq!(report, RunReport { steps: 1, error: Some(CpuError::Halted) });
        assert_eq!(emu.last_report(), Some(report));

        // Still halted: step fails the same way.
        assert_eq!(emu.step(), Err(EmulatorError::Cpu(CpuError::Halted)));

        emu.reset().unwrap();
        let snapshot = emu.snapshot();
        assert_eq!(snapshot.regs.a(), 0);
        assert_eq!(snapshot.regs.pc(), 0);

        emu.run(|_| {}).unwrap();
        assert_eq!(emu.wait().unwrap().steps, 1);
        assert_eq!(emu.snapshot().regs.a(), 5);
    }

    #[test]
    fn test_emulator_set_config() {
        let mut emu = Emulator::with_config(Cpu::from_bytes(&[0xE0]), fast());

        emu.set_config(RunConfig { tick_ms: 0, max_steps: Some(3), input: 0 });
        assert_eq!(emu.config().max_steps, Some(3));

        emu.run(|_| {}).unwrap();
        assert_eq!(emu.wait().unwrap(), RunReport { steps: 3, error: None });
    }
}
