// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Background poller of one physical sensor
//!
//! State machine:
//!
//! ```text
//! Initial --resume--> Working --pause--> Paused --resume--> Working
//!    any  --terminate--> Stopped (final)
//! ```
//!
//! While `Working` the thread blocks in `SensorHal::is_data_ready` and hands
//! every sample to the owner's callback. HAL errors are logged and polling
//! continues after a short back-off; the sensor is never auto-disabled.

use crate::core::{HubError, Result};
use crate::sensors::hal::{HalHandle, RawSample};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

const READY_TIMEOUT: Duration = Duration::from_millis(100);
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Initial,
    Working,
    Paused,
    Stopped,
}

struct PollerShared {
    state: Mutex<PollerState>,
    changed: Condvar,
}

impl PollerShared {
    /// Block while idle; `false` once stopped
    fn wait_for_work(&self) -> bool {
        let mut state = self.state.lock();
        loop {
            match *state {
                PollerState::Working => return true,
                PollerState::Stopped => return false,
                PollerState::Initial | PollerState::Paused => self.changed.wait(&mut state),
            }
        }
    }

    fn is_working(&self) -> bool {
        *self.state.lock() == PollerState::Working
    }
}

pub struct SensorPoller {
    name: String,
    shared: Arc<PollerShared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SensorPoller {
    /// Spawn the poller thread in `Initial` state
    pub fn spawn<F>(name: String, hal: HalHandle, on_sample: F) -> Result<Self>
    where
        F: Fn(RawSample) + Send + 'static,
    {
        let shared = Arc::new(PollerShared {
            state: Mutex::new(PollerState::Initial),
            changed: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let thread_name = name.clone();

        let handle = thread::Builder::new()
            .name(format!("poller-{}", name))
            .spawn(move || poll_loop(&thread_name, &thread_shared, &hal, on_sample))
            .map_err(|e| {
                HubError::AllocationFailure(format!("poller thread for {}: {}", name, e))
            })?;

        Ok(Self {
            name,
            shared,
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn state(&self) -> PollerState {
        *self.shared.state.lock()
    }

    /// `Initial`/`Paused` → `Working`; returns whether a transition happened
    pub fn resume(&self) -> bool {
        self.transition(
            |s| matches!(s, PollerState::Initial | PollerState::Paused),
            PollerState::Working,
        )
    }

    /// `Working` → `Paused`
    pub fn pause(&self) -> bool {
        self.transition(|s| s == PollerState::Working, PollerState::Paused)
    }

    /// Any → `Stopped`, joining the thread
    pub fn terminate(&self) {
        self.transition(|s| s != PollerState::Stopped, PollerState::Stopped);
        if let Some(handle) = self.handle.lock().take() {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("🦀 [POLLER] {} thread panicked", self.name);
            }
        }
    }

    fn transition(&self, allowed: impl Fn(PollerState) -> bool, to: PollerState) -> bool {
        let mut state = self.shared.state.lock();
        if !allowed(*state) {
            return false;
        }
        debug!("🦀 [POLLER] {}: {:?} -> {:?}", self.name, *state, to);
        *state = to;
        self.shared.changed.notify_all();
        true
    }
}

impl Drop for SensorPoller {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn poll_loop<F>(name: &str, shared: &PollerShared, hal: &HalHandle, on_sample: F)
where
    F: Fn(RawSample),
{
    let mut failures: u64 = 0;

    while shared.wait_for_work() {
        let result = hal.is_data_ready(READY_TIMEOUT).and_then(|ready| {
            if ready {
                hal.get_sensor_data().map(Some)
            } else {
                Ok(None)
            }
        });

        match result {
            Ok(Some(sample)) => {
                if failures > 0 {
                    info!("🦀 [POLLER] {} recovered after {} failed polls", name, failures);
                    failures = 0;
                }
                // A sample read just before pause still belongs to the old session
                if shared.is_working() {
                    on_sample(sample);
                }
            }
            Ok(None) => {}
            Err(e) => {
                failures += 1;
                if failures == 1 {
                    warn!("🦀 [POLLER] {} read failed: {}", name, e);
                } else {
                    debug!("🦀 [POLLER] {} read failed ({}x): {}", name, failures, e);
                }
                thread::sleep(ERROR_BACKOFF);
            }
        }
    }

    debug!("🦀 [POLLER] {} stopped", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::hal::SensorHal;
    use crate::sensors::simulated::{Injection, SimulatedHal};
    use crossbeam::channel;
    use sensord_protocol::SensorType;

    fn injected_hal() -> Arc<SimulatedHal> {
        let hal = Arc::new(SimulatedHal::injected(SensorType::Accelerometer, "sim-accel").unwrap());
        hal.init().unwrap();
        hal.enable().unwrap();
        hal
    }

    #[test]
    fn test_state_transitions() {
        let hal = injected_hal();
        let poller = SensorPoller::spawn("accel".to_string(), hal, |_| {}).unwrap();

        assert_eq!(poller.state(), PollerState::Initial);
        assert!(!poller.pause());
        assert!(poller.resume());
        assert_eq!(poller.state(), PollerState::Working);
        assert!(!poller.resume());
        assert!(poller.pause());
        assert_eq!(poller.state(), PollerState::Paused);
        poller.terminate();
        assert_eq!(poller.state(), PollerState::Stopped);
        assert!(!poller.resume());
    }

    #[test]
    fn test_samples_flow_only_while_working() {
        let hal = injected_hal();
        let (tx, rx) = channel::unbounded();
        let poller = SensorPoller::spawn("accel".to_string(), hal.clone(), move |s| {
            let _ = tx.send(s.values);
        })
        .unwrap();

        hal.inject(&[1.0, 2.0, 3.0]);
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());

        poller.resume();
        let values = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_errors_do_not_stop_polling() {
        let hal = injected_hal();
        let (tx, rx) = channel::unbounded();
        let poller = SensorPoller::spawn("accel".to_string(), hal.clone(), move |s| {
            let _ = tx.send(s.values);
        })
        .unwrap();
        poller.resume();

        let injector = hal.injector();
        injector.send(Injection::Fault("transient".to_string())).unwrap();
        injector.send(Injection::Sample(vec![4.0, 5.0, 6.0])).unwrap();

        let values = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(values, vec![4.0, 5.0, 6.0]);
        assert_eq!(poller.state(), PollerState::Working);
    }
}
