/*
 * Test utilities and fakes for simtemp
 *
 * In-memory stand-ins for the attribute store, the data channel and the
 * clock, plus helpers for building temporary sysfs trees.
 */

#[cfg(test)]
pub mod test_utils {
    use std::cell::{Cell, RefCell};
    use std::collections::{BTreeMap, VecDeque};
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use crate::channel::SampleSource;
    use crate::constants::attr;
    use crate::error::{Result, SimtempError};
    use crate::poll_loop::Clock;
    use crate::sample::Sample;
    use crate::sysfs::AttributeStore;

    /// Writes the four attribute files of one instance directory
    pub fn write_instance_attrs(dir: &Path, sampling_ms: u64, threshold_mc: i32, mode: &str) {
        fs::write(dir.join(attr::SAMPLING_MS), format!("{}\n", sampling_ms)).unwrap();
        fs::write(dir.join(attr::SAMPLING_US), format!("{}\n", sampling_ms * 1000)).unwrap();
        fs::write(dir.join(attr::THRESHOLD_MC), format!("{}\n", threshold_mc)).unwrap();
        fs::write(dir.join(attr::MODE), format!("{}\n", mode)).unwrap();
    }

    /// Attribute store kept in memory. Like sysfs, writing an attribute that
    /// does not exist fails with NotFound.
    #[derive(Debug, Default)]
    pub struct MemoryAttributes {
        values: RefCell<BTreeMap<String, String>>,
        writes: RefCell<Vec<(String, String)>>,
    }

    impl MemoryAttributes {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_config(sampling_ms: u64, threshold_mc: i32, mode: &str) -> Self {
            let store = Self::new();
            store.set(attr::SAMPLING_MS, &sampling_ms.to_string());
            store.set(attr::SAMPLING_US, &(sampling_ms * 1000).to_string());
            store.set(attr::THRESHOLD_MC, &threshold_mc.to_string());
            store.set(attr::MODE, mode);
            store
        }

        /// Seed a value without recording it as a write
        pub fn set(&self, name: &str, value: &str) {
            self.values.borrow_mut().insert(name.to_string(), format!("{}\n", value));
        }

        pub fn get(&self, name: &str) -> Option<String> {
            self.values.borrow().get(name).map(|v| v.trim().to_string())
        }

        pub fn remove(&self, name: &str) {
            self.values.borrow_mut().remove(name);
        }

        /// Successful writes in call order
        pub fn writes(&self) -> Vec<(String, String)> {
            self.writes.borrow().clone()
        }
    }

    impl AttributeStore for MemoryAttributes {
        fn read_text(&self, name: &str) -> Result<String> {
            self.get(name).ok_or_else(|| SimtempError::AttributeMissing {
                name: name.to_string(),
                path: PathBuf::from(name),
            })
        }

        fn write(&self, name: &str, value: &str) -> Result<()> {
            let mut values = self.values.borrow_mut();
            match values.get_mut(name) {
                Some(slot) => {
                    *slot = format!("{}\n", value);
                    self.writes.borrow_mut().push((name.to_string(), value.to_string()));
                    Ok(())
                }
                None => Err(SimtempError::AttributeMissing {
                    name: name.to_string(),
                    path: PathBuf::from(name),
                }),
            }
        }
    }

    /// One scripted wake-up of a [`ScriptedSource`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Wake {
        /// Readiness wait times out
        Idle,
        /// Readable, and a full record is returned
        Record(Sample),
        /// Readable, but only this many bytes come back
        Short(usize),
        /// The wait is cut short by a signal, which also raises the interrupt flag
        Interrupt,
    }

    /// Data channel replaying a script; idle forever once the script runs out
    #[derive(Debug)]
    pub struct ScriptedSource {
        script: VecDeque<Wake>,
        waits: Vec<Duration>,
        closed: Arc<AtomicBool>,
        interrupt: Option<Arc<AtomicBool>>,
    }

    impl ScriptedSource {
        pub fn new(script: Vec<Wake>) -> Self {
            Self {
                script: script.into(),
                waits: Vec::new(),
                closed: Arc::new(AtomicBool::new(false)),
                interrupt: None,
            }
        }

        pub fn idle() -> Self {
            Self::new(Vec::new())
        }

        /// Flag raised by [`Wake::Interrupt`]
        pub fn interrupting(mut self, flag: Arc<AtomicBool>) -> Self {
            self.interrupt = Some(flag);
            self
        }

        /// Becomes true once the source is dropped
        pub fn closed_flag(&self) -> Arc<AtomicBool> {
            Arc::clone(&self.closed)
        }

        /// Timeouts passed to each readiness wait
        pub fn waits(&self) -> Vec<Duration> {
            self.waits.clone()
        }
    }

    impl SampleSource for ScriptedSource {
        fn wait_readable(&mut self, timeout: Duration) -> Result<bool> {
            self.waits.push(timeout);
            match self.script.front() {
                None => Ok(false),
                Some(Wake::Idle) => {
                    self.script.pop_front();
                    Ok(false)
                }
                Some(Wake::Interrupt) => {
                    self.script.pop_front();
                    if let Some(flag) = &self.interrupt {
                        flag.store(true, Ordering::SeqCst);
                    }
                    Ok(false)
                }
                Some(_) => Ok(true),
            }
        }

        fn read_record(&mut self, buf: &mut [u8; Sample::SIZE]) -> Result<usize> {
            match self.script.pop_front() {
                Some(Wake::Record(sample)) => {
                    buf.copy_from_slice(&sample.encode());
                    Ok(Sample::SIZE)
                }
                Some(Wake::Short(n)) => Ok(n.min(Sample::SIZE - 1)),
                Some(other) => {
                    self.script.push_front(other);
                    Ok(0)
                }
                None => Ok(0),
            }
        }
    }

    impl Drop for ScriptedSource {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Clock that advances by a fixed step on every reading
    #[derive(Debug)]
    pub struct StepClock {
        origin: Instant,
        step: Duration,
        ticks: Cell<u32>,
    }

    impl StepClock {
        pub fn new(step: Duration) -> Self {
            Self { origin: Instant::now(), step, ticks: Cell::new(0) }
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> Instant {
            let ticks = self.ticks.get() + 1;
            self.ticks.set(ticks);
            self.origin + self.step * ticks
        }
    }
}
