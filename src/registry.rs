use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use log::debug;

use crate::dispatch::{self, CaptureMode, PacketHandler};
use crate::driver::Driver;
use crate::engine::{CaptureEngine, CaptureSession, OpenParams, StopHandle};
use crate::error::{DriverError, Result};

/// Opaque integer identifying a driver across the host boundary.
pub type Handle = i32;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A sink that panicked mid-capture leaves the driver itself consistent.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One registered driver plus what another thread needs to interrupt it.
struct Slot<S> {
    driver: Mutex<Driver<S>>,
    stop: Mutex<Option<StopHandle>>,
    capturing: AtomicBool,
}

impl<S: CaptureSession> Slot<S> {
    fn new() -> Self {
        Slot {
            driver: Mutex::new(Driver::new()),
            stop: Mutex::new(None),
            capturing: AtomicBool::new(false),
        }
    }

    fn driver(&self) -> MutexGuard<'_, Driver<S>> {
        lock(&self.driver)
    }

    /// Locks the driver, first breaking a capture that currently holds it.
    fn interrupt_and_lock(&self) -> MutexGuard<'_, Driver<S>> {
        match self.driver.try_lock() {
            Ok(driver) => driver,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                if self.capturing.load(Ordering::SeqCst) {
                    if let Some(stop) = lock(&self.stop).as_ref() {
                        debug!("Interrupting running capture");
                        stop.stop();
                    }
                }
                self.driver()
            }
        }
    }
}

struct Table<S> {
    slots: HashMap<Handle, Arc<Slot<S>>>,
    next_handle: Handle,
}

/// Owns every live driver, keyed by handle.
///
/// A destroyed handle is a lookup miss rather than a dangling reference.
/// Handles are positive and are not handed out again until the counter wraps
/// past `i32::MAX`; after that, only handles of drivers that no longer exist
/// are reused.
///
/// The handle table is locked only for lookups, and each driver has its own
/// lock, so a long capture on one handle never blocks calls on another.
/// Calls on the same handle serialize; `close` and `destroy` break a running
/// capture on that handle before taking it over.
pub struct DriverRegistry<E: CaptureEngine> {
    engine: E,
    table: Mutex<Table<E::Session>>,
}

impl<E: CaptureEngine> DriverRegistry<E> {
    pub fn new(engine: E) -> Self {
        DriverRegistry {
            engine,
            table: Mutex::new(Table {
                slots: HashMap::new(),
                next_handle: 1,
            }),
        }
    }

    /// Allocates a fresh driver and returns its handle.
    pub fn create(&self) -> Handle {
        let mut table = lock(&self.table);
        let mut handle = table.next_handle;
        loop {
            // Zero and negative values stay invalid so garbage handles never match.
            if handle <= 0 {
                handle = 1;
            }
            if !table.slots.contains_key(&handle) {
                break;
            }
            handle = handle.wrapping_add(1);
        }
        table.next_handle = handle.wrapping_add(1);
        table.slots.insert(handle, Arc::new(Slot::new()));
        debug!("Created driver {}", handle);
        handle
    }

    pub fn is_valid(&self, handle: Handle) -> bool {
        lock(&self.table).slots.contains_key(&handle)
    }

    fn slot(&self, handle: Handle) -> Result<Arc<Slot<E::Session>>> {
        lock(&self.table)
            .slots
            .get(&handle)
            .cloned()
            .ok_or(DriverError::InvalidDriver)
    }

    /// Closes the driver's session and forgets the handle. Invalid handles are
    /// ignored.
    pub fn destroy(&self, handle: Handle) {
        let removed = lock(&self.table).slots.remove(&handle);
        if let Some(slot) = removed {
            slot.interrupt_and_lock().destroy();
            *lock(&slot.stop) = None;
            debug!("Destroyed driver {}", handle);
        }
    }

    pub fn open(&self, handle: Handle, params: &OpenParams) -> Result<()> {
        let slot = self.slot(handle)?;
        let mut driver = slot.driver();
        let result = driver.open(&self.engine, params);
        *lock(&slot.stop) = driver.stop_handle().ok();
        result
    }

    /// Closes the session on `handle`, if any. Silent on invalid handles.
    pub fn close(&self, handle: Handle) {
        if let Ok(slot) = self.slot(handle) {
            slot.interrupt_and_lock().close();
            *lock(&slot.stop) = None;
        }
    }

    pub fn receive_count(&self, handle: Handle) -> Result<u32> {
        self.slot(handle)?.driver().receive_count()
    }

    pub fn drop_count(&self, handle: Handle) -> Result<u32> {
        self.slot(handle)?.driver().drop_count()
    }

    /// Available while a capture runs on the same handle.
    pub fn stop_handle(&self, handle: Handle) -> Result<StopHandle> {
        let slot = self.slot(handle)?;
        let stop = lock(&slot.stop).clone();
        stop.ok_or_else(|| DriverError::Io("No device created".to_string()))
    }

    pub fn list_devices(&self) -> Result<Vec<String>> {
        Ok(self.engine.list_devices()?)
    }

    pub fn capture<H>(&self, handle: Handle, count: i32, handler: &mut H, mode: CaptureMode) -> Result<usize>
    where
        H: PacketHandler + ?Sized,
    {
        let slot = self.slot(handle)?;
        let mut driver = slot.driver();
        slot.capturing.store(true, Ordering::SeqCst);
        let result = dispatch::capture(&mut driver, count, handler, mode);
        slot.capturing.store(false, Ordering::SeqCst);
        result
    }
}
