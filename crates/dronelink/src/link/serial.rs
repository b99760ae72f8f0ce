// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Serial-port link (feature `serial`).

use super::{Link, READ_POLL_INTERVAL};
use parking_lot::Mutex;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};

/// UART link, 8N1 without flow control.
pub struct SerialLink {
    path: String,
    baud: u32,
    reader: Mutex<Box<dyn SerialPort>>,
    writer: Mutex<Box<dyn SerialPort>>,
    closed: AtomicBool,
}

impl SerialLink {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `path` - Serial port path (e.g., "/dev/ttyUSB0", "COM3")
    /// * `baud` - Baud rate (e.g., 57600)
    pub fn open(path: &str, baud: u32) -> io::Result<Self> {
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_POLL_INTERVAL)
            .open()
            .map_err(io::Error::from)?;
        let writer = port.try_clone().map_err(io::Error::from)?;

        log::info!("[SerialLink] opened {} at {} baud", path, baud);

        Ok(Self {
            path: path.to_string(),
            baud,
            reader: Mutex::new(port),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
        })
    }
}

impl Link for SerialLink {
    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Ok(0);
        }
        match self.reader.lock().read(buf) {
            // A zero-byte read on a tty is an idle poll, not a hangup
            Ok(0) => Err(io::Error::new(io::ErrorKind::TimedOut, "no data")),
            other => other,
        }
    }

    fn write(&self, bytes: &[u8]) -> io::Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "link closed"));
        }
        let mut port = self.writer.lock();
        port.write_all(bytes)?;
        port.flush()
    }

    fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{},{}", self.path, self.baud)
    }
}
