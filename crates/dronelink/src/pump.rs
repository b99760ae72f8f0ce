// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message pump.
//!
//! One dedicated thread per session reads the link, decodes frames and
//! hands each packet to a [`PacketHandler`] in decode order. The pump never
//! waits on a request; blocking exchanges live on caller threads.
//!
//! A malformed frame is counted, reported and skipped. End of stream or a
//! read error ends the thread and reports the loss once through
//! [`PacketHandler::on_link_lost`] (unless the pump was stopped first).

use crate::codec::{Codec, Decoded};
use crate::link::{is_idle, Link};
use crate::message::Packet;
use crate::metrics::PumpMetrics;
use crate::sink::{SessionEvent, SessionSink};
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Bytes requested from the link per read.
const READ_CHUNK: usize = 4096;

/// Receives what the pump decodes.
pub trait PacketHandler: Send + Sync {
    /// One decoded packet, on the pump thread.
    fn on_packet(&self, packet: Packet);

    /// Link reached end of stream or failed. Called at most once, from the
    /// pump thread, after which the thread exits.
    fn on_link_lost(&self, reason: &str);
}

/// Handle to a running pump thread.
pub struct MessagePump {
    stop: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MessagePump {
    /// Spawn the pump thread.
    pub fn start(
        link: Arc<dyn Link>,
        codec: Arc<dyn Codec>,
        handler: Arc<dyn PacketHandler>,
        metrics: Arc<PumpMetrics>,
        sink: Arc<dyn SessionSink>,
    ) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        sink.event(&SessionEvent::PumpStarted {
            link: link.describe(),
        });

        let worker = PumpWorker {
            link,
            codec,
            handler,
            metrics,
            sink,
            stop: Arc::clone(&stop),
        };
        let handle = thread::Builder::new()
            .name("dronelink-pump".into())
            .spawn(move || worker.run())?;

        Ok(Self {
            stop,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Signal the thread and wait for it to exit.
    ///
    /// From the pump thread itself (a listener closing the session) this
    /// only signals; the thread exits after the current dispatch.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
        let handle = self.handle.lock().take();
        let Some(handle) = handle else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            log::debug!("[Pump] stop requested from pump thread, not joining");
            return;
        }
        if handle.join().is_err() {
            log::error!("[Pump] pump thread panicked");
        }
    }

    /// Thread still alive.
    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }
}

impl Drop for MessagePump {
    fn drop(&mut self) {
        self.stop();
    }
}

struct PumpWorker {
    link: Arc<dyn Link>,
    codec: Arc<dyn Codec>,
    handler: Arc<dyn PacketHandler>,
    metrics: Arc<PumpMetrics>,
    sink: Arc<dyn SessionSink>,
    stop: Arc<AtomicBool>,
}

impl PumpWorker {
    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn run(self) {
        let mut chunk = vec![0u8; READ_CHUNK];
        let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK * 2);

        let lost = loop {
            if self.stopped() {
                break None;
            }
            match self.link.read(&mut chunk) {
                Ok(0) => break Some("end of stream".to_string()),
                Ok(n) => {
                    self.metrics
                        .bytes_read
                        .fetch_add(n as u64, Ordering::Relaxed);
                    buffer.extend_from_slice(&chunk[..n]);
                    self.drain(&mut buffer);
                }
                Err(e) if is_idle(&e) => continue,
                Err(e) => break Some(format!("read error: {}", e)),
            }
        };

        match lost {
            Some(reason) if !self.stopped() => {
                log::debug!("[Pump] exiting: {}", reason);
                self.handler.on_link_lost(&reason);
            }
            _ => log::debug!("[Pump] stopped"),
        }
    }

    /// Decode and dispatch every complete frame in `buffer`.
    fn drain(&self, buffer: &mut Vec<u8>) {
        let mut offset = 0;
        while offset < buffer.len() && !self.stopped() {
            match self.codec.decode(&buffer[offset..]) {
                Decoded::Packet(packet, consumed) => {
                    offset += consumed.max(1);
                    self.metrics
                        .messages_decoded
                        .fetch_add(1, Ordering::Relaxed);
                    self.handler.on_packet(packet);
                }
                Decoded::Malformed { consumed, reason } => {
                    let consumed = consumed.max(1);
                    offset += consumed;
                    self.metrics.decode_errors.fetch_add(1, Ordering::Relaxed);
                    self.sink.event(&SessionEvent::DecodeError {
                        reason,
                        skipped: consumed,
                    });
                }
                Decoded::NeedMoreData => break,
            }
        }
        buffer.drain(..offset.min(buffer.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FrameCodec;
    use crate::link::MemoryLink;
    use crate::message::{Header, Message};
    use crate::sink::LogSink;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Recorder {
        packets: Mutex<Vec<Packet>>,
        lost: Mutex<Vec<String>>,
    }

    impl PacketHandler for Recorder {
        fn on_packet(&self, packet: Packet) {
            self.packets.lock().push(packet);
        }

        fn on_link_lost(&self, reason: &str) {
            self.lost.lock().push(reason.to_string());
        }
    }

    fn packet(seq: u16) -> Packet {
        Packet::new(
            Header {
                system_id: 1,
                component_id: 1,
                sequence: seq as u8,
            },
            Message::MissionCurrent { seq },
        )
    }

    fn wait_until(cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(3);
        while !cond() {
            assert!(Instant::now() < deadline, "condition not reached");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn start(link: Arc<MemoryLink>) -> (MessagePump, Arc<Recorder>, Arc<PumpMetrics>) {
        let recorder = Arc::new(Recorder::default());
        let metrics = Arc::new(PumpMetrics::new());
        let pump = MessagePump::start(
            link,
            Arc::new(FrameCodec::default()),
            Arc::clone(&recorder) as Arc<dyn PacketHandler>,
            Arc::clone(&metrics),
            Arc::new(LogSink),
        )
        .expect("start");
        (pump, recorder, metrics)
    }

    #[test]
    fn test_decodes_in_order_across_split_writes_and_garbage() {
        let (ours, theirs) = MemoryLink::pair();
        let (pump, recorder, metrics) = start(ours);
        let codec = FrameCodec::default();

        let mut stream = Vec::new();
        for seq in 0..5 {
            stream.extend(codec.encode(&packet(seq)).expect("encode"));
            if seq == 2 {
                stream.extend_from_slice(&[0x00, 0x13, 0x37]);
            }
        }
        for piece in stream.chunks(7) {
            theirs.write(piece).expect("write");
        }

        wait_until(|| recorder.packets.lock().len() == 5);
        let seqs: Vec<u16> = recorder
            .packets
            .lock()
            .iter()
            .map(|p| match p.message {
                Message::MissionCurrent { seq } => seq,
                _ => u16::MAX,
            })
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
        assert_eq!(metrics.snapshot().decode_errors, 3);
        assert_eq!(metrics.snapshot().messages_decoded, 5);
        pump.stop();
    }

    #[test]
    fn test_stray_frame_header_only_costs_its_own_bytes() {
        let (ours, theirs) = MemoryLink::pair();
        let (pump, recorder, metrics) = start(ours);
        let codec = FrameCodec::default();

        let mut stream = vec![0xFD, 0x40, 0x00, 1, 1, 0, 0, 0];
        for seq in 0..4 {
            stream.extend(codec.encode(&packet(seq)).expect("encode"));
        }
        for piece in stream.chunks(16) {
            theirs.write(piece).expect("write");
        }

        wait_until(|| recorder.packets.lock().len() == 4);
        assert_eq!(metrics.snapshot().decode_errors, 8);
        pump.stop();
    }

    #[test]
    fn test_end_of_stream_reports_loss_once() {
        let (ours, theirs) = MemoryLink::pair();
        let (pump, recorder, _) = start(ours);
        theirs.close().expect("close");
        wait_until(|| !pump.is_running());
        assert_eq!(recorder.lost.lock().as_slice(), ["end of stream".to_string()]);
        pump.stop();
        assert_eq!(recorder.lost.lock().len(), 1);
    }

    #[test]
    fn test_stop_is_prompt_and_silent() {
        let (ours, _theirs) = MemoryLink::pair();
        let (pump, recorder, _) = start(ours);
        let start = Instant::now();
        pump.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(!pump.is_running());
        assert!(recorder.lost.lock().is_empty());
        pump.stop();
    }
}
