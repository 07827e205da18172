//! Various event sinks for different use cases

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use log::info;
use shuffle_rust::{Event, EventSink, PeerId, ShTime};

// ============================================================================
// Console Logging Sink
// ============================================================================

/// Logging event sink that outputs events through the `log` facade
pub struct ConsoleEventSink {
    enabled: bool,
}

impl ConsoleEventSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl EventSink for ConsoleEventSink {
    fn log(&mut self, round: ShTime, peer: PeerId, event: Event) {
        if !self.enabled {
            return;
        }

        match event {
            Event::ShuffleStarted {
                partner,
                offered,
                evicted,
            } => info!(
                "{:>5} {:>6x} ShuffleStarted   to:{:x} offered:{} {}",
                round,
                peer,
                partner,
                offered,
                if evicted { "evicted" } else { "" }
            ),
            Event::RequestAccepted { from_peer, offered } => info!(
                "{:>5} {:>6x} RequestAccepted  from:{:x} offered:{}",
                round, peer, from_peer, offered
            ),
            Event::RequestRejected { from_peer } => info!(
                "{:>5} {:>6x} RequestRejected  from:{:x}",
                round, peer, from_peer
            ),
            Event::ShuffleCompleted {
                partner,
                added,
                swapped,
                discarded,
            } => info!(
                "{:>5} {:>6x} ShuffleCompleted with:{:x} +{} ~{} -{}",
                round, peer, partner, added, swapped, discarded
            ),
            Event::ShuffleAborted { partner, restored } => info!(
                "{:>5} {:>6x} ShuffleAborted   by:{:x} {}",
                round,
                peer,
                partner,
                if restored { "restored" } else { "" }
            ),
            Event::UnexpectedMessage { from_peer, kind } => info!(
                "{:>5} {:>6x} Unexpected       {} from:{:x}",
                round, peer, kind, from_peer
            ),
        }
    }
}

// ============================================================================
// CSV Event Sink
// ============================================================================

/// CSV event sink for structured data export
pub struct CsvEventSink {
    writer: BufWriter<File>,
}

impl CsvEventSink {
    pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // Write CSV header
        writeln!(writer, "round,peer,event_type,related_peer,value1,value2,value3")?;

        Ok(Self { writer })
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

impl EventSink for CsvEventSink {
    fn log(&mut self, round: ShTime, peer: PeerId, event: Event) {
        let result = match event {
            Event::ShuffleStarted {
                partner,
                offered,
                evicted,
            } => writeln!(
                self.writer,
                "{},{},ShuffleStarted,{},{},{},0",
                round, peer, partner, offered, evicted as u8
            ),
            Event::RequestAccepted { from_peer, offered } => writeln!(
                self.writer,
                "{},{},RequestAccepted,{},{},0,0",
                round, peer, from_peer, offered
            ),
            Event::RequestRejected { from_peer } => writeln!(
                self.writer,
                "{},{},RequestRejected,{},0,0,0",
                round, peer, from_peer
            ),
            Event::ShuffleCompleted {
                partner,
                added,
                swapped,
                discarded,
            } => writeln!(
                self.writer,
                "{},{},ShuffleCompleted,{},{},{},{}",
                round, peer, partner, added, swapped, discarded
            ),
            Event::ShuffleAborted { partner, restored } => writeln!(
                self.writer,
                "{},{},ShuffleAborted,{},{},0,0",
                round, peer, partner, restored as u8
            ),
            Event::UnexpectedMessage { from_peer, kind } => writeln!(
                self.writer,
                "{},{},Unexpected,{},0,0,{}",
                round, peer, from_peer, kind
            ),
        };

        if let Err(e) = result {
            log::error!("Error writing to CSV: {}", e);
        }
    }
}

impl Drop for CsvEventSink {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

// ============================================================================
// Shared Sink
// ============================================================================

/// One sink fed by many nodes (every node owns a handle)
pub struct SharedSink<S: EventSink> {
    inner: Rc<RefCell<S>>,
}

impl<S: EventSink> SharedSink<S> {
    pub fn new(inner: Rc<RefCell<S>>) -> Self {
        Self { inner }
    }
}

impl<S: EventSink> EventSink for SharedSink<S> {
    fn log(&mut self, round: ShTime, peer: PeerId, event: Event) {
        self.inner.borrow_mut().log(round, peer, event);
    }
}

// ============================================================================
// Multi Sink (Combine Multiple Sinks)
// ============================================================================

/// Combines multiple event sinks
pub struct MultiEventSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl MultiEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }
}

impl EventSink for MultiEventSink {
    fn log(&mut self, round: ShTime, peer: PeerId, event: Event) {
        for sink in &mut self.sinks {
            sink.log(round, peer, event.clone());
        }
    }
}
