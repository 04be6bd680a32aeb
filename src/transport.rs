//! Adapter transport seam.
//!
//! The generic DAP wire state machine (envelope parsing, request dispatch,
//! event routing) lives outside this crate; the bridge only needs a
//! blocking round trip to the adapter process and the set of threads
//! currently suspended at a breakpoint. [`TcpAdapterTransport`] is the
//! default implementation speaking `Content-Length`-framed DAP over TCP.

use anyhow::anyhow;
use serde_json::Value;
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream};

/// Bridge-side view of the adapter connection.
pub trait AdapterTransport: Send {
    /// Forward a DAP message to the adapter process and block until its
    /// reply arrives.
    fn forward(&mut self, message: &Value) -> anyhow::Result<Value>;

    /// Threads currently suspended at a breakpoint in the adapter's model.
    fn stopped_threads(&self) -> Vec<i64>;
}

/// TCP transport with DAP `Content-Length` framing.
pub struct TcpAdapterTransport {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    stopped: HashSet<i64>,
}

impl TcpAdapterTransport {
    pub fn connect(addr: SocketAddr) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let reader = BufReader::new(stream.try_clone()?);
        Ok(Self {
            stream,
            reader,
            stopped: HashSet::new(),
        })
    }

    fn read_message(&mut self) -> anyhow::Result<Value> {
        let mut content_length: Option<usize> = None;
        loop {
            let mut line = String::new();
            let read_n = self.reader.read_line(&mut line)?;
            if read_n == 0 {
                return Err(anyhow!("adapter connection closed"));
            }
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                break;
            }
            if let Some(v) = line.strip_prefix("Content-Length:") {
                content_length = Some(v.trim().parse()?);
            }
        }

        let len = content_length.ok_or_else(|| anyhow!("Missing Content-Length header"))?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        let msg: Value = serde_json::from_slice(&buf)?;
        Ok(msg)
    }

    fn write_message(&mut self, message: &Value) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(message)?;
        write!(self.stream, "Content-Length: {}\r\n\r\n", payload.len())?;
        self.stream.write_all(&payload)?;
        self.stream.flush()?;
        Ok(())
    }

    fn note_event(&mut self, message: &Value) {
        let body = message.get("body");
        match message.get("event").and_then(Value::as_str) {
            Some("stopped") => {
                if let Some(thread_id) = body.and_then(|b| b.get("threadId")).and_then(Value::as_i64)
                {
                    self.stopped.insert(thread_id);
                }
            }
            Some("continued") => {
                let all = body
                    .and_then(|b| b.get("allThreadsContinued"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if all {
                    self.stopped.clear();
                } else if let Some(thread_id) =
                    body.and_then(|b| b.get("threadId")).and_then(Value::as_i64)
                {
                    self.stopped.remove(&thread_id);
                }
            }
            _ => {}
        }
    }
}

impl AdapterTransport for TcpAdapterTransport {
    fn forward(&mut self, message: &Value) -> anyhow::Result<Value> {
        self.write_message(message)?;
        let request_seq = message.get("seq").and_then(Value::as_i64);
        // Events may interleave with the reply; consume them until the
        // matching response arrives.
        loop {
            let incoming = self.read_message()?;
            match incoming.get("type").and_then(Value::as_str) {
                Some("event") => self.note_event(&incoming),
                Some("response")
                    if incoming.get("request_seq").and_then(Value::as_i64) == request_seq =>
                {
                    return Ok(incoming);
                }
                _ => log::warn!(target: "dapbridge", "unexpected adapter message: {incoming}"),
            }
        }
    }

    fn stopped_threads(&self) -> Vec<i64> {
        self.stopped.iter().copied().collect()
    }
}
