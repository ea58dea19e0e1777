use std::io::{self, ErrorKind, Read, Write};
use tracing::debug;

/// CRLF line framing over a serial stream whose reads time out.
pub struct LineLink<P> {
    port: P,
    pending: Vec<u8>,
}

impl<P: Read + Write> LineLink<P> {
    pub fn new(port: P) -> Self {
        LineLink {
            port,
            pending: Vec::new(),
        }
    }

    pub fn send_line(&mut self, text: &str) -> io::Result<()> {
        let line = format!("{}\r\n", text);
        self.port.write_all(line.as_bytes())?;
        self.port.flush()?;
        debug!("-> {:?}", line);
        Ok(())
    }

    /// Next complete line without its terminator, or `None` once the port
    /// stays silent for a full read timeout.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut buf = [0_u8; 256];
        loop {
            if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.pending.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&raw[..pos])
                    .trim_end_matches('\r')
                    .to_string();
                debug!("<- {:?}", line);
                return Ok(Some(line));
            }

            match self.port.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.extend_from_slice(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn get_mut(&mut self) -> &mut P {
        &mut self.port
    }
}
